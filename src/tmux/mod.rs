// ABOUTME: tmux backend for the multiplexer interface
// Process invocation, the listing wire format, and the adapter itself

pub mod adapter;
pub mod format;
pub mod runner;

pub use adapter::TmuxAdapter;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
