// ABOUTME: Library crate for muxkeep exposing the session service and its collaborators

pub mod config;
pub mod models;
pub mod multiplexer;
pub mod session;
pub mod tmux;
