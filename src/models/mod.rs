// ABOUTME: Core data models for persisted muxkeep sessions

pub mod session;

pub use session::{Session, SessionStatus};
