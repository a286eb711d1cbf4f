// ABOUTME: Session storage and lifecycle management
// Repository for durable records, service for reconciliation with the live multiplexer

pub mod error;
pub mod repository;
pub mod service;

pub use error::SessionError;
pub use repository::{ListReport, SessionRepository};
pub use service::SessionService;
