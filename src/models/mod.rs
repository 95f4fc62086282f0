//! Request and Response models for the caller-facing API
//!
//! This module defines the DTOs exchanged with the host application:
//! partial config updates in, health reports out.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::SyncConfigUpdate;
pub use responses::{HealthReport, HealthStatus};
