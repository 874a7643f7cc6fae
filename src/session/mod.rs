//! Stream session management
//!
//! This module provides the `StreamSessionController` that manages:
//! - The single active live or archive session
//! - Teardown of the previous session before the next one starts
//! - Negotiation progress and transport callbacks, stamped per session
//! - Session notifications and snapshots for UI collaborators

mod config;
mod controller;
mod session;

pub use config::SessionConfig;
pub use controller::StreamSessionController;
pub use session::{SessionId, SessionKind, SessionNotification, SessionSnapshot, SessionState};
