//! Connection health monitoring
//!
//! Combines a periodic liveness probe of the backend with the connectivity
//! state pushed by the active session. The published status is the worse of
//! the two, so an ICE failure shows up immediately instead of at the next tick.

mod monitor;

pub use monitor::{ConnectionStatus, HealthMonitor, HealthProbe};
