//! Local control API for UI collaborators
//!
//! This module provides a JSON API over the session controller:
//! - POST /live/:channel - Start watching a live channel
//! - POST /archive - Replay a recording
//! - POST /stop - Tear down the active session
//! - GET /status - Connection badge and session snapshot
//! - GET /recordings?channel=&date= - Ordered recordings and timeline segments
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
