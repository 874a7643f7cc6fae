use crate::catalog::RecordingQuery;
use crate::health::HealthMonitor;
use crate::session::StreamSessionController;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one controller that owns the active session
    pub controller: Arc<StreamSessionController>,

    pub health: Arc<HealthMonitor>,

    /// Backend used for archive searches
    pub recordings: Arc<dyn RecordingQuery>,
}

impl AppState {
    pub fn new(
        controller: Arc<StreamSessionController>,
        health: Arc<HealthMonitor>,
        recordings: Arc<dyn RecordingQuery>,
    ) -> Self {
        Self {
            controller,
            health,
            recordings,
        }
    }
}
