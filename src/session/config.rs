use crate::config::MediaConfig;
use crate::negotiation::{MediaSource, OfferOptions};
use std::time::Duration;

/// Configuration for the sessions a controller creates
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// STUN/TURN servers handed to each transport
    pub ice_servers: Vec<String>,

    /// Request audio alongside video for live channels
    pub live_audio: bool,

    /// Fail a session whose ICE has not connected within this window.
    /// None leaves it to the transport's own timeout or an explicit stop.
    pub ice_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Archive playback always offers video only
    pub fn offer_options(&self, source: &MediaSource) -> OfferOptions {
        OfferOptions {
            receive_video: true,
            receive_audio: matches!(source, MediaSource::Live { .. }) && self.live_audio,
            ice_servers: self.ice_servers.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&MediaConfig::default())
    }
}

impl From<&MediaConfig> for SessionConfig {
    fn from(media: &MediaConfig) -> Self {
        Self {
            ice_servers: media.ice_servers.clone(),
            live_audio: media.live_audio,
            ice_timeout: media.ice_timeout(),
        }
    }
}
