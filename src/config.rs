use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub health: HealthConfig,
    pub media: MediaConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the signaling/storage service, e.g. "http://127.0.0.1:8082"
    pub base_url: String,
    /// Per-request timeout applied by the HTTP client
    pub request_timeout_secs: u64,
    pub endpoints: EndpointsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsConfig {
    pub negotiate_live: String,
    pub negotiate_archive: String,
    pub recordings: String,
    pub playback_url: String,
    pub health: String,
    pub ping: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
    pub keepalive_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub ice_servers: Vec<String>,
    /// Ask for audio alongside video on live channels
    pub live_audio: bool,
    /// Fail sessions whose ICE never connects; unset means wait for the transport
    pub ice_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl HealthConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: 30,
            probe_timeout_ms: 5000,
            keepalive_interval_secs: 60,
        }
    }
}

impl MediaConfig {
    pub fn ice_timeout(&self) -> Option<Duration> {
        self.ice_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            live_audio: true,
            ice_timeout_secs: None,
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            negotiate_live: "/negotiate/live".to_string(),
            negotiate_archive: "/negotiate/archive".to_string(),
            recordings: "/recordings".to_string(),
            playback_url: "/playback-url".to_string(),
            health: "/health".to_string(),
            ping: "/ping".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file and `CAMVIEW__*` environment
    /// variables, layered over built-in defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CAMVIEW").separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid camview configuration")
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let endpoints = EndpointsConfig::default();
        let health = HealthConfig::default();
        let media = MediaConfig::default();

        let builder = config::Config::builder()
            .set_default("backend.base_url", "http://127.0.0.1:8082")?
            .set_default("backend.request_timeout_secs", 10)?
            .set_default("backend.endpoints.negotiate_live", endpoints.negotiate_live)?
            .set_default("backend.endpoints.negotiate_archive", endpoints.negotiate_archive)?
            .set_default("backend.endpoints.recordings", endpoints.recordings)?
            .set_default("backend.endpoints.playback_url", endpoints.playback_url)?
            .set_default("backend.endpoints.health", endpoints.health)?
            .set_default("backend.endpoints.ping", endpoints.ping)?
            .set_default("health.probe_interval_secs", health.probe_interval_secs)?
            .set_default("health.probe_timeout_ms", health.probe_timeout_ms)?
            .set_default("health.keepalive_interval_secs", health.keepalive_interval_secs)?
            .set_default("media.ice_servers", media.ice_servers)?
            .set_default("media.live_audio", media.live_audio)?
            .set_default("http.bind", "127.0.0.1")?
            .set_default("http.port", 8090)?;

        Ok(builder)
    }
}
