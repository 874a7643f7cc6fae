use super::messages::{
    ArchiveOfferRequest, ErrorBody, LiveOfferQuery, PlaybackUrlQuery, PlaybackUrlResponse,
    RecordingsQuery, RecordingsResponse,
};
use crate::catalog::{format_timestamp, ChannelId, RawRecording, Recording, RecordingQuery};
use crate::config::{BackendConfig, EndpointsConfig};
use crate::error::{Result, ViewerError};
use crate::health::HealthProbe;
use crate::negotiation::{MediaSource, SdpType, SessionDescription, SignalingApi};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

/// HTTP client for the signaling/storage backend
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    endpoints: EndpointsConfig,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ViewerError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        info!("Backend client targeting {}", config.base_url);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a backend response.
    ///
    /// An `error` field wins over the HTTP status and is returned verbatim;
    /// otherwise a non-success status becomes a transport error.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await?;

        if let Ok(ErrorBody { error: Some(message) }) = serde_json::from_slice(&body) {
            if !message.is_empty() {
                return Err(ViewerError::Negotiation(message));
            }
        }

        if !status.is_success() {
            return Err(ViewerError::Transport(format!("HTTP {}", status)));
        }

        serde_json::from_slice(&body)
            .map_err(|e| ViewerError::Transport(format!("Invalid backend response: {}", e)))
    }
}

#[async_trait::async_trait]
impl SignalingApi for BackendClient {
    async fn negotiate(
        &self,
        source: &MediaSource,
        offer: &SessionDescription,
    ) -> Result<SessionDescription> {
        let request = match source {
            MediaSource::Live { channel } => self
                .http
                .post(self.url(&self.endpoints.negotiate_live))
                .query(&LiveOfferQuery {
                    channel: channel.as_str(),
                })
                .json(offer),
            MediaSource::Archive { playback_url, .. } => self
                .http
                .post(self.url(&self.endpoints.negotiate_archive))
                .json(&ArchiveOfferRequest {
                    offer: offer.clone(),
                    url: playback_url.clone(),
                }),
        };

        debug!("Sending offer for {}", source.describe());
        let answer: SessionDescription = Self::decode(request.send().await?).await?;

        if answer.kind != SdpType::Answer {
            return Err(ViewerError::Transport(format!(
                "Backend returned {:?} where an answer was expected",
                answer.kind
            )));
        }

        Ok(answer)
    }

    async fn playback_url(&self, recording: &Recording) -> Result<String> {
        let response = self
            .http
            .get(self.url(&self.endpoints.playback_url))
            .query(&PlaybackUrlQuery {
                channel: recording.channel().as_str(),
                start: format_timestamp(&recording.start_time()),
                end: format_timestamp(&recording.end_time()),
            })
            .send()
            .await?;

        let body: PlaybackUrlResponse = Self::decode(response).await?;
        Ok(body.url)
    }
}

#[async_trait::async_trait]
impl RecordingQuery for BackendClient {
    async fn search_recordings(
        &self,
        channel: &ChannelId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRecording>> {
        let response = self
            .http
            .get(self.url(&self.endpoints.recordings))
            .header("Cache-Control", "no-cache")
            .query(&RecordingsQuery {
                channel: channel.as_str(),
                start: start.format("%Y-%m-%d").to_string(),
                end: end.format("%Y-%m-%d").to_string(),
            })
            .send()
            .await?;

        let body: RecordingsResponse = Self::decode(response).await?;
        Ok(body.recordings.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl HealthProbe for BackendClient {
    async fn check(&self) -> Result<()> {
        self.http
            .get(self.url(&self.endpoints.health))
            .header("Cache-Control", "no-cache")
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn keepalive(&self) -> Result<()> {
        self.http
            .get(self.url(&self.endpoints.ping))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
