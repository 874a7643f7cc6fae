// Shared fakes for the integration tests
//
// Stand-ins for the backend, the platform transport and the video surface so
// the controller can be driven without a network or a media stack.

#![allow(dead_code)]

use camview::catalog::{ChannelId, RawRecording, Recording, RecordingQuery};
use camview::config::HealthConfig;
use camview::error::{Result, ViewerError};
use camview::negotiation::{
    IceConnectionState, MediaSink, MediaSource, MediaStreamHandle, MediaTransport, OfferOptions,
    SessionDescription, SignalingApi, TransportEvents, TransportFactory,
};
use camview::session::{SessionConfig, SessionId, SessionNotification, StreamSessionController};
use camview::{HealthMonitor, HealthProbe};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

pub const ANSWER_SDP: &str = "v=0\r\ns=-\r\nt=0 0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=sendonly\r\n";

/// Signaling backend that answers every offer unless told otherwise
#[derive(Default)]
pub struct FakeSignaling {
    /// Requests seen, as "live:<channel>" or "archive:<url>"
    pub calls: Mutex<Vec<String>>,
    /// Backend error returned for every negotiation
    pub error: Option<String>,
    /// When set, live negotiations wait here before answering
    pub hold_live: Option<Arc<Notify>>,
    /// Answer SDP to reply with instead of `ANSWER_SDP`
    pub answer: Option<String>,
    /// Offer SDPs received, in order
    pub offers: Mutex<Vec<String>>,
}

impl FakeSignaling {
    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn holding(gate: Arc<Notify>) -> Self {
        Self {
            hold_live: Some(gate),
            ..Default::default()
        }
    }

    pub fn answering(sdp: &str) -> Self {
        Self {
            answer: Some(sdp.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SignalingApi for FakeSignaling {
    async fn negotiate(
        &self,
        source: &MediaSource,
        offer: &SessionDescription,
    ) -> Result<SessionDescription> {
        let call = match source {
            MediaSource::Live { channel } => format!("live:{}", channel),
            MediaSource::Archive { playback_url, .. } => format!("archive:{}", playback_url),
        };
        self.calls.lock().unwrap().push(call);
        self.offers.lock().unwrap().push(offer.sdp.clone());

        if let (MediaSource::Live { .. }, Some(gate)) = (source, &self.hold_live) {
            gate.notified().await;
        }

        match &self.error {
            Some(message) => Err(ViewerError::Negotiation(message.clone())),
            None => Ok(SessionDescription::answer(
                self.answer.as_deref().unwrap_or(ANSWER_SDP),
            )),
        }
    }

    async fn playback_url(&self, recording: &Recording) -> Result<String> {
        Ok(format!(
            "rtsp://recorder/{}?start={}",
            recording.channel(),
            recording.start_time().format("%H%M%S")
        ))
    }
}

/// Transport handles created so far, so tests can raise callbacks on them
#[derive(Default)]
pub struct FakeTransports {
    pub events: Mutex<Vec<TransportEvents>>,
    pub offers: Mutex<Vec<OfferOptions>>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeTransports {
    /// Callback handle of the transport built for `session`
    pub fn events_for(&self, session: SessionId) -> TransportEvents {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|events| events.session() == session)
            .cloned()
            .expect("no transport created for session")
    }

    pub fn offers(&self) -> Vec<OfferOptions> {
        self.offers.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeTransport {
    offers: Arc<FakeTransports>,
    closed: bool,
}

#[async_trait::async_trait]
impl MediaTransport for FakeTransport {
    async fn create_offer(&mut self, options: &OfferOptions) -> Result<SessionDescription> {
        self.offers.offers.lock().unwrap().push(options.clone());
        Ok(SessionDescription::offer("v=0\r\ns=-\r\nt=0 0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\n"))
    }

    async fn set_remote_description(&mut self, _answer: SessionDescription) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.offers.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub struct FakeTransportFactory(pub Arc<FakeTransports>);

impl TransportFactory for FakeTransportFactory {
    fn create(&self, events: TransportEvents) -> Result<Box<dyn MediaTransport>> {
        self.0.events.lock().unwrap().push(events);
        Ok(Box::new(FakeTransport {
            offers: self.0.clone(),
            closed: false,
        }))
    }
}

/// Video surface that records attach/detach calls
#[derive(Default)]
pub struct RecordingSink {
    pub history: Mutex<Vec<String>>,
    attached: Mutex<bool>,
    /// Attaches made while another stream was still attached
    pub double_attach: AtomicUsize,
}

impl RecordingSink {
    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }

    pub fn is_attached(&self) -> bool {
        *self.attached.lock().unwrap()
    }
}

impl MediaSink for RecordingSink {
    fn attach(&self, stream: &MediaStreamHandle) {
        let mut attached = self.attached.lock().unwrap();
        if *attached {
            self.double_attach.fetch_add(1, Ordering::SeqCst);
        }
        *attached = true;
        self.history.lock().unwrap().push(format!("attach:{}", stream.id));
    }

    fn detach(&self) {
        *self.attached.lock().unwrap() = false;
        self.history.lock().unwrap().push("detach".to_string());
    }
}

/// Probe whose backend is always reachable
pub struct UpProbe;

#[async_trait::async_trait]
impl HealthProbe for UpProbe {
    async fn check(&self) -> Result<()> {
        Ok(())
    }

    async fn keepalive(&self) -> Result<()> {
        Ok(())
    }
}

/// Recording backend serving a fixed payload and counting calls
#[derive(Default)]
pub struct FakeRecordings {
    pub payload: Vec<RawRecording>,
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl RecordingQuery for FakeRecordings {
    async fn search_recordings(
        &self,
        _channel: &ChannelId,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<RawRecording>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

pub struct Harness {
    pub controller: Arc<StreamSessionController>,
    pub signaling: Arc<FakeSignaling>,
    pub transports: Arc<FakeTransports>,
    pub sink: Arc<RecordingSink>,
    pub health: Arc<HealthMonitor>,
}

impl Harness {
    pub fn new(signaling: FakeSignaling) -> Self {
        Self::with_config(signaling, SessionConfig::default())
    }

    pub fn with_config(signaling: FakeSignaling, config: SessionConfig) -> Self {
        let signaling = Arc::new(signaling);
        let transports = Arc::new(FakeTransports::default());
        let sink = Arc::new(RecordingSink::default());
        let health = Arc::new(HealthMonitor::new(Arc::new(UpProbe), HealthConfig::default()));

        let controller = Arc::new(StreamSessionController::new(
            signaling.clone(),
            Arc::new(FakeTransportFactory(transports.clone())),
            sink.clone(),
            health.clone(),
            config,
        ));

        Self {
            controller,
            signaling,
            transports,
            sink,
            health,
        }
    }

    /// Report a stream and ICE connectivity for `session`
    pub fn connect(&self, session: SessionId, stream: &str) {
        let events = self.transports.events_for(session);
        events.track_arrived(MediaStreamHandle {
            id: stream.to_string(),
        });
        events.ice_state_changed(IceConnectionState::Connected);
    }
}

pub fn recording(channel: &str, start: &str, end: &str) -> Recording {
    Recording::from_raw(&RawRecording {
        channel: channel.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
    })
    .expect("valid recording")
}

/// Wait for the first notification matching `predicate`
pub async fn wait_for<F>(
    rx: &mut broadcast::Receiver<SessionNotification>,
    predicate: F,
) -> SessionNotification
where
    F: Fn(&SessionNotification) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let note = rx.recv().await.expect("notification channel closed");
            if predicate(&note) {
                return note;
            }
        }
    })
    .await
    .expect("timed out waiting for session notification")
}

/// Everything already published, without waiting
pub fn drain(rx: &mut broadcast::Receiver<SessionNotification>) -> Vec<SessionNotification> {
    let mut notes = Vec::new();
    while let Ok(note) = rx.try_recv() {
        notes.push(note);
    }
    notes
}
