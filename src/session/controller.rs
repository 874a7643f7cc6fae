use super::config::SessionConfig;
use super::session::{
    Session, SessionId, SessionKind, SessionNotification, SessionSnapshot, SessionState,
};
use crate::catalog::{ChannelId, Recording};
use crate::error::{Result, ViewerError};
use crate::health::{ConnectionStatus, HealthMonitor};
use crate::negotiation::{
    IceConnectionState, MediaSink, MediaSource, NegotiationObserver, NegotiationState,
    Negotiator, SignalingApi, TaggedEvent, TransportEvent, TransportEvents, TransportFactory,
};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Owns the single active viewing session.
///
/// Starting a session always tears the previous one down first, under the
/// slot lock, so two non-terminal sessions never coexist. Transport callbacks
/// are funnelled through one event loop and applied only to the session they
/// were stamped with.
pub struct StreamSessionController {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn SignalingApi>,
    transports: Arc<dyn TransportFactory>,
    sink: Arc<dyn MediaSink>,
    health: Arc<HealthMonitor>,
    config: SessionConfig,
    slot: Mutex<Option<Session>>,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    notify_tx: broadcast::Sender<SessionNotification>,
}

impl StreamSessionController {
    /// Create the controller and spawn its event loop on the current runtime
    pub fn new(
        api: Arc<dyn SignalingApi>,
        transports: Arc<dyn TransportFactory>,
        sink: Arc<dyn MediaSink>,
        health: Arc<HealthMonitor>,
        config: SessionConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notify_tx, _) = broadcast::channel(64);

        let inner = Arc::new(Inner {
            api,
            transports,
            sink,
            health,
            config,
            slot: Mutex::new(None),
            events_tx,
            notify_tx,
        });

        tokio::spawn(Inner::event_loop(Arc::downgrade(&inner), events_rx));

        Self { inner }
    }

    /// Subscribe to session state changes
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotification> {
        self.inner.notify_tx.subscribe()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.health.status()
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        self.inner.slot.lock().await.as_ref().map(Session::snapshot)
    }

    /// Watch a live channel.
    ///
    /// Returns once the answer is applied and connectivity checks are running.
    pub async fn start_live(&self, channel: &str) -> Result<SessionId> {
        let channel = ChannelId::parse(channel)?;
        let source = MediaSource::Live { channel };

        let id = self.inner.begin(SessionKind::Live, source.describe()).await?;
        self.inner.negotiate(id, source).await
    }

    /// Replay an archived recording
    pub async fn start_archive(&self, recording: &Recording) -> Result<SessionId> {
        let id = self
            .inner
            .begin(SessionKind::Archive, MediaSource::describe_archive(recording))
            .await?;

        let playback_url = self.inner.api.playback_url(recording).await;
        self.inner.ensure_current(id).await?;
        let playback_url = match playback_url {
            Ok(url) => url,
            Err(e) => return Err(self.inner.fail(id, e).await),
        };

        debug!("Session {} resolved playback URL {}", id, playback_url);

        let source = MediaSource::Archive {
            playback_url,
            recording: recording.clone(),
        };
        self.inner.negotiate(id, source).await
    }

    /// Entry point for timeline and list clicks
    pub async fn play(&self, recording: &Recording) -> Result<SessionId> {
        self.start_archive(recording).await
    }

    /// Tear down the active session, if any. Safe to call repeatedly.
    pub async fn stop(&self) {
        self.inner.teardown().await;
        self.inner.health.push(ConnectionStatus::Offline);
    }

    /// Unload path; identical to `stop`
    pub async fn shutdown(&self) {
        info!("Shutting down session controller");
        self.stop().await;
    }
}

impl Inner {
    fn notify(&self, session: &Session) {
        // No subscribers is fine
        let _ = self.notify_tx.send(session.notification());
    }

    fn current<'a>(slot: &'a mut Option<Session>, id: SessionId) -> Result<&'a mut Session> {
        match slot.as_mut() {
            Some(session) if session.id == id && !session.state.is_terminal() => Ok(session),
            _ => Err(ViewerError::Superseded(id)),
        }
    }

    /// Release the transport and the sink held by `session`
    async fn release(&self, session: &mut Session) {
        if let Some(watchdog) = session.watchdog.take() {
            watchdog.abort();
        }

        if let Some(transport) = session.transport.take() {
            let mut transport = transport.lock().await;
            debug!("Closing {} transport for session {}", transport.name(), session.id);
            transport.close().await;
        }

        if session.sink_attached {
            self.sink.detach();
            session.sink_attached = false;
        }
        session.pending_stream = None;
    }

    async fn close_session(&self, mut session: Session) {
        if session.state == SessionState::Closed {
            return;
        }

        self.release(&mut session).await;
        session.negotiation = session
            .negotiation
            .transition(NegotiationState::Closed)
            .unwrap_or(NegotiationState::Closed);
        session.state = SessionState::Closed;

        info!("Session {} closed", session.id);
        self.notify(&session);
    }

    async fn teardown(&self) {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            Some(session) => self.close_session(session).await,
            None => debug!("Teardown requested with no active session"),
        }
    }

    /// Close whatever holds the slot and install a fresh session
    async fn begin(&self, kind: SessionKind, source: String) -> Result<SessionId> {
        let mut slot = self.slot.lock().await;

        if let Some(previous) = slot.take() {
            info!("Replacing session {} ({})", previous.id, previous.source);
            self.close_session(previous).await;
        }

        let id = SessionId::new();
        let transport = match self
            .transports
            .create(TransportEvents::new(id, self.events_tx.clone()))
        {
            Ok(transport) => transport,
            Err(e) => {
                error!("Failed to create transport: {}", e);
                self.health.push(ConnectionStatus::Offline);
                return Err(e);
            }
        };

        let session = Session::new(id, kind, source, Arc::new(Mutex::new(transport)));
        info!("Session {} started: {}", id, session.source);

        self.health.clear_push();
        self.notify(&session);
        *slot = Some(session);

        Ok(id)
    }

    async fn negotiate(&self, id: SessionId, source: MediaSource) -> Result<SessionId> {
        let transport = {
            let mut slot = self.slot.lock().await;
            let session = Self::current(&mut slot, id)?;
            match &session.transport {
                Some(transport) => Arc::clone(transport),
                None => return Err(ViewerError::Superseded(id)),
            }
        };

        let options = self.config.offer_options(&source);
        let result = Negotiator::new(id, transport)
            .run(self.api.as_ref(), &source, &options, self)
            .await;

        match result {
            Ok(_) => {
                self.arm_watchdog(id).await;
                Ok(id)
            }
            Err(ViewerError::Superseded(_)) => {
                debug!("Negotiation for session {} abandoned", id);
                Err(ViewerError::Superseded(id))
            }
            Err(e) => Err(self.fail(id, e).await),
        }
    }

    async fn arm_watchdog(&self, id: SessionId) {
        let Some(timeout) = self.config.ice_timeout else {
            return;
        };

        let mut slot = self.slot.lock().await;
        if let Ok(session) = Self::current(&mut slot, id) {
            let events = TransportEvents::new(id, self.events_tx.clone());
            session.watchdog = Some(tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                events.emit(TransportEvent::IceTimedOut);
            }));
        }
    }

    /// Move `id` to Failed and release its handles.
    ///
    /// Returns the error to hand back to the caller: the original one, or
    /// `Superseded` when the session was already replaced.
    async fn fail(&self, id: SessionId, err: ViewerError) -> ViewerError {
        let mut slot = self.slot.lock().await;
        match Self::current(&mut slot, id) {
            Ok(session) => {
                self.fail_locked(session, &err).await;
                err
            }
            Err(superseded) => {
                debug!("Dropping failure for replaced session {}: {}", id, err);
                superseded
            }
        }
    }

    async fn fail_locked(&self, session: &mut Session, err: &ViewerError) {
        warn!("Session {} failed: {}", session.id, err);

        self.release(session).await;
        session.negotiation = session
            .negotiation
            .transition(NegotiationState::Failed)
            .unwrap_or(NegotiationState::Failed);
        session.state = SessionState::Failed {
            reason: err.to_string(),
        };

        self.health.push(ConnectionStatus::Offline);
        self.health.request_probe();
        self.notify(session);
    }

    async fn event_loop(inner: Weak<Inner>, mut events_rx: mpsc::UnboundedReceiver<TaggedEvent>) {
        while let Some(tagged) = events_rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.handle_event(tagged).await;
        }
        debug!("Session event loop stopped");
    }

    async fn handle_event(&self, tagged: TaggedEvent) {
        let mut slot = self.slot.lock().await;
        let session = match Self::current(&mut slot, tagged.session) {
            Ok(session) => session,
            Err(_) => {
                debug!(
                    "Discarding stale {:?} for session {}",
                    tagged.event, tagged.session
                );
                return;
            }
        };

        match tagged.event {
            TransportEvent::IceStateChanged(state) if state.is_connected() => {
                self.on_connected(session);
            }
            TransportEvent::IceStateChanged(state) if state.is_lost() => {
                let err = ViewerError::Media(format!("ICE connection {}", ice_label(state)));
                self.fail_locked(session, &err).await;
            }
            TransportEvent::IceStateChanged(state) => {
                debug!("Session {} ICE state {:?}", session.id, state);
            }
            TransportEvent::TrackArrived(stream) => {
                if session.sink_attached || session.pending_stream.is_some() {
                    debug!("Session {} already has stream, ignoring {}", session.id, stream.id);
                } else if session.state == SessionState::Connected {
                    self.sink.attach(&stream);
                    session.sink_attached = true;
                } else {
                    session.pending_stream = Some(stream);
                }
            }
            TransportEvent::MediaFailed(reason) => {
                self.fail_locked(session, &ViewerError::Media(reason)).await;
            }
            TransportEvent::IceTimedOut => {
                if session.state != SessionState::Connected {
                    let err = ViewerError::Transport(format!(
                        "ICE connectivity not established within {:?}",
                        self.config.ice_timeout.unwrap_or_default()
                    ));
                    self.fail_locked(session, &err).await;
                }
            }
        }
    }

    fn on_connected(&self, session: &mut Session) {
        if session.state == SessionState::Connected {
            return;
        }

        // The transport may report connectivity before the negotiator has
        // recorded that the answer was applied.
        if session.negotiation == NegotiationState::AnswerReceived {
            session.negotiation = NegotiationState::IceConnecting;
        }
        match session.negotiation.transition(NegotiationState::Connected) {
            Ok(state) => session.negotiation = state,
            Err(e) => {
                warn!("Session {} ignoring early connectivity: {}", session.id, e);
                return;
            }
        }

        session.state = SessionState::Connected;
        if let Some(stream) = session.pending_stream.take() {
            self.sink.attach(&stream);
            session.sink_attached = true;
        }

        info!("Session {} connected", session.id);
        self.health.push(ConnectionStatus::Online);
        self.health.request_probe();
        self.notify(session);
    }
}

#[async_trait::async_trait]
impl NegotiationObserver for Inner {
    async fn on_transition(&self, session: SessionId, state: NegotiationState) -> Result<()> {
        {
            let mut slot = self.slot.lock().await;
            let current = Self::current(&mut slot, session)?;
            if current.negotiation.has_reached(state) {
                return Ok(());
            }
            current.negotiation = current.negotiation.transition(state)?;
            self.notify(current);
        }
        self.health.request_probe();
        Ok(())
    }

    async fn ensure_current(&self, session: SessionId) -> Result<()> {
        let mut slot = self.slot.lock().await;
        Self::current(&mut slot, session).map(|_| ())
    }
}

fn ice_label(state: IceConnectionState) -> &'static str {
    match state {
        IceConnectionState::Disconnected => "disconnected",
        IceConnectionState::Failed => "failed",
        IceConnectionState::Closed => "closed",
        _ => "lost",
    }
}
