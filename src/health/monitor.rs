use crate::config::HealthConfig;
use crate::error::Result;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Process-wide backend reachability as shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
}

impl ConnectionStatus {
    fn worse(self, other: ConnectionStatus) -> ConnectionStatus {
        if self == ConnectionStatus::Offline || other == ConnectionStatus::Offline {
            ConnectionStatus::Offline
        } else {
            ConnectionStatus::Online
        }
    }
}

/// Cheap liveness endpoints of the backend
#[async_trait::async_trait]
pub trait HealthProbe: Send + Sync {
    /// Succeeds when the backend answers with a success status
    async fn check(&self) -> Result<()>;

    /// Keeps an active media session's backend resources alive
    async fn keepalive(&self) -> Result<()>;
}

/// Latest value of each signal; `None` until that signal has reported
#[derive(Debug, Clone, Copy, Default)]
struct Signals {
    polled: Option<ConnectionStatus>,
    pushed: Option<ConnectionStatus>,
}

impl Signals {
    fn combined(&self) -> ConnectionStatus {
        match (self.polled, self.pushed) {
            (Some(polled), Some(pushed)) => polled.worse(pushed),
            (Some(status), None) | (None, Some(status)) => status,
            (None, None) => ConnectionStatus::Offline,
        }
    }
}

pub struct HealthMonitor {
    probe: Arc<dyn HealthProbe>,
    config: HealthConfig,
    signals: Mutex<Signals>,
    status_tx: watch::Sender<ConnectionStatus>,
    probe_requested: Notify,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>, config: HealthConfig) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Offline);
        Self {
            probe,
            config,
            signals: Mutex::new(Signals::default()),
            status_tx,
            probe_requested: Notify::new(),
        }
    }

    /// Current published status
    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    fn update(&self, apply: impl FnOnce(&mut Signals)) {
        let combined = {
            let mut signals = self.signals.lock().unwrap_or_else(|e| e.into_inner());
            apply(&mut signals);
            signals.combined()
        };

        let previous = self.status_tx.send_replace(combined);
        if previous != combined {
            info!("Connection status: {:?} -> {:?}", previous, combined);
        }
    }

    fn pushed(&self) -> Option<ConnectionStatus> {
        self.signals.lock().unwrap_or_else(|e| e.into_inner()).pushed
    }

    /// Record a connectivity change reported by the active session
    pub fn push(&self, status: ConnectionStatus) {
        self.update(|signals| signals.pushed = Some(status));
    }

    /// Forget the pushed signal; used when a new session starts negotiating
    pub fn clear_push(&self) {
        self.update(|signals| signals.pushed = None);
    }

    /// Probe the backend once, bounded by the configured timeout
    pub async fn probe(&self) -> ConnectionStatus {
        let polled = match time::timeout(self.config.probe_timeout(), self.probe.check()).await {
            Ok(Ok(())) => ConnectionStatus::Online,
            Ok(Err(e)) => {
                warn!("Health probe failed: {}", e);
                ConnectionStatus::Offline
            }
            Err(_) => {
                warn!(
                    "Health probe timed out after {:?}",
                    self.config.probe_timeout()
                );
                ConnectionStatus::Offline
            }
        };

        self.update(|signals| signals.polled = Some(polled));
        polled
    }

    /// Ask the background task for an immediate probe without waiting for it
    pub fn request_probe(&self) {
        self.probe_requested.notify_one();
    }

    /// Run periodic probes, on-demand probes and keepalive pings until aborted
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Health monitor started (probe every {:?}, keepalive every {:?})",
                self.config.probe_interval(),
                self.config.keepalive_interval()
            );

            let mut probe_tick = time::interval(self.config.probe_interval());
            probe_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let keepalive_period = self.config.keepalive_interval();
            let mut keepalive_tick =
                time::interval_at(Instant::now() + keepalive_period, keepalive_period);
            keepalive_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = probe_tick.tick() => {
                        self.probe().await;
                    }
                    _ = self.probe_requested.notified() => {
                        self.probe().await;
                    }
                    _ = keepalive_tick.tick() => {
                        if self.pushed() == Some(ConnectionStatus::Online) {
                            if let Err(e) = self.probe.keepalive().await {
                                debug!("Keepalive ping failed: {}", e);
                            }
                        }
                    }
                }
            }
        })
    }
}
