use anyhow::{anyhow, Context, Result};
use camview::negotiation::{LogSink, RtcTransportFactory};
use camview::{
    catalog, create_router, AppState, BackendClient, Config, ConnectionStatus, HealthMonitor,
    Recording, RawRecording, SessionConfig, StreamSessionController,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "camview", version, about = "Live and archive viewer controller for surveillance cameras")]
struct Cli {
    /// Configuration file, without extension
    #[arg(long, default_value = "config/camview")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe the backend once
    Health,

    /// List one day of recordings for a channel, with timeline positions
    Search {
        #[arg(long)]
        channel: String,
        /// Day to search, YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Negotiate a live session and report its progress
    Live {
        #[arg(long)]
        channel: String,
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        for_secs: Option<u64>,
    },

    /// Negotiate playback of an archived interval
    Play {
        #[arg(long)]
        channel: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        for_secs: Option<u64>,
    },

    /// Run the local control API
    Serve,
}

struct Viewer {
    backend: Arc<BackendClient>,
    health: Arc<HealthMonitor>,
    controller: Arc<StreamSessionController>,
}

impl Viewer {
    fn build(cfg: &Config) -> Result<Self> {
        let backend = Arc::new(BackendClient::new(&cfg.backend)?);
        let health = Arc::new(HealthMonitor::new(backend.clone(), cfg.health.clone()));
        let controller = Arc::new(StreamSessionController::new(
            backend.clone(),
            Arc::new(RtcTransportFactory::new()?),
            Arc::new(LogSink),
            health.clone(),
            SessionConfig::from(&cfg.media),
        ));

        Ok(Self {
            backend,
            health,
            controller,
        })
    }

    /// Log session notifications until the process ends
    fn report_progress(&self) {
        let mut notifications = self.controller.subscribe();
        tokio::spawn(async move {
            while let Ok(note) = notifications.recv().await {
                info!(
                    "Session {} [{:?}] {:?} / {:?}",
                    note.session, note.kind, note.state, note.negotiation
                );
            }
        });
    }

    async fn hold(&self, for_secs: Option<u64>) -> Result<()> {
        match for_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => {
                info!("Press Ctrl-C to stop");
                tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
            }
        }
        self.controller.shutdown().await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("camview=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("camview v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", cfg.backend.base_url);

    let viewer = Viewer::build(&cfg)?;

    match cli.command {
        Command::Health => {
            let status = viewer.health.probe().await;
            println!("{}", serde_json::to_string(&status)?);
            if status == ConnectionStatus::Offline {
                return Err(anyhow!("backend offline"));
            }
        }

        Command::Search { channel, date } => {
            let result = catalog::search(viewer.backend.as_ref(), &channel, date).await?;

            if result.catalog.is_empty() {
                println!("No recordings found");
            }
            for recording in &result.catalog.recordings {
                println!(
                    "{}  {} - {}  ({})",
                    recording.channel(),
                    recording.start_time(),
                    recording.end_time(),
                    recording.duration_label()
                );
            }
            for segment in &result.segments {
                println!(
                    "  [{:6.2}% +{:6.2}%] {}",
                    segment.left_fraction * 100.0,
                    segment.width_fraction * 100.0,
                    segment.label
                );
            }
            if result.catalog.dropped > 0 {
                warn!("{} malformed recording(s) skipped", result.catalog.dropped);
            }
        }

        Command::Live { channel, for_secs } => {
            let monitor = viewer.health.clone().spawn();
            viewer.report_progress();
            let id = viewer.controller.start_live(&channel).await?;
            info!("Session {} negotiated, waiting for connectivity", id);
            viewer.hold(for_secs).await?;
            monitor.abort();
        }

        Command::Play {
            channel,
            start,
            end,
            for_secs,
        } => {
            let recording = Recording::from_raw(&RawRecording {
                channel,
                start_time: start,
                end_time: end,
            })?;

            let monitor = viewer.health.clone().spawn();
            viewer.report_progress();
            let id = viewer.controller.play(&recording).await?;
            info!("Session {} negotiated, waiting for connectivity", id);
            viewer.hold(for_secs).await?;
            monitor.abort();
        }

        Command::Serve => {
            let monitor = viewer.health.clone().spawn();

            let state = AppState::new(
                viewer.controller.clone(),
                viewer.health.clone(),
                viewer.backend.clone(),
            );
            let app = create_router(state);

            let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Control API listening on {}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
                .context("Control API server failed")?;

            viewer.controller.shutdown().await;
            monitor.abort();
        }
    }

    Ok(())
}
