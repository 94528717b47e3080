use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::metrics::MetricsRegistry;
use crate::pipeline::DriftCheckPipeline;
use crate::plan::PlanEngine;
use crate::scheduler::Scheduler;
use crate::server::ApiState;
use crate::source::SourceFetcher;
use crate::state::StateStore;

/// The objects that live for the whole process, built once at startup.
pub struct App {
    pub state: Arc<StateStore>,
    pub metrics: Arc<MetricsRegistry>,
    pub scheduler: Arc<Scheduler>,
}

impl App {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, engine: Arc<dyn PlanEngine>) -> Self {
        let state = Arc::new(StateStore::new());
        let metrics = Arc::new(MetricsRegistry::new());
        let pipeline = Arc::new(DriftCheckPipeline::new(
            fetcher,
            engine,
            Arc::clone(&state),
            Arc::clone(&metrics),
        ));
        Self {
            state,
            metrics,
            scheduler: Arc::new(Scheduler::new(pipeline)),
        }
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Re-reads the config and swaps the job set. On error the current jobs stay active.
pub fn reload(path: &Path, scheduler: &Scheduler) -> Result<AppConfig, ConfigError> {
    let config = AppConfig::load(path)?;
    let active = scheduler.load(&config.infrastructure_deployments);
    info!(jobs = active, "reloaded configuration from {}", path.display());
    Ok(config)
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// Polls `path` and reloads whenever its modification time changes.
pub async fn watch_config(path: PathBuf, scheduler: Arc<Scheduler>, every: Duration) {
    let mut last_seen = modified_at(&path).await;
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if scheduler.is_shut_down() {
            return;
        }
        let current = modified_at(&path).await;
        if current.is_none() {
            warn!("configuration file {} is not readable", path.display());
            continue;
        }
        if current == last_seen {
            continue;
        }
        last_seen = current;
        if let Err(err) = reload(&path, &scheduler) {
            error!("configuration reload rejected, keeping previous jobs: {err}");
        }
    }
}

pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("failed registering unix signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("signal received, shutting down");
}
