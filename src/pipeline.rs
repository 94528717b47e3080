use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::Deployment;
use crate::error::PlanError;
use crate::metrics::{MetricsRegistry, Phase};
use crate::plan::diagnostic::render_for_display;
use crate::plan::PlanEngine;
use crate::source::SourceFetcher;
use crate::state::{DeploymentRecord, StateStore};

/// Terminal state of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Deployment is disabled; nothing was touched.
    Skipped,
    /// A previous run for the same deployment is still in flight.
    AlreadyRunning,
    FetchFailed,
    PlanFailed,
    Succeeded { drifted: bool },
}

/// Fetch, plan and classify one deployment, then publish the result.
pub struct DriftCheckPipeline {
    fetcher: Arc<dyn SourceFetcher>,
    engine: Arc<dyn PlanEngine>,
    state: Arc<StateStore>,
    metrics: Arc<MetricsRegistry>,
    running: Mutex<HashSet<String>>,
}

struct RunGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.lock().remove(&self.name);
    }
}

impl DriftCheckPipeline {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        engine: Arc<dyn PlanEngine>,
        state: Arc<StateStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            fetcher,
            engine,
            state,
            metrics,
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.lock().contains(name)
    }

    fn claim(&self, name: &str) -> Option<RunGuard<'_>> {
        if !self.running.lock().insert(name.to_string()) {
            return None;
        }
        Some(RunGuard {
            running: &self.running,
            name: name.to_string(),
        })
    }

    pub async fn run(&self, deployment: &Deployment) -> RunOutcome {
        let name = deployment.name.as_str();
        if !deployment.enabled {
            info!(deployment = %name, "skipping deployment because it is disabled");
            return RunOutcome::Skipped;
        }
        let Some(_guard) = self.claim(name) else {
            warn!(deployment = %name, "previous drift check still running, skipping this tick");
            return RunOutcome::AlreadyRunning;
        };

        let started = Instant::now();
        info!(deployment = %name, "processing deployment");

        let copy = match self.fetcher.fetch(&deployment.git).await {
            Ok(copy) => copy,
            Err(err) => {
                self.state.set(
                    name,
                    DeploymentRecord::failed(name).with_metadata("error", json!(err.to_string())),
                );
                self.metrics.record_failure(name);
                self.metrics
                    .record_duration(name, Phase::Fetch, started.elapsed().as_secs_f64());
                error!(deployment = %name, "error cloning repository: {err}");
                return RunOutcome::FetchFailed;
            }
        };
        self.metrics
            .record_duration(name, Phase::Fetch, started.elapsed().as_secs_f64());

        let plan_started = Instant::now();
        let target = copy.path().join(&deployment.source_root);
        let outcome = match self.engine.plan(&target, &deployment.env_vars).await {
            Ok((is_different, plan)) => {
                let effective = plan.count_resources_except_noop_and_read();
                debug!(deployment = %name, effective, "plan drift resources count");
                if is_different {
                    warn!(
                        deployment = %name,
                        "the plan shows differences between the code and the actual infrastructure"
                    );
                    warn!(
                        deployment = %name,
                        "breakdown by types of the changes that would be applied: {}",
                        plan.changes_breakdown()
                    );
                }
                self.state
                    .set(name, DeploymentRecord::succeeded(name, is_different, plan));
                self.metrics.record_success(name, effective);
                self.metrics
                    .record_duration(name, Phase::Plan, plan_started.elapsed().as_secs_f64());
                self.metrics
                    .record_duration(name, Phase::Total, started.elapsed().as_secs_f64());
                RunOutcome::Succeeded {
                    drifted: is_different,
                }
            }
            Err(err) => {
                self.state.set(
                    name,
                    DeploymentRecord::failed(name).with_metadata("error", json!(err.to_string())),
                );
                self.metrics.record_failure(name);
                self.metrics
                    .record_duration(name, Phase::Total, started.elapsed().as_secs_f64());
                match &err {
                    PlanError::Tool { command, details } => error!(
                        deployment = %name,
                        "`{command}` failed:\n{}",
                        render_for_display(details)
                    ),
                    other => error!(deployment = %name, "drift check failed: {other}"),
                }
                RunOutcome::PlanFailed
            }
        };

        copy.discard().await;
        outcome
    }
}
