use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Deployment;
use crate::pipeline::DriftCheckPipeline;

const MINUTE: Duration = Duration::from_secs(60);

/// One fixed-rate timer per enabled deployment, keyed by deployment name.
///
/// Timers only trigger runs; each run is spawned as its own task so a slow check
/// never delays the next tick. Runs already in flight are not cancelled by
/// [`Scheduler::load`] or [`Scheduler::shutdown`].
pub struct Scheduler {
    pipeline: Arc<DriftCheckPipeline>,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Scheduler {
    pub fn new(pipeline: Arc<DriftCheckPipeline>) -> Self {
        Self {
            pipeline,
            jobs: Mutex::new(HashMap::new()),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn pipeline(&self) -> &Arc<DriftCheckPipeline> {
        &self.pipeline
    }

    /// Replaces the whole job set. Must be called from within a tokio runtime.
    ///
    /// Returns the number of active timers afterwards.
    pub fn load(&self, deployments: &[Deployment]) -> usize {
        let mut jobs = self.jobs.lock();
        for (name, handle) in jobs.drain() {
            debug!(deployment = %name, "removing job");
            handle.abort();
        }
        if self.stopped.load(Ordering::SeqCst) {
            warn!("scheduler is shut down, not loading jobs");
            return 0;
        }

        for deployment in deployments {
            if !deployment.enabled {
                info!(deployment = %deployment.name, "not scheduling disabled deployment");
                continue;
            }
            let period = interval_period(deployment.drift_check_interval);
            info!(
                deployment = %deployment.name,
                every = ?period,
                "adding job for deployment"
            );
            let handle = tokio::spawn(job_loop(
                Arc::clone(&self.pipeline),
                Arc::new(deployment.clone()),
                period,
            ));
            if let Some(previous) = jobs.insert(deployment.name.clone(), handle) {
                warn!(deployment = %deployment.name, "duplicate deployment name, replacing job");
                previous.abort();
            }
        }
        jobs.len()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stops all timers; later [`Scheduler::load`] calls are ignored.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let mut jobs = self.jobs.lock();
        for (_, handle) in jobs.drain() {
            handle.abort();
        }
        info!("scheduler shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for (_, handle) in self.jobs.get_mut().drain() {
            handle.abort();
        }
    }
}

/// `drift_check_interval` is in minutes; zero is treated as one.
fn interval_period(minutes: u64) -> Duration {
    let minutes = u32::try_from(minutes.max(1)).unwrap_or(u32::MAX);
    MINUTE.saturating_mul(minutes)
}

async fn job_loop(
    pipeline: Arc<DriftCheckPipeline>,
    deployment: Arc<Deployment>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let pipeline = Arc::clone(&pipeline);
        let deployment = Arc::clone(&deployment);
        tokio::spawn(async move {
            pipeline.run(&deployment).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::interval_period;

    #[test]
    fn interval_is_counted_in_minutes() {
        assert_eq!(interval_period(1), Duration::from_secs(60));
        assert_eq!(interval_period(15), Duration::from_secs(900));
        assert_eq!(interval_period(0), Duration::from_secs(60));
        assert_eq!(
            interval_period(u64::MAX),
            Duration::from_secs(60).saturating_mul(u32::MAX)
        );
    }
}
