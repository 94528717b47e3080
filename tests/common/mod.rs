#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use drift_monitor::config::{Deployment, GitConfig};
use drift_monitor::error::{FetchError, PlanError};
use drift_monitor::plan::{PlanEngine, PlanResult};
use drift_monitor::source::{SourceFetcher, WorkingCopy};
use parking_lot::Mutex;

pub fn deployment(name: &str, interval: u64, enabled: bool) -> Deployment {
    Deployment {
        name: name.to_string(),
        tags: BTreeMap::new(),
        git: GitConfig {
            repo_url: repo_url(name),
            branch: "main".to_string(),
            ssh_key: None,
        },
        source_root: ".".to_string(),
        env_vars: BTreeMap::new(),
        enabled,
        drift_check_interval: interval,
        notifications: Vec::new(),
    }
}

pub fn repo_url(name: &str) -> String {
    format!("https://git.example.com/acme/{name}.git")
}

/// Records every fetch and hands out empty working copies, or fails when asked to.
#[derive(Default)]
pub struct RecordingFetcher {
    calls: Mutex<HashMap<String, usize>>,
    fail: bool,
}

impl RecordingFetcher {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            fail: true,
        }
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.calls.lock().get(&repo_url(name)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SourceFetcher for RecordingFetcher {
    async fn fetch(&self, source: &GitConfig) -> Result<WorkingCopy, FetchError> {
        *self.calls.lock().entry(source.repo_url.clone()).or_insert(0) += 1;
        if self.fail {
            return Err(FetchError::Clone {
                url: source.repo_url.clone(),
                branch: source.branch.clone(),
                stderr: "fatal: unable to access: Could not resolve host".to_string(),
            });
        }
        let root = WorkingCopy::allocate()?;
        let path = root.path().join("repo");
        std::fs::create_dir_all(&path).map_err(FetchError::TempDir)?;
        Ok(WorkingCopy::new(root, path))
    }
}

/// Replies with a fixed plan document, optionally after a delay.
pub struct StaticEngine {
    raw: String,
    delay: Option<Duration>,
    calls: Mutex<usize>,
}

impl StaticEngine {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            delay: None,
            calls: Mutex::new(0),
        }
    }

    pub fn clean() -> Self {
        Self::new(r#"{"format_version":"1.2","resource_changes":[]}"#)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl PlanEngine for StaticEngine {
    async fn plan(
        &self,
        _directory: &Path,
        _env_overrides: &BTreeMap<String, String>,
    ) -> Result<(bool, PlanResult), PlanError> {
        *self.calls.lock() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let plan = PlanResult::from_json(&self.raw)?;
        Ok((plan.has_changes(), plan))
    }
}

/// Lets spawned pipeline runs finish.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
