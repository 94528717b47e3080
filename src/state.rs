use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::plan::PlanResult;

/// Latest known outcome of one deployment's drift check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRecord {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub drifted: Option<bool>,
    pub plan: Option<PlanResult>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl DeploymentRecord {
    pub fn succeeded(name: impl Into<String>, drifted: bool, plan: PlanResult) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            success: true,
            drifted: Some(drifted),
            plan: Some(plan),
            metadata: BTreeMap::new(),
        }
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            success: false,
            drifted: None,
            plan: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Latest-wins map from deployment name to its record.
///
/// Readers always get owned clones, so a reader never observes a record while a
/// pipeline run is replacing it.
#[derive(Debug, Default)]
pub struct StateStore {
    records: RwLock<HashMap<String, DeploymentRecord>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, record: DeploymentRecord) {
        debug!("setting deployment state for state named \"{name}\"");
        self.records.write().insert(name.to_string(), record);
    }

    pub fn get(&self, name: &str) -> Option<DeploymentRecord> {
        self.records.read().get(name).cloned()
    }

    pub fn list(&self) -> Vec<DeploymentRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn delete(&self, name: &str) {
        if self.records.write().remove(name).is_some() {
            debug!("deleted deployment state named \"{name}\"");
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{DeploymentRecord, StateStore};
    use crate::plan::PlanResult;

    fn clean_plan() -> PlanResult {
        PlanResult::from_json(r#"{"format_version":"1.2","resource_changes":[]}"#)
            .expect("valid plan")
    }

    #[test]
    fn set_replaces_previous_record() {
        let store = StateStore::new();
        store.set("net", DeploymentRecord::succeeded("net", false, clean_plan()));
        store.set("net", DeploymentRecord::failed("net"));

        let record = store.get("net").expect("record exists");
        assert!(!record.success);
        assert!(record.drifted.is_none());
        assert!(record.plan.is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_is_a_noop_for_unknown_names() {
        let store = StateStore::new();
        store.delete("ghost");
        store.set("a", DeploymentRecord::failed("a"));
        store.delete("a");
        assert!(store.is_empty());
        assert!(store.get("a").is_none());
    }

    #[test]
    fn returned_records_are_snapshots() {
        let store = StateStore::new();
        store.set("a", DeploymentRecord::failed("a"));
        let mut snapshot = store.get("a").expect("record");
        snapshot.success = true;
        assert!(!store.get("a").expect("record").success);
    }

    #[test]
    fn concurrent_writers_do_not_cross_contaminate() {
        let store = Arc::new(StateStore::new());
        let handles = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let name = format!("deployment-{i}");
                    for round in 0..200 {
                        let record = DeploymentRecord::failed(&name)
                            .with_metadata("round", serde_json::json!(round));
                        store.set(&name, record);
                        let read = store.get(&name).expect("own record visible");
                        assert_eq!(read.name, name);
                        let _ = store.list();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().expect("writer thread");
        }

        assert_eq!(store.len(), 8);
        for i in 0..8 {
            let name = format!("deployment-{i}");
            let record = store.get(&name).expect("record");
            assert_eq!(record.name, name);
            assert_eq!(record.metadata.get("round"), Some(&serde_json::json!(199)));
        }
    }
}
