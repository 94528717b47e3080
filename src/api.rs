//! Kubernetes-style JSON envelopes returned by the REST API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::DeploymentRecord;

pub const API_VERSION: &str = "dda.wkng.net/v1alpha1";
pub const DEPLOYMENT_STATE_KIND: &str = "InfrastructureDeploymentState";

#[derive(Debug, Clone, Serialize)]
pub struct ItemMetadata {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormalItem<T: Serialize> {
    pub kind: String,
    pub api_version: String,
    pub metadata: ItemMetadata,
    pub spec: T,
    pub status: BTreeMap<String, serde_json::Value>,
}

impl<T: Serialize> FormalItem<T> {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, spec: T) -> Self {
        Self {
            kind: kind.into(),
            api_version: API_VERSION.to_string(),
            metadata: ItemMetadata { name: name.into() },
            spec,
            status: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListMetadata {
    pub total_items: usize,
    pub start: usize,
    pub limit: Option<usize>,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormalItemList<T: Serialize> {
    pub kind: String,
    pub api_version: String,
    pub metadata: ListMetadata,
    pub items: Vec<T>,
}

impl<T: Serialize> FormalItemList<T> {
    /// Wraps `items`, keeping only the `[start, start + limit)` window.
    pub fn paginate(items: Vec<T>, start: Option<usize>, limit: Option<usize>) -> Self {
        let total_items = items.len();
        let start = start.unwrap_or(0);
        let end = match limit {
            Some(limit) => start.saturating_add(limit),
            None => total_items,
        };
        let items = items
            .into_iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect();
        Self {
            kind: "List".to_string(),
            api_version: API_VERSION.to_string(),
            metadata: ListMetadata {
                total_items,
                start,
                limit,
                end,
            },
            items,
        }
    }
}

/// The `spec` block of an `InfrastructureDeploymentState` item.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentStateSpec {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub drifted: Option<bool>,
    /// Changes breakdown, e.g. `create=1, update=2`.
    pub plan: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl From<&DeploymentRecord> for DeploymentStateSpec {
    fn from(record: &DeploymentRecord) -> Self {
        Self {
            name: record.name.clone(),
            timestamp: record.timestamp,
            success: record.success,
            drifted: record.drifted,
            plan: record.plan.as_ref().map(|plan| plan.changes_breakdown()),
            metadata: record.metadata.clone(),
        }
    }
}

pub fn deployment_state_item(record: &DeploymentRecord) -> FormalItem<DeploymentStateSpec> {
    FormalItem::new(
        DEPLOYMENT_STATE_KIND,
        record.name.clone(),
        DeploymentStateSpec::from(record),
    )
}
