pub mod diagnostic;
pub mod terraform;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Plan JSON representation this crate understands.
pub const SUPPORTED_FORMAT_VERSION: &str = "1.2";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Action {
    #[serde(rename = "no-op")]
    NoOp,
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
    #[serde(other)]
    Other,
}

/// The bucket a resource falls into, derived from its whole action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    NoOp,
    Create,
    Read,
    Update,
    Delete,
    DeleteCreate,
    CreateDelete,
    Other,
}

impl ChangeKind {
    /// Breakdown order.
    pub const ALL: [ChangeKind; 7] = [
        ChangeKind::NoOp,
        ChangeKind::Create,
        ChangeKind::Read,
        ChangeKind::Update,
        ChangeKind::Delete,
        ChangeKind::DeleteCreate,
        ChangeKind::CreateDelete,
    ];

    pub fn from_actions(actions: &[Action]) -> Self {
        match actions {
            [Action::NoOp] => Self::NoOp,
            [Action::Read] => Self::Read,
            [Action::Create] => Self::Create,
            [Action::Update] => Self::Update,
            [Action::Delete] => Self::Delete,
            [Action::Delete, Action::Create] => Self::DeleteCreate,
            [Action::Create, Action::Delete] => Self::CreateDelete,
            _ => Self::Other,
        }
    }

    pub fn is_effective(&self) -> bool {
        !matches!(self, Self::NoOp | Self::Read)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::DeleteCreate => "delete, create",
            Self::CreateDelete => "create, delete",
            Self::Other => "other",
        }
    }
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Change {
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceChange {
    #[serde(default)]
    pub address: Option<String>,
    pub change: Change,
}

impl ResourceChange {
    pub fn kind(&self) -> ChangeKind {
        ChangeKind::from_actions(&self.change.actions)
    }

    /// Anything besides no-op and read counts as an effective change.
    pub fn is_effective(&self) -> bool {
        self.change
            .actions
            .iter()
            .any(|action| !matches!(action, Action::NoOp | Action::Read))
    }
}

/// Machine-readable plan as produced by `terraform show -json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanResult {
    #[serde(default)]
    pub format_version: String,
    #[serde(default)]
    pub terraform_version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub resource_changes: Vec<ResourceChange>,
}

impl PlanResult {
    /// Parses plan JSON and rejects any format version other than the supported one.
    pub fn from_json(raw: &str) -> Result<Self, PlanError> {
        let plan: Self = serde_json::from_str(raw)
            .map_err(|e| PlanError::Unexpected(format!("invalid plan JSON: {e}")))?;
        if plan.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(PlanError::UnsupportedFormat {
                found: plan.format_version,
                expected: SUPPORTED_FORMAT_VERSION.to_string(),
            });
        }
        Ok(plan)
    }

    pub fn count_total_resources(&self) -> usize {
        self.resource_changes.len()
    }

    pub fn count_resources_by_action(&self, kind: ChangeKind) -> usize {
        self.resource_changes
            .iter()
            .filter(|resource| resource.kind() == kind)
            .count()
    }

    pub fn count_resources_except_noop_and_read(&self) -> usize {
        self.resource_changes
            .iter()
            .filter(|resource| resource.is_effective())
            .count()
    }

    pub fn count_resources(&self) -> BTreeMap<ChangeKind, usize> {
        ChangeKind::ALL
            .iter()
            .map(|kind| (*kind, self.count_resources_by_action(*kind)))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.count_resources_except_noop_and_read() > 0
    }

    /// Non-zero effective buckets as `action=count`, e.g. `create=2, update=1`.
    ///
    /// Effective resources whose action list has no named bucket are reported as `other`.
    pub fn changes_breakdown(&self) -> String {
        let unclassified = self
            .resource_changes
            .iter()
            .filter(|resource| resource.kind() == ChangeKind::Other && resource.is_effective())
            .count();
        ChangeKind::ALL
            .iter()
            .filter(|kind| kind.is_effective())
            .map(|kind| (*kind, self.count_resources_by_action(*kind)))
            .chain(std::iter::once((ChangeKind::Other, unclassified)))
            .filter(|(_, count)| *count > 0)
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait]
pub trait PlanEngine: Send + Sync {
    /// Computes the plan for the definition in `directory`.
    ///
    /// Returns whether the plan contains effective changes alongside the plan itself.
    async fn plan(
        &self,
        directory: &Path,
        env_overrides: &BTreeMap<String, String>,
    ) -> Result<(bool, PlanResult), PlanError>;
}
