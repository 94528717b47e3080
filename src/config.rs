use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub infrastructure_deployments: Vec<Deployment>,
    #[serde(default)]
    pub notification_methods: NotificationConfig,
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_domain")]
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitConfig {
    pub repo_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub ssh_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationConfig {
    #[serde(default)]
    pub slack: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub pagerduty: Option<BTreeMap<String, String>>,
}

/// One infrastructure deployment to check for drift.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub git: GitConfig,
    #[serde(default = "default_source_root")]
    pub source_root: String,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minutes between two checks.
    pub drift_check_interval: u64,
    #[serde(default)]
    pub notifications: Vec<String>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = Self::from_yaml_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn from_yaml_str(data: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for deployment in &self.infrastructure_deployments {
            let name = deployment.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid(
                    "deployment name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate deployment name \"{name}\""
                )));
            }
            if deployment.drift_check_interval == 0 {
                return Err(ConfigError::Invalid(format!(
                    "deployment \"{name}\": drift_check_interval must be positive"
                )));
            }
            if deployment.git.repo_url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "deployment \"{name}\": git.repo_url cannot be empty"
                )));
            }
            if deployment.git.branch.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "deployment \"{name}\": git.branch cannot be empty"
                )));
            }
        }
        Ok(())
    }

    pub fn enabled_deployments(&self) -> impl Iterator<Item = &Deployment> {
        self.infrastructure_deployments.iter().filter(|d| d.enabled)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            infrastructure_deployments: Vec::new(),
            notification_methods: NotificationConfig::default(),
            secrets: BTreeMap::new(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            domain: default_domain(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_source_root() -> String {
    ".".to_string()
}

fn default_true() -> bool {
    true
}
