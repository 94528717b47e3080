use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed parsing YAML config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed creating temporary directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("failed spawning git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git clone of {url} (branch {branch}) failed: {stderr}")]
    Clone {
        url: String,
        branch: String,
        stderr: String,
    },
}

#[derive(Debug, Error)]
pub enum PlanError {
    /// The engine ran and reported a failure.
    #[error("`{command}` failed - Details: {details}")]
    Tool { command: String, details: String },

    #[error("unsupported plan format version {found:?}, expected {expected:?}")]
    UnsupportedFormat { found: String, expected: String },

    #[error("{0}")]
    Unexpected(String),
}
