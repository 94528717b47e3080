use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::GitConfig;
use crate::error::FetchError;
use crate::source::{SourceFetcher, WorkingCopy};

/// Shallow-clones repositories with the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    binary: PathBuf,
}

impl GitFetcher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new("git")
    }
}

/// Last path segment of the URL without the `.git` suffix.
pub fn repo_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(|c| c == '/' || c == ':')
        .next()
        .unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        "repo".to_string()
    } else {
        name.to_string()
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, source: &GitConfig) -> Result<WorkingCopy, FetchError> {
        let root = WorkingCopy::allocate()?;
        let target = root.path().join(repo_name(&source.repo_url));
        debug!(url = %source.repo_url, dir = %target.display(), "cloning repository");

        let mut command = Command::new(&self.binary);
        command
            .args(["clone", "--depth", "1", "--branch", &source.branch])
            .arg(&source.repo_url)
            .arg(&target)
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(key) = &source.ssh_key {
            command.env(
                "GIT_SSH_COMMAND",
                format!("ssh -i {} -o IdentitiesOnly=yes", key.display()),
            );
        }

        let output = command.output().await.map_err(FetchError::Spawn)?;
        if !output.status.success() {
            return Err(FetchError::Clone {
                url: source.repo_url.clone(),
                branch: source.branch.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(url = %source.repo_url, dir = %target.display(), "cloned repository");
        Ok(WorkingCopy::new(root, target))
    }
}
