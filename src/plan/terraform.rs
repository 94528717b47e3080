use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::PlanError;
use crate::plan::{PlanEngine, PlanResult};

const PLAN_FILE: &str = "tfplan";

/// Plan engine that shells out to the `terraform` CLI.
#[derive(Debug, Clone)]
pub struct TerraformEngine {
    binary: PathBuf,
    display_colors: bool,
}

impl TerraformEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            display_colors: false,
        }
    }

    pub fn with_colors(mut self, display_colors: bool) -> Self {
        self.display_colors = display_colors;
        self
    }

    fn command_line(&self, args: &[&str]) -> String {
        format!("{} {}", self.binary.display(), args.join(" "))
    }

    async fn run(
        &self,
        directory: &Path,
        env_overrides: &BTreeMap<String, String>,
        args: &[&str],
    ) -> Result<Output, PlanError> {
        let mut full_args: Vec<&str> = args.to_vec();
        if !self.display_colors {
            full_args.push("-no-color");
        }
        let command_line = self.command_line(&full_args);
        info!(dir = %directory.display(), "running `{command_line}`");

        let output = Command::new(&self.binary)
            .args(&full_args)
            .current_dir(directory)
            .envs(env_overrides)
            .env("TF_IN_AUTOMATION", "1")
            .output()
            .await
            .map_err(|e| PlanError::Unexpected(format!("failed spawning `{command_line}`: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!("`{command_line}` failed with output:\n{stderr}");
            return Err(PlanError::Tool {
                command: command_line,
                details: stderr,
            });
        }
        Ok(output)
    }
}

impl Default for TerraformEngine {
    fn default() -> Self {
        Self::new("terraform")
    }
}

#[async_trait]
impl PlanEngine for TerraformEngine {
    async fn plan(
        &self,
        directory: &Path,
        env_overrides: &BTreeMap<String, String>,
    ) -> Result<(bool, PlanResult), PlanError> {
        let plan_out = format!("-out={PLAN_FILE}");
        self.run(directory, env_overrides, &["init", "-input=false"])
            .await?;
        self.run(directory, env_overrides, &["plan", &plan_out, "-input=false"])
            .await?;
        let shown = self
            .run(directory, env_overrides, &["show", "-json", PLAN_FILE])
            .await?;

        let raw = String::from_utf8_lossy(&shown.stdout);
        let plan = PlanResult::from_json(&raw)?;
        let is_different = plan.has_changes();
        debug!(dir = %directory.display(), is_different, "parsed plan");
        Ok((is_different, plan))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::BTreeMap;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use super::TerraformEngine;
    use crate::error::PlanError;
    use crate::plan::PlanEngine;

    fn fake_binary(dir: &Path, script: &str) -> std::path::PathBuf {
        let path = dir.join("terraform");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    #[tokio::test]
    async fn parses_plan_from_show_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = r#"
if [ "$1" = "show" ]; then
  echo '{"format_version":"1.2","resource_changes":[{"change":{"actions":["update"]}}]}'
fi
exit 0"#;
        let engine = TerraformEngine::new(fake_binary(dir.path(), script));
        let (is_different, plan) = engine
            .plan(dir.path(), &BTreeMap::new())
            .await
            .expect("plan succeeds");
        assert!(is_different);
        assert_eq!(plan.changes_breakdown(), "update=1");
    }

    #[tokio::test]
    async fn env_overrides_reach_the_engine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = r#"
if [ "$1" = "show" ]; then
  if [ "$DRIFT_MARKER" = "yes" ]; then
    echo '{"format_version":"1.2","resource_changes":[]}'
  else
    exit 3
  fi
fi
exit 0"#;
        let engine = TerraformEngine::new(fake_binary(dir.path(), script));
        let mut env = BTreeMap::new();
        env.insert("DRIFT_MARKER".to_string(), "yes".to_string());
        let (is_different, _) = engine.plan(dir.path(), &env).await.expect("plan succeeds");
        assert!(!is_different);
        assert!(std::env::var("DRIFT_MARKER").is_err());
    }

    #[tokio::test]
    async fn failing_command_is_a_tool_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = r#"
if [ "$1" = "plan" ]; then
  echo "Error: no credentials" >&2
  exit 1
fi
exit 0"#;
        let engine = TerraformEngine::new(fake_binary(dir.path(), script));
        let err = engine
            .plan(dir.path(), &BTreeMap::new())
            .await
            .expect_err("plan fails");
        match err {
            PlanError::Tool { command, details } => {
                assert!(command.contains("plan -out=tfplan"));
                assert!(details.contains("no credentials"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn old_format_is_unsupported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = r#"
if [ "$1" = "show" ]; then
  echo '{"format_version":"1.1","resource_changes":[]}'
fi
exit 0"#;
        let engine = TerraformEngine::new(fake_binary(dir.path(), script));
        let err = engine
            .plan(dir.path(), &BTreeMap::new())
            .await
            .expect_err("1.1 rejected");
        assert!(matches!(err, PlanError::UnsupportedFormat { .. }));
    }
}
