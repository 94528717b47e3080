use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use drift_monitor::app::{wait_for_shutdown_signal, watch_config, App};
use drift_monitor::config::AppConfig;
use drift_monitor::plan::terraform::TerraformEngine;
use drift_monitor::redact::ScrubbingMakeWriter;
use drift_monitor::server::{bind, run_server};
use drift_monitor::source::git::GitFetcher;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "drift-monitor",
    about = "Periodically checks Terraform deployments for infrastructure drift"
)]
struct Cli {
    #[arg(short, long, env = "APP_CONFIG", default_value = "config.yaml")]
    config: PathBuf,
    #[arg(
        short,
        long = "log-level",
        env = "APP_LOGLEVEL",
        value_enum,
        ignore_case = true,
        default_value_t = LogLevel::Info
    )]
    log_level: LogLevel,
    #[arg(long, default_value = "terraform")]
    terraform_bin: PathBuf,
    #[arg(long, default_value = "git")]
    git_bin: PathBuf,
    /// Keep terraform's coloured output in diagnostics.
    #[arg(long)]
    colors: bool,
    /// Poll the config file every N seconds and reload it on change.
    #[arg(long = "watch-config", value_name = "SECS")]
    watch_config: Option<u64>,
}

fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ScrubbingMakeWriter::new(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);
    debug!("logging level set to {}", cli.log_level.as_directive());
    info!("starting drift-monitor");

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed loading configuration {}", cli.config.display()))?;

    info!(
        deployments = config.infrastructure_deployments.len(),
        enabled = config.enabled_deployments().count(),
        "loaded configuration from {}",
        cli.config.display()
    );

    let app = App::new(
        Arc::new(GitFetcher::new(cli.git_bin.clone())),
        Arc::new(TerraformEngine::new(cli.terraform_bin.clone()).with_colors(cli.colors)),
    );
    app.scheduler.load(&config.infrastructure_deployments);

    if let Some(secs) = cli.watch_config {
        tokio::spawn(watch_config(
            cli.config.clone(),
            Arc::clone(&app.scheduler),
            Duration::from_secs(secs.max(1)),
        ));
    }

    let listener = bind(&config.server.host, config.server.port).await?;

    let scheduler = Arc::clone(&app.scheduler);
    run_server(app.api_state(), listener, async move {
        wait_for_shutdown_signal().await;
        scheduler.shutdown();
    })
    .await?;

    info!("exiting");
    Ok(())
}
