//! Serve command - start the feedback server.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use feedback_core::Config;
use feedback_core::config::ENV_STORE_PATH;

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Explicit config file.
    pub config: Option<PathBuf>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Bind address.
    pub bind: Option<String>,
    /// Store directory.
    pub store_path: Option<PathBuf>,
}

/// Run the serve command.
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = resolve_config(&args)?;

    let Ok(store_path) = config.require_store_path() else {
        ui::error("No feedback store configured");
        ui::info(&format!(
            "Set {ENV_STORE_PATH}, pass --store-path, or add store.path to {}",
            Config::default_path().display()
        ));
        bail!("missing required configuration: store.path");
    };

    ui::header("Starting Feedback Server");
    ui::kv(
        "Address",
        &format!("{}:{}", config.server.bind_address, config.server.port),
    );
    ui::kv("Store", &store_path.display().to_string());
    ui::kv(
        "Write limit",
        &format!(
            "{} per {}s",
            config.limits.write.max_requests, config.limits.write.window_secs
        ),
    );
    ui::kv(
        "Read limit",
        &format!(
            "{} per {}s",
            config.limits.read.max_requests, config.limits.read.window_secs
        ),
    );
    println!();
    ui::info("Press Ctrl+C to stop");
    println!();

    feedback_gateway::start(config)
        .await
        .context("feedback server failed")?;

    ui::success("Server stopped");
    Ok(())
}

/// Defaults, then the config file, then environment, then flags.
fn resolve_config(args: &ServeArgs) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_default().context("failed to load default config")?,
    };

    let mut config = config
        .with_env_overrides()
        .context("invalid environment override")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = &args.bind {
        config.server.bind_address.clone_from(bind);
    }
    if let Some(path) = &args.store_path {
        config.store.path = Some(path.clone());
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}
