//! Status command - probe a running feedback server.

use std::time::Duration;

use anyhow::Result;
use feedback_core::Config;

use crate::ui::{self, HealthStatus};

/// Status command arguments.
#[derive(Debug, Clone, Default)]
pub struct StatusArgs {
    /// Port override.
    pub port: Option<u16>,
}

/// Run the status command.
pub async fn run_status(args: StatusArgs) -> Result<()> {
    ui::header("Feedback Server Status");

    let config = Config::load_default()
        .and_then(Config::with_env_overrides)
        .unwrap_or_else(|e| {
            ui::warning(&format!("Using default configuration ({e})"));
            Config::default()
        });
    let port = args.port.unwrap_or(config.server.port);

    let client = reqwest::Client::new();
    match client
        .get(format!("http://127.0.0.1:{port}/health"))
        .timeout(Duration::from_secs(2))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            ui::health_check("Server", HealthStatus::Ok, Some("running"));
            ui::kv("  Port", &port.to_string());
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                if let Some(version) = body.get("version").and_then(|v| v.as_str()) {
                    ui::kv("  Version", version);
                }
            }
        }
        Ok(resp) => {
            let detail = format!("health check returned {}", resp.status());
            ui::health_check("Server", HealthStatus::Error, Some(&detail));
        }
        Err(_) => {
            ui::health_check("Server", HealthStatus::Warning, Some("not running"));
            ui::info(&format!("Start with: feedback serve --port {port}"));
        }
    }

    match config.require_store_path() {
        Ok(path) => ui::kv("Store", &path.display().to_string()),
        Err(_) => ui::health_check("Store", HealthStatus::Warning, Some("not configured")),
    }

    Ok(())
}
