//! Gateway binary
//!
//! Loads the TOML configuration, builds the router and provider clients,
//! starts the background health monitor, and serves the HTTP API until a
//! shutdown signal arrives.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use llm_gateway::config;
use llm_gateway::{health, init_tracing, Router};

/// Parse `--config <path>` (default: `gateway.toml`).
fn parse_args() -> Result<String, String> {
    let mut config_path = String::from("gateway.toml");
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = args
                    .next()
                    .ok_or_else(|| "missing value for --config".to_string())?;
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(config_path)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = parse_args()?;
    let config = config::loader::load_from_file(Path::new(&config_path))?;
    init_tracing(config.observability.log_format);

    info!(
        gateway = %config.gateway.name,
        strategy = ?config.router.strategy,
        models = config.models.len(),
        "starting llm-gateway"
    );

    let router = Router::from_config(&config)?;
    let shutdown = CancellationToken::new();

    let monitor = if config.health.enabled {
        Some(health::spawn_monitor(
            router.models().to_vec(),
            Duration::from_millis(config.health.probe_interval_ms),
            Duration::from_millis(config.health.probe_timeout_ms),
            shutdown.clone(),
        ))
    } else {
        None
    };

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    #[cfg(feature = "web-api")]
    llm_gateway::web_api::serve(&config.server, router, shutdown.clone()).await?;

    #[cfg(not(feature = "web-api"))]
    {
        info!(
            models = router.models().len(),
            "web-api feature disabled; running health monitor only"
        );
        shutdown.cancelled().await;
    }

    shutdown.cancel();
    if let Some(handle) = monitor {
        let _ = handle.await;
    }
    info!("gateway stopped");
    Ok(())
}
