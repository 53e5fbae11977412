//! Background health monitor
//!
//! The router never re-probes a model it marked unhealthy; recovery is this
//! module's job. A background task periodically sends a lightweight chat
//! probe to every unhealthy model and flips it back to healthy on success.
//! Probe outcomes never touch latency state — a probe is not a latency
//! sample.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::model::LangModel;
use crate::schemas::ChatRequest;

/// The minimal request used to probe an unhealthy model.
fn probe_request() -> ChatRequest {
    ChatRequest::from_message("ping")
}

/// Spawn the health monitor task.
///
/// Every `probe_interval`, each unhealthy model receives one probe bounded
/// by `probe_timeout`. The task runs until `shutdown` is cancelled.
pub fn spawn_monitor(
    models: Vec<Arc<LangModel>>,
    probe_interval: Duration,
    probe_timeout: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(probe_interval);
        // The first tick fires immediately; skip it so a freshly started
        // gateway doesn't probe before serving.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("health monitor shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            for model in &models {
                if model.healthy() {
                    continue;
                }
                probe(model, probe_timeout).await;
            }
        }
    })
}

/// Probe one unhealthy model and flip it back on success.
async fn probe(model: &Arc<LangModel>, probe_timeout: Duration) {
    let request = probe_request();
    let outcome = tokio::time::timeout(probe_timeout, model.client().chat(&request)).await;

    match outcome {
        Ok(Ok(_)) => {
            model.set_healthy(true);
            info!(model_id = model.id(), "model recovered, marked healthy");
        }
        Ok(Err(error)) => {
            debug!(model_id = model.id(), error = %error, "health probe failed");
        }
        Err(_) => {
            debug!(model_id = model.id(), "health probe timed out");
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::echo::EchoClient;
    use crate::providers::{ClientError, ProviderClient};
    use crate::schemas::ChatResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    struct DownClient {
        calls: AtomicU64,
    }

    #[async_trait]
    impl ProviderClient for DownClient {
        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, ClientError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(ClientError::Api {
                status: 503,
                message: "still down".into(),
            })
        }

        fn id(&self) -> &str {
            "down"
        }
    }

    struct SlowClient {
        started: AtomicBool,
    }

    #[async_trait]
    impl ProviderClient for SlowClient {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
            self.started.store(true, Ordering::Relaxed);
            tokio::time::sleep(Duration::from_secs(30)).await;
            EchoClient::with_delay(0).chat(request).await
        }

        fn id(&self) -> &str {
            "slow"
        }
    }

    fn model_with_client(id: &str, client: Arc<dyn ProviderClient>) -> Arc<LangModel> {
        Arc::new(LangModel::new(
            id,
            1,
            Duration::from_secs(60),
            1,
            0.06,
            client,
        ))
    }

    #[tokio::test]
    async fn test_unhealthy_model_recovers_on_successful_probe() {
        let model = model_with_client("m1", Arc::new(EchoClient::with_delay(0)));
        model.set_healthy(false);

        let shutdown = CancellationToken::new();
        let handle = spawn_monitor(
            vec![Arc::clone(&model)],
            Duration::from_millis(10),
            Duration::from_millis(500),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(model.healthy(), "probe should have recovered the model");

        shutdown.cancel();
        handle.await.expect("test: monitor joins");
    }

    #[tokio::test]
    async fn test_failing_probe_leaves_model_unhealthy() {
        let client = Arc::new(DownClient {
            calls: AtomicU64::new(0),
        });
        let model = model_with_client("m1", Arc::clone(&client) as Arc<dyn ProviderClient>);
        model.set_healthy(false);

        let shutdown = CancellationToken::new();
        let handle = spawn_monitor(
            vec![Arc::clone(&model)],
            Duration::from_millis(10),
            Duration::from_millis(500),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!model.healthy());
        assert!(client.calls.load(Ordering::Relaxed) >= 2, "probing repeats");

        shutdown.cancel();
        handle.await.expect("test: monitor joins");
    }

    #[tokio::test]
    async fn test_healthy_models_are_not_probed() {
        let client = Arc::new(DownClient {
            calls: AtomicU64::new(0),
        });
        let model = model_with_client("m1", Arc::clone(&client) as Arc<dyn ProviderClient>);

        let shutdown = CancellationToken::new();
        let handle = spawn_monitor(
            vec![Arc::clone(&model)],
            Duration::from_millis(10),
            Duration::from_millis(500),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(client.calls.load(Ordering::Relaxed), 0);

        shutdown.cancel();
        handle.await.expect("test: monitor joins");
    }

    #[tokio::test]
    async fn test_probe_timeout_does_not_recover_model() {
        let client = Arc::new(SlowClient {
            started: AtomicBool::new(false),
        });
        let model = model_with_client("m1", Arc::clone(&client) as Arc<dyn ProviderClient>);
        model.set_healthy(false);

        let shutdown = CancellationToken::new();
        let handle = spawn_monitor(
            vec![Arc::clone(&model)],
            Duration::from_millis(10),
            Duration::from_millis(20),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(client.started.load(Ordering::Relaxed), "probe was issued");
        assert!(!model.healthy(), "timed-out probe must not recover");

        shutdown.cancel();
        handle.await.expect("test: monitor joins");
    }

    #[tokio::test]
    async fn test_probe_does_not_record_latency() {
        let model = model_with_client("m1", Arc::new(EchoClient::with_delay(0)));
        model.set_healthy(false);

        let shutdown = CancellationToken::new();
        let handle = spawn_monitor(
            vec![Arc::clone(&model)],
            Duration::from_millis(10),
            Duration::from_millis(500),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(model.healthy());
        assert_eq!(
            model.latency().sample_count(),
            0,
            "a probe is not a latency sample"
        );

        shutdown.cancel();
        handle.await.expect("test: monitor joins");
    }
}
