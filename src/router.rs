//! # Request dispatch
//!
//! ## Responsibility
//! Own the model set and the configured strategy, drive the per-request
//! dispatch loop across candidates, and feed outcomes back into model
//! health and latency state.
//!
//! ## Guarantees
//! - Thread-safe: `Router` is `Clone + Send + Sync` (wraps `Arc<Inner>`);
//!   concurrent requests share health, latency, and cursor state.
//! - At most one attempt per model per request, bounded further by
//!   `retry.max_attempts`.
//! - Transient failures are absorbed and advance the candidate sequence;
//!   non-retryable and budget errors surface immediately.
//! - A failed or cancelled call never pollutes latency state.
//! - Cancellation is honoured before every attempt, during the provider
//!   call, and during the inter-attempt delay.
//!
//! ## NOT Responsible For
//! - Candidate selection order (see `routing`)
//! - Health recovery of unhealthy models (see `health`)

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ConfigError, GatewayConfig, RetryConfig, RoutingStrategyKind};
use crate::model::LangModel;
use crate::providers::{self, ErrorClass};
use crate::routing::RoutingStrategy;
use crate::schemas::{ChatRequest, ChatResponse};
use crate::{GatewayError, ModelFailure};

/// Request-level orchestrator over the configured model set.
///
/// Cheaply cloneable (wraps `Arc<Inner>`). All clones share state.
#[derive(Clone)]
pub struct Router {
    inner: Arc<Inner>,
}

struct Inner {
    models: Vec<Arc<LangModel>>,
    strategy: RoutingStrategy,
    max_attempts: u32,
    inter_attempt_delay: Duration,
}

impl Router {
    /// Create a router over `models` with the given strategy and retry policy.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidField` when two models share an id.
    pub fn new(
        models: Vec<Arc<LangModel>>,
        strategy: RoutingStrategyKind,
        retry: RetryConfig,
    ) -> Result<Self, ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for model in &models {
            if !seen.insert(model.id().to_string()) {
                return Err(ConfigError::InvalidField {
                    field: "models.id".into(),
                    value: model.id().to_string(),
                    reason: "duplicate model id within one router".into(),
                });
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                strategy: RoutingStrategy::new(strategy, models.clone()),
                models,
                max_attempts: retry.max_attempts,
                inter_attempt_delay: Duration::from_millis(retry.inter_attempt_delay_ms),
            }),
        })
    }

    /// Build a router (models, clients, strategy) from a validated config.
    ///
    /// Disabled model entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when a provider client cannot be built (for
    /// example a missing API key environment variable).
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let mut models = Vec::new();
        for cfg in config.models.iter().filter(|m| m.enabled) {
            let client = providers::build_client(cfg)?;
            models.push(Arc::new(LangModel::new(
                cfg.id.clone(),
                cfg.weight,
                Duration::from_millis(cfg.latency_update_interval_ms),
                cfg.warmup_samples,
                cfg.latency_decay,
                client,
            )));
        }
        Self::new(models, config.router.strategy, config.router.retry.clone())
    }

    /// The configured model set, in priority order.
    pub fn models(&self) -> &[Arc<LangModel>] {
        &self.inner.models
    }

    /// Dispatch one chat request without external cancellation.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, GatewayError> {
        self.chat_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Dispatch one chat request, honouring `cancel` at every safe point.
    ///
    /// On success the serving model's latency is observed and it is marked
    /// healthy. Transient failures mark the model unhealthy and advance to
    /// the next candidate; they surface only if every candidate fails.
    pub async fn chat_with_cancel(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, GatewayError> {
        if request.message.content.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "message content must not be empty".into(),
            ));
        }

        if let Some(override_params) = &request.override_params {
            return self
                .dispatch_override(&override_params.model_id, request, cancel)
                .await;
        }

        let effective_max =
            (self.inner.max_attempts as usize).min(self.inner.models.len());
        let mut candidates = self.inner.strategy.candidates();
        let mut failures: Vec<ModelFailure> = Vec::new();
        let mut attempts = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
            if attempts >= effective_max {
                return Err(Self::exhausted(failures));
            }
            if attempts > 0 && !self.inner.inter_attempt_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                    _ = tokio::time::sleep(self.inner.inter_attempt_delay) => {}
                }
            }

            let Some(model) = candidates.next() else {
                return Err(Self::exhausted(failures));
            };
            attempts += 1;

            match self.attempt(&model, request, cancel).await? {
                Ok(response) => return Ok(response),
                Err(error) => failures.push(ModelFailure {
                    model_id: model.id().to_string(),
                    error,
                }),
            }
        }
    }

    /// Force dispatch to a single named model, bypassing the strategy.
    async fn dispatch_override(
        &self,
        model_id: &str,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, GatewayError> {
        let Some(model) = self.inner.models.iter().find(|m| m.id() == model_id) else {
            return Err(GatewayError::InvalidRequest(format!(
                "override model '{model_id}' is not configured"
            )));
        };
        debug!(model_id, "strategy bypassed by request override");

        match self.attempt(model, request, cancel).await? {
            Ok(response) => Ok(response),
            Err(error) => Err(GatewayError::AllProvidersFailed {
                failures: vec![ModelFailure {
                    model_id: model.id().to_string(),
                    error,
                }],
            }),
        }
    }

    /// One timed provider call with outcome recording.
    ///
    /// The outer `Result` carries terminal gateway errors (cancellation,
    /// non-retryable, budget); the inner `Err` is a transient failure the
    /// dispatch loop absorbs.
    async fn attempt(
        &self,
        model: &Arc<LangModel>,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<Result<ChatResponse, providers::ClientError>, GatewayError> {
        debug!(
            model_id = model.id(),
            strategy = self.inner.strategy.name(),
            "dispatching chat request"
        );

        let start = Instant::now();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            outcome = model.client().chat(request) => outcome,
        };

        match outcome {
            Ok(response) => {
                let elapsed = start.elapsed();
                model.latency().observe(elapsed);
                model.set_healthy(true);
                debug!(
                    model_id = model.id(),
                    latency_ms = elapsed.as_millis() as u64,
                    "chat request served"
                );
                Ok(Ok(response))
            }
            Err(error) => match error.classify() {
                ErrorClass::NonRetryable => {
                    warn!(model_id = model.id(), error = %error, "non-retryable provider error");
                    Err(GatewayError::NonRetryable(error))
                }
                ErrorClass::BudgetExhausted => {
                    warn!(model_id = model.id(), error = %error, "provider budget exhausted");
                    Err(GatewayError::BudgetExhausted(error))
                }
                ErrorClass::Transient => {
                    model.set_healthy(false);
                    warn!(
                        model_id = model.id(),
                        error = %error,
                        "provider unavailable, advancing to next candidate"
                    );
                    Ok(Err(error))
                }
            },
        }
    }

    fn exhausted(failures: Vec<ModelFailure>) -> GatewayError {
        if failures.is_empty() {
            GatewayError::NoHealthyModels
        } else {
            GatewayError::AllProvidersFailed { failures }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("strategy", &self.inner.strategy.name())
            .field("models", &self.inner.models.len())
            .field("max_attempts", &self.inner.max_attempts)
            .finish()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ClientError, ProviderClient};
    use crate::schemas::{unix_now, ChatMessage, ModelResponse, TokenUsage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// One scripted provider behaviour per call; the last entry repeats.
    #[derive(Clone, Copy)]
    enum Script {
        Succeed { delay_ms: u64 },
        FailStatus(u16),
        FailBudget,
        FailEmpty,
        Hang,
    }

    struct ScriptedClient {
        script: Mutex<VecDeque<Script>>,
        fallback: Script,
        calls: AtomicU64,
    }

    impl ScriptedClient {
        fn new(script: Vec<Script>, fallback: Script) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicU64::new(0),
            }
        }

        fn always(script: Script) -> Self {
            Self::new(Vec::new(), script)
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl ProviderClient for ScriptedClient {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let step = self
                .script
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
                .unwrap_or(self.fallback);
            match step {
                Script::Succeed { delay_ms } => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Ok(ChatResponse {
                        id: "scripted".into(),
                        created: unix_now(),
                        provider: "scripted".into(),
                        model_name: "scripted".into(),
                        cached: false,
                        model_response: ModelResponse {
                            system_id: Default::default(),
                            message: ChatMessage::model(request.message.content.clone()),
                            token_usage: TokenUsage::default(),
                        },
                    })
                }
                Script::FailStatus(status) => Err(ClientError::Api {
                    status,
                    message: "scripted failure".into(),
                }),
                Script::FailBudget => {
                    Err(ClientError::BudgetExhausted("scripted quota".into()))
                }
                Script::FailEmpty => Err(ClientError::EmptyResponse),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(ClientError::Timeout)
                }
            }
        }

        fn id(&self) -> &str {
            "scripted"
        }
    }

    fn scripted_model(id: &str, client: Arc<ScriptedClient>) -> Arc<LangModel> {
        Arc::new(LangModel::new(
            id,
            1,
            Duration::from_secs(60),
            1,
            0.06,
            client,
        ))
    }

    fn priority_router(models: Vec<Arc<LangModel>>) -> Router {
        Router::new(models, RoutingStrategyKind::Priority, RetryConfig {
            max_attempts: 10,
            inter_attempt_delay_ms: 0,
        })
        .expect("test: router builds")
    }

    fn request() -> ChatRequest {
        ChatRequest::from_message("hello")
    }

    // -- construction ----------------------------------------------------

    #[test]
    fn test_duplicate_model_ids_rejected() {
        let client = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let result = Router::new(
            vec![
                scripted_model("same", Arc::clone(&client)),
                scripted_model("same", client),
            ],
            RoutingStrategyKind::Priority,
            RetryConfig::default(),
        );
        assert!(result.is_err());
    }

    // -- success path ----------------------------------------------------

    #[tokio::test]
    async fn test_success_observes_latency_and_marks_healthy() {
        let client = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let model = scripted_model("m1", client);
        model.set_healthy(true);
        let router = priority_router(vec![Arc::clone(&model)]);

        let response = router.chat(&request()).await.expect("test: chat succeeds");
        assert_eq!(response.model_response.message.content, "hello");
        assert_eq!(model.latency().sample_count(), 1);
        assert!(model.healthy());
    }

    #[tokio::test]
    async fn test_success_restores_health_flag() {
        // A model can be picked while a stale unhealthy read is in flight;
        // success must flip it back.
        let client = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let healthy = scripted_model("up", Arc::clone(&client));
        let router = priority_router(vec![Arc::clone(&healthy)]);
        healthy.set_healthy(true);
        let _ = router.chat(&request()).await.expect("test: chat succeeds");
        assert!(healthy.healthy());
    }

    // -- transient failures ----------------------------------------------

    #[tokio::test]
    async fn test_transient_failure_advances_to_next_candidate() {
        let failing = Arc::new(ScriptedClient::always(Script::FailStatus(503)));
        let working = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let m1 = scripted_model("m1", Arc::clone(&failing));
        let m2 = scripted_model("m2", Arc::clone(&working));
        let router = priority_router(vec![Arc::clone(&m1), Arc::clone(&m2)]);

        let response = router.chat(&request()).await.expect("test: fallback works");
        assert_eq!(response.id, "scripted");
        assert_eq!(failing.calls(), 1);
        assert_eq!(working.calls(), 1);
        assert!(!m1.healthy(), "failed model must be marked unhealthy");
        assert!(m2.healthy());
    }

    #[tokio::test]
    async fn test_failed_call_does_not_observe_latency() {
        let failing = Arc::new(ScriptedClient::always(Script::FailStatus(503)));
        let working = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let m1 = scripted_model("m1", failing);
        let m2 = scripted_model("m2", working);
        let router = priority_router(vec![Arc::clone(&m1), Arc::clone(&m2)]);

        let _ = router.chat(&request()).await;
        assert_eq!(
            m1.latency().sample_count(),
            0,
            "a failed call's elapsed time is not a latency sample"
        );
        assert_eq!(m2.latency().sample_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_is_absorbed_as_transient() {
        let empty = Arc::new(ScriptedClient::always(Script::FailEmpty));
        let working = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let m1 = scripted_model("m1", empty);
        let m2 = scripted_model("m2", working);
        let router = priority_router(vec![Arc::clone(&m1), m2]);

        assert!(router.chat(&request()).await.is_ok());
        assert!(!m1.healthy());
        assert_eq!(m1.latency().sample_count(), 0);
    }

    #[tokio::test]
    async fn test_all_transient_failures_return_detail_tail() {
        let c1 = Arc::new(ScriptedClient::always(Script::FailStatus(503)));
        let c2 = Arc::new(ScriptedClient::always(Script::FailStatus(502)));
        let router = priority_router(vec![
            scripted_model("m1", Arc::clone(&c1)),
            scripted_model("m2", Arc::clone(&c2)),
        ]);

        let err = router.chat(&request()).await.expect_err("test: must fail");
        match err {
            GatewayError::AllProvidersFailed { failures } => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].model_id, "m1");
                assert_eq!(failures[1].model_id, "m2");
            }
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
        assert_eq!(c1.calls(), 1, "each model attempted exactly once");
        assert_eq!(c2.calls(), 1);
    }

    // -- terminal failures -----------------------------------------------

    #[tokio::test]
    async fn test_non_retryable_error_surfaces_immediately() {
        let bad = Arc::new(ScriptedClient::always(Script::FailStatus(400)));
        let never_called = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let m1 = scripted_model("m1", Arc::clone(&bad));
        let m2 = scripted_model("m2", Arc::clone(&never_called));
        let router = priority_router(vec![Arc::clone(&m1), m2]);

        let err = router.chat(&request()).await.expect_err("test: must fail");
        assert!(matches!(err, GatewayError::NonRetryable(_)));
        assert_eq!(never_called.calls(), 0, "no retry after non-retryable");
        assert!(m1.healthy(), "non-retryable must not touch health");
        assert_eq!(m1.latency().sample_count(), 0);
    }

    #[tokio::test]
    async fn test_budget_exhausted_surfaces_immediately() {
        let broke = Arc::new(ScriptedClient::always(Script::FailBudget));
        let never_called = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let router = priority_router(vec![
            scripted_model("m1", broke),
            scripted_model("m2", Arc::clone(&never_called)),
        ]);

        let err = router.chat(&request()).await.expect_err("test: must fail");
        assert!(matches!(err, GatewayError::BudgetExhausted(_)));
        assert_eq!(never_called.calls(), 0);
    }

    // -- candidate budget ------------------------------------------------

    #[tokio::test]
    async fn test_max_attempts_caps_candidates() {
        let clients: Vec<Arc<ScriptedClient>> = (0..4)
            .map(|_| Arc::new(ScriptedClient::always(Script::FailStatus(503))))
            .collect();
        let models = clients
            .iter()
            .enumerate()
            .map(|(i, c)| scripted_model(&format!("m{i}"), Arc::clone(c)))
            .collect();
        let router = Router::new(models, RoutingStrategyKind::Priority, RetryConfig {
            max_attempts: 2,
            inter_attempt_delay_ms: 0,
        })
        .expect("test: router builds");

        let err = router.chat(&request()).await.expect_err("test: must fail");
        match err {
            GatewayError::AllProvidersFailed { failures } => assert_eq!(failures.len(), 2),
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
        let total_calls: u64 = clients.iter().map(|c| c.calls()).sum();
        assert_eq!(total_calls, 2, "attempt budget is min(max_attempts, models)");
    }

    #[tokio::test]
    async fn test_no_models_returns_no_healthy_models() {
        let router = priority_router(Vec::new());
        let err = router.chat(&request()).await.expect_err("test: must fail");
        assert!(matches!(err, GatewayError::NoHealthyModels));
    }

    #[tokio::test]
    async fn test_all_models_unhealthy_returns_no_healthy_models() {
        let client = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let model = scripted_model("m1", Arc::clone(&client));
        model.set_healthy(false);
        let router = priority_router(vec![model]);

        let err = router.chat(&request()).await.expect_err("test: must fail");
        assert!(matches!(err, GatewayError::NoHealthyModels));
        assert_eq!(client.calls(), 0);
    }

    // -- validation and override -----------------------------------------

    #[tokio::test]
    async fn test_empty_message_is_invalid_request() {
        let client = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let router = priority_router(vec![scripted_model("m1", client)]);
        let err = router
            .chat(&ChatRequest::from_message(""))
            .await
            .expect_err("test: must fail");
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_override_bypasses_strategy() {
        let first = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let second = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let router = priority_router(vec![
            scripted_model("m1", Arc::clone(&first)),
            scripted_model("m2", Arc::clone(&second)),
        ]);

        let mut req = request();
        req.override_params = Some(crate::schemas::OverrideParams {
            model_id: "m2".into(),
        });
        router.chat(&req).await.expect("test: override succeeds");
        assert_eq!(first.calls(), 0, "priority order is bypassed");
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn test_override_unknown_model_is_invalid_request() {
        let client = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let router = priority_router(vec![scripted_model("m1", client)]);

        let mut req = request();
        req.override_params = Some(crate::schemas::OverrideParams {
            model_id: "ghost".into(),
        });
        let err = router.chat(&req).await.expect_err("test: must fail");
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }

    // -- cancellation ----------------------------------------------------

    #[tokio::test]
    async fn test_cancellation_mid_call_surfaces_cancelled() {
        let hanging = Arc::new(ScriptedClient::always(Script::Hang));
        let model = scripted_model("m1", hanging);
        let router = priority_router(vec![Arc::clone(&model)]);

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = {
            let router = router.clone();
            tokio::spawn(async move { router.chat_with_cancel(&request(), &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = handle.await.expect("test: task joins");
        assert!(matches!(result, Err(GatewayError::Cancelled)));
        assert!(model.healthy(), "cancellation must not mark models unhealthy");
        assert_eq!(model.latency().sample_count(), 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_short_circuits() {
        let client = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let router = priority_router(vec![scripted_model("m1", Arc::clone(&client))]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = router
            .chat_with_cancel(&request(), &cancel)
            .await
            .expect_err("test: must fail");
        assert!(matches!(err, GatewayError::Cancelled));
        assert_eq!(client.calls(), 0);
    }

    // -- recovery interplay ----------------------------------------------

    #[tokio::test]
    async fn test_traffic_shifts_until_model_marked_healthy_again() {
        let flaky = Arc::new(ScriptedClient::new(
            vec![Script::FailStatus(503)],
            Script::Succeed { delay_ms: 0 },
        ));
        let stable = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let m1 = scripted_model("m1", Arc::clone(&flaky));
        let m2 = scripted_model("m2", Arc::clone(&stable));
        let router = priority_router(vec![Arc::clone(&m1), Arc::clone(&m2)]);

        // First request: m1 fails once, m2 serves.
        router.chat(&request()).await.expect("test: fallback works");
        assert!(!m1.healthy());

        // Subsequent requests go to m2 only while m1 is unhealthy.
        router.chat(&request()).await.expect("test: m2 serves");
        assert_eq!(flaky.calls(), 1);
        assert_eq!(stable.calls(), 2);

        // External recovery (health monitor's job) brings m1 back.
        m1.set_healthy(true);
        router.chat(&request()).await.expect("test: m1 serves again");
        assert_eq!(flaky.calls(), 2);
    }

    #[tokio::test]
    async fn test_router_debug_does_not_panic() {
        let client = Arc::new(ScriptedClient::always(Script::Succeed { delay_ms: 0 }));
        let router = priority_router(vec![scripted_model("m1", client)]);
        let debug = format!("{router:?}");
        assert!(debug.contains("Router"));
    }
}
