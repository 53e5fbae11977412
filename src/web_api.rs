//! Web API Server
//!
//! The HTTP surface in front of the router.
//!
//! ## Endpoints
//!
//! - `POST /v1/chat` - Dispatch a normalized chat request (JSON)
//! - `GET /health` - Per-model health snapshot
//!
//! ## Usage
//!
//! ```no_run
//! use llm_gateway::{config, web_api, Router};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = config::loader::load_from_file("gateway.toml".as_ref()).unwrap();
//!     let router = Router::from_config(&config).unwrap();
//!     web_api::serve(&config.server, router, CancellationToken::new())
//!         .await
//!         .unwrap();
//! }
//! ```

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::router::Router;
use crate::schemas::ChatRequest;
use crate::GatewayError;

/// JSON body returned for any failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable error description.
    pub error: String,
    /// Stable error kind tag.
    pub kind: &'static str,
    /// Per-model error tail; present only for `all_providers_failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<HashMap<String, String>>,
}

/// One entry of the `GET /health` snapshot.
#[derive(Debug, Serialize)]
pub struct ModelHealth {
    pub id: String,
    pub healthy: bool,
    pub warmed_up: bool,
    pub latency_ms: f64,
}

/// Start the web API server, running until `shutdown` is cancelled.
pub async fn serve(
    config: &ServerConfig,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("gateway API listening on http://{addr}");

    axum::serve(listener, app(router))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Build the axum application. Separated from [`serve`] for tests.
pub fn app(router: Router) -> axum::Router {
    axum::Router::new()
        .route("/v1/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(router)
}

async fn chat_handler(
    State(router): State<Router>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id);

    // Dropping this handler future (client disconnect) drops the dispatch
    // future, which aborts the in-flight provider call.
    match router.chat(&request).instrument(span).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error_response(&error),
    }
}

async fn health_handler(State(router): State<Router>) -> Json<Vec<ModelHealth>> {
    let snapshot = router
        .models()
        .iter()
        .map(|m| ModelHealth {
            id: m.id().to_string(),
            healthy: m.healthy(),
            warmed_up: m.latency().warmed_up(),
            latency_ms: m.latency().value(),
        })
        .collect();
    Json(snapshot)
}

fn error_response(error: &GatewayError) -> Response {
    let status = match error {
        GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        GatewayError::NonRetryable(_) => StatusCode::BAD_GATEWAY,
        GatewayError::BudgetExhausted(_) => StatusCode::PAYMENT_REQUIRED,
        GatewayError::NoHealthyModels | GatewayError::AllProvidersFailed { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        GatewayError::Cancelled => StatusCode::REQUEST_TIMEOUT,
    };

    let failures = match error {
        GatewayError::AllProvidersFailed { failures } => Some(
            failures
                .iter()
                .map(|f| (f.model_id.clone(), f.error.kind().to_string()))
                .collect(),
        ),
        _ => None,
    };

    let body = ErrorBody {
        error: error.to_string(),
        kind: error.kind(),
        failures,
    };
    (status, Json(body)).into_response()
}

// ── Tests ──────────────────────────────────────────────────────────────
