use crate::chat::{self, ChatRequest};
use crate::config::RelayConfig;
use crate::credentials::Credentials;
use crate::error::{ErrorEnvelope, Outcome};
use crate::logging::{LogLevel, Record, SharedLogger};
use crate::rate_limit::{self, RateLimiter};
use crate::status::{self, ConfigReport, HealthReport, KeysReport};
use crate::translation::{self, TranslationRequest};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub credentials: Credentials,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
    pub limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        credentials: Credentials,
        client: reqwest::Client,
        logger: SharedLogger,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window_secs,
        ));
        Self {
            config,
            credentials,
            client,
            logger,
            limiter,
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/test-keys", get(handle_test_keys))
        .route("/api/test-config", get(handle_test_config))
        .route("/api/translate", post(handle_translate))
        .route("/api/ai-assistant", post(handle_ai_assistant))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit::enforce,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_translate(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: TranslationRequest = match parse_body(&state, "translate", &body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let outcome = translation::relay_translation(
        &req,
        &state.config.translation,
        state.credentials.translation.as_ref(),
        &state.client,
        &state.logger,
    )
    .await;

    respond(outcome)
}

async fn handle_ai_assistant(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ChatRequest = match parse_body(&state, "ai-assistant", &body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let outcome = chat::relay_chat(
        &req,
        &state.config.chat,
        state.credentials.chat.as_ref(),
        &state.client,
        &state.logger,
    )
    .await;

    respond(outcome)
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(HealthReport::collect(
        &state.config,
        &state.credentials,
        state.started_at,
    ))
}

async fn handle_test_keys(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<KeysReport> {
    let fallback_host = format!("localhost:{}", state.config.port);
    let server_url = status::request_base_url(&headers, &fallback_host);
    Json(KeysReport::collect(
        &state.config,
        &state.credentials,
        server_url,
    ))
}

async fn handle_test_config(State(state): State<Arc<AppState>>) -> Json<ConfigReport> {
    let report = ConfigReport::collect(&state.config, &state.credentials);
    state.logger.record(
        Record::new(LogLevel::Info, "test-config", "Test config endpoint called")
            .context(serde_json::to_value(&report).unwrap_or_default()),
    );
    Json(report)
}

/// Decode a JSON body. An empty body counts as `{}`.
fn parse_body<T: DeserializeOwned + Default>(
    state: &AppState,
    component: &str,
    body: &Bytes,
) -> std::result::Result<T, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        state
            .logger
            .warn(component, format!("Failed to parse request: {}", e));
        let err = ErrorEnvelope::new(format!("Invalid request body: {}", e));
        (StatusCode::BAD_REQUEST, Json(err)).into_response()
    })
}

fn respond(outcome: Outcome) -> Response {
    match outcome {
        Ok(body) => {
            let content_type = body
                .content_type
                .unwrap_or_else(|| "application/json".to_string());
            ([(header::CONTENT_TYPE, content_type)], body.bytes).into_response()
        }
        Err(envelope) => (StatusCode::INTERNAL_SERVER_ERROR, Json(envelope)).into_response(),
    }
}
