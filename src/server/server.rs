use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::cache::error::CacheError;
use crate::cache::token::AccessToken;
use crate::cache::token_cache::TokenCache;
use crate::config::settings::SettingsConfig;
use crate::observability::routes::MetricsState;
use crate::sources::TokenExchange;

pub struct AppState<E: TokenExchange> {
    pub cache: Arc<TokenCache<E>>,
}

impl<E: TokenExchange> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self { cache: self.cache.clone() }
    }
}

impl<E: TokenExchange> AppState<E> {
    pub fn new(cache: Arc<TokenCache<E>>) -> Self {
        Self { cache }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub key: String,
    pub secret: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentitiesResponse {
    pub keys: Vec<String>,
    pub default: Option<String>,
}

/// Error body returned by every handler.
pub enum ApiError {
    Cache(CacheError),
    BadRequest(String),
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::Cache(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Cache(err @ CacheError::UnregisteredKey { .. }) => (StatusCode::NOT_FOUND, err.to_string()),
            ApiError::Cache(err @ CacheError::ExchangeFailed { .. }) => (StatusCode::BAD_GATEWAY, err.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Routes of the public cache operations plus the metrics route when enabled.
pub fn router<E>(state: AppState<E>, settings_config: &SettingsConfig) -> Router
where
    E: TokenExchange + 'static,
    E::Token: AccessToken,
{
    let metrics_state = MetricsState::new(state.cache.metrics().clone());

    Router::new()
        .route("/identities", get(list_identities::<E>).post(register_identity::<E>))
        .route("/tokens/{key}", get(get_token::<E>))
        .route("/flush", post(flush::<E>))
        .with_state(state)
        .merge(metrics_state.router(&settings_config.metrics))
}

/// Serve until `shutdown` resolves.
pub async fn start<E, F>(settings_config: &SettingsConfig, cache: Arc<TokenCache<E>>, shutdown: F) -> Result<()>
where
    E: TokenExchange + 'static,
    E::Token: AccessToken,
    F: Future<Output = ()> + Send + 'static,
{
    let metrics = cache.metrics().clone();
    let app = router(AppState::new(cache), settings_config);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on {}", listener.local_addr()?);

    metrics.up.set(1);
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown).await;
    metrics.up.set(0);
    served?;
    Ok(())
}

async fn get_token<E>(
    State(state): State<AppState<E>>,
    Path(key): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ApiError>
where
    E: TokenExchange + 'static,
    E::Token: AccessToken,
{
    let result = state.cache.get_token_result(&key, &query.code, query.force).await?;
    Ok(Json(TokenResponse {
        access_token: result.access_token().to_owned(),
        expires_at: result.expires_at,
    }))
}

async fn list_identities<E>(State(state): State<AppState<E>>) -> Json<IdentitiesResponse>
where
    E: TokenExchange + 'static,
{
    Json(IdentitiesResponse {
        keys: state.cache.list_keys().await,
        default: state.cache.get_first_registered_key().await,
    })
}

async fn register_identity<E>(
    State(state): State<AppState<E>>,
    Json(request): Json<RegisterRequest>,
) -> Result<StatusCode, ApiError>
where
    E: TokenExchange + 'static,
{
    if request.key.trim().is_empty() || request.secret.is_empty() {
        warn!("rejected registration with empty key or secret");
        return Err(ApiError::BadRequest("key and secret must not be empty".to_owned()));
    }
    state
        .cache
        .register(&request.key, &request.secret, request.name.as_deref())
        .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn flush<E>(State(state): State<AppState<E>>) -> StatusCode
where
    E: TokenExchange + 'static,
{
    state.cache.flush_all().await;
    StatusCode::NO_CONTENT
}
