use crate::error::ApiError;
use crate::state::AppState;
use crate::webhook::receive_event;
use alert_registry::AlertDto;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use provider_core::{ActionParams, Provider, ProviderError, ScopeResults};
use providers::ProviderInfo;
use serde_json::Value;
use std::sync::Arc;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/providers", get(list_providers))
        .route("/alerts/event/:provider_type", post(receive_event))
        .route("/providers/:id/scopes", get(validate_scopes))
        .route("/providers/:id/alerts", get(get_alerts))
        .route("/providers/:id/notify", post(notify))
        .route("/providers/:id/query", post(query))
        .with_state(state)
}

async fn list_providers() -> Json<Vec<ProviderInfo>> {
    Json(providers::catalog())
}

/// Runs a blocking provider call off the async workers.
async fn call<T, F>(state: &AppState, id: &str, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn Provider) -> Result<T, ProviderError> + Send + 'static,
{
    let provider: Arc<dyn Provider> = state
        .instances
        .get(id)
        .ok_or_else(|| ApiError::UnknownProvider(id.to_string()))?;
    let result = tokio::task::spawn_blocking(move || {
        let _guard = provider.context().span().entered();
        f(provider.as_ref())
    })
    .await?;
    Ok(result?)
}

async fn validate_scopes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScopeResults>, ApiError> {
    call(&state, &id, |p| Ok(p.validate_scopes())).await.map(Json)
}

async fn get_alerts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AlertDto>>, ApiError> {
    call(&state, &id, |p| p.get_alerts()).await.map(Json)
}

async fn notify(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let params = ActionParams::from_value(body)?;
    call(&state, &id, move |p| p.notify(&params)).await.map(Json)
}

async fn query(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let params = ActionParams::from_value(body)?;
    call(&state, &id, move |p| p.query(&params)).await.map(Json)
}
