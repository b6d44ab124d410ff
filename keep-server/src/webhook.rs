use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use provider_core::consumer::AlertSink;
use provider_core::ProviderContext;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    /// Configured instance the event belongs to; its context is stamped onto
    /// the alerts.
    pub provider_id: Option<String>,
}

/// `POST /alerts/event/{provider_type}`: formats the payload with the
/// type's static formatter and hands the alerts to the collector.
pub async fn receive_event(
    State(state): State<AppState>,
    Path(provider_type): Path<String>,
    Query(query): Query<EventQuery>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let kind = providers::find(&provider_type)
        .ok_or_else(|| ApiError::UnknownProviderType(provider_type.clone()))?;

    let context: Option<ProviderContext> = match &query.provider_id {
        Some(id) => {
            let provider = state
                .instances
                .get(id)
                .filter(|p| p.provider_type() == kind.provider_type)
                .ok_or_else(|| ApiError::UnknownProvider(id.clone()))?;
            Some(provider.context().clone())
        }
        None => None,
    };

    let alerts = (kind.format_alert)(&payload, context.as_ref())?.into_vec();
    let accepted = alerts.len();
    state
        .collector
        .push(alerts)
        .map_err(|_| ApiError::CollectorClosed)?;

    tracing::info!(
        tenant_id = %state.tenant_id,
        %provider_type,
        accepted,
        "accepted webhook event"
    );
    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": accepted }))))
}
