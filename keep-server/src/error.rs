use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use provider_core::ProviderError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unknown provider type `{0}`")]
    UnknownProviderType(String),
    #[error("no provider configured with id `{0}`")]
    UnknownProvider(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("alert collector has shut down")]
    CollectorClosed,
    #[error("provider call did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownProviderType(_) | ApiError::UnknownProvider(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Provider(err) => match err {
                ProviderError::Config(_)
                | ProviderError::MissingParameter(_)
                | ProviderError::InvalidParameter { .. }
                | ProviderError::Format(_) => StatusCode::BAD_REQUEST,
                ProviderError::Unsupported { .. } => StatusCode::NOT_IMPLEMENTED,
                ProviderError::Hibernating(_) => StatusCode::SERVICE_UNAVAILABLE,
                ProviderError::Http { .. }
                | ProviderError::Transport(_)
                | ProviderError::Remote(_)
                | ProviderError::Queue(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::CollectorClosed => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(%status, error = %self, "request failed");
        } else {
            tracing::debug!(%status, error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
