//! Error responses.
//!
//! Every failure leaves the server as
//! `{"success": false, "error": {"kind": "...", "message": "..."}}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crm_core::AccessError;
use crm_eval::RollupError;
use crm_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    Rollup(#[from] RollupError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("principal lacks role '{required}'")]
    Forbidden { required: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Rollup(RollupError::UnknownDashboard { .. }) | ApiError::NotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::Rollup(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Access(AccessError::UnknownRole(_)) => StatusCode::BAD_REQUEST,
            ApiError::Access(AccessError::MissingIdentity) | ApiError::Forbidden { .. } => {
                StatusCode::FORBIDDEN
            }
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Rollup(e) => e.kind(),
            ApiError::Access(AccessError::UnknownRole(_)) => "unknown_role",
            ApiError::Access(AccessError::MissingIdentity) => "missing_identity",
            ApiError::Storage(_) => "storage",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound => "not_found",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("invalid query string: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "request rejected");
        }
        let body = serde_json::json!({
            "success": false,
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
