//! HTTP surface of the review service.

pub mod handlers;
pub mod models;
pub mod state;

use crate::error::ReviewError;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::path::Path;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Request bodies larger than this are refused.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by handlers: a status plus one short message.
#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Prefixes server-side failures with what the handler was doing.
    /// Client errors keep their message as is.
    pub fn during(mut self, action: &str) -> Self {
        if self.status.is_server_error() {
            self.message = format!("{action}: {}", self.message);
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ReviewError> for WebError {
    fn from(err: ReviewError) -> Self {
        let status = match &err {
            ReviewError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ReviewError::NotFound(_) => StatusCode::NOT_FOUND,
            ReviewError::SignatureRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ReviewError::Store(_) | ReviewError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match err {
            ReviewError::InvalidArgument(msg)
            | ReviewError::NotFound(msg)
            | ReviewError::Store(msg)
            | ReviewError::Parse(msg)
            | ReviewError::SignatureRejected(msg) => msg,
        };
        Self { status, message }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

/// Builds the API router. When `public_dir` is set, unmatched paths are
/// served as static files from it.
pub fn build_router(state: AppState, public_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::healthcheck))
        .route("/api/transactions/list", get(handlers::list_transactions))
        .route(
            "/api/transaction/:namespace/:filename/raw",
            get(handlers::raw_signature),
        )
        .route(
            "/api/transaction/:namespace/:filename/commit",
            post(handlers::commit_transaction),
        )
        .route(
            "/api/transaction/:namespace/:filename/reject",
            post(handlers::reject_transaction),
        )
        .route("/api/users/list", get(handlers::list_users))
        .route("/api/user/save", post(handlers::save_user))
        .route(
            "/api/user/:username",
            get(handlers::get_user).delete(handlers::delete_user),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state);

    let router = match public_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    router.layer(TraceLayer::new_for_http())
}
