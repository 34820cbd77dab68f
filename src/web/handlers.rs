use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::Value as JsonValue;

use super::{
    Result, WebError,
    models::{
        CommitResponse, HealthResponse, RawSignatureResponse, RejectResponse, SuccessResponse,
    },
    state::AppState,
};
use crate::users::SaveUserRequest;

pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn list_transactions(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let pending = state
        .engine
        .list_pending()
        .await
        .map_err(|err| WebError::from(err).during("unable to list pending transactions"))?;
    Ok(Json(pending))
}

pub async fn raw_signature(
    State(state): State<AppState>,
    Path((namespace, filename)): Path<(String, String)>,
) -> Result<Json<RawSignatureResponse>> {
    let raw = state
        .engine
        .fetch_raw_signature(&namespace, &filename)
        .await
        .map_err(|err| WebError::from(err).during("failed to fetch signature"))?;
    Ok(Json(raw.into()))
}

pub async fn commit_transaction(
    State(state): State<AppState>,
    Path((namespace, filename)): Path<(String, String)>,
) -> Result<Json<CommitResponse>> {
    let outcome = state
        .engine
        .commit(&namespace, &filename)
        .await
        .map_err(|err| WebError::from(err).during("commit failed"))?;
    Ok(Json(outcome.into()))
}

pub async fn reject_transaction(
    State(state): State<AppState>,
    Path((namespace, filename)): Path<(String, String)>,
) -> Result<Json<RejectResponse>> {
    let outcome = state
        .engine
        .reject(&namespace, &filename)
        .await
        .map_err(|err| WebError::from(err).during("reject failed"))?;
    Ok(Json(outcome.into()))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let users = state
        .engine
        .user_index()
        .load_or_rebuild()
        .await
        .map_err(|err| WebError::from(err).during("unable to list users"))?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<JsonValue>> {
    let record = state
        .users
        .get(&username)
        .await
        .map_err(|err| WebError::from(err).during("failed to read user"))?;
    Ok(Json(record))
}

pub async fn save_user(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SaveUserRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>> {
    let Json(payload) = payload.map_err(|rejection| {
        WebError::new(
            StatusCode::BAD_REQUEST,
            format!("invalid request body: {}", rejection.body_text()),
        )
    })?;
    state
        .users
        .save(payload)
        .await
        .map_err(|err| WebError::from(err).during("failed to save user"))?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state
        .users
        .delete(&username)
        .await
        .map_err(WebError::from)?;
    Ok(Json(SuccessResponse { success: true }))
}
