use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cq_queue::{QueueEntry, QueueItem};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{ApiResult, AppState, MessageResponse};

#[derive(Deserialize, ToSchema)]
pub struct EnqueueRequest {
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub is_priority: bool,
}

#[derive(Serialize, ToSchema)]
pub struct AttendResponse {
    pub message: String,
    pub notification: bool,
}

/// Conditional read of the cached waiting line. Never touches the store.
pub async fn list_queue(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let snapshot = state.cache().snapshot().await;
    let token = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok());

    let etag = HeaderValue::from(snapshot.version);
    if snapshot.is_current(token) {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
    }

    let mut response = Json(&snapshot.entries).into_response();
    response.headers_mut().insert(header::ETAG, etag);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

pub async fn enqueue(
    State(state): State<AppState>,
    Json(payload): Json<EnqueueRequest>,
) -> ApiResult<(StatusCode, Json<QueueEntry>)> {
    let cpf = payload.cpf.unwrap_or_default();
    let entry = state.gateway.enqueue(&cpf, payload.is_priority).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn current_attending(
    State(state): State<AppState>,
) -> ApiResult<Json<Option<QueueItem>>> {
    let current = state.store.current_attending().await?;
    Ok(Json(current))
}

pub async fn start_attending(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
) -> ApiResult<Json<AttendResponse>> {
    let outcome = state.gateway.start_attending(entry_id).await?;
    Ok(Json(AttendResponse {
        message: "attendance started".into(),
        notification: outcome.notified,
    }))
}

pub async fn finish_attending(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    state.gateway.finish_attending(entry_id).await?;
    Ok(MessageResponse::new("attendance finished"))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    state.gateway.cancel(entry_id).await?;
    Ok(MessageResponse::new("patient removed from the queue"))
}
