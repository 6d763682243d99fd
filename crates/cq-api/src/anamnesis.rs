use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use cq_queue::{Anamnesis, AnamnesisInput};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{ApiError, ApiResult, AppState, MessageResponse};

#[derive(Serialize, ToSchema)]
pub struct AnamnesisCreated {
    pub message: String,
    pub id: i64,
}

async fn patient_for_entry(state: &AppState, entry_id: i64) -> ApiResult<i64> {
    state
        .store
        .entry_patient_id(entry_id)
        .await?
        .ok_or_else(|| ApiError::not_found("queue entry not found"))
}

fn require_chief_complaint(input: &AnamnesisInput) -> ApiResult<()> {
    match input.chief_complaint() {
        Some(_) => Ok(()),
        None => Err(ApiError::validation("chief complaint is required")),
    }
}

pub async fn list_for_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
) -> ApiResult<Json<Vec<Anamnesis>>> {
    let patient_id = patient_for_entry(&state, entry_id).await?;
    let records = state.store.anamneses_for_patient(patient_id).await?;
    Ok(Json(records))
}

pub async fn create_for_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
    Json(input): Json<AnamnesisInput>,
) -> ApiResult<(StatusCode, Json<AnamnesisCreated>)> {
    require_chief_complaint(&input)?;
    let patient_id = patient_for_entry(&state, entry_id).await?;
    let id = state.store.create_anamnesis(patient_id, &input).await?;
    tracing::info!(entry_id, patient_id, anamnesis_id = id, "anamnesis recorded");
    Ok((
        StatusCode::CREATED,
        Json(AnamnesisCreated {
            message: "anamnesis created".into(),
            id,
        }),
    ))
}

pub async fn update_for_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
    Json(input): Json<AnamnesisInput>,
) -> ApiResult<Json<MessageResponse>> {
    require_chief_complaint(&input)?;
    let patient_id = patient_for_entry(&state, entry_id).await?;
    if !state.store.update_anamnesis(patient_id, &input).await? {
        return Err(ApiError::not_found("anamnesis not found"));
    }
    Ok(MessageResponse::new("anamnesis updated"))
}

pub async fn list_for_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> ApiResult<Json<Vec<Anamnesis>>> {
    let records = state.store.anamneses_for_patient(patient_id).await?;
    Ok(Json(records))
}
