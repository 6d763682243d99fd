use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use cq_queue::{NewPatient, Patient, StoreError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ByUserQuery {
    #[serde(default)]
    user_id: Option<i64>,
}

#[derive(Serialize)]
pub struct PatientLookup {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<Patient>,
}

#[derive(Deserialize)]
pub struct AdminRegistration {
    #[serde(flatten)]
    pub patient: NewPatient,
    #[serde(default)]
    pub is_priority: bool,
}

#[derive(Serialize, ToSchema)]
pub struct RegistrationResponse {
    pub message: String,
    pub patient_id: i64,
    pub entry_id: i64,
}

pub async fn create_patient(
    State(state): State<AppState>,
    Json(mut patient): Json<NewPatient>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    patient.cpf = patient.cpf.trim().to_string();
    if patient.cpf.is_empty() {
        return Err(ApiError::validation("cpf is required"));
    }

    let created = state
        .store
        .create_patient(&patient)
        .await
        .map_err(|err| match err {
            StoreError::Duplicate(_) => ApiError::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                "a patient with this cpf already exists",
            ),
            other => other.into(),
        })?;
    tracing::info!(patient_id = created.id, "patient registered");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn patient_by_user(
    State(state): State<AppState>,
    Query(query): Query<ByUserQuery>,
) -> ApiResult<Json<PatientLookup>> {
    let Some(user_id) = query.user_id else {
        return Err(ApiError::validation("user_id is required"));
    };

    let patient = state.store.patient_by_user(user_id).await?;
    Ok(Json(PatientLookup {
        exists: patient.is_some(),
        patient,
    }))
}

/// Front-desk registration: creates the patient and puts them in line in one step.
pub async fn register_and_enqueue(
    State(state): State<AppState>,
    Json(payload): Json<AdminRegistration>,
) -> ApiResult<(StatusCode, Json<RegistrationResponse>)> {
    let (patient, entry) = state
        .gateway
        .register_and_enqueue(payload.patient, payload.is_priority)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            message: "patient registered and queued".into(),
            patient_id: patient.id,
            entry_id: entry.id,
        }),
    ))
}
