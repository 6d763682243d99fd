use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use cq_core::password;
use cq_queue::{NewUser, StoreError, UserRole};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{ApiError, ApiResult, AppState};

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub login: String,
    pub role: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub user_id: i64,
    pub role: String,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn auth_failed() -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        "AUTH_FAILED",
        "invalid credentials",
    )
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let (Some(login), Some(secret), Some(role)) = (
        present(payload.login),
        present(payload.password),
        present(payload.role),
    ) else {
        return Err(ApiError::validation("login, password and role are required"));
    };
    let role: UserRole = role.trim().parse().map_err(ApiError::validation)?;

    let password_hash = password::hash_password(&secret).map_err(|err| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "AUTH_ERROR",
            err.to_string(),
        )
    })?;

    let user = state
        .store
        .create_user(&NewUser {
            login: login.trim().to_string(),
            password_hash,
            role,
        })
        .await
        .map_err(|err| match err {
            StoreError::Duplicate(_) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", "login already exists")
            }
            other => other.into(),
        })?;

    tracing::info!(user_id = user.id, role = user.role.as_str(), "user created");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            login: user.login,
            role: user.role.as_str().to_string(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let (Some(login), Some(secret)) = (present(payload.login), present(payload.password)) else {
        return Err(ApiError::validation("login and password are required"));
    };

    let Some(user) = state.store.user_by_login(login.trim()).await? else {
        return Err(auth_failed());
    };

    let verified = password::verify_password(&secret, &user.password_hash).map_err(|err| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "AUTH_ERROR",
            err.to_string(),
        )
    })?;
    if !verified {
        return Err(auth_failed());
    }

    Ok(Json(LoginResponse {
        user_id: user.id,
        role: user.role.as_str().to_string(),
    }))
}
