use utoipa::OpenApi;

use crate::anamnesis::AnamnesisCreated;
use crate::doctors::DoctorSummary;
use crate::patients::RegistrationResponse;
use crate::queue::{AttendResponse, EnqueueRequest};
use crate::users::{CreateUserRequest, LoginRequest, LoginResponse, UserResponse};
use crate::{ErrorResponse, HealthStatus, MessageResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        healthz_doc,
        metrics_doc,
        openapi_doc,
        queue_list_doc,
        queue_enqueue_doc,
        queue_current_doc,
        queue_attend_doc,
        queue_finish_doc,
        queue_cancel_doc,
        entry_anamnesis_list_doc,
        entry_anamnesis_create_doc,
        entry_anamnesis_update_doc,
        patients_create_doc,
        patients_by_user_doc,
        patients_admin_doc,
        patient_anamnesis_list_doc,
        users_create_doc,
        auth_login_doc,
        doctors_list_doc
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        MessageResponse,
        EnqueueRequest,
        AttendResponse,
        AnamnesisCreated,
        RegistrationResponse,
        CreateUserRequest,
        UserResponse,
        LoginRequest,
        LoginResponse,
        DoctorSummary
    )),
    tags(
        (name = "queue-api", description = "Clinic waiting line API")
    )
)]
pub struct QueueApiDoc;

pub fn document() -> utoipa::openapi::OpenApi {
    QueueApiDoc::openapi()
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, body = HealthStatus), (status = 503, body = HealthStatus))
)]
#[allow(dead_code)]
fn healthz_doc() {}

#[utoipa::path(
    get,
    path = "/metrics",
    responses((status = 200, content_type = "text/plain", body = String))
)]
#[allow(dead_code)]
fn metrics_doc() {}

#[utoipa::path(
    get,
    path = "/openapi.json",
    responses((status = 200, body = serde_json::Value))
)]
#[allow(dead_code)]
fn openapi_doc() {}

#[utoipa::path(
    get,
    path = "/queue",
    params(("If-None-Match" = Option<String>, Header, description = "Last seen queue version")),
    responses(
        (status = 200, description = "Waiting line in call order", body = serde_json::Value),
        (status = 304, description = "Queue unchanged since the given version")
    )
)]
#[allow(dead_code)]
fn queue_list_doc() {}

#[utoipa::path(
    post,
    path = "/queue",
    request_body = EnqueueRequest,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
#[allow(dead_code)]
fn queue_enqueue_doc() {}

#[utoipa::path(
    get,
    path = "/queue/current",
    responses((status = 200, description = "Entry being attended, or null", body = serde_json::Value))
)]
#[allow(dead_code)]
fn queue_current_doc() {}

#[utoipa::path(
    post,
    path = "/queue/{id}/attend",
    params(("id" = i64, Path, description = "Queue entry id")),
    responses((status = 200, body = AttendResponse), (status = 404, body = ErrorResponse))
)]
#[allow(dead_code)]
fn queue_attend_doc() {}

#[utoipa::path(
    post,
    path = "/queue/{id}/finish",
    params(("id" = i64, Path, description = "Queue entry id")),
    responses((status = 200, body = MessageResponse), (status = 404, body = ErrorResponse))
)]
#[allow(dead_code)]
fn queue_finish_doc() {}

#[utoipa::path(
    delete,
    path = "/queue/{id}",
    params(("id" = i64, Path, description = "Queue entry id")),
    responses((status = 200, body = MessageResponse), (status = 404, body = ErrorResponse))
)]
#[allow(dead_code)]
fn queue_cancel_doc() {}

#[utoipa::path(
    get,
    path = "/queue/{id}/anamnesis",
    params(("id" = i64, Path, description = "Queue entry id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
#[allow(dead_code)]
fn entry_anamnesis_list_doc() {}

#[utoipa::path(
    post,
    path = "/queue/{id}/anamnesis",
    params(("id" = i64, Path, description = "Queue entry id")),
    request_body = serde_json::Value,
    responses(
        (status = 201, body = AnamnesisCreated),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
#[allow(dead_code)]
fn entry_anamnesis_create_doc() {}

#[utoipa::path(
    put,
    path = "/queue/{id}/anamnesis",
    params(("id" = i64, Path, description = "Queue entry id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
#[allow(dead_code)]
fn entry_anamnesis_update_doc() {}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = serde_json::Value,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
#[allow(dead_code)]
fn patients_create_doc() {}

#[utoipa::path(
    get,
    path = "/patients/byuser",
    params(("user_id" = i64, Query, description = "Owning user id")),
    responses((status = 200, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
#[allow(dead_code)]
fn patients_by_user_doc() {}

#[utoipa::path(
    post,
    path = "/patients/admin",
    request_body = serde_json::Value,
    responses(
        (status = 201, body = RegistrationResponse),
        (status = 400, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
#[allow(dead_code)]
fn patients_admin_doc() {}

#[utoipa::path(
    get,
    path = "/patients/{id}/anamnesis",
    params(("id" = i64, Path, description = "Patient id")),
    responses((status = 200, body = serde_json::Value))
)]
#[allow(dead_code)]
fn patient_anamnesis_list_doc() {}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, body = UserResponse),
        (status = 400, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
#[allow(dead_code)]
fn users_create_doc() {}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, body = LoginResponse),
        (status = 400, body = ErrorResponse),
        (status = 401, body = ErrorResponse)
    )
)]
#[allow(dead_code)]
fn auth_login_doc() {}

#[utoipa::path(
    get,
    path = "/doctors",
    responses((status = 200, body = [DoctorSummary]))
)]
#[allow(dead_code)]
fn doctors_list_doc() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_documented_route_is_in_the_document() {
        let paths = document().paths.paths;
        for path in [
            "/healthz",
            "/metrics",
            "/openapi.json",
            "/queue",
            "/queue/current",
            "/queue/{id}",
            "/queue/{id}/attend",
            "/queue/{id}/finish",
            "/queue/{id}/anamnesis",
            "/patients",
            "/patients/byuser",
            "/patients/admin",
            "/patients/{id}/anamnesis",
            "/users",
            "/auth/login",
            "/doctors",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }
}
