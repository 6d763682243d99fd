use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use cq_core::notify::{DisabledNotifier, MailApiConfig, MailApiNotifier, Notifier};
use cq_core::{config, db, http, logging, metrics, server};
use cq_queue::postgres::PgStore;
use cq_queue::{ClinicStore, QueueCache, QueueError, QueueGateway, QueueStore, StoreError};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

mod anamnesis;
mod doctors;
mod openapi;
mod patients;
mod queue;
mod users;


const SERVICE_NAME: &str = "cq-queue-api";

#[derive(Clone)]
pub(crate) struct AppState {
    store: Arc<dyn ClinicStore>,
    gateway: Arc<QueueGateway>,
}

impl AppState {
    fn new<S>(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self
    where
        S: ClinicStore + 'static,
    {
        let queue_store: Arc<dyn QueueStore> = store.clone();
        let cache = Arc::new(QueueCache::new(Arc::clone(&queue_store), SERVICE_NAME));
        let gateway = Arc::new(QueueGateway::new(
            queue_store,
            cache,
            notifier,
            SERVICE_NAME,
        ));
        Self { store, gateway }
    }

    fn cache(&self) -> &QueueCache {
        self.gateway.cache()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ErrorResponse {
    code: String,
    message: String,
    details: Option<Value>,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(constraint) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", "record already exists")
                    .with_details(json!({ "constraint": constraint }))
            }
            other => {
                tracing::error!(error = %other, "store failure");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "DB_ERROR", other.to_string())
            }
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Validation(message) => ApiError::validation(message),
            QueueError::NotFound(message) => ApiError::not_found(message),
            QueueError::Conflict(message) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", message)
            }
            QueueError::Store(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = ErrorResponse {
            code: self.code.to_string(),
            message: self.message,
            details: self.details,
        };
        (self.status, Json(payload)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, ToSchema)]
pub(crate) struct HealthStatus {
    status: String,
}

#[derive(Serialize, ToSchema)]
pub(crate) struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

pub struct QueueApiConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    pub db: db::DbOptions,
    pub mail: Option<MailApiConfig>,
}

pub fn load_config() -> Result<QueueApiConfig> {
    let addr = config::socket_addr_from_env("QUEUE_API_ADDR", "0.0.0.0:3001")?;
    let database_url = config::required_env("DATABASE_URL")?;
    let db = db::DbOptions {
        max_connections: config::env_or("DB_MAX_CONNECTIONS", 10)?,
        acquire_timeout: Duration::from_secs(config::env_or("DB_ACQUIRE_TIMEOUT_SECONDS", 5)?),
        statement_timeout: Duration::from_millis(config::env_or("DB_STATEMENT_TIMEOUT_MS", 5_000)?),
    };
    let mail = match config::optional_env("MAIL_API_URL") {
        Some(url) => Some(MailApiConfig {
            url,
            token: config::optional_env("MAIL_API_TOKEN"),
            from: config::env_or("MAIL_FROM", "no-reply@clinic.local".to_string())?,
            timeout: Duration::from_secs(config::env_or("MAIL_TIMEOUT_SECONDS", 10)?),
        }),
        None => None,
    };
    Ok(QueueApiConfig {
        addr,
        database_url,
        db,
        mail,
    })
}

pub async fn run(config: QueueApiConfig) -> Result<()> {
    logging::init(SERVICE_NAME);
    metrics::init(SERVICE_NAME);

    let pool = db::connect(&config.database_url, &config.db).await?;
    let store = Arc::new(PgStore::new(pool));

    let notifier: Arc<dyn Notifier> = match config.mail {
        Some(mail) => {
            tracing::info!(relay = %mail.url, "call notifications enabled");
            Arc::new(MailApiNotifier::new(mail)?)
        }
        None => {
            tracing::warn!("MAIL_API_URL not set; call notifications disabled");
            Arc::new(DisabledNotifier)
        }
    };

    let state = AppState::new(store, notifier);
    let version = state.cache().rebuild().await?;
    tracing::info!(version, "initial queue snapshot loaded");

    let router = http::apply_standard_layers(router(state), SERVICE_NAME);
    let router = http::apply_cors(router);
    server::serve(config.addr, router).await
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/queue", get(queue::list_queue).post(queue::enqueue))
        .route("/queue/current", get(queue::current_attending))
        .route("/queue/:id", axum::routing::delete(queue::cancel))
        .route("/queue/:id/attend", post(queue::start_attending))
        .route("/queue/:id/finish", post(queue::finish_attending))
        .route(
            "/queue/:id/anamnesis",
            get(anamnesis::list_for_entry)
                .post(anamnesis::create_for_entry)
                .put(anamnesis::update_for_entry),
        )
        .route("/patients", post(patients::create_patient))
        .route("/patients/byuser", get(patients::patient_by_user))
        .route("/patients/admin", post(patients::register_and_enqueue))
        .route("/patients/:id/anamnesis", get(anamnesis::list_for_patient))
        .route("/users", post(users::create_user))
        .route("/auth/login", post(users::login))
        .route("/doctors", get(doctors::list_doctors))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => (StatusCode::OK, Json(HealthStatus { status: "ok".into() })),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthStatus {
                    status: "unavailable".into(),
                }),
            )
        }
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    metrics::metrics_response(SERVICE_NAME)
}

async fn openapi_json() -> impl IntoResponse {
    Json(openapi::document())
}
