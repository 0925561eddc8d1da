use crate::assessment::{Assessment, IntrusionPolicy};
use crate::config::{ApiConfig, Config};
use crate::ingestion::IngestionService;
use crate::query::QueryService;
use crate::record::{Stream, ValidationError};
use crate::store::{Snapshot, StreamStores};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ingestion: IngestionService,
    pub query: QueryService,
    pub policy: Arc<IntrusionPolicy>,
}

impl AppState {
    /// Build the per-stream stores and the services sharing them
    pub fn new(config: &Config) -> Self {
        let stores = StreamStores::from_config(&config.storage);

        Self {
            ingestion: IngestionService::new(stores.clone()),
            query: QueryService::new(stores),
            policy: Arc::new(IntrusionPolicy::new(&config.assessment)),
        }
    }
}

/// Successful ingestion response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Errors surfaced by the HTTP boundary
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Malformed JSON payload: {0}")]
    MalformedPayload(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::MalformedPayload(rejection.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::MalformedPayload(detail) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Malformed JSON payload".to_string(),
                    missing: None,
                    detail: Some(detail),
                },
            ),
            ApiError::PayloadTooLarge(detail) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorResponse {
                    error: "Payload too large".to_string(),
                    missing: None,
                    detail: Some(detail),
                },
            ),
            ApiError::Validation(ValidationError::MissingFields(missing)) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Missing required data".to_string(),
                    missing: Some(missing),
                    detail: None,
                },
            ),
            ApiError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Invalid record data".to_string(),
                    missing: None,
                    detail: Some(e.to_string()),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<HeaderValue> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/sensors", get(get_sensors).post(post_sensors))
        .route("/api/faces", get(get_faces).post(post_faces))
        .route("/api/status", get(get_status))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "telemetry"
    }))
}

async fn post_sensors(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    ingest(&state, Stream::Sensors, payload)?;
    Ok(created("Sensor data received successfully"))
}

async fn post_faces(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    ingest(&state, Stream::Faces, payload)?;
    Ok(created("Face detection data received successfully"))
}

async fn get_sensors(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.query.query(Stream::Sensors))
}

async fn get_faces(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.query.query(Stream::Faces))
}

/// Intrusion verdict over the latest sensor and face records
async fn get_status(State(state): State<AppState>) -> Json<Assessment> {
    let sensor = state.query.latest(Stream::Sensors);
    let face = state.query.latest(Stream::Faces);

    Json(state.policy.assess(sensor.as_ref(), face.as_ref()))
}

#[instrument(skip_all, fields(stream = %stream))]
fn ingest(
    state: &AppState,
    stream: Stream,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(), ApiError> {
    let Json(raw) = payload.map_err(|rejection| {
        warn!(error = %rejection, "Rejected unreadable payload");
        ApiError::from(rejection)
    })?;

    state.ingestion.ingest(stream, raw)?;
    Ok(())
}

fn created(message: &str) -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::CREATED,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
}

/// Start the telemetry API server, running until `shutdown` resolves
pub async fn start_api_server<F>(state: AppState, config: &ApiConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting telemetry API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: ApiError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn test_validation_errors_map_to_bad_request() {
        let missing = ValidationError::MissingFields(vec!["light_level".to_string()]);
        assert_eq!(status_of(missing.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ValidationError::NotAnObject.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::MalformedPayload("eof".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_oversized_payload_status() {
        assert_eq!(
            status_of(ApiError::PayloadTooLarge("limit".to_string())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_error_response_omits_empty_fields() {
        let body = ErrorResponse {
            error: "Missing required data".to_string(),
            missing: Some(vec!["image".to_string()]),
            detail: None,
        };

        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"error": "Missing required data", "missing": ["image"]})
        );
    }
}
