//! REST API handlers
//!
//! Device protocol, in order:
//! 1. `GET /{key}` with an enrollment key returns the enrollment script
//! 2. the script posts a full report to `/api/onboarding`, which registers
//!    the device and returns the scheduler script
//! 3. the scheduler polls `/api/tasks`, which returns the telemetry script
//! 4. the telemetry script posts a report to `/api/telemetry`
//!
//! Each step only accepts the token issued by the step before it. The
//! device registry itself is read through the operator routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use mnms_core::{decode_envelope, DecodeError, TelemetryEnvelope};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{DeviceClaims, TokenError};
use crate::metrics::{telemetry_points, MetricsError};
use crate::state::AppState;
use crate::store::{KeyError, StoreError};

/// Request-level failures
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Rejected payload: {0}")]
    Decode(#[from] DecodeError),
    #[error("{0}")]
    Key(#[from] KeyError),
    #[error("Device report carries no serial number")]
    MissingSerial,
    #[error("Token is not valid for {0}")]
    WrongToken(&'static str),
    #[error("Device not found: {0}")]
    UnknownDevice(Uuid),
    #[error("Failed to issue token: {0}")]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Decode(_) | Self::MissingSerial => StatusCode::BAD_REQUEST,
            Self::Key(_) => StatusCode::UNAUTHORIZED,
            Self::WrongToken(_) => StatusCode::FORBIDDEN,
            Self::UnknownDevice(_) | Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Token(_) | Self::Store(_) | Self::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            debug!(error = %self, status = %status, "Request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

fn decode(payload: &str) -> Result<TelemetryEnvelope, ApiError> {
    let envelope = decode_envelope(payload)?;
    for warning in &envelope.warnings {
        warn!(%warning, "Device report decoded with warnings");
    }
    Ok(envelope)
}

/// Validate an enrollment key and hand out the enrollment script
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Path(key_id): Path<String>,
) -> Result<String, ApiError> {
    state.keys.consume(&key_id).inspect_err(|e| {
        warn!(key = %key_id, reason = %e, "Enrollment key rejected");
    })?;

    let token = state.signer.sign(DeviceClaims::enrollment())?;
    info!(key = %key_id, "Issued enrollment script");
    Ok(state.scripts.enrollment(&token))
}

/// Register the reporting device (if new) and install the task scheduler
pub async fn onboarding(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<DeviceClaims>,
    payload: String,
) -> Result<String, ApiError> {
    if !claims.is_enrollment() {
        return Err(ApiError::WrongToken("onboarding"));
    }
    let envelope = decode(&payload)?;
    let serial = envelope.device.serial_text().ok_or(ApiError::MissingSerial)?;

    let (device, created) = state
        .devices
        .find_or_create(&serial, envelope.device, envelope.interfaces)?;
    if !created {
        info!(device = %device.id, serial = %serial, "Device already registered");
    }

    let token = state
        .task_signer
        .sign(DeviceClaims::onboarded(device.id, serial))?;
    Ok(state.scripts.scheduler(&token))
}

/// Hand out the telemetry task for the polling device
pub async fn tasks(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<DeviceClaims>,
) -> Result<String, ApiError> {
    let id = claims.onboarded_id().ok_or(ApiError::WrongToken("tasks"))?;
    let device = state.devices.get(id)?.ok_or(ApiError::UnknownDevice(id))?;

    let refresh = state
        .task_signer
        .sign(DeviceClaims::onboarded(device.id, device.serial))?;
    let telemetry = state.signer.sign(DeviceClaims::telemetry(device.id))?;

    debug!(device = %id, "Issued telemetry task");
    Ok(state.scripts.task(&refresh, &telemetry))
}

/// Ingest a telemetry report
pub async fn telemetry(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<DeviceClaims>,
    payload: String,
) -> Result<&'static str, ApiError> {
    let device_id = claims
        .telemetry_device()
        .ok_or(ApiError::WrongToken("telemetry"))?;
    let envelope = decode(&payload)?;

    let points = telemetry_points(device_id, &envelope, Utc::now());
    let interfaces = envelope.interfaces.len();

    state
        .devices
        .update(device_id, envelope.device, envelope.interfaces)?;
    state.metrics.write_points(points)?;

    debug!(device = %device_id, interfaces, "Ingested telemetry");
    Ok("200")
}

/// List all registered devices (operator route)
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.devices.list()?))
}

/// Get a specific device by ID (operator route)
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let device = state.devices.get(id)?.ok_or(ApiError::UnknownDevice(id))?;
    Ok(Json(device))
}
