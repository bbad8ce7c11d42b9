//! Short-lived device credentials
//!
//! Devices are far too constrained to hold a session, so every response
//! carries a fresh HS256 JWT valid for a few seconds, and the next request
//! the device makes presents it as a Bearer token. The claims carry the
//! device identity from one step of the protocol to the next.
//!
//! The device read-back routes are for operators and take a static key
//! from the configuration instead.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// `{"alg":"HS256","typ":"JWT"}`
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token is not a three-part JWT")]
    Malformed,
    #[error("Unsupported token algorithm")]
    UnsupportedAlgorithm,
    #[error("Token signature mismatch")]
    BadSignature,
    #[error("Token expired")]
    Expired,
    #[error("Invalid token encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Invalid token claims: {0}")]
    Claims(#[from] serde_json::Error),
    #[error("Invalid signing key")]
    Key,
}

/// Claims carried between protocol steps.
///
/// - enrollment: no identity, only lets the device reach onboarding
/// - onboarded: `id` and `serial` of the registered device
/// - telemetry: `device_id` the report will be stored under
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<Uuid>,
    /// Expiry, seconds since the Unix epoch
    #[serde(default)]
    pub exp: u64,
}

impl DeviceClaims {
    pub fn enrollment() -> Self {
        Self::default()
    }

    pub fn onboarded(id: Uuid, serial: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            serial: Some(serial.into()),
            ..Self::default()
        }
    }

    pub fn telemetry(device_id: Uuid) -> Self {
        Self {
            device_id: Some(device_id),
            ..Self::default()
        }
    }

    /// Issued by the enrollment route; carries no identity
    pub fn is_enrollment(&self) -> bool {
        self.id.is_none() && self.device_id.is_none()
    }

    /// Device the scheduler token belongs to
    pub fn onboarded_id(&self) -> Option<Uuid> {
        match (self.id, self.device_id) {
            (Some(id), None) => Some(id),
            _ => None,
        }
    }

    /// Device a telemetry report will be stored under
    pub fn telemetry_device(&self) -> Option<Uuid> {
        match (self.id, self.device_id) {
            (None, Some(device_id)) => Some(device_id),
            _ => None,
        }
    }
}

/// Issues and verifies device tokens
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
        }
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Key)
    }

    /// Sign `claims`, stamping an expiry `ttl` from now
    pub fn sign(&self, mut claims: DeviceClaims) -> Result<String, TokenError> {
        claims.exp = current_unix_time() + self.ttl.as_secs();

        let header = URL_SAFE_NO_PAD.encode(JWT_HEADER);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{}.{}", header, payload);

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Check signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<DeviceClaims, TokenError> {
        self.verify_at(token, current_unix_time())
    }

    fn verify_at(&self, token: &str, now: u64) -> Result<DeviceClaims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header: serde_json::Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header)?)?;
        if header.get("alg").and_then(|a| a.as_str()) != Some("HS256") {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let mut mac = self.mac()?;
        mac.update(token[..token.len() - signature.len() - 1].as_bytes());
        mac.verify_slice(&URL_SAFE_NO_PAD.decode(signature)?)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: DeviceClaims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload)?)?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Operator keys, kept as HMAC tags so presented keys are compared in
/// constant time
#[derive(Clone)]
pub struct OperatorKeys {
    secret: Vec<u8>,
    tags: Vec<Vec<u8>>,
}

impl OperatorKeys {
    pub fn new(secret: impl AsRef<[u8]>, keys: &[String]) -> Result<Self, TokenError> {
        let mut operators = Self {
            secret: secret.as_ref().to_vec(),
            tags: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            let tag = operators.tag(key)?;
            operators.tags.push(tag);
        }
        Ok(operators)
    }

    fn mac(&self, key: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Key)?;
        mac.update(key.as_bytes());
        Ok(mac)
    }

    fn tag(&self, key: &str) -> Result<Vec<u8>, TokenError> {
        Ok(self.mac(key)?.finalize().into_bytes().to_vec())
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn verify(&self, presented: &str) -> bool {
        self.tags.iter().any(|tag| {
            self.mac(presented)
                .is_ok_and(|mac| mac.verify_slice(tag).is_ok())
        })
    }
}

/// Get current Unix timestamp
fn current_unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Pull the token out of an `Authorization` value.
///
/// RouterOS scripts send both `bearer` and `Bearer`, sometimes with
/// trailing whitespace.
fn bearer_token(value: &str) -> Option<&str> {
    let value = value.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Error response for authentication failures
#[derive(Serialize)]
struct AuthError {
    error: String,
    code: &'static str,
}

fn unauthorized(error: impl Into<String>, code: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(AuthError {
            error: error.into(),
            code,
        }),
    )
        .into_response()
}

/// Bearer token of the request, or the 401 to answer with
fn request_token(request: &Request) -> Result<&str, Response> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header.map(bearer_token) {
        Some(Some(token)) => Ok(token),
        Some(None) => {
            warn!("Invalid authorization header format");
            Err(unauthorized(
                "Invalid authorization header format. Use: Bearer <token>",
                "INVALID_AUTH_FORMAT",
            ))
        }
        None => {
            debug!(path = %request.uri().path(), "Missing authorization header");
            Err(unauthorized(
                "Authorization required. Include header: Authorization: Bearer <token>",
                "AUTH_REQUIRED",
            ))
        }
    }
}

/// Authentication middleware for the device routes
///
/// Verifies the Bearer token and stores its [`DeviceClaims`] in the request
/// extensions. Each handler checks the claims are of the kind it serves.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let verified = match request_token(&request) {
        Ok(token) => state.signer.verify(token),
        Err(response) => return response,
    };

    match verified {
        Ok(claims) => {
            debug!(?claims, "Token validated successfully");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, "Rejected device token");
            unauthorized("Invalid or expired token", "INVALID_TOKEN")
        }
    }
}

/// Authentication middleware for the operator routes
pub async fn operator_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.operators.is_empty() {
        return unauthorized("Operator routes are disabled", "OPERATOR_DISABLED");
    }
    let accepted = match request_token(&request) {
        Ok(key) => state.operators.verify(key),
        Err(response) => return response,
    };

    if accepted {
        next.run(request).await
    } else {
        warn!(path = %request.uri().path(), "Rejected operator key");
        unauthorized("Invalid operator key", "INVALID_OPERATOR_KEY")
    }
}
