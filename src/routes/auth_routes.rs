//! HTTP routes for credential issuance and identity lookup
//!
//! - POST /api/v1/login - Issue a bearer token for a username
//! - GET  /api/v1/me    - Return the verified payload (behind the gate)

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::authorization_payload;
use crate::server::AppState;
use crate::types::{Result, ScoreboardError};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 10 * 1024;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub username: String,
    pub issued_at: String,
    pub expired_at: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// =============================================================================
// Response Helpers
// =============================================================================

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(full_body(json))
        .unwrap_or_else(|_| Response::new(BoxBody::default()))
}

fn error_response(err: ScoreboardError) -> Response<BoxBody> {
    let (status, error) = err.into_status_code_and_body();
    json_response(status, &ErrorResponse { error })
}

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Read a JSON body, refusing to buffer more than `MAX_BODY_BYTES`
async fn parse_json_body<T, B>(req: Request<B>) -> Result<T>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<BoxError>,
{
    let body = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ScoreboardError::BadRequest("Request body too large".into())
            } else {
                ScoreboardError::Http(format!("Failed to read body: {}", e))
            }
        })?;

    Ok(serde_json::from_slice(&body.to_bytes())?)
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /api/v1/login
///
/// There is no user store: any non-blank username receives a token valid for
/// the configured duration.
async fn handle_login<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            warn!("Login rejected: {}", e);
            return error_response(e);
        }
    };

    if body.username.trim().is_empty() {
        return error_response(ScoreboardError::BadRequest(
            "Missing required field: username".into(),
        ));
    }

    match state
        .tokens
        .create_token(&body.username, state.args.token_duration())
    {
        Ok((access_token, payload)) => {
            info!(
                "Issued token {} for {} (expires {})",
                payload.id,
                payload.username,
                payload.expired_at.to_rfc3339()
            );
            json_response(
                StatusCode::OK,
                &LoginResponse {
                    access_token,
                    user: UserResponse {
                        username: body.username,
                    },
                },
            )
        }
        Err(e) => {
            error!("Failed to create access token: {}", e);
            error_response(ScoreboardError::Internal(
                "Failed to create access token".into(),
            ))
        }
    }
}

/// GET /api/v1/me
///
/// Must run behind the gate; a request without a payload is answered with a
/// JSON 401, since no credential was inspected.
async fn handle_me<B>(req: Request<B>) -> Response<BoxBody> {
    match authorization_payload(&req) {
        Ok(payload) => json_response(
            StatusCode::OK,
            &MeResponse {
                id: payload.id,
                username: payload.username.clone(),
                issued_at: payload.issued_at.to_rfc3339(),
                expired_at: payload.expired_at.to_rfc3339(),
            },
        ),
        Err(e) => {
            warn!("Protected handler reached without payload: {}", e);
            error_response(ScoreboardError::from(e))
        }
    }
}

// =============================================================================
// Main Router
// =============================================================================

/// Handle `/api/v1/*` requests.
pub async fn handle_api_request<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let path = req.uri().path().to_string();

    match (req.method(), path.as_str()) {
        (&Method::POST, "/api/v1/login") => handle_login(req, state).await,
        (&Method::GET, "/api/v1/me") => state.gate.guard(req, handle_me).await,

        (_, "/api/v1/login") | (_, "/api/v1/me") => {
            error_response(ScoreboardError::MethodNotAllowed(path))
        }

        _ => error_response(ScoreboardError::NotFound(path)),
    }
}
