//! Bearer authentication gate
//!
//! Wraps a protected handler. The gate reads `Authorization: Bearer <token>`,
//! verifies the token through a [`TokenMaker`], and on success stores the
//! payload in the request extensions as [`AuthorizationPayload`] before
//! calling the handler. Every failure is answered with the same `401`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{HeaderMap, Request, Response, StatusCode};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::auth::token::{Payload, TokenError, TokenMaker};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Authorization scheme accepted by the gate (compared case-insensitively)
pub const BEARER_SCHEME: &str = "bearer";

/// Reasons a request is not authenticated
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("authorization header is not provided")]
    MissingHeader,

    #[error("invalid authorization header format")]
    MalformedHeader,

    #[error("unsupported authorization type: {0}")]
    UnsupportedScheme(String),

    #[error("invalid token: {0}")]
    Token(#[from] TokenError),

    #[error("missing authorization payload")]
    MissingPayload,
}

/// Verified payload attached to a request by the gate.
///
/// Only this crate can construct it, so its presence in the request
/// extensions means the gate accepted the request.
#[derive(Debug, Clone)]
pub struct AuthorizationPayload(Arc<Payload>);

impl AuthorizationPayload {
    pub(crate) fn new(payload: Payload) -> Self {
        Self(Arc::new(payload))
    }

    pub fn payload(&self) -> &Payload {
        &self.0
    }
}

/// Read the authenticated payload placed on `req` by [`AuthGate::guard`]
pub fn authorization_payload<B>(req: &Request<B>) -> Result<&Payload, GateError> {
    req.extensions()
        .get::<AuthorizationPayload>()
        .map(AuthorizationPayload::payload)
        .ok_or(GateError::MissingPayload)
}

/// Request-pipeline stage enforcing a valid bearer token
#[derive(Clone)]
pub struct AuthGate {
    maker: Arc<dyn TokenMaker>,
}

impl AuthGate {
    pub fn new(maker: Arc<dyn TokenMaker>) -> Self {
        Self { maker }
    }

    /// Extract and verify the bearer token in `headers`
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Payload, GateError> {
        let header = headers.get(AUTHORIZATION).ok_or(GateError::MissingHeader)?;
        let header = header.to_str().map_err(|_| GateError::MalformedHeader)?;

        let fields: Vec<&str> = header.split_whitespace().collect();
        let [scheme, token] = fields.as_slice() else {
            return Err(GateError::MalformedHeader);
        };

        if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
            return Err(GateError::UnsupportedScheme(scheme.to_string()));
        }

        Ok(self.maker.verify_token(token)?)
    }

    /// Authenticate `req` and, if accepted, hand it to `next` with the
    /// payload attached. Rejected requests never reach `next`.
    pub async fn guard<B, F, Fut>(&self, mut req: Request<B>, next: F) -> Response<BoxBody>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Response<BoxBody>>,
    {
        match self.authenticate(req.headers()) {
            Ok(payload) => {
                debug!("Authenticated {} (token {})", payload.username, payload.id);
                req.extensions_mut()
                    .insert(AuthorizationPayload::new(payload));
                next(req).await
            }
            Err(e) => {
                debug!("Rejected {} {}: {}", req.method(), req.uri().path(), e);
                unauthorized_response()
            }
        }
    }
}

/// The single response sent for every authentication failure
pub fn unauthorized_response() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(CONTENT_TYPE, "text/plain")
        .header(WWW_AUTHENTICATE, "Bearer")
        .body(
            Full::new(Bytes::from_static(b"unauthorized"))
                .map_err(|never| match never {})
                .boxed(),
        )
        .unwrap_or_else(|_| Response::new(BoxBody::default()))
}
