//! Authentication for the scoreboard API
//!
//! Provides:
//! - Signed, time-bounded credential issuance and verification (HS256 JWT)
//! - The bearer gate that protects handlers and exposes the verified payload

pub mod gate;
pub mod token;

pub use gate::{
    authorization_payload, unauthorized_response, AuthGate, AuthorizationPayload, GateError,
};
pub use token::{JwtMaker, Payload, TokenError, TokenMaker, MIN_SECRET_LENGTH};
