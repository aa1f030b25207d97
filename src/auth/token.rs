//! Credential issuance and verification
//!
//! Credentials are compact JWS tokens signed with HS256 (HMAC-SHA256) under a
//! single shared secret. Verification is stateless: the header algorithm is
//! checked first, then the signature, then expiry.
//!
//! Security notes:
//! - Only `HS256` is accepted. Any other `alg` value, `none` included, is
//!   rejected before the signature is looked at.
//! - The secret must be at least 32 bytes.
//! - Expired and forged tokens are separate errors for diagnostics only.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Minimum signing secret length in bytes
pub const MIN_SECRET_LENGTH: usize = 32;

/// The only algorithm name accepted in a token header
const SIGNING_ALGORITHM: &str = "HS256";

/// Errors produced while issuing or verifying credentials
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("signing secret must be at least {min} bytes, got {actual}")]
    InvalidSecret { min: usize, actual: usize },

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("token signature is invalid")]
    SignatureMismatch,

    #[error("token has expired")]
    Expired,

    #[error("failed to issue token: {0}")]
    Internal(String),
}

/// Claim set carried by every credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Random per-credential identifier
    pub id: Uuid,
    /// Subject the credential asserts
    pub username: String,
    /// Issued at (millisecond precision)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub issued_at: DateTime<Utc>,
    /// Expiration time (millisecond precision)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expired_at: DateTime<Utc>,
}

impl Payload {
    /// Build a payload valid for `duration` from now.
    ///
    /// Zero and negative durations are allowed and yield a payload that is
    /// already expired. `duration` is truncated toward zero to whole
    /// milliseconds, so `expired_at - issued_at` equals the truncated value.
    pub fn new(username: &str, duration: Duration) -> Result<Self, TokenError> {
        let duration = Duration::milliseconds(duration.num_milliseconds());
        let issued_at = Utc::now().trunc_subsecs(3);
        let expired_at = issued_at
            .checked_add_signed(duration)
            .ok_or_else(|| TokenError::Internal("token duration out of range".into()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            issued_at,
            expired_at,
        })
    }

    /// Whether the payload is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expired_at
    }
}

/// Issues and verifies credentials
pub trait TokenMaker: Send + Sync {
    /// Create a signed token for `username` valid for `duration`
    fn create_token(&self, username: &str, duration: Duration)
        -> Result<(String, Payload), TokenError>;

    /// Verify a token and return its payload
    fn verify_token(&self, token: &str) -> Result<Payload, TokenError>;
}

/// HS256 JWT token maker
#[derive(Clone)]
pub struct JwtMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtMaker {
    /// Create a new maker.
    ///
    /// Returns an error if the secret is shorter than [`MIN_SECRET_LENGTH`].
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(TokenError::InvalidSecret {
                min: MIN_SECRET_LENGTH,
                actual: secret.len(),
            });
        }

        // Expiry is checked against our own payload fields, not `exp`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Verify a token against an explicit clock reading
    pub fn verify_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<Payload, TokenError> {
        let alg = header_algorithm(token)?;
        if alg != SIGNING_ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(alg));
        }

        let token_data = decode::<Payload>(token, &self.decoding_key, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureMismatch,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::UnsupportedAlgorithm(alg.clone())
                }
                _ => TokenError::Malformed(err.to_string()),
            })?;

        let payload = token_data.claims;
        if payload.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(payload)
    }
}

impl TokenMaker for JwtMaker {
    fn create_token(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(username, duration)?;

        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|e| TokenError::Internal(format!("failed to sign token: {}", e)))?;

        Ok((token, payload))
    }

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        self.verify_token_at(token, Utc::now())
    }
}

impl fmt::Debug for JwtMaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtMaker")
            .field("algorithm", &SIGNING_ALGORITHM)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Read the `alg` field of a compact token without trusting anything else
fn header_algorithm(token: &str) -> Result<String, TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed("expected three segments".into()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| TokenError::Malformed(format!("header encoding: {}", e)))?;

    let header: RawHeader = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("header: {}", e)))?;

    Ok(header.alg)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "12345678901234567890123456789012";

    fn test_maker() -> JwtMaker {
        JwtMaker::new(SECRET).unwrap()
    }

    fn unsigned_token(header_json: &str, payload: &Payload) -> String {
        let header = URL_SAFE_NO_PAD.encode(header_json);
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        format!("{}.{}.", header, claims)
    }

    #[test]
    fn test_create_and_verify_token() {
        let maker = test_maker();
        let duration = Duration::minutes(1);
        let before = Utc::now();

        let (token, created) = maker.create_token("test-user", duration).unwrap();
        assert!(!token.is_empty());

        let payload = maker.verify_token(&token).unwrap();
        assert_eq!(payload, created);
        assert!(!payload.id.is_nil());
        assert_eq!(payload.username, "test-user");
        assert!((payload.issued_at - before).num_milliseconds().abs() < 1000);
        assert_eq!(payload.expired_at, payload.issued_at + duration);
    }

    #[test]
    fn test_zero_duration_expires_at_issue_time() {
        let maker = test_maker();
        let (token, payload) = maker.create_token("test-user", Duration::zero()).unwrap();
        assert_eq!(payload.expired_at, payload.issued_at);

        assert_eq!(
            maker.verify_token_at(&token, payload.issued_at),
            Ok(payload.clone())
        );
    }

    #[test]
    fn test_sub_millisecond_duration_is_truncated() {
        let maker = test_maker();
        let duration = Duration::minutes(1) + Duration::nanoseconds(1_500_000);
        let (token, payload) = maker.create_token("test-user", duration).unwrap();
        assert_eq!(
            payload.expired_at - payload.issued_at,
            Duration::milliseconds(60_001)
        );
        assert_eq!(maker.verify_token_at(&token, payload.issued_at), Ok(payload));

        let payload = Payload::new("test-user", -Duration::microseconds(2_500)).unwrap();
        assert_eq!(
            payload.expired_at - payload.issued_at,
            -Duration::milliseconds(2)
        );
    }

    #[test]
    fn test_expired_token() {
        let maker = test_maker();
        let (token, payload) = maker.create_token("test-user", -Duration::minutes(1)).unwrap();
        assert!(payload.expired_at < payload.issued_at);

        assert_eq!(maker.verify_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_expiry_boundary() {
        let maker = test_maker();
        let (token, payload) = maker.create_token("test-user", Duration::hours(1)).unwrap();

        assert!(maker.verify_token_at(&token, payload.expired_at).is_ok());
        assert_eq!(
            maker.verify_token_at(&token, payload.expired_at + Duration::milliseconds(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_alg_none_rejected() {
        let maker = test_maker();
        let payload = Payload::new("hacker", Duration::minutes(1)).unwrap();

        for alg in ["none", "None", "NONE", "nOnE"] {
            let token = unsigned_token(&format!(r#"{{"alg":"{}","typ":"JWT"}}"#, alg), &payload);
            assert_eq!(
                maker.verify_token(&token),
                Err(TokenError::UnsupportedAlgorithm(alg.to_string()))
            );
        }
    }

    #[test]
    fn test_alg_none_with_copied_signature_rejected() {
        let maker = test_maker();
        let (token, payload) = maker.create_token("alice", Duration::minutes(1)).unwrap();
        let signature = token.rsplit('.').next().unwrap();

        let forged = format!(
            "{}{}",
            unsigned_token(r#"{"alg":"none","typ":"JWT"}"#, &payload),
            signature
        );
        assert_eq!(
            maker.verify_token(&forged),
            Err(TokenError::UnsupportedAlgorithm("none".into()))
        );
    }

    #[test]
    fn test_other_hmac_algorithm_rejected() {
        let maker = test_maker();
        let payload = Payload::new("test-user", Duration::minutes(1)).unwrap();

        let token = encode(
            &Header::new(Algorithm::HS512),
            &payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            maker.verify_token(&token),
            Err(TokenError::UnsupportedAlgorithm("HS512".into()))
        );
    }

    #[test]
    fn test_flipped_signature_rejected() {
        let maker = test_maker();
        let (token, _) = maker.create_token("alice", Duration::minutes(1)).unwrap();
        let signature_start = token.rfind('.').unwrap() + 1;

        for i in signature_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            assert!(maker.verify_token(&tampered).is_err(), "position {}", i);
        }
    }

    #[test]
    fn test_swapped_claims_rejected() {
        let maker = test_maker();
        let (alice, _) = maker.create_token("alice", Duration::minutes(1)).unwrap();
        let (mallory, _) = maker.create_token("mallory", Duration::minutes(1)).unwrap();

        let alice_parts: Vec<&str> = alice.split('.').collect();
        let mallory_parts: Vec<&str> = mallory.split('.').collect();
        let spliced = format!("{}.{}.{}", alice_parts[0], mallory_parts[1], alice_parts[2]);

        assert_eq!(maker.verify_token(&spliced), Err(TokenError::SignatureMismatch));
    }

    #[test]
    fn test_wrong_secret() {
        let maker1 = test_maker();
        let maker2 = JwtMaker::new("different-secret-that-is-at-least-32-bytes").unwrap();

        let (token, _) = maker1.create_token("alice", Duration::minutes(1)).unwrap();
        assert_eq!(maker2.verify_token(&token), Err(TokenError::SignatureMismatch));
    }

    #[test]
    fn test_malformed_tokens() {
        let maker = test_maker();

        for token in ["", "invalid-token", "a.b", "a.b.c.d", "!!!.e30.", "e30.e30.sig"] {
            assert!(
                matches!(maker.verify_token(token), Err(TokenError::Malformed(_))),
                "{:?}",
                token
            );
        }
    }

    #[test]
    fn test_tokens_are_unique() {
        let maker = test_maker();
        let (token1, payload1) = maker.create_token("alice", Duration::hours(1)).unwrap();
        let (token2, payload2) = maker.create_token("alice", Duration::hours(1)).unwrap();

        assert_ne!(payload1.id, payload2.id);
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_secret_validation() {
        // Too short
        assert_eq!(
            JwtMaker::new("short").unwrap_err(),
            TokenError::InvalidSecret { min: 32, actual: 5 }
        );

        // Empty
        assert!(JwtMaker::new("").is_err());

        // One short of the minimum
        assert!(JwtMaker::new(&SECRET[..31]).is_err());

        // Valid
        assert!(JwtMaker::new(SECRET).is_ok());
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", test_maker());
        assert!(!rendered.contains(SECRET));
        assert!(rendered.contains("HS256"));
    }
}
