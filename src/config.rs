//! Configuration for the scoreboard auth service
//!
//! CLI arguments and environment variable handling using clap.

use chrono::Duration;
use clap::Parser;
use std::net::SocketAddr;

use crate::auth::MIN_SECRET_LENGTH;
use crate::types::ScoreboardError;

/// Signing secret used when `--dev-mode` is set and no secret is configured
const DEV_SIGNING_SECRET: &str = "dev-mode-secret-not-for-production-use-123456";

/// Scoreboard auth - bearer credentials for the HPL scoreboard API
#[derive(Parser, Debug, Clone)]
#[command(name = "scoreboard-auth")]
#[command(about = "Issues and verifies bearer credentials for the HPL scoreboard API")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "SERVER_ADDRESS", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Secret used to sign and verify credentials (at least 32 bytes)
    #[arg(long, env = "JWT_SECRET_KEY", hide_env_values = true)]
    pub jwt_secret_key: Option<String>,

    /// Enable development mode (falls back to a built-in signing secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Lifetime of credentials issued by login, in seconds
    #[arg(long, env = "TOKEN_DURATION_SECONDS", default_value = "86400")]
    pub token_duration_seconds: u64,

    /// Origins allowed to call the API from a browser (comma-separated)
    #[arg(
        long,
        env = "CORS_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5173,http://localhost:3000"
    )]
    pub cors_allowed_origins: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    /// Get the effective signing secret (uses the built-in default in dev mode)
    pub fn signing_secret(&self) -> Result<&str, ScoreboardError> {
        match (&self.jwt_secret_key, self.dev_mode) {
            (Some(secret), _) => Ok(secret.as_str()),
            (None, true) => Ok(DEV_SIGNING_SECRET),
            (None, false) => Err(ScoreboardError::Config(
                "JWT_SECRET_KEY is required in production mode".into(),
            )),
        }
    }

    /// Lifetime of credentials issued by login
    pub fn token_duration(&self) -> Duration {
        i64::try_from(self.token_duration_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Whether a browser origin may call the API
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        self.cors_allowed_origins.iter().any(|o| o == origin)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ScoreboardError> {
        let secret = self.signing_secret()?;
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(ScoreboardError::Config(format!(
                "JWT_SECRET_KEY must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }

        if self.token_duration_seconds == 0 {
            return Err(ScoreboardError::Config(
                "TOKEN_DURATION_SECONDS must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
