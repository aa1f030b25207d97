//! Scoreboard auth - bearer credentials for the HPL scoreboard API
//!
//! A client logs in once with a username and receives a signed, time-bounded
//! token. Protected routes sit behind [`auth::AuthGate`], which verifies the
//! token on every request without any server-side session store and hands
//! the verified [`auth::Payload`] to the handler through the request
//! extensions.

pub mod auth;
pub mod config;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, ScoreboardError};
