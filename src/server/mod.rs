//! HTTP server for the scoreboard auth service

pub mod http;

pub use http::{route, run, AppState};
