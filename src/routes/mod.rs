//! HTTP routes for the scoreboard auth service

pub mod auth_routes;
pub mod health;

pub use auth_routes::handle_api_request;
pub use health::health_check;
