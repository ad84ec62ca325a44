//! HTTP API handlers for checkin-server

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod submit;
pub mod ui;
pub mod uploads;

pub use auth::{login, logout, session_middleware};
pub use dashboard::get_dashboard;
pub use health::health_routes;
pub use submit::submit_checkin;
pub use ui::{serve_dashboard, serve_index, serve_login};
pub use uploads::serve_upload;
