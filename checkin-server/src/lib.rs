//! checkin-server library - athlete check-in intake and coach dashboard
//!
//! Public routes accept check-ins; the dashboard, its JSON feed and stored
//! attachments sit behind a coach session.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use checkin_common::attachments::AttachmentStore;
use checkin_common::{Config, PersistenceGateway};

pub mod api;
pub mod error;
pub mod intake;
pub mod notify;
pub mod session;

pub use error::{ApiError, ApiResult};

use notify::NotificationQueue;
use session::SessionStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Record storage for the configured backend
    pub gateway: Arc<dyn PersistenceGateway>,
    /// Attachment files under the upload root
    pub attachments: Arc<AttachmentStore>,
    pub notifications: NotificationQueue,
    pub sessions: SessionStore,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: Config,
        gateway: Arc<dyn PersistenceGateway>,
        notifications: NotificationQueue,
    ) -> Self {
        let attachments = Arc::new(AttachmentStore::new(config.upload_root()));
        Self {
            config: Arc::new(config),
            gateway,
            attachments,
            notifications,
            sessions: SessionStore::new(),
        }
    }
}

/// Build application router
///
/// Session routes answer 403 when no coach password is configured and
/// redirect to `/login` without a valid session.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let body_limit = state.config.max_upload_bytes;

    // Protected routes (coach session)
    let protected = Router::new()
        .route("/dashboard", get(api::serve_dashboard))
        .route("/api/dashboard", get(api::get_dashboard))
        .route("/uploads/*path", get(api::serve_upload))
        .route("/logout", post(api::logout))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_middleware,
        ));

    // Public routes
    let public = Router::new()
        .route("/", get(api::serve_index))
        .route("/submit-checkin", post(api::submit_checkin))
        .route("/login", get(api::serve_login).post(api::login))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
