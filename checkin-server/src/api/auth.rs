//! Coach login and session middleware

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::ui::login_page;
use crate::error::ApiError;
use crate::session::{clear_session_cookie, password_matches, session_cookie, token_from_headers};
use crate::AppState;

/// Message shown when the dashboard is disabled
pub const DASHBOARD_DISABLED: &str = "Coach dashboard is disabled: no coach password configured";

/// Session middleware
///
/// Applied to the dashboard, its JSON feed, stored attachments and logout.
pub async fn session_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.config.coach_password.is_none() {
        return Err(ApiError::Forbidden(DASHBOARD_DISABLED.to_string()));
    }

    match token_from_headers(request.headers()) {
        Some(token) if state.sessions.is_valid(&token).await => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

/// POST /login
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let Some(expected) = state.config.coach_password.as_deref() else {
        return ApiError::Forbidden(DASHBOARD_DISABLED.to_string()).into_response();
    };

    if !password_matches(&form.password, expected) {
        warn!("Rejected coach login");
        return (
            StatusCode::UNAUTHORIZED,
            Html(login_page(Some("Incorrect password"))),
        )
            .into_response();
    }

    let token = state.sessions.create().await;
    info!("Coach logged in");

    (
        [(header::SET_COOKIE, session_cookie(&token, state.sessions.ttl()))],
        Redirect::to("/dashboard"),
    )
        .into_response()
}

/// POST /logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = token_from_headers(&headers) {
        state.sessions.revoke(&token).await;
    }

    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/login"),
    )
        .into_response()
}
