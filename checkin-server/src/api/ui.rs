//! UI serving routes
//!
//! The check-in form lists one file input per known upload field; the
//! inputs are generated from the field catalogue so the page and the
//! intake handler cannot drift apart.

use axum::response::Html;

use checkin_common::attachments::fields::{kind_of, UPLOAD_FIELDS};
use checkin_common::attachments::AttachmentKind;

const INDEX_HTML: &str = include_str!("../ui/index.html");
const LOGIN_HTML: &str = include_str!("../ui/login.html");
const DASHBOARD_HTML: &str = include_str!("../ui/dashboard.html");

/// GET /
///
/// Serves the athlete check-in form
pub async fn serve_index() -> Html<String> {
    Html(INDEX_HTML.replace("{{UPLOAD_FIELDS}}", &upload_inputs()))
}

/// GET /login
pub async fn serve_login() -> Html<String> {
    Html(login_page(None))
}

/// GET /dashboard
///
/// Static shell; records are loaded from `/api/dashboard`
pub async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// Login page, optionally showing an error line
pub fn login_page(error: Option<&str>) -> String {
    let message = error
        .map(|e| format!("<p class=\"error\">{}</p>", e))
        .unwrap_or_default();
    LOGIN_HTML.replace("{{ERROR}}", &message)
}

fn upload_inputs() -> String {
    UPLOAD_FIELDS
        .iter()
        .map(|(field, prefix)| {
            let accept = match kind_of(field) {
                AttachmentKind::Photo => "image/*",
                AttachmentKind::Video => "video/*",
            };
            format!(
                "<label>{}<input type=\"file\" name=\"{}\" accept=\"{}\"></label>\n",
                prefix.replace('_', " "),
                field,
                accept
            )
        })
        .collect()
}
