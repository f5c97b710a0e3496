//! The reminder web panel.
//!
//! Routes:
//!
//! | Path                            | Auth | Handler |
//! |---------------------------------|------|---------|
//! | `/`                             | no   | secret key login |
//! | `/remind/`                      | key  | checkup, notify, schedule |
//! | `/checkup/`                     | key  | checkup only |
//! | `/menu/`                        | key  | service settings |
//! | `/phonenumbers/`                | key  | sender and destination numbers |
//! | `/phonenumbers/delete/:id/`     | key  | delete a destination number |
//! | `/iftttmakers/`                 | key  | IFTTT maker keys |
//! | `/iftttmakers/delete/:id/`      | key  | delete a maker key |
//! | `/notifications/`               | key  | SMS and IFTTT switches |
//! | `/upload/`                      | key  | upload the ATrigger verification file |
//! | `/ATriggerVerify.txt`           | no   | serve the verification file |

mod admin;
mod auth;
mod files;
mod pages;
mod status;

use std::net::SocketAddr;
use std::sync::Arc;

use askama::Template;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::{Error, Fault, Result};
use crate::panel::Panel;

pub use files::VERIFICATION_FILE_NAME;

/// Shared handler state.
pub type AppState = Arc<Panel>;

/// Query parameters every authenticated page understands.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    /// Panel secret key.
    pub key: Option<String>,
    /// `1` after a successful upload.
    pub info: Option<u8>,
    /// `1` when a delete succeeded, `0` when the entry did not exist.
    pub delinfo: Option<u8>,
    /// Id of the deleted entry.
    pub delid: Option<u32>,
}

/// Build the router with every panel route.
pub fn router(panel: AppState) -> Router {
    let protected = Router::new()
        .route("/remind/", get(status::remind))
        .route("/checkup/", get(status::checkup))
        .route("/menu/", get(admin::menu_page).post(admin::menu_submit))
        .route(
            "/phonenumbers/",
            get(admin::phone_numbers_page).post(admin::phone_numbers_submit),
        )
        .route("/phonenumbers/delete/:id/", get(admin::delete_phone_number))
        .route(
            "/iftttmakers/",
            get(admin::ifttt_makers_page).post(admin::ifttt_makers_submit),
        )
        .route("/iftttmakers/delete/:id/", get(admin::delete_ifttt_maker))
        .route(
            "/notifications/",
            get(admin::notifications_page).post(admin::notifications_submit),
        )
        .route("/upload/", get(files::upload_page).post(files::upload_submit))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&panel),
            auth::require_key,
        ));

    Router::new()
        .route("/", get(auth::login_page).post(auth::login_submit))
        .route(
            &format!("/{VERIFICATION_FILE_NAME}"),
            get(files::verification_file),
        )
        .merge(protected)
        .with_state(panel)
}

/// Serve the panel until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(panel: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(panel))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// `key=<secret>` with the secret percent-encoded, for links and redirects.
pub(crate) fn key_query(key: &str) -> String {
    Url::parse_with_params("http://panel.invalid/", &[("key", key)])
        .ok()
        .and_then(|url| url.query().map(str::to_string))
        .unwrap_or_default()
}

/// Render a template into an HTML response.
pub(crate) fn render<T: Template>(template: &T) -> Result<Html<String>> {
    Ok(Html(template.render()?))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.fault() {
            Fault::Unauthenticated => return Redirect::to("/").into_response(),
            Fault::Client => StatusCode::BAD_REQUEST,
            Fault::Server => {
                error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let page = pages::ErrorPage {
            status: status.as_u16(),
            message: self.to_string(),
        };
        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(_) => (status, self.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_query_encodes() {
        assert_eq!(key_query("abc"), "key=abc");
        assert_eq!(key_query("a b&c"), "key=a+b%26c");
    }

    #[test]
    fn test_unauthorized_redirects_home() {
        let response = Error::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/");
    }

    #[test]
    fn test_internal_error_is_500() {
        let response = Error::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upload_error_is_400() {
        let response = Error::upload("no file").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
