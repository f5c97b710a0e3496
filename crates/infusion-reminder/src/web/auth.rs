//! Secret key check and login form.

use axum::extract::{Query, Request, State};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::pages::LoginPage;
use super::{key_query, render, AppState, PageQuery};

/// Login form body.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginForm {
    #[serde(default)]
    apisecret: String,
}

/// Let a request through only when `?key=` matches the panel secret.
pub(crate) async fn require_key(State(panel): State<AppState>, request: Request, next: Next) -> Response {
    let key = Query::<PageQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.key);

    match key {
        Some(key) if panel.secret_matches(&key) => next.run(request).await,
        Some(_) => {
            warn!("Rejected request to {} with a wrong key", request.uri().path());
            Error::Unauthorized.into_response()
        }
        None => {
            debug!("Request to {} without a key", request.uri().path());
            Error::Unauthorized.into_response()
        }
    }
}

pub(crate) async fn login_page() -> Result<Html<String>> {
    render(&LoginPage { error: None })
}

pub(crate) async fn login_submit(
    State(panel): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let secret = form.apisecret.trim();
    if panel.secret_matches(secret) {
        return Ok(Redirect::to(&format!("/menu/?{}", key_query(secret))).into_response());
    }
    warn!("Failed login attempt");
    Ok(render(&LoginPage {
        error: Some("Wrong secret key.".to_string()),
    })?
    .into_response())
}
