//! ATrigger verification file upload and download.

use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use tracing::{info, warn};

use crate::error::{Error, Result};

use super::pages::{nav_links, UploadPage};
use super::{key_query, render, AppState, PageQuery};

/// Name the verification file is stored and served under.
pub const VERIFICATION_FILE_NAME: &str = "ATriggerVerify.txt";

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

pub(crate) async fn upload_page(Query(query): Query<PageQuery>) -> Result<Html<String>> {
    render(&upload_form(&query, None))
}

pub(crate) async fn upload_submit(
    State(panel): State<AppState>,
    Query(query): Query<PageQuery>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut contents = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::upload(e.body_text()))?
    {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field.bytes().await.map_err(|e| Error::upload(e.body_text()))?;
            contents = Some(bytes);
            break;
        }
    }

    let Some(contents) = contents.filter(|c| !c.is_empty()) else {
        return Ok(render(&upload_form(&query, Some("Choose a file to upload.")))?.into_response());
    };

    let dir = panel.config().upload_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| Error::DirectoryCreate {
            path: dir.clone(),
            source,
        })?;
    let path = dir.join(VERIFICATION_FILE_NAME);
    tokio::fs::write(&path, &contents).await?;
    info!("Stored {} ({} bytes)", path.display(), contents.len());

    Ok(Redirect::to(&format!(
        "/menu/?{}&info=1",
        key_query(query.key.as_deref().unwrap_or_default())
    ))
    .into_response())
}

/// Serve the uploaded verification file; no key required.
pub(crate) async fn verification_file(State(panel): State<AppState>) -> Result<Response> {
    let path = panel.config().upload_dir().join(VERIFICATION_FILE_NAME);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            bytes,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Verification file requested but not uploaded");
            Ok((StatusCode::NOT_FOUND, "not found").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

fn upload_form(query: &PageQuery, error: Option<&str>) -> UploadPage {
    UploadPage {
        key_query: key_query(query.key.as_deref().unwrap_or_default()),
        nav: nav_links(),
        error: error.map(str::to_string),
    }
}
