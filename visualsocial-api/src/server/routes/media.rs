use crate::server::{Result, ServerError, ServerRouter, json::Json};
use axum::extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use visualsocial_db::client::{ReviewClient, UploadedMedia};

const FILE_FIELD: &str = "file";
const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(upload_media)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/media")]
struct MediaPath;

/// Stores the `file` field of a multipart form and makes it the draft media.
async fn upload_media(
    _: MediaPath,
    State(client): State<Arc<ReviewClient>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadedMedia>> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            debug!(name = ?field.name(), "Skipping multipart field");
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        let content_type = field.content_type().map(ToOwned::to_owned);
        let bytes = field.bytes().await?;

        let uploaded = client
            .upload_media(&file_name, content_type.as_deref(), bytes)
            .await?;
        return Ok(Json(uploaded));
    }

    Err(ServerError::MissingFile)
}
