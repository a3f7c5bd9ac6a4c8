//! The hosted backend the review tool delegates persistence to.
//!
//! Two capabilities are consumed: a record store with the `posts` and
//! `comments` tables, and a blob store holding uploaded media. Running without
//! either is a supported mode, see [`BackendSettings::connect`].

use crate::{fs::FsBlobStore, postgres::PgRecordStore, rest::RestBackend};
use async_trait::async_trait;
use bytes::Bytes;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tracing::{info, warn};
use visualsocial_common::{
    model::{
        Id, ModelValidationError,
        comment::{Comment, CreateComment, PostRef},
        post::{Post, PostContent, PostMarker, ReviewStatus},
    },
    snowflake::SnowflakeTimestampFromDateTimeError,
};

pub const POSTS_TABLE: &str = "posts";
pub const COMMENTS_TABLE: &str = "comments";
pub const UPLOADS_BUCKET: &str = "uploads";

pub type Result<T, E = BackendError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("An object in the backend was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Request to the backend failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend replied with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Backend returned no row for the {0} insert")]
    EmptyInsert(&'static str),
    #[error("Storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object key is not allowed: {0:?}")]
    InvalidKey(String),
    #[error("Could not mint an id: {0}")]
    Id(#[from] SnowflakeTimestampFromDateTimeError),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_post(&self, content: &PostContent) -> Result<Post>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// Sets the status of `post_id`. Returns whether a row was updated.
    async fn update_post_status(
        &self,
        post_id: Id<PostMarker>,
        status: ReviewStatus,
    ) -> Result<bool>;

    async fn insert_comment(&self, comment: &CreateComment) -> Result<Comment>;

    /// Comments attached to `target`, oldest first.
    async fn select_comments(&self, target: &PostRef) -> Result<Vec<Comment>>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: Option<&str>,
    ) -> Result<()>;

    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// A configured backend. Its absence means local-only mode.
#[derive(Clone)]
pub struct Backend {
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    /// Directory the blob store writes to, if it is local and has to be served.
    pub media_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("media_dir", &self.media_dir)
            .finish_non_exhaustive()
    }
}

/// Where the backend lives, as far as it is configured.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct BackendSettings {
    /// Endpoint of the hosted backend.
    pub url: Option<String>,
    /// Public (anonymous) key of the hosted backend.
    pub api_key: Option<String>,
    /// Self-hosted alternative: a Postgres connection string.
    pub database_url: Option<String>,
    pub media_dir: Option<PathBuf>,
    pub media_public_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum BackendKind {
    Hosted { url: String, api_key: String },
    Postgres { database_url: String },
}

impl BackendSettings {
    /// Picks the backend to use. Missing or half-configured settings select none.
    #[must_use]
    pub fn kind(&self) -> Option<BackendKind> {
        match (&self.url, &self.api_key) {
            (Some(url), Some(api_key)) if !url.is_empty() && !api_key.is_empty() => {
                return Some(BackendKind::Hosted {
                    url: url.clone(),
                    api_key: api_key.clone(),
                });
            }
            (None, None) => {}
            _ => warn!("Only one of the backend url and api key is set, ignoring both"),
        }

        self.database_url
            .as_ref()
            .filter(|database_url| !database_url.is_empty())
            .map(|database_url| BackendKind::Postgres {
                database_url: database_url.clone(),
            })
    }

    /// Connects to the configured backend.
    ///
    /// Returns `None` when nothing usable is configured or the connection
    /// fails; the caller then runs in local-only mode.
    pub async fn connect(self, default_media_url: &str) -> Option<Backend> {
        match self.kind() {
            Some(BackendKind::Hosted { url, api_key }) => {
                info!(%url, "Using hosted backend");
                let rest = Arc::new(RestBackend::new(url, api_key));
                Some(Backend {
                    records: rest.clone(),
                    blobs: rest,
                    media_dir: None,
                })
            }
            Some(BackendKind::Postgres { database_url }) => {
                let records = match PgRecordStore::connect(&database_url).await {
                    Ok(records) => records,
                    Err(err) => {
                        warn!(error = %err, "Could not connect to postgres, running locally");
                        return None;
                    }
                };
                let media_dir = self.media_dir.unwrap_or_else(|| PathBuf::from("media"));
                let media_url = self
                    .media_public_url
                    .unwrap_or_else(|| default_media_url.to_owned());
                info!(media_dir = %media_dir.display(), "Using postgres backend");

                Some(Backend {
                    records: Arc::new(records),
                    blobs: Arc::new(FsBlobStore::new(media_dir.clone(), media_url)),
                    media_dir: Some(media_dir),
                })
            }
            None => {
                warn!("No backend configured, data only lives as long as this process");
                None
            }
        }
    }
}
