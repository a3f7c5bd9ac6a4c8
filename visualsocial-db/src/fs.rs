use crate::backend::{BackendError, BlobStore, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Blob store writing uploads below a local directory.
///
/// Objects end up at `{root}/{bucket}/{key}` and are expected to be served
/// under `{public_base}/{bucket}/{key}`.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base: String,
}

impl FsBlobStore {
    #[must_use]
    pub fn new(root: PathBuf, public_base: impl Into<String>) -> Self {
        let mut public_base = public_base.into();
        while public_base.ends_with('/') {
            public_base.pop();
        }

        Self { root, public_base }
    }

    fn check_segment(segment: &str) -> Result<()> {
        let forbidden = segment.is_empty()
            || segment == "."
            || segment.contains("..")
            || segment.contains(['/', '\\', '\0']);

        if forbidden {
            return Err(BackendError::InvalidKey(segment.to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        _content_type: Option<&str>,
    ) -> Result<()> {
        Self::check_segment(bucket)?;
        Self::check_segment(key)?;

        let dir = self.root.join(bucket);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(key);
        fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), len = bytes.len(), "Stored upload");

        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.public_base)
    }
}
