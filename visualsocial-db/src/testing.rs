//! In-memory stand-ins for the backend.

use crate::backend::{Backend, BackendError, BlobStore, RecordStore, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use time::OffsetDateTime;
use visualsocial_common::model::{
    Id,
    comment::{Comment, CreateComment, Origin, PostRef},
    post::{Post, PostContent, PostMarker, ReviewStatus},
};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    next_id: AtomicU64,
    pub posts: Mutex<Vec<Post>>,
    pub comments: Mutex<Vec<Comment>>,
    pub uploads: Mutex<Vec<(String, String, Bytes)>>,
    pub status_updates: AtomicU64,
    /// Makes `insert_post` fail while everything else keeps working.
    pub reject_posts: AtomicBool,
}

impl MemoryBackend {
    /// The store together with a backend handle onto it.
    pub fn shared() -> (Arc<Self>, Backend) {
        let memory = Arc::new(Self::default());
        let backend = Backend {
            records: memory.clone(),
            blobs: memory.clone(),
            media_dir: None,
        };
        (memory, backend)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1000
    }
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn insert_post(&self, content: &PostContent) -> Result<Post> {
        if self.reject_posts.load(Ordering::Relaxed) {
            return FailingBackend::unavailable();
        }
        let post = Post {
            id: Id::from(self.next_id()),
            content: content.clone(),
            status: ReviewStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        };
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(post.clone());
        Ok(post)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let posts = self.posts.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(posts.iter().find(|post| post.id == post_id).cloned())
    }

    async fn update_post_status(
        &self,
        post_id: Id<PostMarker>,
        status: ReviewStatus,
    ) -> Result<bool> {
        self.status_updates.fetch_add(1, Ordering::Relaxed);
        let mut posts = self.posts.lock().unwrap_or_else(PoisonError::into_inner);
        let post = posts.iter_mut().find(|post| post.id == post_id);
        let updated = post.is_some();
        if let Some(post) = post {
            post.status = status;
        }
        Ok(updated)
    }

    async fn insert_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let comment = Comment {
            id: Id::from(self.next_id()),
            target: comment.target.clone(),
            position: comment.position,
            text: comment.text.clone(),
            created_at: OffsetDateTime::now_utc(),
            origin: Origin::Backend,
        };
        self.comments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(comment.clone());
        Ok(comment)
    }

    async fn select_comments(&self, target: &PostRef) -> Result<Vec<Comment>> {
        let comments = self.comments.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(comments
            .iter()
            .filter(|comment| &comment.target == target)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        _content_type: Option<&str>,
    ) -> Result<()> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((bucket.to_owned(), key.to_owned(), bytes));
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{bucket}/{key}")
    }
}

/// A backend that is configured but unreachable.
#[derive(Debug, Default)]
pub struct FailingBackend;

impl FailingBackend {
    pub fn backend() -> Backend {
        let failing = Arc::new(Self);
        Backend {
            records: failing.clone(),
            blobs: failing,
            media_dir: None,
        }
    }

    fn unavailable<T>() -> Result<T> {
        Err(BackendError::Status {
            status: 503,
            body: "unavailable".to_owned(),
        })
    }
}

#[async_trait]
impl RecordStore for FailingBackend {
    async fn insert_post(&self, _content: &PostContent) -> Result<Post> {
        Self::unavailable()
    }

    async fn fetch_post(&self, _post_id: Id<PostMarker>) -> Result<Option<Post>> {
        Self::unavailable()
    }

    async fn update_post_status(
        &self,
        _post_id: Id<PostMarker>,
        _status: ReviewStatus,
    ) -> Result<bool> {
        Self::unavailable()
    }

    async fn insert_comment(&self, _comment: &CreateComment) -> Result<Comment> {
        Self::unavailable()
    }

    async fn select_comments(&self, _target: &PostRef) -> Result<Vec<Comment>> {
        Self::unavailable()
    }
}

#[async_trait]
impl BlobStore for FailingBackend {
    async fn upload(
        &self,
        _bucket: &str,
        _key: &str,
        _bytes: Bytes,
        _content_type: Option<&str>,
    ) -> Result<()> {
        Self::unavailable()
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("unreachable://{bucket}/{key}")
    }
}
