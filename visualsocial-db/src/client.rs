//! The review tool as seen by one process.
//!
//! [`ReviewClient`] composes the view state machine, the annotation store and
//! the optional backend. Every failed backend write falls back to state kept
//! in this process and is logged at `warn`; only uploads report failure.

use crate::{
    annotations::{AnnotationError, AnnotationStore},
    backend::{Backend, BackendError, UPLOADS_BUCKET},
    ids::LocalIds,
};
use bytes::Bytes;
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use visualsocial_common::{
    model::{
        Id,
        comment::{Comment, PinPosition, PostRef},
        post::{MediaType, Post, PostContent, PostMarker, ReviewStatus},
    },
    review::{
        Decision, DecisionOutcome, DraftPatch, IgnoredDecision, ReviewError, ReviewLink,
        ReviewSession, ViewMode, review_param,
    },
    snowflake::{NodeId, SnowflakeTimestampFromDateTimeError},
};

/// Shown on every page while no backend is configured.
pub const DEGRADED_BANNER: &str =
    "No backend is configured. Posts and comments only last until the server restarts.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error("Could not mint a local id: {0}")]
    Id(#[from] SnowflakeTimestampFromDateTimeError),
    #[error("Uploads need a configured backend")]
    NoMediaStore,
    #[error("Upload failed: {0}")]
    Upload(#[source] BackendError),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ClientConfig {
    /// Origin review links are built on, e.g. `https://preview.example`.
    pub origin: String,
    /// Node id of snowflakes minted for local-only records.
    pub node_id: NodeId,
}

/// Everything a page needs to render after a load.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct SessionView {
    pub mode: ViewMode,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<&'static str>,
    pub content: PostContent,
    pub post: Option<Post>,
    pub link: Option<ReviewLink>,
    pub status: Option<ReviewStatus>,
    pub available_decisions: Vec<Decision>,
    pub comments: Vec<Comment>,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Published {
    pub post: Post,
    pub link: ReviewLink,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct DecisionView {
    pub post: Option<Post>,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<IgnoredDecision>,
    pub available_decisions: Vec<Decision>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct UploadedMedia {
    pub media_url: String,
    pub media_type: MediaType,
}

#[derive(Debug, Default)]
struct LocalPosts {
    /// Every post this process has seen.
    known: HashMap<Id<PostMarker>, Post>,
    /// Posts whose latest state never reached the backend.
    unsynced: HashSet<Id<PostMarker>>,
}

pub struct ReviewClient {
    origin: String,
    backend: Option<Backend>,
    ids: Arc<LocalIds>,
    draft: Mutex<PostContent>,
    posts: Mutex<LocalPosts>,
    annotations: AnnotationStore,
}

impl ReviewClient {
    #[must_use]
    pub fn new(config: ClientConfig, backend: Option<Backend>) -> Self {
        let ids = Arc::new(LocalIds::new(config.node_id));
        let annotations = AnnotationStore::new(
            backend.as_ref().map(|backend| backend.records.clone()),
            ids.clone(),
        );

        Self {
            origin: config.origin,
            backend,
            ids,
            draft: Mutex::new(PostContent::demo()),
            posts: Mutex::new(LocalPosts::default()),
            annotations,
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.backend.is_none()
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Local directory uploads land in, if they have to be served by us.
    #[must_use]
    pub fn media_dir(&self) -> Option<&Path> {
        self.backend.as_ref()?.media_dir.as_deref()
    }

    fn posts(&self) -> MutexGuard<'_, LocalPosts> {
        self.posts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn draft_guard(&self) -> MutexGuard<'_, PostContent> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn draft(&self) -> PostContent {
        self.draft_guard().clone()
    }

    /// Loads the page state for `query`, the raw query string of the page url.
    pub async fn load_session(&self, query: &str) -> SessionView {
        let session = match ViewMode::from_query(query) {
            ViewMode::Agency => ReviewSession::agency(self.draft()),
            ViewMode::Client => {
                let post = match review_param(query).map(str::parse::<Id<PostMarker>>) {
                    Some(Ok(post_id)) => self.fetch_post(post_id).await,
                    _ => {
                        debug!(query, "Review link does not name a post id");
                        None
                    }
                };
                ReviewSession::client(post)
            }
        };

        let comments = match (session.mode(), session.post()) {
            (ViewMode::Agency, _) => {
                let target = PostRef::Media(session.content().media_url.clone());
                self.annotations.list_annotations(&target).await
            }
            (ViewMode::Client, Some(post)) => {
                self.annotations.list_annotations(&post.id.into()).await
            }
            (ViewMode::Client, None) => Vec::new(),
        };

        SessionView {
            mode: session.mode(),
            degraded: self.is_degraded(),
            banner: self.is_degraded().then_some(DEGRADED_BANNER),
            content: session.content().clone(),
            link: session.link(&self.origin),
            status: session.status(),
            available_decisions: session.available_decisions(),
            post: session.into_post(),
            comments,
        }
    }

    pub fn edit_draft(&self, patch: DraftPatch) -> PostContent {
        let mut draft = self.draft_guard();
        patch.apply(&mut draft);
        draft.clone()
    }

    /// Applies `patch` to the draft and publishes the result as a pending post.
    pub async fn publish(&self, patch: DraftPatch) -> Result<Published, ClientError> {
        let mut session = ReviewSession::agency(self.edit_draft(patch));

        let saved = match &self.backend {
            Some(backend) => match backend.records.insert_post(session.content()).await {
                Ok(post) => Some(post),
                Err(err) => {
                    warn!(error = %err, "Publishing failed, keeping the post locally");
                    None
                }
            },
            None => None,
        };
        let synced = saved.is_some();
        let (post_id, created_at) = match saved {
            Some(post) => (post.id, post.created_at),
            None => self.ids.next()?,
        };

        let post = session.publish(post_id, created_at)?.clone();
        let link = ReviewLink::new(self.origin.as_str(), post.id);
        self.remember(post.clone(), synced);
        info!(post_id = %post.id, synced, "Published post");

        Ok(Published { post, link })
    }

    pub async fn post(&self, post_id: Id<PostMarker>) -> Option<Post> {
        self.fetch_post(post_id).await
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Option<Post> {
        let records = {
            let posts = self.posts();
            match &self.backend {
                Some(backend) if !posts.unsynced.contains(&post_id) => backend.records.clone(),
                _ => return posts.known.get(&post_id).cloned(),
            }
        };

        match records.fetch_post(post_id).await {
            Ok(Some(post)) => {
                self.remember(post.clone(), true);
                Some(post)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, %post_id, "Loading post failed, using last known state");
                self.posts().known.get(&post_id).cloned()
            }
        }
    }

    fn remember(&self, post: Post, synced: bool) {
        let mut posts = self.posts();
        if synced {
            posts.unsynced.remove(&post.id);
        } else {
            posts.unsynced.insert(post.id);
        }
        posts.known.insert(post.id, post);
    }

    /// Takes a client decision on `post_id`.
    ///
    /// Concurrent decisions on the same post race; the last write wins.
    pub async fn decide(&self, post_id: Id<PostMarker>, decision: Decision) -> DecisionView {
        let mut session = ReviewSession::client(self.fetch_post(post_id).await);

        let (applied, ignored) = match session.decide(decision) {
            DecisionOutcome::Applied(change) => {
                let unsynced = self.posts().unsynced.contains(&post_id);
                let records = match &self.backend {
                    Some(backend) if !unsynced => Some(backend.records.clone()),
                    _ => None,
                };
                let synced = match records {
                    Some(records) => match records
                        .update_post_status(change.post_id, change.to)
                        .await
                    {
                        Ok(true) => true,
                        Ok(false) => {
                            warn!(
                                %post_id,
                                status = %change.to,
                                "Backend has no row for the post, keeping the decision locally"
                            );
                            false
                        }
                        Err(err) => {
                            warn!(
                                error = %err,
                                %post_id,
                                status = %change.to,
                                "Saving decision failed, keeping it locally"
                            );
                            false
                        }
                    },
                    None => false,
                };
                if let Some(post) = session.post() {
                    self.remember(post.clone(), synced);
                }
                info!(%post_id, from = %change.from, to = %change.to, "Decision taken");
                (true, None)
            }
            DecisionOutcome::Ignored(reason) => {
                debug!(%post_id, ?reason, "Decision ignored");
                (false, Some(reason))
            }
        };

        DecisionView {
            available_decisions: session.available_decisions(),
            post: session.into_post(),
            applied,
            ignored,
        }
    }

    pub async fn add_comment(
        &self,
        target: PostRef,
        position: PinPosition,
        text: &str,
    ) -> Result<Comment, ClientError> {
        Ok(self.annotations.add_annotation(target, position, text).await?)
    }

    pub async fn list_comments(&self, target: &PostRef) -> Vec<Comment> {
        self.annotations.list_annotations(target).await
    }

    /// Stores an uploaded file and points the draft at it.
    pub async fn upload_media(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<UploadedMedia, ClientError> {
        let backend = self.backend.as_ref().ok_or(ClientError::NoMediaStore)?;

        let key = upload_key(OffsetDateTime::now_utc(), file_name);
        backend
            .blobs
            .upload(UPLOADS_BUCKET, &key, bytes, content_type)
            .await
            .map_err(ClientError::Upload)?;

        let uploaded = UploadedMedia {
            media_url: backend.blobs.public_url(UPLOADS_BUCKET, &key),
            media_type: MediaType::detect(content_type, file_name),
        };
        self.edit_draft(DraftPatch {
            media_url: Some(uploaded.media_url.clone()),
            media_type: Some(uploaded.media_type),
            ..DraftPatch::default()
        });
        info!(%key, media_type = %uploaded.media_type, "Stored upload");

        Ok(uploaded)
    }
}

/// `{unix_millis}.{extension}`, keeping only a plain alphanumeric extension.
fn upload_key(now: OffsetDateTime, file_name: &str) -> String {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .filter(|extension| {
            !extension.is_empty() && extension.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map_or_else(|| "bin".to_owned(), str::to_ascii_lowercase);

    format!("{}.{extension}", now.unix_timestamp_nanos() / 1_000_000)
}

#[cfg(test)]
mod tests {
    use crate::{
        client::{ClientConfig, ClientError, DEGRADED_BANNER, ReviewClient, upload_key},
        testing::{FailingBackend, MemoryBackend},
    };
    use bytes::Bytes;
    use std::sync::atomic::Ordering;
    use time::macros::datetime;
    use visualsocial_common::{
        model::{
            comment::{Origin, PinPosition, PostRef},
            post::{DEMO_MEDIA_URL, MediaType, Platform, ReviewStatus},
        },
        review::{Decision, DraftPatch, IgnoredDecision, ViewMode},
        snowflake::NodeId,
    };

    fn config() -> ClientConfig {
        ClientConfig {
            origin: "https://preview.example".to_owned(),
            node_id: NodeId::new(3).unwrap(),
        }
    }

    fn feed_hello() -> DraftPatch {
        DraftPatch {
            platform: Some(Platform::Feed),
            caption: Some("Hello".to_owned()),
            ..DraftPatch::default()
        }
    }

    #[tokio::test]
    async fn degraded_agency_session() {
        let client = ReviewClient::new(config(), None);

        let view = client.load_session("").await;

        assert_eq!(view.mode, ViewMode::Agency);
        assert!(view.degraded);
        assert_eq!(view.banner, Some(DEGRADED_BANNER));
        assert_eq!(view.content.media_url, DEMO_MEDIA_URL);
        assert!(view.comments.is_empty());
        assert!(view.post.is_none());
        assert!(view.available_decisions.is_empty());
    }

    #[tokio::test]
    async fn publish_then_review_locally() {
        let client = ReviewClient::new(config(), None);

        let published = client.publish(feed_hello()).await.unwrap();
        assert_eq!(
            published.link.to_string(),
            format!("https://preview.example?id={}", published.post.id)
        );

        let view = client
            .load_session(&format!("?id={}", published.post.id))
            .await;
        assert_eq!(view.mode, ViewMode::Client);
        assert_eq!(view.status, Some(ReviewStatus::Pending));
        assert_eq!(view.content.platform, Platform::Feed);
        assert_eq!(view.content.caption, "Hello");
        assert_eq!(
            view.available_decisions,
            vec![Decision::Approve, Decision::RequestChanges]
        );

        let decided = client
            .decide(published.post.id, Decision::Approve)
            .await;
        assert!(decided.applied);

        let reloaded = client
            .load_session(&format!("?id={}", published.post.id))
            .await;
        assert_eq!(reloaded.status, Some(ReviewStatus::Approved));
        assert!(reloaded.available_decisions.is_empty());

        let again = client
            .decide(published.post.id, Decision::RequestChanges)
            .await;
        assert!(!again.applied);
        assert_eq!(again.ignored, Some(IgnoredDecision::AlreadyApproved));
    }

    #[tokio::test]
    async fn unknown_post_id_is_a_no_op() {
        let (memory, backend) = MemoryBackend::shared();
        let client = ReviewClient::new(config(), Some(backend));

        let view = client.load_session("?id=999").await;
        assert_eq!(view.mode, ViewMode::Client);
        assert!(view.post.is_none());

        let decided = client.decide(999.into(), Decision::Approve).await;
        assert_eq!(decided.ignored, Some(IgnoredDecision::NoPost));
        assert_eq!(memory.status_updates.load(Ordering::Relaxed), 0);

        assert!(client.load_session("?id=nope").await.post.is_none());
    }

    #[tokio::test]
    async fn backend_round_trip() {
        let (memory, backend) = MemoryBackend::shared();
        let client = ReviewClient::new(config(), Some(backend));

        let published = client.publish(feed_hello()).await.unwrap();
        assert_eq!(published.post.id, 1000.into());
        assert!(!client.load_session("").await.degraded);

        client
            .decide(published.post.id, Decision::RequestChanges)
            .await;
        assert_eq!(memory.posts.lock().unwrap()[0].status, ReviewStatus::ChangesRequested);
        assert_eq!(memory.status_updates.load(Ordering::Relaxed), 1);

        let comment = client
            .add_comment(
                published.post.id.into(),
                PinPosition::new(50.0, 25.0).unwrap(),
                "move the logo",
            )
            .await
            .unwrap();
        assert_eq!(comment.origin, Origin::Backend);

        let view = client
            .load_session(&format!("?id={}", published.post.id))
            .await;
        assert_eq!(view.status, Some(ReviewStatus::ChangesRequested));
        assert_eq!(view.comments, vec![comment]);
    }

    #[tokio::test]
    async fn unreachable_backend_degrades_every_write() {
        let client = ReviewClient::new(config(), Some(FailingBackend::backend()));

        let published = client.publish(feed_hello()).await.unwrap();
        assert_eq!(
            published.post.id.snowflake().node_id(),
            NodeId::new(3).unwrap()
        );

        let decided = client.decide(published.post.id, Decision::Approve).await;
        assert!(decided.applied);

        let comment = client
            .add_comment(
                PostRef::Post(published.post.id),
                PinPosition::new(1.0, 1.0).unwrap(),
                "hi",
            )
            .await
            .unwrap();
        assert_eq!(comment.origin, Origin::Local);

        let view = client
            .load_session(&format!("?id={}", published.post.id))
            .await;
        assert_eq!(view.status, Some(ReviewStatus::Approved));
        assert_eq!(view.comments, vec![comment]);
    }

    #[tokio::test]
    async fn decisions_on_unsaved_posts_stay_local() {
        let (memory, backend) = MemoryBackend::shared();
        memory.reject_posts.store(true, Ordering::Relaxed);
        let client = ReviewClient::new(config(), Some(backend));

        let published = client.publish(feed_hello()).await.unwrap();
        let query = format!("?id={}", published.post.id);
        assert!(client.load_session(&query).await.post.is_some());

        let decided = client.decide(published.post.id, Decision::Approve).await;
        assert!(decided.applied);
        assert_eq!(memory.status_updates.load(Ordering::Relaxed), 0);

        let reloaded = client.load_session(&query).await;
        assert!(reloaded.post.is_some());
        assert_eq!(reloaded.status, Some(ReviewStatus::Approved));
    }

    #[tokio::test]
    async fn upload_updates_draft() {
        let (memory, backend) = MemoryBackend::shared();
        let client = ReviewClient::new(config(), Some(backend));

        let uploaded = client
            .upload_media("Clip.MP4", Some("video/mp4"), Bytes::from_static(b"frames"))
            .await
            .unwrap();

        assert_eq!(uploaded.media_type, MediaType::Video);
        assert!(uploaded.media_url.starts_with("memory://uploads/"));
        assert!(uploaded.media_url.ends_with(".mp4"));
        assert_eq!(client.draft().media_url, uploaded.media_url);
        assert_eq!(memory.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_upload_leaves_draft_alone() {
        let client = ReviewClient::new(config(), Some(FailingBackend::backend()));
        let result = client
            .upload_media("a.png", Some("image/png"), Bytes::from_static(b"png"))
            .await;
        assert!(matches!(result, Err(ClientError::Upload(_))));
        assert_eq!(client.draft().media_url, DEMO_MEDIA_URL);

        let local = ReviewClient::new(config(), None);
        let result = local
            .upload_media("a.png", Some("image/png"), Bytes::from_static(b"png"))
            .await;
        assert!(matches!(result, Err(ClientError::NoMediaStore)));
    }

    #[test]
    fn upload_keys() {
        let now = datetime!(2025-01-01 00:00:01.5 UTC);

        assert_eq!(upload_key(now, "Holiday.JPG"), "1735689601500.jpg");
        assert_eq!(upload_key(now, "noext"), "1735689601500.bin");
        assert_eq!(upload_key(now, "evil.p/ng"), "1735689601500.bin");
    }
}
