//! The review workflow of a single post.
//!
//! An agency session edits a draft and publishes it, which yields a review
//! link. Whoever opens the link is in client mode and may approve the post or
//! request changes. Possessing the link is the only credential.

use crate::model::{
    Id,
    post::{MediaType, Platform, Post, PostContent, PostMarker, PostProfile, ReviewStatus},
};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::Display;
use thiserror::Error;
use time::OffsetDateTime;

/// Query parameter that switches a session into client mode.
pub const REVIEW_QUERY_PARAM: &str = "id";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Agency,
    Client,
}

impl ViewMode {
    /// Client mode iff the query string carries a non-empty `id`.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        if review_param(query).is_some() {
            Self::Client
        } else {
            Self::Agency
        }
    }
}

/// The non-empty value of the review parameter in `query`, if any.
#[must_use]
pub fn review_param(query: &str) -> Option<&str> {
    query
        .trim_start_matches('?')
        .split('&')
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| *key == REVIEW_QUERY_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ReviewError {
    #[error("Only the agency view can edit or publish")]
    NotAgency,
    #[error("Post {0} is already published")]
    AlreadyPublished(Id<PostMarker>),
}

/// `{origin}?id={post_id}`, the capability URL handed to the client.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct ReviewLink {
    origin: String,
    post_id: Id<PostMarker>,
}

impl ReviewLink {
    #[must_use]
    pub fn new(origin: impl Into<String>, post_id: Id<PostMarker>) -> Self {
        Self {
            origin: origin.into(),
            post_id,
        }
    }
}

impl Display for ReviewLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}?{REVIEW_QUERY_PARAM}={}", self.origin, self.post_id)
    }
}

impl Serialize for ReviewLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    RequestChanges,
}

impl Decision {
    #[must_use]
    pub fn target_status(self) -> ReviewStatus {
        match self {
            Decision::Approve => ReviewStatus::Approved,
            Decision::RequestChanges => ReviewStatus::ChangesRequested,
        }
    }
}

/// A status change the caller has to persist.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct StatusChange {
    pub post_id: Id<PostMarker>,
    pub from: ReviewStatus,
    pub to: ReviewStatus,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoredDecision {
    /// There is no published post to decide on.
    NoPost,
    /// Decisions belong to the client view.
    NotClient,
    /// Approval is final.
    AlreadyApproved,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum DecisionOutcome {
    Applied(StatusChange),
    Ignored(IgnoredDecision),
}

/// Partial update of the agency draft. Absent fields are left alone.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DraftPatch {
    pub media_url: Option<String>,
    pub media_type: Option<MediaType>,
    pub platform: Option<Platform>,
    pub caption: Option<String>,
    pub profile: Option<PostProfile>,
}

impl DraftPatch {
    pub fn apply(self, content: &mut PostContent) {
        if let Some(media_url) = self.media_url {
            content.media_url = media_url;
        }
        if let Some(media_type) = self.media_type {
            content.media_type = media_type;
        }
        if let Some(platform) = self.platform {
            content.platform = platform;
        }
        if let Some(caption) = self.caption {
            content.caption = caption;
        }
        if let Some(profile) = self.profile {
            content.profile = profile;
        }
    }
}

/// View state of one page load.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ReviewSession {
    mode: ViewMode,
    draft: PostContent,
    post: Option<Post>,
}

impl ReviewSession {
    #[must_use]
    pub fn agency(draft: PostContent) -> Self {
        Self {
            mode: ViewMode::Agency,
            draft,
            post: None,
        }
    }

    /// A session opened through a review link. `post` is `None` when the
    /// linked post could not be found.
    #[must_use]
    pub fn client(post: Option<Post>) -> Self {
        Self {
            mode: ViewMode::Client,
            draft: post
                .as_ref()
                .map_or_else(PostContent::demo, |post| post.content.clone()),
            post,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    #[must_use]
    pub fn post(&self) -> Option<&Post> {
        self.post.as_ref()
    }

    #[must_use]
    pub fn into_post(self) -> Option<Post> {
        self.post
    }

    /// What the preview currently shows.
    #[must_use]
    pub fn content(&self) -> &PostContent {
        self.post.as_ref().map_or(&self.draft, |post| &post.content)
    }

    #[must_use]
    pub fn status(&self) -> Option<ReviewStatus> {
        self.post.as_ref().map(|post| post.status)
    }

    pub fn edit(&mut self, patch: DraftPatch) -> Result<&PostContent, ReviewError> {
        self.ensure_editable()?;
        patch.apply(&mut self.draft);
        Ok(&self.draft)
    }

    /// Turns the draft into a pending post with the backend-assigned `id`.
    pub fn publish(
        &mut self,
        id: Id<PostMarker>,
        created_at: OffsetDateTime,
    ) -> Result<&Post, ReviewError> {
        self.ensure_editable()?;

        let post = Post {
            id,
            content: self.draft.clone(),
            status: ReviewStatus::Pending,
            created_at,
        };
        Ok(&*self.post.insert(post))
    }

    fn ensure_editable(&self) -> Result<(), ReviewError> {
        if self.mode != ViewMode::Agency {
            return Err(ReviewError::NotAgency);
        }
        if let Some(post) = &self.post {
            return Err(ReviewError::AlreadyPublished(post.id));
        }
        Ok(())
    }

    #[must_use]
    pub fn link(&self, origin: &str) -> Option<ReviewLink> {
        self.post.as_ref().map(|post| ReviewLink::new(origin, post.id))
    }

    pub fn approve(&mut self) -> DecisionOutcome {
        self.decide(Decision::Approve)
    }

    pub fn request_changes(&mut self) -> DecisionOutcome {
        self.decide(Decision::RequestChanges)
    }

    /// Applies `decision` locally. The caller persists an `Applied` change and
    /// must not touch the backend for an `Ignored` one.
    pub fn decide(&mut self, decision: Decision) -> DecisionOutcome {
        let Some(post) = self.post.as_mut() else {
            return DecisionOutcome::Ignored(IgnoredDecision::NoPost);
        };
        if self.mode != ViewMode::Client {
            return DecisionOutcome::Ignored(IgnoredDecision::NotClient);
        }
        if post.status == ReviewStatus::Approved {
            return DecisionOutcome::Ignored(IgnoredDecision::AlreadyApproved);
        }

        let change = StatusChange {
            post_id: post.id,
            from: post.status,
            to: decision.target_status(),
        };
        post.status = change.to;
        DecisionOutcome::Applied(change)
    }

    /// Decisions the client may still take.
    #[must_use]
    pub fn available_decisions(&self) -> Vec<Decision> {
        match (&self.mode, &self.post) {
            (ViewMode::Client, Some(post)) if post.status != ReviewStatus::Approved => {
                vec![Decision::Approve, Decision::RequestChanges]
            }
            _ => Vec::new(),
        }
    }
}
