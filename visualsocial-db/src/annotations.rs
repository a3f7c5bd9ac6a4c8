//! Pinned comments of the current process, reconciled with the backend.
//!
//! A new pin is recorded locally first. If the backend accepts it, the
//! server record replaces the local one; otherwise the local record stays
//! for the lifetime of the process and is reported with [`Origin::Local`].

use crate::{backend::RecordStore, ids::LocalIds};
use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;
use tracing::{debug, warn};
use visualsocial_common::{
    model::comment::{Comment, CreateComment, Origin, PinPosition, PostRef},
    snowflake::SnowflakeTimestampFromDateTimeError,
};

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AnnotationError {
    #[error("Comment text is empty")]
    EmptyText,
    #[error("Could not mint a local id: {0}")]
    Id(#[from] SnowflakeTimestampFromDateTimeError),
}

#[derive(Clone, Debug, Default)]
struct Thread {
    /// Last list the backend returned, plus pins it accepted since.
    synced: Vec<Comment>,
    /// Pins only this process knows about.
    local: Vec<Comment>,
}

impl Thread {
    fn is_empty(&self) -> bool {
        self.synced.is_empty() && self.local.is_empty()
    }
}

pub struct AnnotationStore {
    records: Option<Arc<dyn RecordStore>>,
    ids: Arc<LocalIds>,
    threads: Mutex<HashMap<PostRef, Thread>>,
}

impl AnnotationStore {
    #[must_use]
    pub fn new(records: Option<Arc<dyn RecordStore>>, ids: Arc<LocalIds>) -> Self {
        Self {
            records,
            ids,
            threads: Mutex::new(HashMap::new()),
        }
    }

    fn threads(&self) -> MutexGuard<'_, HashMap<PostRef, Thread>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn add_annotation(
        &self,
        target: PostRef,
        position: PinPosition,
        text: &str,
    ) -> Result<Comment, AnnotationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AnnotationError::EmptyText);
        }

        let (id, created_at) = self.ids.next()?;
        let local = Comment {
            id,
            target: target.clone(),
            position,
            text: text.to_owned(),
            created_at,
            origin: Origin::Local,
        };
        self.threads()
            .entry(target.clone())
            .or_default()
            .local
            .push(local.clone());

        let Some(records) = &self.records else {
            debug!(%target, comment_id = %id, "Kept comment locally");
            return Ok(local);
        };

        let create = CreateComment {
            target: target.clone(),
            position,
            text: text.to_owned(),
        };
        match records.insert_comment(&create).await {
            Ok(saved) => {
                let mut threads = self.threads();
                let thread = threads.entry(target).or_default();
                thread.local.retain(|comment| comment.id != id);
                thread.synced.push(saved.clone());
                Ok(saved)
            }
            Err(err) => {
                warn!(error = %err, %target, "Saving comment failed, keeping it locally");
                Ok(local)
            }
        }
    }

    /// Backend comments in creation order, followed by local-only ones.
    pub async fn list_annotations(&self, target: &PostRef) -> Vec<Comment> {
        if let Some(records) = &self.records {
            match records.select_comments(target).await {
                Ok(comments) => {
                    let mut threads = self.threads();
                    match threads.entry(target.clone()) {
                        Entry::Occupied(mut thread) => {
                            thread.get_mut().synced = comments;
                            if thread.get().is_empty() {
                                thread.remove();
                            }
                        }
                        Entry::Vacant(thread) => {
                            if !comments.is_empty() {
                                thread.insert(Thread {
                                    synced: comments,
                                    local: Vec::new(),
                                });
                            }
                        }
                    }
                }
                Err(err) => warn!(error = %err, %target, "Loading comments failed"),
            }
        }

        self.threads()
            .get(target)
            .map(|thread| {
                thread
                    .synced
                    .iter()
                    .chain(&thread.local)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
