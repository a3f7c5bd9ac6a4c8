//! Client for a hosted backend-as-a-service.
//!
//! Tables are reached through a PostgREST style api under `/rest/v1` and
//! media through an object storage api under `/storage/v1`. Every request
//! carries the public api key both as `apikey` and as bearer token.

use crate::{
    backend::{
        BackendError, BlobStore, COMMENTS_TABLE, POSTS_TABLE, RecordStore, Result,
    },
    record::{CommentRecord, NewCommentRecord, NewPostRecord, PostRecord},
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Method, RequestBuilder, Response,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::debug;
use visualsocial_common::model::{
    Id,
    comment::{Comment, CreateComment, PostRef},
    post::{Post, PostContent, PostMarker, ReviewStatus},
};

const API_KEY_HEADER: &str = "apikey";
const PREFER_HEADER: &str = "Prefer";

pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestBackend {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, api_key)
    }

    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            client,
            base_url,
            api_key: api_key.into(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.request(method, &format!("/rest/v1/{table}"))
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>> {
        let response = Self::check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn insert_one<T: DeserializeOwned>(
        &self,
        table: &'static str,
        row: &(impl serde::Serialize + Sync),
    ) -> Result<T> {
        let request = self
            .table(Method::POST, table)
            .header(PREFER_HEADER, "return=representation")
            .json(row);

        Self::rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or(BackendError::EmptyInsert(table))
    }
}

#[async_trait]
impl RecordStore for RestBackend {
    async fn insert_post(&self, content: &PostContent) -> Result<Post> {
        let record: PostRecord = self
            .insert_one(POSTS_TABLE, &NewPostRecord::new(content))
            .await?;
        debug!(post_id = record.id, "Inserted post");

        Ok(Post::try_from(record)?)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let request = self
            .table(Method::GET, POSTS_TABLE)
            .query(&[("select", "*".to_owned()), ("id", format!("eq.{post_id}"))]);

        let post = Self::rows::<PostRecord>(request)
            .await?
            .into_iter()
            .next()
            .map(Post::try_from)
            .transpose()?;
        Ok(post)
    }

    async fn update_post_status(
        &self,
        post_id: Id<PostMarker>,
        status: ReviewStatus,
    ) -> Result<bool> {
        let request = self
            .table(Method::PATCH, POSTS_TABLE)
            .query(&[("select", "id".to_owned()), ("id", format!("eq.{post_id}"))])
            .header(PREFER_HEADER, "return=representation")
            .json(&serde_json::json!({ "status": status }));

        let updated = Self::rows::<IgnoredAny>(request).await?;
        Ok(!updated.is_empty())
    }

    async fn insert_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let record: CommentRecord = self
            .insert_one(COMMENTS_TABLE, &NewCommentRecord::new(comment))
            .await?;

        Ok(Comment::try_from(record)?)
    }

    async fn select_comments(&self, target: &PostRef) -> Result<Vec<Comment>> {
        let mut query = vec![("select", "*".to_owned())];
        match target {
            PostRef::Post(post_id) => query.push(("post_id", format!("eq.{post_id}"))),
            PostRef::Media(media_url) => {
                query.push(("post_id", "is.null".to_owned()));
                query.push(("media_url", format!("eq.{media_url}")));
            }
        }
        query.push(("order", "created_at.asc,id.asc".to_owned()));

        let request = self.table(Method::GET, COMMENTS_TABLE).query(&query);

        let comments = Self::rows::<CommentRecord>(request)
            .await?
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }
}

#[async_trait]
impl BlobStore for RestBackend {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: Option<&str>,
    ) -> Result<()> {
        let request = self
            .request(Method::POST, &format!("/storage/v1/object/{bucket}/{key}"))
            .header(
                CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(bytes);

        Self::check_status(request.send().await?).await?;
        debug!(bucket, key, "Uploaded object");
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{key}", self.base_url)
    }
}
