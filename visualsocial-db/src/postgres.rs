use crate::{
    backend::{RecordStore, Result},
    record::{CommentRecord, NewCommentRecord, NewPostRecord, PostRecord},
};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as};
use std::sync::{Mutex, PoisonError};
use tracing::debug;
use visualsocial_common::{
    model::{
        Id, ModelValidationError, VisualSocialSnowflakeGenerator,
        comment::{Comment, CreateComment, PostRef},
        post::{Post, PostContent, PostMarker, ReviewStatus},
    },
    snowflake::NodeId,
};

/// Node id used for snowflakes minted by the postgres store.
const POSTGRES_NODE_ID: u16 = 1;

/// Record store talking to a self-hosted Postgres database.
pub struct PgRecordStore {
    pool: PgPool,
    snowflake_generator: Mutex<VisualSocialSnowflakeGenerator>,
}

impl PgRecordStore {
    #[must_use]
    pub fn new(pool: PgPool, node_id: NodeId) -> Self {
        Self {
            pool,
            snowflake_generator: Mutex::new(VisualSocialSnowflakeGenerator::new(node_id)),
        }
    }

    /// Connects and brings the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("Postgres migrations applied");

        let node_id = NodeId::new(POSTGRES_NODE_ID).unwrap_or_default();
        Ok(Self::new(pool, node_id))
    }

    fn next_snowflake(&self) -> Result<i64> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(snowflake.get().cast_signed())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert_post(&self, content: &PostContent) -> Result<Post> {
        let new_post = NewPostRecord::new(content);
        let profile = new_post
            .profile
            .map(serde_json::to_value)
            .transpose()
            .map_err(|err| ModelValidationError::Profile(err.to_string()))?;

        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO posts (id, media_url, media_type, platform, caption, profile, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, media_url, media_type, platform, caption, profile, status, created_at
            ",
        )
        .bind(self.next_snowflake()?)
        .bind(new_post.media_url)
        .bind(new_post.media_type)
        .bind(new_post.platform)
        .bind(new_post.caption)
        .bind(profile)
        .bind(new_post.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(Post::try_from(record)?)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT id, media_url, media_type, platform, caption, profile, status, created_at
            FROM posts
            WHERE id = $1
            ",
        )
        .bind(u64::from(post_id).cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn update_post_status(
        &self,
        post_id: Id<PostMarker>,
        status: ReviewStatus,
    ) -> Result<bool> {
        let updated = query("UPDATE posts SET status = $2 WHERE id = $1")
            .bind(u64::from(post_id).cast_signed())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(updated.rows_affected() > 0)
    }

    async fn insert_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let new_comment = NewCommentRecord::new(comment);

        let record = query_as::<_, CommentRecord>(
            "
            INSERT INTO comments (id, post_id, media_url, x, y, text)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, post_id, media_url, x, y, text, created_at
            ",
        )
        .bind(self.next_snowflake()?)
        .bind(new_comment.post_id)
        .bind(new_comment.media_url)
        .bind(new_comment.x)
        .bind(new_comment.y)
        .bind(new_comment.text)
        .fetch_one(&self.pool)
        .await?;

        Ok(Comment::try_from(record)?)
    }

    async fn select_comments(&self, target: &PostRef) -> Result<Vec<Comment>> {
        let select = match target {
            PostRef::Post(post_id) => query_as::<_, CommentRecord>(
                "
                SELECT id, post_id, media_url, x, y, text, created_at
                FROM comments
                WHERE post_id = $1
                ORDER BY created_at, id
                ",
            )
            .bind(u64::from(*post_id).cast_signed()),
            PostRef::Media(media_url) => query_as::<_, CommentRecord>(
                "
                SELECT id, post_id, media_url, x, y, text, created_at
                FROM comments
                WHERE post_id IS NULL AND media_url = $1
                ORDER BY created_at, id
                ",
            )
            .bind(media_url.as_str()),
        };

        let records = select.fetch_all(&self.pool).await?;
        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }
}
