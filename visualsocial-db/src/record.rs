use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use visualsocial_common::{
    codec,
    model::{
        ModelValidationError,
        comment::{Comment, CreateComment, Origin, PinPosition, PostRef},
        post::{Post, PostContent, PostProfile, ReviewStatus},
    },
};

/// A row of the `posts` table, as returned by Postgres or the REST api.
#[derive(Clone, PartialEq, Debug, Deserialize, sqlx::FromRow)]
pub(crate) struct PostRecord {
    pub id: i64,
    pub media_url: String,
    pub media_type: String,
    pub platform: String,
    pub caption: String,
    pub profile: Option<serde_json::Value>,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A row of the `comments` table.
#[derive(Clone, PartialEq, Debug, Deserialize, sqlx::FromRow)]
pub(crate) struct CommentRecord {
    pub id: i64,
    pub post_id: Option<i64>,
    pub media_url: Option<String>,
    pub x: f64,
    pub y: f64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub(crate) struct NewPostRecord<'a> {
    pub media_url: &'a str,
    pub media_type: &'static str,
    pub platform: &'static str,
    pub caption: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<&'a PostProfile>,
    pub status: &'static str,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub(crate) struct NewCommentRecord<'a> {
    pub post_id: Option<i64>,
    pub media_url: Option<&'a str>,
    pub x: f64,
    pub y: f64,
    pub text: &'a str,
}

impl<'a> NewPostRecord<'a> {
    pub fn new(content: &'a PostContent) -> Self {
        Self {
            media_url: &content.media_url,
            media_type: content.media_type.as_str(),
            platform: content.platform.as_str(),
            caption: &content.caption,
            profile: (!content.profile.is_empty()).then_some(&content.profile),
            status: ReviewStatus::Pending.as_str(),
        }
    }
}

impl<'a> NewCommentRecord<'a> {
    pub fn new(comment: &'a CreateComment) -> Self {
        let (post_id, media_url) = match &comment.target {
            PostRef::Post(id) => (Some(u64::from(*id).cast_signed()), None),
            PostRef::Media(url) => (None, Some(url.as_str())),
        };

        Self {
            post_id,
            media_url,
            x: comment.position.x(),
            y: comment.position.y(),
            text: &comment.text,
        }
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        let (caption, profile) = match value.profile {
            Some(profile) if !profile.is_null() => {
                let profile = serde_json::from_value(profile)
                    .map_err(|err| ModelValidationError::Profile(err.to_string()))?;
                (value.caption, profile)
            }
            // Rows written before the profile column existed pack it into the caption.
            _ => {
                let unpacked = codec::unpack(&value.caption);
                (unpacked.caption, unpacked.profile)
            }
        };

        Ok(Self {
            id: value.id.cast_unsigned().into(),
            content: PostContent {
                media_url: value.media_url,
                media_type: value.media_type.parse()?,
                platform: value.platform.parse()?,
                caption,
                profile,
            },
            status: value.status.parse()?,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        let target = match (value.post_id, value.media_url) {
            (Some(post_id), _) => PostRef::Post(post_id.cast_unsigned().into()),
            (None, Some(media_url)) => PostRef::Media(media_url),
            (None, None) => return Err(ModelValidationError::DetachedComment),
        };

        Ok(Self {
            id: value.id.cast_unsigned().into(),
            target,
            position: PinPosition::new(value.x, value.y)?,
            text: value.text,
            created_at: value.created_at,
            origin: Origin::Backend,
        })
    }
}
