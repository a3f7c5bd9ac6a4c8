use crate::server::{
    Result, ServerError, ServerRouter,
    json::{Created, Json},
};
use axum::{
    extract::{Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use visualsocial_common::{
    model::{
        Id,
        comment::{Comment, PinPosition, PostRef},
        post::{Platform, PostMarker},
    },
    pin::{BoundingRect, ClickPoint, PinOutcome, PreviewSurface},
};
use visualsocial_db::client::ReviewClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_post_comments)
        .typed_post(add_post_comment)
        .typed_get(list_demo_comments)
        .typed_post(add_demo_comment)
}

/// Where a new comment goes: an already normalized position, or a raw click
/// on the rendered preview.
#[derive(Clone, PartialEq, Debug, Deserialize)]
struct AddComment {
    text: String,
    #[serde(default)]
    position: Option<PinPosition>,
    #[serde(default)]
    click: Option<PreviewClick>,
}

#[derive(Clone, PartialEq, Debug, Deserialize)]
struct PreviewClick {
    point: ClickPoint,
    /// Bounding box of the media element.
    media: BoundingRect,
    /// Extra controls drawn over the media, in the same pixel space.
    #[serde(default)]
    controls: Vec<BoundingRect>,
    /// Layout of the preview. Posts use their own platform.
    #[serde(default)]
    platform: Option<Platform>,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
struct PinResponse {
    #[serde(flatten)]
    outcome: PinOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<Comment>,
}

impl IntoResponse for PinResponse {
    fn into_response(self) -> Response {
        if self.comment.is_some() {
            Created(self).into_response()
        } else {
            Json(self).into_response()
        }
    }
}

async fn add_comment(
    client: &ReviewClient,
    target: PostRef,
    platform: Platform,
    request: AddComment,
) -> Result<PinResponse> {
    let outcome = match (request.position, request.click) {
        (Some(position), None) => PinOutcome::Pinned { position },
        (None, Some(click)) => PreviewSurface::new(click.media, click.platform.unwrap_or(platform))
            .with_controls(click.controls)
            .locate(click.point)?,
        _ => return Err(ServerError::AmbiguousPlacement),
    };

    let comment = match &outcome {
        PinOutcome::Pinned { position } => Some(
            client
                .add_comment(target, *position, &request.text)
                .await?,
        ),
        PinOutcome::Ignored { .. } => None,
    };

    Ok(PinResponse { outcome, comment })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct PostCommentsPath {
    id: Id<PostMarker>,
}

async fn list_post_comments(
    PostCommentsPath { id }: PostCommentsPath,
    State(client): State<Arc<ReviewClient>>,
) -> Json<Vec<Comment>> {
    Json(client.list_comments(&PostRef::Post(id)).await)
}

async fn add_post_comment(
    PostCommentsPath { id }: PostCommentsPath,
    State(client): State<Arc<ReviewClient>>,
    Json(request): Json<AddComment>,
) -> Result<PinResponse> {
    let post = client
        .post(id)
        .await
        .ok_or(ServerError::PostByIdNotFound(id))?;

    add_comment(&client, PostRef::Post(id), post.content.platform, request).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/demo/comments")]
struct DemoCommentsPath;

/// Single-media demo mode: comments are keyed by the media url.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct DemoQuery {
    media_url: Option<String>,
}

impl DemoQuery {
    fn target(self, client: &ReviewClient) -> PostRef {
        PostRef::Media(
            self.media_url
                .filter(|media_url| !media_url.is_empty())
                .unwrap_or_else(|| client.draft().media_url),
        )
    }
}

async fn list_demo_comments(
    _: DemoCommentsPath,
    State(client): State<Arc<ReviewClient>>,
    query: Result<Query<DemoQuery>, QueryRejection>,
) -> Result<Json<Vec<Comment>>> {
    let Query(query) = query?;
    let target = query.target(&client);

    Ok(Json(client.list_comments(&target).await))
}

async fn add_demo_comment(
    _: DemoCommentsPath,
    State(client): State<Arc<ReviewClient>>,
    query: Result<Query<DemoQuery>, QueryRejection>,
    Json(request): Json<AddComment>,
) -> Result<PinResponse> {
    let Query(query) = query?;
    let target = query.target(&client);
    // Other media carry no layout of their own; callers can pass one per click.
    let draft = client.draft();
    let platform = if target == PostRef::Media(draft.media_url) {
        draft.platform
    } else {
        Platform::Feed
    };

    add_comment(&client, target, platform, request).await
}
