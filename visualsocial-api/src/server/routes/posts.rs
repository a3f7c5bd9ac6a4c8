use crate::server::{
    Result, ServerError, ServerRouter,
    json::{Created, Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use visualsocial_common::{
    model::{
        Id,
        post::{Post, PostMarker},
    },
    review::{Decision, DraftPatch},
};
use visualsocial_db::client::{DecisionView, Published, ReviewClient};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(publish_post)
        .typed_get(get_post)
        .typed_post(approve_post)
        .typed_post(request_changes)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts")]
struct PostsPath;

/// Publishes the agency draft, with `patch` applied last.
async fn publish_post(
    _: PostsPath,
    State(client): State<Arc<ReviewClient>>,
    Json(patch): Json<DraftPatch>,
) -> Result<Created<Published>> {
    let published = client.publish(patch).await?;

    Ok(Created(published))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(client): State<Arc<ReviewClient>>,
) -> Result<Json<Post>> {
    let post = client
        .post(id)
        .await
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/approve", rejection(ServerError))]
struct ApprovePath {
    id: Id<PostMarker>,
}

async fn approve_post(
    ApprovePath { id }: ApprovePath,
    State(client): State<Arc<ReviewClient>>,
) -> Result<Json<DecisionView>> {
    decide(&client, id, Decision::Approve).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/request-changes", rejection(ServerError))]
struct RequestChangesPath {
    id: Id<PostMarker>,
}

async fn request_changes(
    RequestChangesPath { id }: RequestChangesPath,
    State(client): State<Arc<ReviewClient>>,
) -> Result<Json<DecisionView>> {
    decide(&client, id, Decision::RequestChanges).await
}

async fn decide(
    client: &ReviewClient,
    id: Id<PostMarker>,
    decision: Decision,
) -> Result<Json<DecisionView>> {
    let view = client.decide(id, decision).await;
    if view.post.is_none() {
        return Err(ServerError::PostByIdNotFound(id));
    }

    Ok(Json(view))
}
