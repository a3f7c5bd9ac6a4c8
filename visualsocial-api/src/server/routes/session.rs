use crate::server::{ServerRouter, json::Json};
use axum::extract::{RawQuery, State};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use visualsocial_common::{model::post::PostContent, review::DraftPatch};
use visualsocial_db::client::{ReviewClient, SessionView};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(load_session)
        .typed_get(get_draft)
        .typed_patch(edit_draft)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/session")]
struct SessionPath;

/// The page load. `?id=` opens the client view of that post.
async fn load_session(
    _: SessionPath,
    State(client): State<Arc<ReviewClient>>,
    RawQuery(query): RawQuery,
) -> Json<SessionView> {
    let view = client.load_session(query.as_deref().unwrap_or_default()).await;

    Json(view)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/draft")]
struct DraftPath;

async fn get_draft(_: DraftPath, State(client): State<Arc<ReviewClient>>) -> Json<PostContent> {
    Json(client.draft())
}

async fn edit_draft(
    _: DraftPath,
    State(client): State<Arc<ReviewClient>>,
    Json(patch): Json<DraftPatch>,
) -> Json<PostContent> {
    Json(client.edit_draft(patch))
}
