use crate::server::{ServerRouter, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use visualsocial_db::client::ReviewClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(health)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/health")]
struct HealthPath;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
struct Health {
    status: &'static str,
    degraded: bool,
}

async fn health(_: HealthPath, State(client): State<Arc<ReviewClient>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        degraded: client.is_degraded(),
    })
}
