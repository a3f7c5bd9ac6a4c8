#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use visualsocial_api::server::{self, ServerState};
use visualsocial_common::snowflake::NodeId;
use visualsocial_db::{
    backend::Backend,
    client::{ClientConfig, ReviewClient},
};

pub const ORIGIN: &str = "http://localhost:3000";

/// The application in local-only mode, as started without any backend settings.
pub fn build_test_app() -> Router {
    build_test_app_with(None)
}

pub fn build_test_app_with(backend: Option<Backend>) -> Router {
    let client = ReviewClient::new(
        ClientConfig {
            origin: ORIGIN.to_owned(),
            node_id: NodeId::new(1).unwrap(),
        },
        backend,
    );

    server::app(
        ServerState {
            client: Arc::new(client),
        },
        None,
    )
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
