//! The agency to client round trip against a server without a backend.

mod common;

use axum::http::StatusCode;
use common::{ORIGIN, body_json, build_test_app, get, post_json};
use serde_json::{Value, json};
use visualsocial_common::model::post::DEMO_MEDIA_URL;

async fn publish_feed_post(app: &axum::Router) -> Value {
    let response = post_json(app, "/posts", &json!({ "platform": "feed", "caption": "Hello" })).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    body_json(response).await
}

#[tokio::test]
async fn fresh_load_is_degraded_agency_view() {
    let app = build_test_app();

    let response = get(&app, "/session").await;
    assert_eq!(response.status(), StatusCode::OK);

    let session = body_json(response).await;
    assert_eq!(session["mode"], "agency");
    assert_eq!(session["degraded"], true);
    assert!(session["banner"].is_string());
    assert_eq!(session["content"]["media_url"], DEMO_MEDIA_URL);
    assert_eq!(session["comments"], json!([]));
    assert_eq!(session["post"], Value::Null);
}

#[tokio::test]
async fn published_link_opens_client_view() {
    let app = build_test_app();

    let published = publish_feed_post(&app).await;
    let id = published["post"]["id"].as_u64().unwrap();
    assert_eq!(published["link"], format!("{ORIGIN}?id={id}"));
    assert_eq!(published["post"]["status"], "pending");

    let session = body_json(get(&app, &format!("/session?id={id}")).await).await;
    assert_eq!(session["mode"], "client");
    assert_eq!(session["content"]["platform"], "feed");
    assert_eq!(session["content"]["caption"], "Hello");
    assert_eq!(session["status"], "pending");
    assert_eq!(
        session["available_decisions"],
        json!(["approve", "request_changes"])
    );

    let post = body_json(get(&app, &format!("/posts/{id}")).await).await;
    assert_eq!(post["id"], id);
}

#[tokio::test]
async fn click_is_pinned_at_relative_position() {
    let app = build_test_app();
    let id = publish_feed_post(&app).await["post"]["id"].as_u64().unwrap();

    let response = post_json(
        &app,
        &format!("/posts/{id}/comments"),
        &json!({
            "text": "Bigger logo here",
            "click": {
                "point": { "client_x": 210.0, "client_y": 220.0 },
                "media": { "left": 10.0, "top": 20.0, "width": 400.0, "height": 800.0 }
            }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let pinned = body_json(response).await;
    assert_eq!(pinned["outcome"], "pinned");
    assert_eq!(pinned["position"], json!({ "x": 50.0, "y": 25.0 }));
    assert_eq!(pinned["comment"]["origin"], "local");

    let comments = body_json(get(&app, &format!("/posts/{id}/comments")).await).await;
    assert_eq!(comments.as_array().unwrap().len(), 1);
    assert_eq!(comments[0]["text"], "Bigger logo here");
    assert_eq!(comments[0]["x"], 50.0);
    assert_eq!(comments[0]["y"], 25.0);
}

#[tokio::test]
async fn approval_survives_reload_and_is_final() {
    let app = build_test_app();
    let id = publish_feed_post(&app).await["post"]["id"].as_u64().unwrap();

    let response = post_json(&app, &format!("/posts/{id}/approve"), &json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let decided = body_json(response).await;
    assert_eq!(decided["applied"], true);
    assert_eq!(decided["post"]["status"], "approved");

    let session = body_json(get(&app, &format!("/session?id={id}")).await).await;
    assert_eq!(session["status"], "approved");
    assert_eq!(session["available_decisions"], json!([]));

    let again = body_json(
        post_json(&app, &format!("/posts/{id}/request-changes"), &json!({})).await,
    )
    .await;
    assert_eq!(again["applied"], false);
    assert_eq!(again["ignored"], "already_approved");
    assert_eq!(again["post"]["status"], "approved");
}

#[tokio::test]
async fn changes_requested_can_still_be_approved() {
    let app = build_test_app();
    let id = publish_feed_post(&app).await["post"]["id"].as_u64().unwrap();

    let changes = body_json(
        post_json(&app, &format!("/posts/{id}/request-changes"), &json!({})).await,
    )
    .await;
    assert_eq!(changes["post"]["status"], "changes");

    let approved =
        body_json(post_json(&app, &format!("/posts/{id}/approve"), &json!({})).await).await;
    assert_eq!(approved["post"]["status"], "approved");
}

#[tokio::test]
async fn unknown_post_is_not_found() {
    let app = build_test_app();

    let session = body_json(get(&app, "/session?id=12345").await).await;
    assert_eq!(session["mode"], "client");
    assert_eq!(session["post"], Value::Null);
    assert_eq!(session["available_decisions"], json!([]));

    let response = post_json(&app, "/posts/12345/approve", &json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["status"], 404);

    assert_eq!(get(&app, "/posts/abc").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_fallback() {
    let app = build_test_app();

    let health = body_json(get(&app, "/health").await).await;
    assert_eq!(health, json!({ "status": "ok", "degraded": true }));

    let response = get(&app, "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = body_json(response).await;
    assert_eq!(error["status"], 404);
    assert!(error["message"].as_str().unwrap().contains("/nope"));
}
