//! Channel CRUD surface round trips and validation failures.

use hub_channels::{ChannelRepo, ChannelStore};
use std::sync::Arc;
use telemetry_hub::{HubConfig, HubServer};
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::{Filter, Reply};

fn hub() -> (Arc<ChannelStore>, BoxedFilter<(Response,)>) {
    let store = Arc::new(ChannelStore::in_memory());
    let server = HubServer::new(HubConfig::default(), store.clone());
    let routes = server.routes().map(Reply::into_response).boxed();

    (store, routes)
}

async fn create(
    routes: &BoxedFilter<(Response,)>,
    body: serde_json::Value,
) -> (u16, serde_json::Value) {
    let resp = warp::test::request()
        .method("POST")
        .path("/channel")
        .json(&body)
        .reply(routes)
        .await;
    let status = resp.status().as_u16();
    let body = serde_json::from_slice(resp.body()).unwrap_or(serde_json::Value::Null);

    (status, body)
}

#[tokio::test]
async fn create_returns_the_public_view() {
    let (_store, routes) = hub();

    let (status, body) = create(
        &routes,
        serde_json::json!({ "name": "WRT", "password": "abc" }),
    )
    .await;

    assert_eq!(status, 201);
    assert_eq!(body["name"], "WRT");
    assert!(body["id"].as_str().is_some());
    assert!(body["createdAt"].as_str().is_some());
    assert!(body["updatedAt"].as_str().is_some());

    // the credential never leaves the server
    assert!(body.get("secret").is_none());
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn create_hashes_the_password_before_storing() {
    let (store, routes) = hub();

    let (_, body) = create(
        &routes,
        serde_json::json!({ "name": "WRT", "password": "abc" }),
    )
    .await;

    let stored = store
        .find_id(body["id"].as_str().unwrap())
        .await
        .unwrap();
    assert!(stored.secret.starts_with("$argon2"));
    assert_ne!(stored.secret, "abc");
}

#[tokio::test]
async fn create_validates_the_body() {
    let (_store, routes) = hub();

    let cases = [
        serde_json::json!({ "password": "abc" }),
        serde_json::json!({ "name": "", "password": "abc" }),
        serde_json::json!({ "name": "bad name", "password": "abc" }),
        serde_json::json!({ "name": "WRT" }),
        serde_json::json!({ "name": "WRT", "password": "" }),
    ];

    for body in cases {
        let (status, reply) = create(&routes, body.clone()).await;
        assert_eq!(status, 400, "expected 400 for {body}");
        assert!(reply["error"].as_str().is_some());
    }
}

#[tokio::test]
async fn unicode_names_are_accepted() {
    let (_store, routes) = hub();

    let (status, _) = create(
        &routes,
        serde_json::json!({ "name": "Überholen", "password": "abc" }),
    )
    .await;
    assert_eq!(status, 201);
}

#[tokio::test]
async fn index_lists_created_channels() {
    let (_store, routes) = hub();

    create(&routes, serde_json::json!({ "name": "one", "password": "a" })).await;
    create(&routes, serde_json::json!({ "name": "two", "password": "b" })).await;

    let resp = warp::test::request().path("/channel").reply(&routes).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["one", "two"]);
}

#[tokio::test]
async fn show_update_delete_round_trip() {
    let (_store, routes) = hub();

    let (_, created) = create(
        &routes,
        serde_json::json!({ "name": "WRT", "password": "abc" }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let resp = warp::test::request()
        .path(&format!("/channel/{id}"))
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), 200);

    let resp = warp::test::request()
        .method("PUT")
        .path(&format!("/channel/{id}"))
        .json(&serde_json::json!({ "name": "GT3", "password": "new" }))
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), 200);
    let updated: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(updated["name"], "GT3");
    assert_eq!(updated["id"], id);
    assert_eq!(updated["createdAt"], created["createdAt"]);

    let resp = warp::test::request()
        .method("DELETE")
        .path(&format!("/channel/{id}"))
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), 200);

    let resp = warp::test::request()
        .path(&format!("/channel/{id}"))
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let (_store, routes) = hub();

    let resp = warp::test::request().path("/channel/nope").reply(&routes).await;
    assert_eq!(resp.status(), 404);

    let resp = warp::test::request()
        .method("PUT")
        .path("/channel/nope")
        .json(&serde_json::json!({ "name": "WRT", "password": "abc" }))
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), 404);

    let resp = warp::test::request()
        .method("DELETE")
        .path("/channel/nope")
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn health_and_status_respond() {
    let (_store, routes) = hub();
    create(&routes, serde_json::json!({ "name": "WRT", "password": "a" })).await;

    let resp = warp::test::request().path("/health").reply(&routes).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.body().as_ref(), b"OK");

    let resp = warp::test::request().path("/status").reply(&routes).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["service"], "telemetry-hub");
    assert_eq!(body["channels"], 1);
    assert_eq!(body["sessions"], 0);
}
