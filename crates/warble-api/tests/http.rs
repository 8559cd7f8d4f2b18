//! End-to-end tests against the real router with an in-memory database.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use warble_api::{AppState, AppStateInner};
use warble_db::Database;

fn app() -> Router {
    let db = Database::open_in_memory().unwrap();
    let state: AppState = Arc::new(AppStateInner { db });
    warble_api::router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

/// Sign a user up and hand back (session token, user id).
async fn signup(app: &Router, username: &str, email: &str, password: &str) -> (String, i64) {
    let (status, body) = send(
        app,
        "POST",
        "/signup",
        None,
        Some(json!({ "username": username, "email": email, "password": password })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_i64().unwrap(),
    )
}

async fn post_message(app: &Router, token: &str, text: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/messages/new",
        Some(token),
        Some(json!({ "text": text })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "post failed: {body}");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn signup_starts_a_session_and_applies_defaults() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/signup",
        None,
        Some(json!({ "username": "alice", "email": "a@x.com", "password": "pw1sixchars" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["image_url"], "/static/images/default-pic.png");
    assert_eq!(
        body["user"]["header_image_url"],
        "/static/images/warbler-hero.jpg"
    );

    // The token works right away.
    let token = body["token"].as_str().unwrap().to_string();
    let (status, home) = send(&app, "GET", "/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(home["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = app();
    signup(&app, "alice", "a@x.com", "pw1sixchars").await;

    let (status, body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "pw1sixchars" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");

    let (wrong_pw_status, wrong_pw_body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "not-it" })),
    )
    .await;
    let (no_user_status, no_user_body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "nobody", "password": "pw1sixchars" })),
    )
    .await;

    // Wrong password and unknown username produce the same outcome.
    assert_eq!(wrong_pw_status, StatusCode::UNAUTHORIZED);
    assert_eq!(no_user_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw_body, no_user_body);
}

#[tokio::test]
async fn duplicate_signup_is_a_conflict_with_no_partial_row() {
    let app = app();
    signup(&app, "alice", "a@x.com", "pw1sixchars").await;

    let (status, body) = send(
        &app,
        "POST",
        "/signup",
        None,
        Some(json!({ "username": "alice", "email": "other@x.com", "password": "pw2sixchars" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "username already taken");

    let (status, body) = send(
        &app,
        "POST",
        "/signup",
        None,
        Some(json!({ "username": "alice2", "email": "a@x.com", "password": "pw2sixchars" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "email already taken");

    // Only the original row exists.
    let (_, users) = send(&app, "GET", "/users", None, None).await;
    assert_eq!(users.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn feed_contains_own_and_followed_messages_only() {
    let app = app();
    let (alice_token, _) = signup(&app, "alice", "a@x.com", "pw1sixchars").await;
    let (bob_token, bob_id) = signup(&app, "bob", "b@x.com", "pw2sixchars").await;
    let (carol_token, _) = signup(&app, "carol", "c@x.com", "pw3sixchars").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/users/follow/{bob_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    post_message(&app, &bob_token, "hello world").await;
    post_message(&app, &carol_token, "unrelated noise").await;

    let (status, home) = send(&app, "GET", "/", Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let messages = home["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "hello world");
    assert_eq!(messages[0]["username"], "bob");
    assert_eq!(messages[0]["user_id"], bob_id);
}

#[tokio::test]
async fn anonymous_homepage_is_the_landing_payload() {
    let app = app();
    let (status, body) = send(&app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["landing"], true);
}

#[tokio::test]
async fn message_text_length_is_bounded() {
    let app = app();
    let (token, _) = signup(&app, "alice", "a@x.com", "pw1sixchars").await;

    let (status, _) = send(
        &app,
        "POST",
        "/messages/new",
        Some(&token),
        Some(json!({ "text": "x".repeat(141) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/messages/new",
        Some(&token),
        Some(json!({ "text": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/messages/new",
        Some(&token),
        Some(json!({ "text": "x".repeat(140) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["text"].as_str().unwrap().len(), 140);
}

#[tokio::test]
async fn toggle_like_is_its_own_inverse_and_self_like_is_forbidden() {
    let app = app();
    let (alice_token, alice_id) = signup(&app, "alice", "a@x.com", "pw1sixchars").await;
    let (bob_token, _) = signup(&app, "bob", "b@x.com", "pw2sixchars").await;
    let msg = post_message(&app, &bob_token, "like me").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/add_like/{msg}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked"], true);

    let (_, liked) = send(
        &app,
        "GET",
        &format!("/users/{alice_id}/likes"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(liked.as_array().unwrap().len(), 1);
    assert_eq!(liked[0]["text"], "like me");

    // Toggling again restores the original state.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/add_like/{msg}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked"], false);

    let (_, liked) = send(
        &app,
        "GET",
        &format!("/users/{alice_id}/likes"),
        Some(&alice_token),
        None,
    )
    .await;
    assert!(liked.as_array().unwrap().is_empty());

    // Bob can never like his own warble, no matter how often he tries.
    for _ in 0..2 {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/users/add_like/{msg}"),
            Some(&bob_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "You cannot like your own warble.");
    }
}

#[tokio::test]
async fn a_message_holds_at_most_one_like_system_wide() {
    let app = app();
    let (alice_token, _) = signup(&app, "alice", "a@x.com", "pw1sixchars").await;
    let (bob_token, _) = signup(&app, "bob", "b@x.com", "pw2sixchars").await;
    let (carol_token, carol_id) = signup(&app, "carol", "c@x.com", "pw3sixchars").await;
    let msg = post_message(&app, &bob_token, "popular").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/users/add_like/{msg}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The schema allows one like per message: the second user's like is a
    // conflict.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/users/add_like/{msg}"),
        Some(&carol_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, liked) = send(
        &app,
        "GET",
        &format!("/users/{carol_id}/likes"),
        Some(&carol_token),
        None,
    )
    .await;
    assert!(liked.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn privileged_routes_refuse_anonymous_requests_uniformly() {
    let app = app();
    let (_, bob_id) = signup(&app, "bob", "b@x.com", "pw2sixchars").await;

    let attempts = [
        ("POST", "/messages/new".to_string()),
        ("POST", format!("/users/follow/{bob_id}")),
        ("POST", format!("/users/stop-following/{bob_id}")),
        ("POST", "/users/profile".to_string()),
        ("POST", "/users/delete".to_string()),
        ("POST", format!("/users/add_like/{bob_id}")),
        ("GET", format!("/users/{bob_id}/likes")),
        ("GET", format!("/users/{bob_id}/following")),
        ("GET", format!("/users/{bob_id}/followers")),
    ];

    for (method, uri) in attempts {
        let (status, body) =
            send(&app, method, &uri, None, Some(json!({ "text": "x" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["error"], "Access unauthorized.", "{method} {uri}");
    }

    // A bogus token is just as Anonymous.
    let (status, _) = send(
        &app,
        "POST",
        "/messages/new",
        Some("not-a-real-token"),
        Some(json!({ "text": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // None of the refused attempts changed any state.
    let (_, page) = send(&app, "GET", &format!("/users/{bob_id}"), None, None).await;
    assert!(page["messages"].as_array().unwrap().is_empty());
    assert_eq!(page["stats"]["followers"], 0);
    assert_eq!(page["stats"]["likes"], 0);
}

#[tokio::test]
async fn public_routes_need_no_authentication() {
    let app = app();
    let (bob_token, bob_id) = signup(&app, "bob", "b@x.com", "pw2sixchars").await;
    let msg = post_message(&app, &bob_token, "public warble").await;

    let (status, users) = send(&app, "GET", "/users?q=bo", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users[0]["username"], "bob");

    let (status, page) = send(&app, "GET", &format!("/users/{bob_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["user"]["username"], "bob");
    assert_eq!(page["stats"]["messages"], 1);
    assert_eq!(page["messages"][0]["text"], "public warble");

    let (status, message) = send(&app, "GET", &format!("/messages/{msg}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message["text"], "public warble");

    let (status, _) = send(&app, "GET", "/messages/99999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_ends_the_session_and_is_idempotent() {
    let app = app();
    let (token, _) = signup(&app, "alice", "a@x.com", "pw1sixchars").await;

    let (status, _) = send(&app, "GET", "/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    // The token is dead: privileged calls refuse, the homepage is anonymous.
    let (status, _) = send(
        &app,
        "POST",
        "/messages/new",
        Some(&token),
        Some(json!({ "text": "after logout" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, home) = send(&app, "GET", "/", Some(&token), None).await;
    assert_eq!(home["landing"], true);

    // Logging out again, or while Anonymous, is a no-op.
    let (status, _) = send(&app, "GET", "/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/logout", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn profile_update_requires_the_current_password() {
    let app = app();
    let (token, _) = signup(&app, "alice", "a@x.com", "pw1sixchars").await;
    signup(&app, "bob", "b@x.com", "pw2sixchars").await;

    let (status, _) = send(
        &app,
        "POST",
        "/users/profile",
        Some(&token),
        Some(json!({
            "username": "alice2", "email": "a@x.com",
            "bio": "hacked", "password": "wrong"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "POST",
        "/users/profile",
        Some(&token),
        Some(json!({
            "username": "alice2", "email": "a@x.com",
            "bio": "it's me", "location": "north", "password": "pw1sixchars"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice2");
    assert_eq!(body["bio"], "it's me");

    // Colliding with another user's name is a conflict.
    let (status, _) = send(
        &app,
        "POST",
        "/users/profile",
        Some(&token),
        Some(json!({
            "username": "bob", "email": "a@x.com", "password": "pw1sixchars"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn deleting_an_account_cascades_everywhere() {
    let app = app();
    let (alice_token, alice_id) = signup(&app, "alice", "a@x.com", "pw1sixchars").await;
    let (bob_token, bob_id) = signup(&app, "bob", "b@x.com", "pw2sixchars").await;

    let (_, _) = send(
        &app,
        "POST",
        &format!("/users/follow/{bob_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    let msg = post_message(&app, &bob_token, "soon gone").await;
    send(
        &app,
        "POST",
        &format!("/users/add_like/{msg}"),
        Some(&alice_token),
        None,
    )
    .await;

    let (status, _) = send(&app, "POST", "/users/delete", Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::OK);

    // Bob, his messages, and the edges pointing at him are all gone.
    let (status, _) = send(&app, "GET", &format!("/users/{bob_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, home) = send(&app, "GET", "/", Some(&alice_token), None).await;
    assert!(home["messages"].as_array().unwrap().is_empty());
    assert!(home["likes"].as_array().unwrap().is_empty());

    let (_, following) = send(
        &app,
        "GET",
        &format!("/users/{alice_id}/following"),
        Some(&alice_token),
        None,
    )
    .await;
    assert!(following.as_array().unwrap().is_empty());

    // Deleting the account also ended Bob's session.
    let (status, _) = send(
        &app,
        "POST",
        "/messages/new",
        Some(&bob_token),
        Some(json!({ "text": "ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_the_owner_may_delete_a_message() {
    let app = app();
    let (alice_token, _) = signup(&app, "alice", "a@x.com", "pw1sixchars").await;
    let (bob_token, _) = signup(&app, "bob", "b@x.com", "pw2sixchars").await;
    let msg = post_message(&app, &bob_token, "bob's warble").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/messages/{msg}/delete"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/messages/{msg}/delete"),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/messages/{msg}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/messages/{msg}/delete"),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_endpoints_are_idempotent_and_guard_self_follow() {
    let app = app();
    let (alice_token, alice_id) = signup(&app, "alice", "a@x.com", "pw1sixchars").await;
    let (_, bob_id) = signup(&app, "bob", "b@x.com", "pw2sixchars").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/follow/{bob_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], true);

    // Following again is a no-op, not an error.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/follow/{bob_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/users/follow/{alice_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/stop-following/{bob_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);

    // Unfollowing someone you don't follow is tolerated.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/stop-following/{bob_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], false);

    // Following a user that doesn't exist is a 404.
    let (status, _) = send(
        &app,
        "POST",
        "/users/follow/99999",
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
