//! HTTP-level integration tests for the REST surface, run through the full
//! middleware stack with `tower::ServiceExt::oneshot`.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{
    body_json, build_test_app, create_admin, create_editor, create_page, edit, get, get_auth,
    join, send_json, test_state, token_for, TestClient, TEST_PASSWORD,
};
use serde_json::json;
use tandem_api::bootstrap;
use tandem_api::config::BootstrapAdmin;
use tandem_core::colors::CURSOR_PALETTE;
use tandem_core::protocol::ClientMessage;
use tandem_db::Gateway;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Test: GET /health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let (state, _db) = test_state();
    let response = get(build_test_app(state), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["connections"], 0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (state, _db) = test_state();
    let response = get(build_test_app(state), "/api/v1/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let (state, _db) = test_state();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/auth/login")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = build_test_app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:5173"
    );
}

// ---------------------------------------------------------------------------
// Test: POST /auth/login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_returns_token_usable_on_the_socket() {
    let (state, db) = test_state();
    let alice = create_editor(&db, "alice").await;
    let app = build_test_app(state.clone());

    let response = send_json(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        json!({ "username": "alice", "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["user"]["id"], alice.id);
    assert_eq!(json["user"]["role"], "user");
    assert!(json["user"].get("password_hash").is_none());
    assert_eq!(json["expires_in"], 15 * 60);

    let token = json["access_token"].as_str().unwrap();
    let conn = state.collab.authenticate(Some(token)).await.unwrap();
    assert_eq!(conn.user.id, alice.id);
}

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let (state, db) = test_state();
    create_editor(&db, "alice").await;

    for (username, password) in [("alice", "wrong"), ("nobody", TEST_PASSWORD)] {
        let response = send_json(
            build_test_app(state.clone()),
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "username": username, "password": password }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn login_with_empty_username_is_400() {
    let (state, _db) = test_state();
    let response = send_json(
        build_test_app(state),
        Method::POST,
        "/api/v1/auth/login",
        None,
        json!({ "username": "", "password": "x" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: GET /pages/{slug}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn read_path_renders_page_and_counts_views() {
    let (state, db) = test_state();
    let page = create_page(&db, "intro", None).await;
    db.publish_page(&tandem_db::models::page_history::PublishPage {
        page_id: page.id,
        title: page.title.clone(),
        content: "[b]Hi[/b] <there>".to_string(),
        parent_id: None,
        history: None,
    })
    .await
    .unwrap();

    let first = get(build_test_app(state.clone()), "/api/v1/pages/intro").await;
    assert_eq!(first.status(), StatusCode::OK);
    let json = body_json(first).await;
    assert_eq!(json["data"]["slug"], "intro");
    assert_eq!(json["data"]["html"], "<strong>Hi</strong> &lt;there&gt;");
    assert_eq!(json["data"]["has_draft"], false);
    assert_eq!(json["data"]["view_count"], 1);

    let second = get(build_test_app(state), "/api/v1/pages/intro").await;
    assert_eq!(body_json(second).await["data"]["view_count"], 2);
}

#[tokio::test]
async fn read_path_reports_pending_draft() {
    let (state, db) = test_state();
    let page = create_page(&db, "intro", None).await;
    let alice = create_editor(&db, "alice").await;

    let mut a = TestClient::connect(&state, &alice).await;
    a.send(&state.collab, join(page.id)).await;

    // A freshly seeded draft matches the page.
    let response = get(build_test_app(state.clone()), "/api/v1/pages/intro").await;
    assert_eq!(body_json(response).await["data"]["has_draft"], false);

    a.send(&state.collab, edit(page.id, "work in progress")).await;
    let response = get(build_test_app(state), "/api/v1/pages/intro").await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["has_draft"], true);
    assert_eq!(json["data"]["content"], common::ORIGINAL_BODY);
}

#[tokio::test]
async fn deleted_or_unknown_page_is_404() {
    let (state, db) = test_state();
    let page = create_page(&db, "gone", None).await;
    db.soft_delete_page(page.id).await;

    for uri in ["/api/v1/pages/gone", "/api/v1/pages/never-existed"] {
        let response = get(build_test_app(state.clone()), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn invalid_token_on_public_read_is_401() {
    let (state, db) = test_state();
    create_page(&db, "intro", None).await;
    let response = get_auth(build_test_app(state), "/api/v1/pages/intro", "garbage").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Test: GET /pages/{slug}/history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_lists_publishes_newest_first() {
    let (state, db) = test_state();
    let page = create_page(&db, "intro", None).await;
    let alice = create_editor(&db, "alice").await;
    let token = token_for(&state, &alice);

    let mut a = TestClient::connect(&state, &alice).await;
    a.send(&state.collab, join(page.id)).await;
    for body in ["first", "second"] {
        a.send(&state.collab, edit(page.id, body)).await;
        a.send(
            &state.collab,
            ClientMessage::Publish {
                page_id: page.id,
                parent_id: None,
            },
        )
        .await;
    }

    let unauthenticated = get(build_test_app(state.clone()), "/api/v1/pages/intro/history").await;
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    let response = get_auth(build_test_app(state), "/api/v1/pages/intro/history", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let entries = json["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["content"], "second");
    assert_eq!(entries[0]["previous_content"], "first");
    assert_eq!(entries[1]["previous_content"], common::ORIGINAL_BODY);
}

// ---------------------------------------------------------------------------
// Test: /users/me/color
// ---------------------------------------------------------------------------

#[tokio::test]
async fn color_is_assigned_once_and_can_be_changed() {
    let (state, db) = test_state();
    let alice = create_editor(&db, "alice").await;
    let token = token_for(&state, &alice);

    let response = get_auth(build_test_app(state.clone()), "/api/v1/users/me/color", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let assigned = body_json(response).await["data"]["color"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(CURSOR_PALETTE.contains(&assigned.as_str()));

    let again = get_auth(build_test_app(state.clone()), "/api/v1/users/me/color", &token).await;
    assert_eq!(body_json(again).await["data"]["color"], assigned);

    let response = send_json(
        build_test_app(state.clone()),
        Method::PUT,
        "/api/v1/users/me/color",
        Some(&token),
        json!({ "color": "#123abc" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = db.find_user(alice.id).await.unwrap().unwrap();
    assert_eq!(stored.cursor_color.as_deref(), Some("#123abc"));
}

#[tokio::test]
async fn malformed_color_is_rejected() {
    let (state, db) = test_state();
    let alice = create_editor(&db, "alice").await;
    let token = token_for(&state, &alice);

    for bad in ["red", "#12345g", "#1234567"] {
        let response = send_json(
            build_test_app(state.clone()),
            Method::PUT,
            "/api/v1/users/me/color",
            Some(&token),
            json!({ "color": bad }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{bad}");
        assert_eq!(body_json(response).await["code"], "INVALID_COLOR");
    }
}

// ---------------------------------------------------------------------------
// Test: /admin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_views_require_admin_role() {
    let (state, db) = test_state();
    let alice = create_editor(&db, "alice").await;
    let token = token_for(&state, &alice);

    for uri in ["/api/v1/admin/sessions", "/api/v1/admin/events"] {
        let response = get_auth(build_test_app(state.clone()), uri, &token).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        let anonymous = get(build_test_app(state.clone()), uri).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn admin_sees_live_sessions_and_events() {
    let (state, db) = test_state();
    let page = create_page(&db, "intro", None).await;
    let root = create_admin(&db, "root").await;
    let alice = create_editor(&db, "alice").await;
    let token = token_for(&state, &root);

    let mut a = TestClient::connect(&state, &alice).await;
    a.send(&state.collab, join(page.id)).await;

    let response = get_auth(build_test_app(state.clone()), "/api/v1/admin/sessions", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let sessions = json["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["username"], "alice");
    assert_eq!(sessions[0]["pageSlug"], "intro");
    assert_eq!(sessions[0]["mode"], "editing");

    let response = get_auth(build_test_app(state), "/api/v1/admin/events", &token).await;
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["event"], "user-joined-page");
}

// ---------------------------------------------------------------------------
// Test: startup seeding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bootstrap_seeds_admin_and_home_once() {
    let (state, db) = test_state();
    let mut config = common::test_config();
    config.bootstrap_admin = Some(BootstrapAdmin {
        username: "root".to_string(),
        password: TEST_PASSWORD.to_string(),
    });

    bootstrap::run(&*db, &config).await.unwrap();
    bootstrap::run(&*db, &config).await.unwrap();

    let admin = db.find_user_by_username("root").await.unwrap().unwrap();
    assert!(admin.is_admin());
    let home = db
        .find_live_page_by_slug(bootstrap::HOME_SLUG)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(home.created_by, Some(admin.id));

    let response = send_json(
        build_test_app(state),
        Method::POST,
        "/api/v1/auth/login",
        None,
        json!({ "username": "root", "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
