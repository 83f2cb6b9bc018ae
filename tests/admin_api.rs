//! Admin user management: changelist, change page, add page, delete and
//! the permission model around them.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for .oneshot()

use accountd::api::AppState;
use accountd::db::models::User;
use accountd::db::users;
use common::{body_json, build_test_app, empty_request, issue_token, json_request};

struct Fixture {
    app: axum::Router,
    state: Arc<AppState>,
    admin: User,
    admin_token: String,
    user: User,
}

async fn setup() -> Fixture {
    let (app, state) = build_test_app().await;
    let admin = users::create_superuser(&state.db, "admin@rrecipes.com", "testpass123", "")
        .await
        .expect("Should create superuser");
    let admin_token = issue_token(&state, &admin).await;
    let user = users::create_user(&state.db, "testuser@testemail.com", "testpass123", "Test User")
        .await
        .expect("Should create user");
    Fixture { app, state, admin, admin_token, user }
}

#[tokio::test]
async fn test_users_listed() {
    let f = setup().await;

    let resp = f
        .app
        .oneshot(empty_request("GET", "/api/admin/users", Some(&f.admin_token)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["total"], 2);
    let data = json["data"].as_array().unwrap();
    assert!(data.iter().any(|u| u["name"] == "Test User" && u["email"] == "testuser@testemail.com"));
    assert!(data.iter().all(|u| u.get("password").is_none()));
}

#[tokio::test]
async fn test_users_search_and_pagination() {
    let f = setup().await;

    let resp = f
        .app
        .clone()
        .oneshot(empty_request("GET", "/api/admin/users?search=testemail", Some(&f.admin_token)))
        .await
        .unwrap();
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["data"][0]["email"], "testuser@testemail.com");

    let resp = f
        .app
        .oneshot(empty_request("GET", "/api/admin/users?per_page=1&page=2", Some(&f.admin_token)))
        .await
        .unwrap();
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["total"], 2);
    assert_eq!(json["per_page"], 1);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_out_of_range_page_is_rejected() {
    let f = setup().await;

    for path in ["/api/admin/users", "/api/admin/audit-log"] {
        let uri = format!("{}?page=9223372036854775807&per_page=200", path);
        let resp = f
            .app
            .clone()
            .oneshot(empty_request("GET", &uri, Some(&f.admin_token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", path);
    }
}

#[tokio::test]
async fn test_user_change_page() {
    let f = setup().await;

    let resp = f
        .app
        .clone()
        .oneshot(empty_request("GET", &format!("/api/admin/users/{}", f.user.id), Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["email"], "testuser@testemail.com");

    let resp = f
        .app
        .oneshot(empty_request("GET", "/api/admin/users/does-not-exist", Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_user_page() {
    let f = setup().await;

    let body = json!({"email": "staff@example.com", "password": "staffpass", "is_staff": true});
    let resp = f
        .app
        .clone()
        .oneshot(json_request("POST", "/api/admin/users", &body, Some(&f.admin_token)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["email"], "staff@example.com");
    assert_eq!(json["is_staff"], true);
    assert_eq!(json["is_superuser"], false);
    assert!(json.get("password").is_none());

    let dup = json!({"email": "testuser@testemail.com", "password": "another1"});
    let resp = f
        .app
        .oneshot(json_request("POST", "/api/admin/users", &dup, Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_require_authentication() {
    let f = setup().await;

    let resp = f.app.oneshot(empty_request("GET", "/api/admin/users", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_regular_user_forbidden() {
    let f = setup().await;
    let token = issue_token(&f.state, &f.user).await;

    let resp = f
        .app
        .oneshot(empty_request("GET", "/api/admin/users", Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_staff_can_view_but_not_change() {
    let f = setup().await;
    let mut staff = users::create_user(&f.state.db, "staff@example.com", "staffpass", "Staff")
        .await
        .unwrap();
    staff.is_staff = true;
    users::update(&f.state.db, &mut staff).await.unwrap();
    let token = issue_token(&f.state, &staff).await;

    let resp = f
        .app
        .clone()
        .oneshot(empty_request("GET", "/api/admin/users", Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json!({"email": "new@example.com", "password": "newpass1"});
    let resp = f
        .app
        .clone()
        .oneshot(json_request("POST", "/api/admin/users", &body, Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = f
        .app
        .oneshot(empty_request("DELETE", &format!("/api/admin/users/{}", f.user.id), Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_user_and_deactivation_revokes_tokens() {
    let f = setup().await;
    let user_token = issue_token(&f.state, &f.user).await;

    let body = json!({"name": "Renamed", "is_active": false});
    let resp = f
        .app
        .clone()
        .oneshot(json_request("PUT", &format!("/api/admin/users/{}", f.user.id), &body, Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp.into_body()).await;
    assert_eq!(json["name"], "Renamed");
    assert_eq!(json["is_active"], false);

    let resp = f
        .app
        .oneshot(empty_request("GET", "/api/user/me", Some(&user_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_user_email_conflict() {
    let f = setup().await;

    let body = json!({"email": "admin@rrecipes.com"});
    let resp = f
        .app
        .oneshot(json_request("PUT", &format!("/api/admin/users/{}", f.user.id), &body, Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_last_superuser_cannot_be_demoted() {
    let f = setup().await;

    let body = json!({"is_superuser": false});
    let resp = f
        .app
        .oneshot(json_request("PUT", &format!("/api/admin/users/{}", f.admin.id), &body, Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let stored = users::find_by_id(&f.state.db, &f.admin.id).await.unwrap().unwrap();
    assert!(stored.is_superuser);
}

#[tokio::test]
async fn test_superusers_demoting_each_other_leave_one() {
    for _ in 0..10 {
        let f = setup().await;
        let other = users::create_superuser(&f.state.db, "second@rrecipes.com", "testpass123", "")
            .await
            .unwrap();
        let other_token = issue_token(&f.state, &other).await;

        let body = json!({"is_superuser": false});
        let demote_other = json_request("PUT", &format!("/api/admin/users/{}", other.id), &body, Some(&f.admin_token));
        let demote_admin = json_request("PUT", &format!("/api/admin/users/{}", f.admin.id), &body, Some(&other_token));

        let a = tokio::spawn(f.app.clone().oneshot(demote_other));
        let b = tokio::spawn(f.app.clone().oneshot(demote_admin));
        let statuses = [a.await.unwrap().unwrap().status(), b.await.unwrap().unwrap().status()];

        // the loser is refused either by the guard (400) or, if it lost its
        // own superuser flag first, by the permission check (403)
        assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1, "{:?}", statuses);
        assert!(statuses
            .iter()
            .all(|s| matches!(*s, StatusCode::OK | StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN)));
        assert_eq!(users::count_active_superusers(&f.state.db).await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_superuser_must_be_staff() {
    let f = setup().await;

    let body = json!({"is_superuser": true, "is_staff": false});
    let resp = f
        .app
        .oneshot(json_request("PUT", &format!("/api/admin/users/{}", f.user.id), &body, Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_user() {
    let f = setup().await;
    let uri = format!("/api/admin/users/{}", f.user.id);

    let resp = f
        .app
        .clone()
        .oneshot(empty_request("DELETE", &uri, Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = f
        .app
        .oneshot(empty_request("GET", &uri, Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let f = setup().await;

    let resp = f
        .app
        .oneshot(empty_request("DELETE", &format!("/api/admin/users/{}", f.admin.id), Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_mutations_are_audited() {
    let f = setup().await;

    let body = json!({"email": "audited@example.com", "password": "auditpass"});
    let resp = f
        .app
        .clone()
        .oneshot(json_request("POST", "/api/admin/users", &body, Some(&f.admin_token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // audit writes are spawned; give them a moment
    let mut total = 0;
    for _ in 0..50 {
        let resp = f
            .app
            .clone()
            .oneshot(empty_request("GET", "/api/admin/audit-log?action=create", Some(&f.admin_token)))
            .await
            .unwrap();
        let json = body_json(resp.into_body()).await;
        total = json["total"].as_i64().unwrap_or(0);
        if total > 0 {
            assert_eq!(json["data"][0]["email"], "admin@rrecipes.com");
            assert_eq!(json["data"][0]["detail"], "audited@example.com");
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(total, 1);
}
