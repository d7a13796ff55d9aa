use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use outreach_api::sender::ScriptedSender;
use outreach_api::token::TokenService;
use outreach_api::{AppStateInner, CampaignEngine, auth, router};
use outreach_db::Database;
use outreach_types::models::DeliveryStatus;

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin-pass";

fn app_with(sender: ScriptedSender) -> Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    auth::seed_admin(&db, ADMIN_EMAIL, ADMIN_PASSWORD).unwrap();
    let engine = CampaignEngine::new(db.clone(), Arc::new(sender), 2);
    router(Arc::new(AppStateInner {
        db,
        tokens: TokenService::new("integration-test-secret", 3600),
        engine,
    }))
}

fn app() -> Router {
    app_with(ScriptedSender::always(DeliveryStatus::Sent))
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn admin_token(app: &Router) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/auth/admin/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn create_workspace(app: &Router, admin: &str, name: &str) -> String {
    let (status, body) = call(app, "POST", "/workspaces", Some(admin), Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["workspace"]["id"].as_str().unwrap().to_string()
}

async fn add_member(app: &Router, admin: &str, workspace: &str, email: &str, role: &str) {
    let (status, body) = call(
        app,
        "POST",
        &format!("/workspaces/{}/users", workspace),
        Some(admin),
        Some(json!({ "name": "Member", "email": email, "password": "secret1", "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
}

/// Logs in a single-workspace user and returns the access token.
async fn user_token(app: &Router, email: &str) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/auth/user/login",
        None,
        Some(json!({ "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["accessToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn admin_login_rejects_bad_credentials() {
    let app = app();

    let (status, body) = call(&app, "POST", "/auth/admin/login", None, Some(json!({ "email": ADMIN_EMAIL }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email and password are required");

    let (status, _) = call(
        &app,
        "POST",
        "/auth/admin/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = admin_token(&app).await;
    let (status, body) = call(&app, "GET", "/workspaces", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["totalItems"], 0);
}

#[tokio::test]
async fn multi_workspace_user_selects_a_workspace() {
    let app = app();
    let admin = admin_token(&app).await;
    let north = create_workspace(&app, &admin, "North").await;
    let south = create_workspace(&app, &admin, "South").await;
    let other = create_workspace(&app, &admin, "Other").await;

    let (status, body) = call(
        &app,
        "POST",
        "/users",
        Some(&admin),
        Some(json!({ "name": "Dana", "email": "dana@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        "POST",
        &format!("/users/{}/workspaces/{}", user_id, north),
        Some(&admin),
        Some(json!({ "role": "Editor" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(
        &app,
        "POST",
        &format!("/users/{}/workspaces/{}", user_id, south),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["workspaces"].as_array().unwrap().len(), 2);

    let (status, body) = call(
        &app,
        "POST",
        "/auth/user/login",
        None,
        Some(json!({ "email": "dana@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("accessToken").is_none());
    let temp = body["tempToken"].as_str().unwrap().to_string();

    // A selection token is not an access token.
    let (status, _) = call(&app, "GET", "/contacts", Some(&temp), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        "POST",
        "/auth/user/select-workspace",
        Some(&temp),
        Some(json!({ "workspaceId": other })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied to this workspace");

    let (status, body) = call(&app, "POST", "/auth/user/select-workspace", Some(&temp), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Workspace ID is required");

    let (status, body) = call(
        &app,
        "POST",
        "/auth/user/select-workspace",
        Some(&temp),
        Some(json!({ "workspaceId": south })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["user"]["role"], "Viewer");
    let access = body["token"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "GET", "/contacts", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);

    // Removing the membership revokes the token on its next use.
    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/users/{}/workspaces/{}", user_id, south),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, "GET", "/contacts", Some(&access), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Workspace access revoked");
}

#[tokio::test]
async fn user_without_workspace_cannot_log_in() {
    let app = app();
    let admin = admin_token(&app).await;
    call(
        &app,
        "POST",
        "/users",
        Some(&admin),
        Some(json!({ "name": "Lee", "email": "lee@example.com", "password": "secret1" })),
    )
    .await;

    let (status, body) = call(
        &app,
        "POST",
        "/auth/user/login",
        None,
        Some(json!({ "email": "lee@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "No workspace assigned. Contact admin.");
}

#[tokio::test]
async fn roles_gate_reads_and_writes() {
    let app = app();
    let admin = admin_token(&app).await;
    let ws = create_workspace(&app, &admin, "Main").await;
    add_member(&app, &admin, &ws, "viewer@example.com", "Viewer").await;
    let viewer = user_token(&app, "viewer@example.com").await;

    let (status, _) = call(&app, "GET", "/contacts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, "GET", "/contacts", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "POST",
        "/contacts",
        Some(&viewer),
        Some(json!({
            "name": "Asha",
            "phoneNumber": "9876543210",
            "email": "asha@example.com",
            "company": "Acme"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, "GET", "/workspaces", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Promotion applies to the token already issued.
    let (status, _) = call(
        &app,
        "GET",
        &format!("/workspaces/{}/users", ws),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, members) = call(&app, "GET", &format!("/workspaces/{}", ws), Some(&admin), None).await;
    let member_id = members["users"][0]["id"].as_str().unwrap().to_string();
    let (status, _) = call(
        &app,
        "PUT",
        &format!("/workspaces/{}/users/{}", ws, member_id),
        Some(&admin),
        Some(json!({ "role": "Editor" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        "POST",
        "/contacts",
        Some(&viewer),
        Some(json!({
            "name": "Asha",
            "phoneNumber": "9876543210",
            "email": "asha@example.com",
            "company": "Acme"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
}

#[tokio::test]
async fn admin_needs_workspace_header_for_scoped_routes() {
    let app = app();
    let admin = admin_token(&app).await;
    let ws = create_workspace(&app, &admin, "Main").await;

    let (status, _) = call(&app, "GET", "/contacts", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .uri("/contacts")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .header("x-workspace-id", ws)
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn campaign_create_launch_and_inspect() {
    let app = app_with(ScriptedSender::new([DeliveryStatus::Sent, DeliveryStatus::Failed]));
    let admin = admin_token(&app).await;
    let ws = create_workspace(&app, &admin, "Main").await;
    add_member(&app, &admin, &ws, "editor@example.com", "Editor").await;
    let editor = user_token(&app, "editor@example.com").await;

    for (name, phone, tags) in [
        ("Asha", "9876543210", json!(["vip"])),
        ("Ravi", "8765432109", json!(["vip", "north"])),
        ("Meera", "7654321098", json!(["cold"])),
    ] {
        let (status, body) = call(
            &app,
            "POST",
            "/contacts",
            Some(&editor),
            Some(json!({
                "name": name,
                "phoneNumber": phone,
                "email": format!("{}@example.com", phone),
                "company": "Acme",
                "tags": tags
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let (status, body) = call(
        &app,
        "POST",
        "/message-templates",
        Some(&editor),
        Some(json!({ "name": "Promo", "type": "Text", "body": "Hello!" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let template_id = body["template"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        "POST",
        "/campaigns",
        Some(&editor),
        Some(json!({ "name": "Spring", "targetTags": ["vip"], "templateId": template_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["campaign"]["status"], "Draft");
    assert_eq!(body["campaign"]["targetContactsCount"], 2);
    let campaign_id = body["campaign"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        "POST",
        &format!("/campaigns/{}/launch", campaign_id),
        Some(&editor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["campaign"]["status"], "Completed");
    assert_eq!(body["campaign"]["stats"], json!({ "total": 2, "sent": 1, "failed": 1 }));

    let (status, body) = call(
        &app,
        "POST",
        &format!("/campaigns/{}/launch", campaign_id),
        Some(&editor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only draft campaigns can be launched");

    let (status, body) = call(&app, "GET", &format!("/campaigns/{}", campaign_id), Some(&editor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["campaign"]["stats"]["total"], 2);

    let (status, body) = call(
        &app,
        "PUT",
        &format!("/campaigns/{}", campaign_id),
        Some(&editor),
        Some(json!({ "name": "Too late" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/campaigns/{}/copy", campaign_id),
        Some(&editor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["campaign"]["name"], "Spring (Copy)");
    assert_eq!(body["campaign"]["status"], "Draft");

    let (status, body) = call(&app, "GET", "/analytics/top-tags", Some(&editor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0], json!({ "tag": "vip", "contactCount": 2 }));
}

#[tokio::test]
async fn malformed_input_uses_the_error_shape() {
    let app = app();
    let admin = admin_token(&app).await;

    let (status, body) = call(&app, "GET", "/workspaces/not-a-uuid", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let req = Request::builder()
        .method("POST")
        .uri("/workspaces")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
