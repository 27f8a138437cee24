use axum::{
    routing::{get, post},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use folio_api::app::{self, AppState};
use folio_api::app::routes::rbac::PERSISTED_HEADER;
use folio_api::authz::Guard;
use folio_api::config::ApiConfig;
use folio_auth::{JwtClaims, Permission, PrincipalId, Role};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AppState::in_memory(JWT_SECRET)).await
    }

    async fn spawn_with(state: AppState) -> Self {
        // Same router as prod plus a couple of guarded resource routes,
        // bound to an ephemeral port.
        let resources = resource_routes(&state);
        let app = app::build_app_with(state, resources);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Stand-ins for the project routes, declared the way real resource routers are.
fn resource_routes(state: &AppState) -> Router {
    let create = Guard::all_permissions(&state.authorizer, [Permission::ProjectCreate])
        .apply(Router::new().route("/projects", post(|| async { StatusCode::CREATED })));
    let read = Guard::any_permission(
        &state.authorizer,
        [Permission::ProjectRead, Permission::UserReadAll],
    )
    .apply(Router::new().route("/projects/:id", get(|| async { "{}" })));

    create.merge(read)
}

fn mint_jwt(role: Role) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        role,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn role_permissions(
    client: &reqwest::Client,
    srv: &TestServer,
    admin: &str,
    role: &str,
) -> Vec<String> {
    let res = client
        .get(srv.url(&format!("/admin/rbac/permissions/{role}")))
        .bearer_auth(admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for path in ["/whoami", "/admin/rbac/permissions", "/projects/1"] {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "GET {path}");
    }

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reports_role_and_current_permissions() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(mint_jwt(Role::Guest))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["role"], "guest");
    let perms = body["permissions"].as_array().unwrap();
    assert_eq!(perms.len(), 5);
    assert!(perms.iter().any(|p| p == "settings:read"));
}

#[tokio::test]
async fn admin_surface_is_admin_only() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for role in [Role::User, Role::Guest] {
        let token = mint_jwt(role);

        let res = client
            .get(srv.url("/admin/rbac/permissions"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["details"]["kind"], "role");
        assert_eq!(body["details"]["actual"], role.as_str());

        // Writes are rejected before the payload is even looked at.
        let res = client
            .put(srv.url("/admin/rbac/permissions/finance_manager"))
            .bearer_auth(&token)
            .json(&json!(["not:a:permission"]))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = client
            .post(srv.url("/admin/rbac/permissions/reset"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn fresh_table_matches_defaults() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);

    let mut guest = role_permissions(&client, &srv, &admin, "guest").await;
    guest.sort();
    assert_eq!(
        guest,
        vec!["note:read", "project:read", "resource:read", "settings:read", "user:read"]
    );

    let admin_perms = role_permissions(&client, &srv, &admin, "admin").await;
    assert_eq!(admin_perms.len(), Permission::ALL.len());
}

#[tokio::test]
async fn stripping_a_role_takes_effect_on_next_request_and_reset_restores_it() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);
    let user = mint_jwt(Role::User);

    let res = client
        .post(srv.url("/projects"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .put(srv.url("/admin/rbac/permissions/user"))
        .bearer_auth(&admin)
        .json(&json!({ "permissions": ["project:read"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Same token, no re-login: the new table applies immediately.
    let res = client
        .post(srv.url("/projects"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["details"]["required"], json!(["project:create"]));
    assert_eq!(body["details"]["role"], "user");

    let res = client
        .get(srv.url("/projects/1"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Other roles untouched.
    let guest = role_permissions(&client, &srv, &admin, "guest").await;
    assert_eq!(guest.len(), 5);

    let res = client
        .post(srv.url("/admin/rbac/permissions/reset"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let table: serde_json::Value = res.json().await.unwrap();
    assert!(table["user"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "project:create"));

    let res = client
        .post(srv.url("/projects"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn replace_all_without_guest_is_rejected_and_changes_nothing() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);

    let before = role_permissions(&client, &srv, &admin, "guest").await;

    let res = client
        .put(srv.url("/admin/rbac/permissions"))
        .bearer_auth(&admin)
        .json(&json!({ "admin": ["rbac:read", "rbac:update"], "user": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("guest"));

    assert_eq!(role_permissions(&client, &srv, &admin, "guest").await, before);
    assert_eq!(
        role_permissions(&client, &srv, &admin, "admin").await.len(),
        Permission::ALL.len()
    );
}

#[tokio::test]
async fn replace_all_round_trips() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);

    let table = json!({
        "admin": ["rbac:read", "rbac:update"],
        "user": ["todo:read", "project:read"],
        "guest": [],
    });

    let res = client
        .put(srv.url("/admin/rbac/permissions"))
        .bearer_auth(&admin)
        .json(&table)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url("/admin/rbac/permissions"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "admin": ["rbac:read", "rbac:update"],
            "user": ["project:read", "todo:read"],
            "guest": [],
        })
    );

    // The admin surface stays reachable: it is gated by role, not permission.
    let res = client
        .put(srv.url("/admin/rbac/permissions/admin"))
        .bearer_auth(&admin)
        .json(&json!([]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = client
        .get(srv.url("/admin/rbac/catalog"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_role_and_permission_are_named() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);

    let res = client
        .put(srv.url("/admin/rbac/permissions/finance_manager"))
        .bearer_auth(&admin)
        .json(&json!({ "permissions": ["project:read"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_role");
    assert!(body["message"].as_str().unwrap().contains("finance_manager"));

    let res = client
        .get(srv.url("/admin/rbac/permissions/finance_manager"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .put(srv.url("/admin/rbac/permissions/user"))
        .bearer_auth(&admin)
        .json(&json!({ "permissions": ["project:read", "project:archive"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("project:archive"));
}

#[tokio::test]
async fn concurrent_edits_to_different_roles_both_apply() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);

    let put = |role: &'static str, perms: serde_json::Value| {
        let client = client.clone();
        let url = srv.url(&format!("/admin/rbac/permissions/{role}"));
        let admin = admin.clone();
        async move {
            client
                .put(url)
                .bearer_auth(admin)
                .json(&json!({ "permissions": perms }))
                .send()
                .await
                .unwrap()
                .status()
        }
    };

    let (a, b) = tokio::join!(
        put("admin", json!(["rbac:read"])),
        put("user", json!(["todo:read"]))
    );
    assert_eq!(a, StatusCode::OK);
    assert_eq!(b, StatusCode::OK);

    assert_eq!(role_permissions(&client, &srv, &admin, "admin").await, vec!["rbac:read"]);
    assert_eq!(role_permissions(&client, &srv, &admin, "user").await, vec!["todo:read"]);
}

#[tokio::test]
async fn explain_reports_decision() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);

    let res = client
        .get(srv.url("/admin/rbac/explain?role=guest&permission=project:create"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["explanation"]["granted"], false);
    assert_eq!(body["explanation"]["granting_roles"], json!(["admin", "user"]));

    let res = client
        .get(srv.url("/admin/rbac/explain?role=guest&permission=project:archive"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn file_backed_table_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rbac.json");
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        jwt_secret: JWT_SECRET.to_string(),
        rbac_table_path: Some(path.clone()),
    };
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);

    {
        let srv = TestServer::spawn_with(AppState::from_config(&config).unwrap()).await;
        let res = client
            .put(srv.url("/admin/rbac/permissions/guest"))
            .bearer_auth(&admin)
            .json(&json!(["project:read"]))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let srv = TestServer::spawn_with(AppState::from_config(&config).unwrap()).await;
    assert_eq!(
        role_permissions(&client, &srv, &admin, "guest").await,
        vec!["project:read"]
    );
}

#[tokio::test]
async fn malformed_admin_bodies_are_validation_errors() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);

    let before = client
        .get(srv.url("/admin/rbac/permissions"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    for path in ["/admin/rbac/permissions", "/admin/rbac/permissions/user"] {
        let truncated = client
            .put(srv.url(path))
            .bearer_auth(&admin)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(r#"{"admin":["#);
        let untyped = client
            .put(srv.url(path))
            .bearer_auth(&admin)
            .body(r#"["project:read"]"#);

        for req in [truncated, untyped] {
            let res = req.send().await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "PUT {path}");
            let body: serde_json::Value = res.json().await.unwrap();
            assert_eq!(body["error"], "validation_error", "PUT {path}");
            assert!(body["message"].is_string());
        }
    }

    let after = client
        .get(srv.url("/admin/rbac/permissions"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(after, before);

    let res = client
        .get(srv.url("/admin/rbac/explain?role=user"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn undurable_edit_is_flagged_in_response() {
    let dir = tempfile::tempdir().unwrap();
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        jwt_secret: JWT_SECRET.to_string(),
        // Parent directory does not exist, so every write fails.
        rbac_table_path: Some(dir.path().join("missing").join("rbac.json")),
    };
    let srv = TestServer::spawn_with(AppState::from_config(&config).unwrap()).await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);

    let res = client
        .put(srv.url("/admin/rbac/permissions/guest"))
        .bearer_auth(&admin)
        .json(&json!([]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[PERSISTED_HEADER], "false");
    assert!(role_permissions(&client, &srv, &admin, "guest").await.is_empty());

    std::fs::create_dir(dir.path().join("missing")).unwrap();
    let res = client
        .post(srv.url("/admin/rbac/permissions/reset"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(PERSISTED_HEADER).is_none());
}
