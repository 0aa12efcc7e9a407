#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use societyhub::api;
use societyhub::auth;
use societyhub::config::Config;
use societyhub::db;
use societyhub::infrastructure::AppState;
use societyhub::infrastructure::mailer::MemoryMailer;
use societyhub::modules::integrations::payment_gateway::HttpPaymentGateway;
use tower::util::ServiceExt; // for `oneshot`

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mailer: Arc<MemoryMailer>,
}

impl TestApp {
    pub fn db(&self) -> &DatabaseConnection {
        self.state.db()
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        send(&self.router, req).await
    }
}

// Each test gets its own media directory so uploads never collide
pub fn test_config() -> Config {
    let mut config = Config {
        database_url: "sqlite::memory:".to_string(),
        media_root: std::env::temp_dir()
            .join("societyhub-tests")
            .join(uuid::Uuid::new_v4().to_string()),
        public_base_url: "http://testserver".to_string(),
        ..Config::default()
    };
    config.payment.webhook_secret = WEBHOOK_SECRET.to_string();
    config
}

// Helper to create a test app backed by an in-memory database
pub async fn setup() -> TestApp {
    setup_with_gateway("http://127.0.0.1:9").await
}

pub async fn setup_with_gateway(gateway_url: &str) -> TestApp {
    let config = test_config();
    let db = db::init_db(&config.database_url)
        .await
        .expect("Failed to init DB");

    let mailer = MemoryMailer::new();
    let state = AppState::new(db, config)
        .with_mailer(mailer.clone())
        .with_gateway(Arc::new(HttpPaymentGateway::new(gateway_url, "sk_test")));

    let router = Router::new().nest("/api", api::api_router(state.clone()));
    TestApp {
        state,
        router,
        mailer,
    }
}

// Helper to create a user with the given role and a valid token for it
pub async fn create_user(db: &DatabaseConnection, email: &str, role: &str) -> (i32, String) {
    let now = chrono::Utc::now().to_rfc3339();
    let user = societyhub::models::user::ActiveModel {
        email: Set(email.to_string()),
        password_hash: Set("unused".to_string()),
        first_name: Set("Test".to_string()),
        last_name: Set(role.to_string()),
        role: Set(role.to_string()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let user = user.insert(db).await.expect("Failed to create user");
    let token = auth::create_jwt(user.id, &user.email, &user.role).expect("Failed to create token");
    (user.id, token)
}

pub async fn admin(db: &DatabaseConnection) -> (i32, String) {
    create_user(db, "admin@example.org", "admin").await
}

pub async fn member(db: &DatabaseConnection, email: &str) -> (i32, String) {
    create_user(db, email, "member").await
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    empty_request("GET", uri, token)
}

pub fn multipart_request(uri: &str, token: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let boundary = "societyhub-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap()
}

pub async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}
