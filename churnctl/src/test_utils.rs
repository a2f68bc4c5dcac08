//! Shared helpers for integration-style handler tests.

use crate::{
    api::models::users::Role,
    auth::password,
    build_router,
    db::handlers::{Repository, Users},
    db::models::users::{UserCreateDBRequest, UserDBResponse},
    email::EmailService,
    ml::ChurnModel,
    types::UserId,
    AppState, Config,
};
use axum_test::TestServer;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;

/// A config suitable for tests: fixed JWT secret, insecure cookies so the
/// test client round-trips them, and file-mode email delivery into a
/// per-test temp directory.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.secret_key = Some("test-secret-key".to_string());
    config.auth.cookie_secure = false;
    config.email.file_path = std::env::temp_dir()
        .join(format!("churnctl-test-emails-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    config
}

fn test_classifier() -> ChurnModel {
    let model = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/artifacts/churn_model.json"));
    let scaler = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/artifacts/scaler.json"));
    ChurnModel::load(model, scaler).expect("load model artifacts")
}

/// Build a test server backed by the given pool (migrations already applied
/// by `sqlx::test`).
pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = test_config();
    let email = EmailService::new(&config).expect("create email service");

    let state = AppState::builder()
        .db(pool)
        .config(config)
        .classifier(Arc::new(test_classifier()))
        .email(Arc::new(email))
        .build();

    TestServer::new(build_router(state)).expect("create test server")
}

async fn insert_user(pool: &PgPool, username: &str, email: &str, raw_password: &str, role: Role) -> UserDBResponse {
    let password_hash = password::hash_string(raw_password).expect("hash password");
    let mut conn = pool.acquire().await.expect("acquire connection");
    let mut users = Users::new(&mut conn);
    users
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some(password_hash),
            role,
            is_active: true,
        })
        .await
        .expect("create test user")
}

pub async fn create_test_user(pool: &PgPool, username: &str, email: &str, raw_password: &str) -> UserDBResponse {
    insert_user(pool, username, email, raw_password, Role::User).await
}

pub async fn create_test_admin(pool: &PgPool, username: &str, email: &str, raw_password: &str) -> UserDBResponse {
    insert_user(pool, username, email, raw_password, Role::Admin).await
}

pub async fn set_user_active(pool: &PgPool, id: UserId, is_active: bool) {
    let mut conn = pool.acquire().await.expect("acquire connection");
    let mut users = Users::new(&mut conn);
    users.set_active(id, is_active).await.expect("set user active");
}

/// Login and return the session cookie (`name=token`) ready for a `cookie`
/// header.
pub async fn login(server: &TestServer, username: &str, raw_password: &str) -> String {
    let response = server
        .post("/authentication/login")
        .json(&serde_json::json!({"username": username, "password": raw_password}))
        .await;
    assert_eq!(response.status_code().as_u16(), 200, "login failed for {username}");

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .expect("login response sets a cookie")
        .to_str()
        .expect("cookie is valid ASCII");
    set_cookie.split(';').next().expect("cookie has a value").to_string()
}
