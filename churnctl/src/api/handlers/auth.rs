use axum::{extract::State, Json};

use crate::{
    api::models::{
        auth::{
            AuthResponse, AuthSuccessResponse, DeleteAccountRequest, LoginRequest, LoginResponse, LogoutResponse,
            PasswordChangeRequest, RegisterRequest, RegisterResponse, RegistrationInfo,
        },
        users::{CurrentUser, Role, UserResponse},
    },
    auth::{password, session},
    db::{
        handlers::{Repository, Users},
        models::users::UserCreateDBRequest,
    },
    errors::Error,
    AppState,
};

/// Get registration information
#[utoipa::path(
    get,
    path = "/authentication/register",
    tag = "authentication",
    responses(
        (status = 200, description = "Registration info", body = RegistrationInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_registration_info(State(state): State<AppState>) -> Result<Json<RegistrationInfo>, Error> {
    Ok(Json(RegistrationInfo {
        enabled: state.config.auth.allow_registration,
        message: if state.config.auth.allow_registration {
            "Registration is enabled".to_string()
        } else {
            "Registration is disabled".to_string()
        },
    }))
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/authentication/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "User already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    if !state.config.auth.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let min_length = state.config.auth.password_min_length;
    if request.password.len() < min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {min_length} characters"),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut tx);

    // Check both unique columns up front for friendlier messages than a raw
    // constraint violation
    if user_repo.get_by_username(&request.username).await?.is_some() {
        return Err(Error::BadRequest {
            message: "Username already exists".to_string(),
        });
    }
    if user_repo.get_by_email(&request.email).await?.is_some() {
        return Err(Error::BadRequest {
            message: "An account with this email address already exists".to_string(),
        });
    }

    // Hash the password on a blocking thread to avoid blocking the async runtime
    let password = request.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let create_request = UserCreateDBRequest {
        username: request.username,
        email: request.email,
        password_hash: Some(password_hash),
        role: Role::User,
        is_active: true,
    };

    let created_user = user_repo.create(&create_request).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let user_response = UserResponse::from(created_user.clone());
    let current_user = CurrentUser::from(created_user);
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = create_session_cookie(&token, &state.config);

    let auth_response = AuthResponse {
        user: user_response,
        message: "Registration successful".to_string(),
    };

    Ok(RegisterResponse { auth_response, cookie })
}

/// Login with username and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or deactivated account"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut pool_conn);

    let user = user_repo
        .get_by_username(&request.username)
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Invalid username or password".to_string()),
        })?;

    let password_hash = user.password_hash.clone().ok_or_else(|| Error::Unauthenticated {
        message: Some("Invalid username or password".to_string()),
    })?;

    // Verify password on a blocking thread to avoid blocking the async runtime
    let password = request.password.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&password, &password_hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(Error::Unauthenticated {
            message: Some("Invalid username or password".to_string()),
        });
    }

    // Deactivated accounts keep their data but cannot sign in
    if !user.is_active {
        return Err(Error::Unauthenticated {
            message: Some("Account is deactivated. Contact an administrator.".to_string()),
        });
    }

    let user_response = UserResponse::from(user.clone());
    let current_user = CurrentUser::from(user);
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = create_session_cookie(&token, &state.config);

    let auth_response = AuthResponse {
        user: user_response,
        message: "Login successful".to_string(),
    };

    Ok(LoginResponse { auth_response, cookie })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    let auth_response = AuthSuccessResponse {
        message: "Logout successful".to_string(),
    };

    Ok(LogoutResponse {
        auth_response,
        cookie: create_expired_cookie(&state.config),
    })
}

/// Change the authenticated user's password
#[utoipa::path(
    post,
    path = "/authentication/password-change",
    request_body = PasswordChangeRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed", body = AuthSuccessResponse),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password is incorrect"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<PasswordChangeRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    let min_length = state.config.auth.password_min_length;
    if request.new_password.len() < min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {min_length} characters"),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut pool_conn);

    let user = user_repo.get_by_id(current_user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: current_user.id.to_string(),
    })?;

    let password_hash = user.password_hash.ok_or_else(|| Error::Unauthenticated {
        message: Some("Current password is incorrect".to_string()),
    })?;

    let current_password = request.current_password.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&current_password, &password_hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }

    let new_password = request.new_password.clone();
    let new_password_hash = tokio::task::spawn_blocking(move || password::hash_string(&new_password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    user_repo.update_password_hash(current_user.id, &new_password_hash).await?;

    Ok(Json(AuthSuccessResponse {
        message: "Password changed successfully".to_string(),
    }))
}

/// Delete the authenticated user's account (and all their prediction records)
#[utoipa::path(
    post,
    path = "/authentication/delete-account",
    request_body = DeleteAccountRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Account deleted", body = AuthSuccessResponse),
        (status = 400, description = "Username confirmation did not match"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn delete_account(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<DeleteAccountRequest>,
) -> Result<LogoutResponse, Error> {
    if request.username_confirm != current_user.username {
        return Err(Error::BadRequest {
            message: "Username confirmation does not match".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut pool_conn);

    // Prediction records cascade with the account
    if !user_repo.delete(current_user.id).await? {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: current_user.id.to_string(),
        });
    }

    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Account deleted".to_string(),
        },
        cookie: create_expired_cookie(&state.config),
    })
}

/// Helper function to create a session cookie
fn create_session_cookie(token: &str, config: &crate::config::Config) -> String {
    let auth = &config.auth;
    let max_age = auth.session_duration.as_secs();

    format!(
        "{}={}; Path=/; HttpOnly; Secure={}; SameSite=Strict; Max-Age={}",
        auth.cookie_name, token, auth.cookie_secure, max_age
    )
}

fn create_expired_cookie(config: &crate::config::Config) -> String {
    format!(
        "{}=; Path=/; HttpOnly; Secure={}; SameSite=Strict; Max-Age=0",
        config.auth.cookie_name, config.auth.cookie_secure
    )
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    #[test_log::test(sqlx::test)]
    async fn register_login_logout_flow(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server
            .post("/authentication/register")
            .json(&json!({
                "username": "newuser",
                "email": "newuser@example.com",
                "password": "password123"
            }))
            .await;
        assert_eq!(response.status_code().as_u16(), 201);
        assert!(response.headers().get("set-cookie").is_some());
        let body: serde_json::Value = response.json();
        assert_eq!(body["user"]["username"], "newuser");
        assert_eq!(body["user"]["role"], "user");

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "newuser", "password": "password123"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);
        assert!(response.headers().get("set-cookie").is_some());

        let response = server.post("/authentication/logout").await;
        assert_eq!(response.status_code().as_u16(), 200);
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test_log::test(sqlx::test)]
    async fn login_rejects_bad_credentials(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        create_test_user(&pool, "alice", "alice@example.com", "correct-horse").await;

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "alice", "password": "wrong"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 401);

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "nobody", "password": "whatever"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 401);
    }

    #[test_log::test(sqlx::test)]
    async fn deactivated_user_cannot_login(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, "bob", "bob@example.com", "password123").await;
        set_user_active(&pool, user.id, false).await;

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "bob", "password": "password123"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 401);
        assert!(response.text().contains("deactivated"));
    }

    #[test_log::test(sqlx::test)]
    async fn register_enforces_minimum_password_length(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server
            .post("/authentication/register")
            .json(&json!({
                "username": "shorty",
                "email": "shorty@example.com",
                "password": "abc"
            }))
            .await;
        assert_eq!(response.status_code().as_u16(), 400);
    }

    #[test_log::test(sqlx::test)]
    async fn register_rejects_duplicate_username(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        create_test_user(&pool, "taken", "taken@example.com", "password123").await;

        let response = server
            .post("/authentication/register")
            .json(&json!({
                "username": "taken",
                "email": "other@example.com",
                "password": "password123"
            }))
            .await;
        assert_eq!(response.status_code().as_u16(), 400);
    }

    #[test_log::test(sqlx::test)]
    async fn change_password_requires_current(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        create_test_user(&pool, "carol", "carol@example.com", "oldpassword").await;
        let cookie = login(&server, "carol", "oldpassword").await;

        let response = server
            .post("/authentication/password-change")
            .add_header("cookie", &cookie)
            .json(&json!({"current_password": "wrong", "new_password": "newpassword"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 401);

        let response = server
            .post("/authentication/password-change")
            .add_header("cookie", &cookie)
            .json(&json!({"current_password": "oldpassword", "new_password": "newpassword"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);

        // old password no longer works
        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "carol", "password": "oldpassword"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 401);
        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "carol", "password": "newpassword"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);
    }

    #[test_log::test(sqlx::test)]
    async fn delete_account_requires_username_confirmation(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        create_test_user(&pool, "dave", "dave@example.com", "password123").await;
        let cookie = login(&server, "dave", "password123").await;

        let response = server
            .post("/authentication/delete-account")
            .add_header("cookie", &cookie)
            .json(&json!({"username_confirm": "not-dave"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 400);

        let response = server
            .post("/authentication/delete-account")
            .add_header("cookie", &cookie)
            .json(&json!({"username_confirm": "dave"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "dave", "password": "password123"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 401);
    }
}
