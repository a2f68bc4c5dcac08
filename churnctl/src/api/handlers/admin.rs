//! Admin-only endpoints: user management, system analytics, model metrics.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::models::{
        pagination::PaginatedResponse,
        stats::{AdminOverviewResponse, DailyTrendPoint, ModelMetricsResponse, PredictionStatsResponse, UserActivityResponse},
        users::{CurrentUser, ListUsersQuery, UserCreate, UserDetailResponse, UserResponse},
    },
    auth::{password, require_admin},
    db::{
        handlers::{analytics::Analytics, model_metrics::ModelMetrics, users::UserFilter, Predictions, Repository, Users},
        models::users::UserCreateDBRequest,
    },
    errors::Error,
    types::UserId,
    AppState,
};

/// Number of days covered by the admin daily trend view.
const TREND_DAYS: i32 = 30;

/// System-wide overview: accounts, predictions, and current model metrics
#[utoipa::path(
    get,
    path = "/api/v1/admin/overview",
    tag = "admin",
    responses(
        (status = 200, description = "System overview", body = AdminOverviewResponse),
        (status = 403, description = "Admin access required"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn overview(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<AdminOverviewResponse>, Error> {
    require_admin(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let overview = Analytics::new(&mut conn).system_overview().await?;
    let metrics = ModelMetrics::new(&mut conn).latest().await?;

    Ok(Json(AdminOverviewResponse::new(overview, metrics)))
}

/// List user accounts
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(ListUsersQuery),
    tag = "admin",
    responses(
        (status = 200, description = "One page of users", body = PaginatedResponse<UserResponse>),
        (status = 403, description = "Admin access required"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, Error> {
    require_admin(&current_user)?;

    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let filter = UserFilter::new(skip, limit);
    let users = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Create a user account (role chosen by the admin)
#[utoipa::path(
    post,
    path = "/api/v1/admin/users",
    request_body = UserCreate,
    tag = "admin",
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid user data"),
        (status = 403, description = "Admin access required"),
        (status = 409, description = "Username or email already exists"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), Error> {
    require_admin(&current_user)?;

    let min_length = state.config.auth.password_min_length;
    if request.password.len() < min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {min_length} characters"),
        });
    }

    let raw_password = request.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&raw_password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let user = repo
        .create(&UserCreateDBRequest {
            username: request.username,
            email: request.email,
            password_hash: Some(password_hash),
            role: request.role,
            is_active: true,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// User detail: the account plus its prediction stats
#[utoipa::path(
    get,
    path = "/api/v1/admin/users/{id}",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    tag = "admin",
    responses(
        (status = 200, description = "User detail", body = UserDetailResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<Json<UserDetailResponse>, Error> {
    require_admin(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;
    let stats = Predictions::new(&mut conn).stats_for_user(id).await?;

    Ok(Json(UserDetailResponse {
        user: UserResponse::from(user),
        stats: PredictionStatsResponse::from(stats),
    }))
}

/// Activate a user account
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/activate",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    tag = "admin",
    responses(
        (status = 200, description = "Account activated", body = UserResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn activate_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>, Error> {
    require_admin(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).set_active(id, true).await?;

    Ok(Json(UserResponse::from(user)))
}

/// Deactivate a user account. The account and its records are kept; the user
/// just cannot sign in.
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/deactivate",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    tag = "admin",
    responses(
        (status = 200, description = "Account deactivated", body = UserResponse),
        (status = 400, description = "Cannot deactivate yourself"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>, Error> {
    require_admin(&current_user)?;
    if id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot deactivate your own account".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).set_active(id, false).await?;

    Ok(Json(UserResponse::from(user)))
}

/// Delete a user account and all their prediction records
#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{id}",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    tag = "admin",
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete yourself"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<StatusCode, Error> {
    require_admin(&current_user)?;
    if id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot delete your own account".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Users::new(&mut conn).delete(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(Error::NotFound {
            resource: "User".to_string(),
            id: id.to_string(),
        }),
    }
}

/// Daily prediction counts across all users for the last 30 days
#[utoipa::path(
    get,
    path = "/api/v1/admin/trends",
    tag = "admin",
    responses(
        (status = 200, description = "Daily buckets, oldest first", body = [DailyTrendPoint]),
        (status = 403, description = "Admin access required"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn daily_trends(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<DailyTrendPoint>>, Error> {
    require_admin(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rows = Analytics::new(&mut conn).daily_trends(TREND_DAYS).await?;

    Ok(Json(rows.into_iter().map(DailyTrendPoint::from).collect()))
}

/// Account breakdown: active, inactive, and admin counts
#[utoipa::path(
    get,
    path = "/api/v1/admin/user-activity",
    tag = "admin",
    responses(
        (status = 200, description = "Account breakdown", body = UserActivityResponse),
        (status = 403, description = "Admin access required"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn user_activity(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserActivityResponse>, Error> {
    require_admin(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let breakdown = Analytics::new(&mut conn).user_activity().await?;

    Ok(Json(UserActivityResponse::from(breakdown)))
}

/// Mark the current model metrics as reviewed (bumps their timestamp)
#[utoipa::path(
    post,
    path = "/api/v1/admin/model-metrics/refresh",
    tag = "admin",
    responses(
        (status = 200, description = "Refreshed metrics", body = ModelMetricsResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "No metrics recorded"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn refresh_model_metrics(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<ModelMetricsResponse>, Error> {
    require_admin(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let row = ModelMetrics::new(&mut conn).refresh().await?;

    Ok(Json(ModelMetricsResponse::from(row)))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    #[test_log::test(sqlx::test)]
    async fn admin_endpoints_reject_regular_users(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        create_test_user(&pool, "plain", "plain@example.com", "password123").await;
        let cookie = login(&server, "plain", "password123").await;

        for path in ["/api/v1/admin/overview", "/api/v1/admin/users", "/api/v1/admin/user-activity"] {
            let response = server.get(path).add_header("cookie", &cookie).await;
            assert_eq!(response.status_code().as_u16(), 403, "expected 403 for {path}");
        }
    }

    #[test_log::test(sqlx::test)]
    async fn overview_counts_users_and_predictions(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        create_test_admin(&pool, "root", "root@example.com", "password123").await;
        create_test_user(&pool, "member", "member@example.com", "password123").await;
        let admin = login(&server, "root", "password123").await;
        let member = login(&server, "member", "password123").await;

        server
            .post("/api/v1/predictions")
            .add_header("cookie", &member)
            .json(&json!({
                "customer_name": "Acme",
                "tenure": 2.0,
                "monthly_charges": 80.0,
                "total_charges": 160.0,
                "contract_type": "Month-to-month",
                "payment_method": "Electronic check"
            }))
            .await;

        let response = server.get("/api/v1/admin/overview").add_header("cookie", &admin).await;
        assert_eq!(response.status_code().as_u16(), 200);
        let body: serde_json::Value = response.json();
        assert_eq!(body["total_users"], 2);
        assert_eq!(body["active_users"], 2);
        assert_eq!(body["total_predictions"], 1);
        assert!(body["model_metrics"]["accuracy"].as_f64().unwrap() > 0.0);
    }

    #[test_log::test(sqlx::test)]
    async fn user_list_honors_skip_and_limit_params(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        create_test_admin(&pool, "root", "root@example.com", "password123").await;
        let admin = login(&server, "root", "password123").await;

        for i in 0..5 {
            create_test_user(&pool, &format!("member{i}"), &format!("member{i}@example.com"), "password123").await;
        }

        let page = |skip: &'static str, limit: &'static str| {
            server
                .get("/api/v1/admin/users")
                .add_query_param("skip", skip)
                .add_query_param("limit", limit)
                .add_header("cookie", &admin)
        };

        let response = page("0", "4").await;
        assert_eq!(response.status_code().as_u16(), 200);
        let first: serde_json::Value = response.json();
        assert_eq!(first["total_count"], 6);
        assert_eq!(first["skip"], 0);
        assert_eq!(first["limit"], 4);
        assert_eq!(first["data"].as_array().unwrap().len(), 4);

        let response = page("4", "4").await;
        assert_eq!(response.status_code().as_u16(), 200);
        let second: serde_json::Value = response.json();
        assert_eq!(second["skip"], 4);
        assert_eq!(second["data"].as_array().unwrap().len(), 2);

        // the two pages partition the full user set
        let mut usernames: Vec<String> = first["data"]
            .as_array()
            .unwrap()
            .iter()
            .chain(second["data"].as_array().unwrap())
            .map(|u| u["username"].as_str().unwrap().to_string())
            .collect();
        usernames.sort();
        assert_eq!(
            usernames,
            ["member0", "member1", "member2", "member3", "member4", "root"]
        );
    }

    #[test_log::test(sqlx::test)]
    async fn admin_manages_user_lifecycle(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        create_test_admin(&pool, "root", "root@example.com", "password123").await;
        let admin = login(&server, "root", "password123").await;

        // create
        let response = server
            .post("/api/v1/admin/users")
            .add_header("cookie", &admin)
            .json(&json!({
                "username": "managed",
                "email": "managed@example.com",
                "password": "password123",
                "role": "user"
            }))
            .await;
        assert_eq!(response.status_code().as_u16(), 201);
        let id = response.json::<serde_json::Value>()["id"].as_str().unwrap().to_string();

        // detail includes stats
        let response = server.get(&format!("/api/v1/admin/users/{id}")).add_header("cookie", &admin).await;
        assert_eq!(response.status_code().as_u16(), 200);
        let body: serde_json::Value = response.json();
        assert_eq!(body["username"], "managed");
        assert_eq!(body["stats"]["total_predictions"], 0);

        // deactivate blocks login, activate restores it
        let response = server
            .post(&format!("/api/v1/admin/users/{id}/deactivate"))
            .add_header("cookie", &admin)
            .await;
        assert_eq!(response.status_code().as_u16(), 200);
        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "managed", "password": "password123"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 401);

        let response = server
            .post(&format!("/api/v1/admin/users/{id}/activate"))
            .add_header("cookie", &admin)
            .await;
        assert_eq!(response.status_code().as_u16(), 200);
        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "managed", "password": "password123"}))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);

        // delete
        let response = server.delete(&format!("/api/v1/admin/users/{id}")).add_header("cookie", &admin).await;
        assert_eq!(response.status_code().as_u16(), 204);
        let response = server.get(&format!("/api/v1/admin/users/{id}")).add_header("cookie", &admin).await;
        assert_eq!(response.status_code().as_u16(), 404);
    }

    #[test_log::test(sqlx::test)]
    async fn admin_cannot_target_own_account(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin_user = create_test_admin(&pool, "root", "root@example.com", "password123").await;
        let admin = login(&server, "root", "password123").await;

        let response = server
            .post(&format!("/api/v1/admin/users/{}/deactivate", admin_user.id))
            .add_header("cookie", &admin)
            .await;
        assert_eq!(response.status_code().as_u16(), 400);

        let response = server
            .delete(&format!("/api/v1/admin/users/{}", admin_user.id))
            .add_header("cookie", &admin)
            .await;
        assert_eq!(response.status_code().as_u16(), 400);
    }

    #[test_log::test(sqlx::test)]
    async fn metrics_refresh_bumps_timestamp(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        create_test_admin(&pool, "root", "root@example.com", "password123").await;
        let admin = login(&server, "root", "password123").await;

        let before = server
            .get("/api/v1/model/metrics")
            .add_header("cookie", &admin)
            .await
            .json::<serde_json::Value>();

        let response = server
            .post("/api/v1/admin/model-metrics/refresh")
            .add_header("cookie", &admin)
            .await;
        assert_eq!(response.status_code().as_u16(), 200);
        let after: serde_json::Value = response.json();

        assert_eq!(before["accuracy"], after["accuracy"]);
        assert!(after["updated_at"].as_str().unwrap() >= before["updated_at"].as_str().unwrap());
    }
}
