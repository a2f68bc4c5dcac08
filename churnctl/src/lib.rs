//! # churnctl: Customer Churn Prediction Service
//!
//! `churnctl` scores telecom customers against a pre-trained logistic
//! regression model and manages the resulting prediction records. It exposes a
//! REST API for single and bulk (CSV) scoring, a paginated prediction history
//! with filtering and CSV export, emailed reports, per-user statistics, and an
//! admin surface for user management and system analytics.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL for persistence. The model is loaded
//! once at startup from JSON artifacts (coefficients plus feature scaler) and
//! shared across handlers; scoring is pure arithmetic and needs no external
//! service.
//!
//! Requests flow through session-cookie authentication (JWT, see [`auth`]),
//! reach a handler in [`api::handlers`], and touch the database through the
//! repositories in [`db::handlers`]. Admin endpoints additionally check the
//! caller's role.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use churnctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = churnctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     churnctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod export;
pub mod import;
pub mod ml;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    auth::password,
    db::handlers::{Repository, Users},
    db::models::users::UserCreateDBRequest,
    email::EmailService,
    ml::{ChurnModel, Classifier},
    openapi::ApiDoc,
};
use axum::{
    routing::{delete, get, post},
    Router,
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, instrument, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{PredictionId, UserId};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub classifier: Arc<dyn Classifier>,
    pub email: Arc<EmailService>,
}

/// Get the churnctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: creates the configured admin account on first startup, and on
/// later startups updates its password when one is configured. Returns the
/// admin's user ID.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(config: &Config, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = match config.auth.admin_password.as_deref() {
        Some(pwd) => Some(password::hash_string(pwd).map_err(|e| anyhow::anyhow!("hash admin password: {e}"))?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing) = user_repo
        .get_by_username(&config.auth.admin_username)
        .await
        .map_err(|e| anyhow::anyhow!("check existing admin user: {e}"))?
    {
        if let Some(hash) = password_hash {
            user_repo
                .update_password_hash(existing.id, &hash)
                .await
                .map_err(|e| anyhow::anyhow!("update admin password: {e}"))?;
        }
        tx.commit().await?;
        return Ok(existing.id);
    }

    let created = user_repo
        .create(&UserCreateDBRequest {
            username: config.auth.admin_username.clone(),
            email: config.auth.admin_email.clone(),
            password_hash,
            role: Role::Admin,
            is_active: true,
        })
        .await
        .map_err(|e| anyhow::anyhow!("create admin user: {e}"))?;

    tx.commit().await?;
    info!("Created initial admin user {}", created.username);
    Ok(created.id)
}

/// Build the main application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> Router {
    // Authentication routes at root level
    let auth_routes = Router::new()
        .route(
            "/authentication/register",
            get(api::handlers::auth::get_registration_info).post(api::handlers::auth::register),
        )
        .route("/authentication/login", post(api::handlers::auth::login))
        .route("/authentication/logout", post(api::handlers::auth::logout))
        .route("/authentication/password-change", post(api::handlers::auth::change_password))
        .route("/authentication/delete-account", post(api::handlers::auth::delete_account))
        .with_state(state.clone());

    // API routes
    let api_routes = Router::new()
        // Prediction scoring and history
        .route(
            "/predictions",
            post(api::handlers::predictions::create_prediction).get(api::handlers::predictions::history),
        )
        .route("/predictions/import", post(api::handlers::predictions::import_csv))
        .route("/predictions/export", get(api::handlers::predictions::export_csv))
        .route("/predictions/email-report", post(api::handlers::predictions::email_report))
        .route(
            "/predictions/{id}",
            get(api::handlers::predictions::get_prediction).delete(api::handlers::predictions::delete_prediction),
        )
        .route("/predictions/{id}/email", post(api::handlers::predictions::email_prediction))
        // Stats and model metrics
        .route("/stats", get(api::handlers::predictions::stats))
        .route("/stats/monthly-trend", get(api::handlers::predictions::monthly_trend))
        .route("/model/metrics", get(api::handlers::predictions::model_metrics))
        // Admin surface
        .route("/admin/overview", get(api::handlers::admin::overview))
        .route(
            "/admin/users",
            get(api::handlers::admin::list_users).post(api::handlers::admin::create_user),
        )
        .route(
            "/admin/users/{id}",
            get(api::handlers::admin::get_user).delete(api::handlers::admin::delete_user),
        )
        .route("/admin/users/{id}/activate", post(api::handlers::admin::activate_user))
        .route("/admin/users/{id}/deactivate", post(api::handlers::admin::deactivate_user))
        .route("/admin/trends", get(api::handlers::admin::daily_trends))
        .route("/admin/user-activity", get(api::handlers::admin::user_activity))
        .route("/admin/model-metrics/refresh", post(api::handlers::admin::refresh_model_metrics))
        .with_state(state);

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(auth_routes)
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, loads the model artifacts, and ensures the admin user exists
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles requests
///    until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await?;
        migrator().run(&pool).await?;

        create_initial_admin_user(&config, &pool).await?;

        let classifier = ChurnModel::load(&config.model.model_path, &config.model.scaler_path)?;
        let email = EmailService::new(&config)?;

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .classifier(Arc::new(classifier))
            .email(Arc::new(email))
            .build();

        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("churnctl listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::create_initial_admin_user;
    use crate::db::handlers::{Repository, Users};
    use crate::test_utils::test_config;
    use sqlx::PgPool;

    #[test_log::test(sqlx::test)]
    async fn initial_admin_user_is_idempotent(pool: PgPool) {
        let mut config = test_config();
        config.auth.admin_username = "admin".to_string();
        config.auth.admin_email = "admin@example.com".to_string();
        config.auth.admin_password = Some("first-password".to_string());

        let id = create_initial_admin_user(&config, &pool).await.unwrap();
        let again = create_initial_admin_user(&config, &pool).await.unwrap();
        assert_eq!(id, again);

        let mut conn = pool.acquire().await.unwrap();
        let mut users = Users::new(&mut conn);
        let admin = users.get_by_id(id).await.unwrap().unwrap();
        assert!(admin.is_admin());
        assert!(admin.is_active);
        assert_eq!(admin.email, "admin@example.com");
    }

    #[test_log::test(sqlx::test)]
    async fn healthz_is_public(pool: PgPool) {
        let server = crate::test_utils::create_test_app(pool).await;
        let response = server.get("/healthz").await;
        assert_eq!(response.status_code().as_u16(), 200);
        assert_eq!(response.text(), "OK");
    }
}
