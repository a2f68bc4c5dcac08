//! OpenAPI documentation for the REST API, served at `/docs`.

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::api;

/// Session cookie security scheme.
struct SessionSecurityAddon;

impl Modify for SessionSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "session".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "churnctl_session",
                    "JWT session cookie set by the login endpoint",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "churnctl API",
        description = "Customer churn prediction service: score customers against a \
            logistic regression model, manage prediction history, and run bulk CSV imports."
    ),
    modifiers(&SessionSecurityAddon),
    paths(
        // Authentication
        api::handlers::auth::get_registration_info,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::change_password,
        api::handlers::auth::delete_account,
        // Predictions
        api::handlers::predictions::create_prediction,
        api::handlers::predictions::history,
        api::handlers::predictions::get_prediction,
        api::handlers::predictions::delete_prediction,
        api::handlers::predictions::import_csv,
        api::handlers::predictions::export_csv,
        api::handlers::predictions::email_prediction,
        api::handlers::predictions::email_report,
        api::handlers::predictions::stats,
        api::handlers::predictions::monthly_trend,
        api::handlers::predictions::model_metrics,
        // Admin
        api::handlers::admin::overview,
        api::handlers::admin::list_users,
        api::handlers::admin::create_user,
        api::handlers::admin::get_user,
        api::handlers::admin::activate_user,
        api::handlers::admin::deactivate_user,
        api::handlers::admin::delete_user,
        api::handlers::admin::daily_trends,
        api::handlers::admin::user_activity,
        api::handlers::admin::refresh_model_metrics,
    ),
    components(schemas(
        api::models::auth::RegistrationInfo,
        api::models::auth::RegisterRequest,
        api::models::auth::LoginRequest,
        api::models::auth::AuthResponse,
        api::models::auth::AuthSuccessResponse,
        api::models::auth::PasswordChangeRequest,
        api::models::auth::DeleteAccountRequest,
        api::models::users::Role,
        api::models::users::UserCreate,
        api::models::users::UserResponse,
        api::models::users::UserDetailResponse,
        api::models::users::CurrentUser,
        api::models::predictions::PredictionCreate,
        api::models::predictions::PredictionResponse,
        api::models::predictions::HistoryResponse,
        api::models::predictions::ImportResponse,
        api::models::predictions::EmailReportRequest,
        api::models::stats::PredictionStatsResponse,
        api::models::stats::MonthlyTrendPoint,
        api::models::stats::DailyTrendPoint,
        api::models::stats::ModelMetricsResponse,
        api::models::stats::AdminOverviewResponse,
        api::models::stats::UserActivityResponse,
        crate::import::RowReport,
        crate::import::RowStatus,
    )),
    tags(
        (name = "authentication", description = "Account registration and session management"),
        (name = "predictions", description = "Churn scoring, history, import/export, and reports"),
        (name = "stats", description = "Per-user aggregates and model metrics"),
        (name = "admin", description = "User management and system analytics"),
    )
)]
pub struct ApiDoc;
