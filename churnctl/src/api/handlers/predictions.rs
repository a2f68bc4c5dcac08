use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::{
    api::models::{
        auth::AuthSuccessResponse,
        pagination::{resolve_page, HISTORY_PER_PAGE},
        predictions::{EmailReportRequest, HistoryQuery, HistoryResponse, ImportResponse, PredictionCreate, PredictionResponse},
        stats::{ModelMetricsResponse, MonthlyTrendPoint, PredictionStatsResponse},
        users::CurrentUser,
    },
    auth::require_owner_or_admin,
    db::{
        handlers::{model_metrics::ModelMetrics, predictions::PredictionFilter, Predictions, Repository},
        models::predictions::PredictionCreateDBRequest,
    },
    errors::Error,
    export, import,
    types::PredictionId,
    AppState,
};

/// Most recent records covered by a bulk email report.
const BULK_REPORT_LIMIT: i64 = 50;

/// Score a single customer and store the result
#[utoipa::path(
    post,
    path = "/api/v1/predictions",
    request_body = PredictionCreate,
    tag = "predictions",
    responses(
        (status = 201, description = "Prediction created", body = PredictionResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn create_prediction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<PredictionCreate>,
) -> Result<(StatusCode, Json<PredictionResponse>), Error> {
    let profile = request.profile();
    let outcome = state.classifier.predict(&profile);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Predictions::new(&mut conn);
    let db_request = PredictionCreateDBRequest::new(current_user.id, request.customer_name, profile, outcome);
    let record = repo.create(&db_request).await?;

    Ok((StatusCode::CREATED, Json(PredictionResponse::from(record))))
}

/// Paginated, filterable history of the caller's predictions
#[utoipa::path(
    get,
    path = "/api/v1/predictions",
    params(HistoryQuery),
    tag = "predictions",
    responses(
        (status = 200, description = "One page of history", body = HistoryResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, Error> {
    let (mut filter, warnings) = query.to_filter(current_user.id);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Predictions::new(&mut conn);

    let total_count = repo.count(&filter).await?;
    let (page, total_pages) = resolve_page(query.page(), total_count, HISTORY_PER_PAGE);

    filter.skip = (page - 1) * HISTORY_PER_PAGE;
    filter.limit = HISTORY_PER_PAGE;
    let records = repo.list(&filter).await?;

    Ok(Json(HistoryResponse {
        data: records.into_iter().map(PredictionResponse::from).collect(),
        page,
        total_pages,
        total_count,
        warnings,
    }))
}

/// Get a single prediction record
#[utoipa::path(
    get,
    path = "/api/v1/predictions/{id}",
    params(("id" = uuid::Uuid, Path, description = "Prediction record ID")),
    tag = "predictions",
    responses(
        (status = 200, description = "Prediction record", body = PredictionResponse),
        (status = 403, description = "Record belongs to another user"),
        (status = 404, description = "Record not found"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn get_prediction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<PredictionId>,
) -> Result<Json<PredictionResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Predictions::new(&mut conn);

    let record = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Prediction".to_string(),
        id: id.to_string(),
    })?;
    require_owner_or_admin(&current_user, record.user_id)?;

    Ok(Json(PredictionResponse::from(record)))
}

/// Delete a prediction record
#[utoipa::path(
    delete,
    path = "/api/v1/predictions/{id}",
    params(("id" = uuid::Uuid, Path, description = "Prediction record ID")),
    tag = "predictions",
    responses(
        (status = 204, description = "Record deleted"),
        (status = 403, description = "Record belongs to another user"),
        (status = 404, description = "Record not found"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn delete_prediction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<PredictionId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Predictions::new(&mut conn);

    let record = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Prediction".to_string(),
        id: id.to_string(),
    })?;
    require_owner_or_admin(&current_user, record.user_id)?;

    repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Bulk-score customers from an uploaded CSV file.
///
/// Row errors are isolated: each bad row is reported and skipped while the
/// good rows are committed together in one transaction.
#[utoipa::path(
    post,
    path = "/api/v1/predictions/import",
    request_body(content_type = "multipart/form-data"),
    tag = "predictions",
    responses(
        (status = 200, description = "Per-row import results", body = ImportResponse),
        (status = 400, description = "Missing, non-CSV, or unreadable file"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn import_csv(
    State(state): State<AppState>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, Error> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Invalid multipart request: {e}"),
    })? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(|e| Error::BadRequest {
                message: format!("Could not read uploaded file: {e}"),
            })?;
            upload = Some((filename, data.to_vec()));
            break;
        }
    }

    let (filename, data) = upload.ok_or(import::ImportError::MissingFile)?;
    import::validate_filename(&filename)?;

    let outcome = import::process_batch(&data, state.classifier.as_ref(), current_user.id)?;

    if !outcome.staged.is_empty() {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut repo = Predictions::new(&mut conn);
        repo.create_many(&outcome.staged).await?;
    }

    Ok(Json(ImportResponse {
        success_count: outcome.success_count,
        error_count: outcome.error_count,
        rows: outcome.rows,
    }))
}

/// Download the caller's full prediction history as CSV
#[utoipa::path(
    get,
    path = "/api/v1/predictions/export",
    tag = "predictions",
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn export_csv(State(state): State<AppState>, current_user: CurrentUser) -> Result<Response, Error> {
    let records = all_records_for(&state, &current_user).await?;
    let body = export::render_csv(&records)?;
    let filename = export::export_filename(Utc::now());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response())
}

/// Email a single prediction report
#[utoipa::path(
    post,
    path = "/api/v1/predictions/{id}/email",
    params(("id" = uuid::Uuid, Path, description = "Prediction record ID")),
    request_body = EmailReportRequest,
    tag = "predictions",
    responses(
        (status = 200, description = "Report sent", body = AuthSuccessResponse),
        (status = 400, description = "Invalid recipient address"),
        (status = 404, description = "Record not found"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn email_prediction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<PredictionId>,
    Json(request): Json<EmailReportRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    let record = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut repo = Predictions::new(&mut conn);
        repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
            resource: "Prediction".to_string(),
            id: id.to_string(),
        })?
    };
    require_owner_or_admin(&current_user, record.user_id)?;

    state.email.send_prediction_report(&request.recipient, &record).await?;

    Ok(Json(AuthSuccessResponse {
        message: format!("Report sent to {}", request.recipient),
    }))
}

/// Email a summary report over the caller's most recent predictions
#[utoipa::path(
    post,
    path = "/api/v1/predictions/email-report",
    request_body = EmailReportRequest,
    tag = "predictions",
    responses(
        (status = 200, description = "Report sent", body = AuthSuccessResponse),
        (status = 400, description = "Invalid recipient address or no records"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn email_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<EmailReportRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    let records = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut repo = Predictions::new(&mut conn);
        repo.list_recent(current_user.id, BULK_REPORT_LIMIT).await?
    };
    if records.is_empty() {
        return Err(Error::BadRequest {
            message: "No predictions to report".to_string(),
        });
    }

    state.email.send_bulk_report(&request.recipient, &records).await?;

    Ok(Json(AuthSuccessResponse {
        message: format!("Report sent to {}", request.recipient),
    }))
}

/// The caller's aggregate prediction stats
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "stats",
    responses(
        (status = 200, description = "Aggregate stats", body = PredictionStatsResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn stats(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<PredictionStatsResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Predictions::new(&mut conn);
    let stats = repo.stats_for_user(current_user.id).await?;

    Ok(Json(PredictionStatsResponse::from(stats)))
}

/// Monthly prediction counts over the trailing year
#[utoipa::path(
    get,
    path = "/api/v1/stats/monthly-trend",
    tag = "stats",
    responses(
        (status = 200, description = "Monthly buckets, oldest first", body = [MonthlyTrendPoint]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn monthly_trend(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<MonthlyTrendPoint>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Predictions::new(&mut conn);
    let rows = repo.monthly_trend(Some(current_user.id)).await?;

    Ok(Json(rows.into_iter().map(MonthlyTrendPoint::from).collect()))
}

/// Evaluation metrics of the deployed model
#[utoipa::path(
    get,
    path = "/api/v1/model/metrics",
    tag = "stats",
    responses(
        (status = 200, description = "Current model metrics", body = ModelMetricsResponse),
        (status = 404, description = "No metrics recorded"),
    ),
    security(("session" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn model_metrics(State(state): State<AppState>, _current_user: CurrentUser) -> Result<Json<ModelMetricsResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ModelMetrics::new(&mut conn);
    let row = repo.latest().await?.ok_or_else(|| Error::NotFound {
        resource: "Model metrics".to_string(),
        id: "latest".to_string(),
    })?;

    Ok(Json(ModelMetricsResponse::from(row)))
}

/// Every record the caller owns, newest first.
async fn all_records_for(
    state: &AppState,
    current_user: &CurrentUser,
) -> Result<Vec<crate::db::models::predictions::PredictionDBResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Predictions::new(&mut conn);

    let mut filter = PredictionFilter {
        user_id: Some(current_user.id),
        ..Default::default()
    };
    filter.limit = repo.count(&filter).await?.max(1);
    Ok(repo.list(&filter).await?)
}
