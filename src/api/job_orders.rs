//! Job order endpoints, including the end-of-day carry-over.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::db::{
    parse_date, CreateJobOrderRequest, EndOfDayRequest, EndOfDayResponse, JobOrder,
    JobOrderResponse, JobStatus, ListJobOrdersQuery, Role, UpdateJobOrderRequest,
};
use crate::engine::run_end_of_day;
use crate::AppState;

use super::auth::CurrentUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::validation::{parse_date_filter, parse_job_order_changes, parse_new_job_order};

/// `GET /job-orders?date=&status=&carriedOver=`
pub async fn list_job_orders(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<ListJobOrdersQuery>,
) -> Result<Json<Vec<JobOrderResponse>>, ApiError> {
    let date = parse_date_filter(query.date)?;
    let status = match query.status.as_deref() {
        Some(s) => {
            let mut errors = ValidationErrorBuilder::new();
            let status = errors.check("status", s.parse::<JobStatus>());
            errors.finish()?;
            status.map(|s| s.as_str().to_string())
        }
        None => None,
    };

    let filter = ListJobOrdersQuery {
        date,
        status,
        carried_over: query.carried_over,
    };
    let jobs = JobOrder::list(&state.db, &filter).await?;
    Ok(Json(jobs.into_iter().map(JobOrderResponse::from).collect()))
}

/// `GET /job-orders/:id`
pub async fn get_job_order(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<JobOrderResponse>, ApiError> {
    let job = JobOrder::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job order not found"))?;

    Ok(Json(JobOrderResponse::from(job)))
}

/// `POST /job-orders`
pub async fn create_job_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateJobOrderRequest>,
) -> Result<(StatusCode, Json<JobOrderResponse>), ApiError> {
    user.require(Role::can_manage_job_orders)?;
    let new = parse_new_job_order(request)?;

    let job = JobOrder::create(&state.db, &new, &user.id).await?;

    tracing::info!(
        job_order_id = %job.id,
        job_number = %job.job_number,
        date = %job.date,
        "Created job order"
    );

    Ok((StatusCode::CREATED, Json(JobOrderResponse::from(job))))
}

/// `PUT /job-orders/:id`
pub async fn update_job_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateJobOrderRequest>,
) -> Result<Json<JobOrderResponse>, ApiError> {
    user.require(Role::can_manage_job_orders)?;
    let changes = parse_job_order_changes(request)?;

    let job = JobOrder::update(&state.db, &id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Job order not found"))?;

    Ok(Json(JobOrderResponse::from(job)))
}

/// `DELETE /job-orders/:id`
pub async fn delete_job_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    user.require(Role::can_manage_job_orders)?;

    if !JobOrder::delete(&state.db, &id).await? {
        return Err(ApiError::not_found("Job order not found"));
    }

    tracing::info!(job_order_id = %id, deleted_by = %user.id, "Deleted job order");

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /job-orders/end-of-day`
///
/// The body is optional; without a `date` the server's local date is closed.
pub async fn end_of_day(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Bytes,
) -> Result<Json<EndOfDayResponse>, ApiError> {
    user.require(Role::can_run_end_of_day)?;

    let request: EndOfDayRequest = if body.iter().all(u8::is_ascii_whitespace) {
        EndOfDayRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            let mut errors = ValidationErrorBuilder::new();
            errors.add("body", e.to_string());
            errors.build().unwrap_or_else(ApiError::server_error)
        })?
    };

    let date = match request.date.as_deref() {
        Some(d) => {
            let mut errors = ValidationErrorBuilder::new();
            let date = errors.check("date", parse_date(d));
            errors.finish()?;
            date
        }
        None => None,
    }
    .unwrap_or_else(|| chrono::Local::now().date_naive());

    let result = run_end_of_day(&state.db, date, &user.id).await?;
    Ok(Json(result))
}
