//! Appointment booking endpoints.

use axum::{extract::State, http::StatusCode, Json};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::db::{
    Appointment, AppointmentChanges, AppointmentResponse, CreateAppointmentRequest,
    DeleteNoShowResponse, ListAppointmentsQuery, Role, SetNoShowRequest,
    UpdateAppointmentRequest, User,
};
use crate::AppState;

use super::auth::CurrentUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::validation::{
    parse_appointment_changes, parse_date_filter, parse_new_appointment,
};

/// Reject ids that do not belong to a user with the given role.
async fn require_role(
    db: &SqlitePool,
    field: &str,
    user_id: &str,
    role: Role,
) -> Result<(), ApiError> {
    let has_role = User::get_by_id(db, user_id)
        .await?
        .map(|u| u.role() == role)
        .unwrap_or(false);

    if !has_role {
        let mut errors = ValidationErrorBuilder::new();
        errors.add(field, format!("must reference a {}", role));
        errors.finish()?;
    }
    Ok(())
}

/// Technician and service advisor ids must point at accounts with those roles.
async fn require_staff(
    db: &SqlitePool,
    technician_id: Option<&str>,
    service_advisor_id: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(id) = technician_id {
        require_role(db, "technicianId", id, Role::Technician).await?;
    }
    if let Some(id) = service_advisor_id {
        require_role(db, "serviceAdvisorId", id, Role::ServiceAdvisor).await?;
    }
    Ok(())
}

/// `GET /appointments?date=&technicianId=&noShow=`
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<ListAppointmentsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, ApiError> {
    let filter = ListAppointmentsQuery {
        date: parse_date_filter(query.date)?,
        ..query
    };

    let appointments = Appointment::list(&state.db, &filter).await?;
    Ok(Json(
        appointments.into_iter().map(AppointmentResponse::from).collect(),
    ))
}

/// `GET /appointments/:id`
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment = Appointment::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    Ok(Json(AppointmentResponse::from(appointment)))
}

/// `POST /appointments`
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>), ApiError> {
    user.require(Role::can_book_appointments)?;
    let new = parse_new_appointment(request)?;
    require_staff(
        &state.db,
        Some(new.technician_id.as_str()),
        new.service_advisor_id.as_deref(),
    )
    .await?;

    let appointment = Appointment::create(&state.db, &new, &user.id).await?;

    tracing::info!(
        appointment_id = %appointment.id,
        date = %appointment.date,
        created_by = %user.id,
        "Booked appointment"
    );

    Ok((StatusCode::CREATED, Json(AppointmentResponse::from(appointment))))
}

/// `PUT /appointments/:id`
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateAppointmentRequest>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    user.require(Role::can_book_appointments)?;
    let changes = parse_appointment_changes(request)?;
    require_staff(
        &state.db,
        changes.technician_id.as_deref(),
        changes.service_advisor_id.as_deref(),
    )
    .await?;

    let appointment = Appointment::update(&state.db, &id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    Ok(Json(AppointmentResponse::from(appointment)))
}

/// `PATCH /appointments/:id/no-show`
pub async fn set_no_show(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<SetNoShowRequest>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    user.require(Role::can_book_appointments)?;

    let changes = AppointmentChanges {
        no_show: Some(request.no_show),
        ..Default::default()
    };
    let appointment = Appointment::update(&state.db, &id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    Ok(Json(AppointmentResponse::from(appointment)))
}

/// `DELETE /appointments/:id`
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    user.require(Role::can_book_appointments)?;

    if !Appointment::delete(&state.db, &id).await? {
        return Err(ApiError::not_found("Appointment not found"));
    }

    tracing::info!(appointment_id = %id, deleted_by = %user.id, "Deleted appointment");

    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /appointments/delete-all-no-show`
pub async fn delete_all_no_show(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<DeleteNoShowResponse>, ApiError> {
    user.require(Role::can_book_appointments)?;

    let deleted_count = Appointment::delete_all_no_show(&state.db).await?;

    tracing::info!(deleted_count, deleted_by = %user.id, "Deleted no-show appointments");

    Ok(Json(DeleteNoShowResponse { deleted_count }))
}
