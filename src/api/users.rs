//! User and technician listing, account creation.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::auth::hash_password;
use crate::db::{CreateUserRequest, ListUsersQuery, NewUser, Role, User, UserResponse};
use crate::AppState;

use super::auth::CurrentUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{ApiJson, ApiQuery};
use super::validation::parse_new_user;

/// `GET /users?role=`
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    user.require(Role::can_manage_users)?;

    let role = match query.role.as_deref() {
        Some(r) => {
            let mut errors = ValidationErrorBuilder::new();
            let role = errors.check("role", r.parse::<Role>());
            errors.finish()?;
            role
        }
        None => None,
    };

    let users = User::list(&state.db, role).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// `GET /technicians`
pub async fn list_technicians(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let technicians = User::list(&state.db, Some(Role::Technician)).await?;
    Ok(Json(technicians.into_iter().map(UserResponse::from).collect()))
}

/// `POST /users`
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    user.require(Role::can_manage_users)?;
    let payload = parse_new_user(request)?;

    // Only a superadmin may hand out superadmin
    if payload.role == Role::Superadmin && user.role != Role::Superadmin {
        tracing::warn!(user_id = %user.id, "Attempt to create a superadmin");
        return Err(ApiError::forbidden());
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::server_error()
    })?;

    let created = User::create(
        &state.db,
        &NewUser {
            name: payload.name,
            email: payload.email,
            password_hash,
            role: payload.role,
            level: payload.level,
            picture_url: payload.picture_url,
            break_times: payload.break_times,
        },
    )
    .await?;

    tracing::info!(
        user_id = %created.id,
        role = %created.role,
        created_by = %user.id,
        "Created user"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}
