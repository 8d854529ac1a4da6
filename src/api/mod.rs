mod appointments;
pub mod auth;
pub mod error;
pub mod extract;
mod job_orders;
mod users;
pub mod validation;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub use error::ApiError;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/login", post(auth::login));

    // Everything else requires a valid session token
    let protected_routes = Router::new()
        // Session
        .route("/session", get(auth::session))
        .route("/refresh", post(auth::refresh))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/technicians", get(users::list_technicians))
        // Appointments
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/appointments/delete-all-no-show",
            delete(appointments::delete_all_no_show),
        )
        .route(
            "/appointments/:id",
            get(appointments::get_appointment)
                .put(appointments::update_appointment)
                .delete(appointments::delete_appointment),
        )
        .route("/appointments/:id/no-show", patch(appointments::set_no_show))
        // Job orders
        .route(
            "/job-orders",
            get(job_orders::list_job_orders).post(job_orders::create_job_order),
        )
        .route("/job-orders/end-of-day", post(job_orders::end_of_day))
        .route(
            "/job-orders/:id",
            get(job_orders::get_job_order)
                .put(job_orders::update_job_order)
                .delete(job_orders::delete_job_order),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(error::route_not_found)
        .method_not_allowed_fallback(error::method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
