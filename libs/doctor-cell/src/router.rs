// libs/doctor-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // The whole portal requires a valid session; role checks live in the
    // handlers because /all is readable by patients too.
    let protected_routes = Router::new()
        .route("/all", get(handlers::list_doctors))
        .route("/appointments", get(handlers::get_appointments))
        .route("/appointments/{appointment_id}", put(handlers::update_appointment))
        .route("/patients", get(handlers::get_patients))
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/prescribe-medication", post(handlers::prescribe_medication))
        .route("/prescriptions", get(handlers::get_prescriptions))
        .route("/profile", get(handlers::get_profile))
        .route("/profile", put(handlers::update_profile))
        .route("/change-password", put(handlers::change_password))
        .route("/notifications", put(handlers::update_notifications))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
