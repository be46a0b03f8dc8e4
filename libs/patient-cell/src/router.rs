// libs/patient-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn patient_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/available-slots", get(handlers::get_available_slots))
        .route("/appointments", post(handlers::book_appointment))
        .route("/appointments", get(handlers::get_appointments))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/prescriptions", get(handlers::get_prescriptions))
        .route("/medical-history", get(handlers::get_medical_history))
        .route("/profile", get(handlers::get_profile))
        .route("/profile", put(handlers::update_profile))
        .route("/change-password", put(handlers::change_password))
        .route("/notifications", put(handlers::update_notifications))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
