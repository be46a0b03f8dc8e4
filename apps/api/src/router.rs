use std::sync::Arc;

use axum::{routing::get, Router};

use admin_cell::router::admin_routes;
use auth_cell::router::auth_routes;
use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let api_routes = Router::new()
        .merge(auth_routes(state.clone()))
        .nest("/patient", patient_routes(state.clone()))
        .nest("/doctor", doctor_routes(state.clone()))
        .nest("/admin", admin_routes(state.clone()));

    Router::new()
        .route("/", get(|| async { "Hospital Management System API is running!" }))
        .nest("/api", api_routes)
}
