// libs/auth-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};
use shared_models::auth::TokenResponse;
use shared_models::error::AppError;
use shared_utils::jwt::validate_token as verify_jwt;

use crate::models::{LoginRequest, LoginResponse, RegisterRequest};

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth("Invalid authorization header format".to_string()));
    }

    Ok(auth_value[7..].to_string())
}

/// Best-effort extraction of the human-readable message GoTrue puts in
/// its error bodies.
fn auth_api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|parsed| {
            ["msg", "error_description", "message"]
                .iter()
                .find_map(|key| parsed[*key].as_str().map(String::from))
        })
        .unwrap_or_else(|| "Authentication service rejected the request".to_string())
}

/// Create the auth account, then the matching profile row. The profile
/// table is picked by role; admins are provisioned out of band.
#[axum::debug_handler]
pub async fn register(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    request.validate()?;
    debug!("Registering new {} account for {}", request.role, request.email);

    let client = SupabaseClient::new(&state);

    let profile_table = if request.role == "doctor" {
        "/rest/v1/doctors"
    } else {
        "/rest/v1/patients"
    };

    // Friendlier duplicate check; the auth provider still enforces
    // uniqueness if two registrations race.
    let existing_path = format!(
        "{}?email=eq.{}",
        profile_table,
        urlencoding::encode(&request.email)
    );
    let existing: Vec<Value> = client
        .request(Method::GET, &existing_path, None, None)
        .await
        .map_err(AppError::from)?;
    if !existing.is_empty() {
        return Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let signup_body = json!({
        "email": request.email,
        "password": request.password,
        "data": {
            "first_name": request.first_name,
            "last_name": request.last_name,
            "phone": request.phone,
            "role": request.role
        }
    });

    let signup: Value = client
        .request(Method::POST, "/auth/v1/signup", None, Some(signup_body))
        .await
        .map_err(|e| match e {
            DbError::Conflict(body) => AppError::Conflict(auth_api_message(&body)),
            DbError::Api { status: 400 | 422, body } => AppError::Validation(auth_api_message(&body)),
            other => AppError::ExternalService(other.to_string()),
        })?;

    let user_id = signup["user"]["id"]
        .as_str()
        .or_else(|| signup["id"].as_str())
        .ok_or_else(|| {
            AppError::ExternalService("Auth provider returned no user id".to_string())
        })?
        .to_string();
    let access_token = signup["access_token"].as_str();

    let now = chrono_now();
    let mut profile = json!({
        "id": user_id,
        "first_name": request.first_name,
        "last_name": request.last_name,
        "email": request.email,
        "phone": request.phone,
        "created_at": now,
        "updated_at": now
    });
    if request.role == "doctor" {
        // Placeholder until the doctor completes their profile.
        profile["specialty"] = json!("General Practice");
    }

    client
        .insert_returning(profile_table, access_token, profile)
        .await
        .map_err(AppError::from)?;

    info!("Registered {} account {}", request.role, user_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful",
            "user": {
                "id": user_id,
                "email": request.email,
                "role": request.role
            }
        })),
    ))
}

/// Exchange credentials for a session token via the auth provider.
#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    debug!("Login attempt for {}", request.email);

    let client = SupabaseClient::new(&state);

    let body = json!({
        "email": request.email,
        "password": request.password
    });

    let session: Value = client
        .request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(body),
        )
        .await
        .map_err(|e| match e {
            DbError::Unauthorized(_) | DbError::Api { status: 400, .. } => {
                AppError::Auth("Invalid email or password".to_string())
            }
            other => AppError::ExternalService(other.to_string()),
        })?;

    let token = session["access_token"]
        .as_str()
        .ok_or_else(|| AppError::ExternalService("Auth provider returned no token".to_string()))?
        .to_string();

    let role = session["user"]["user_metadata"]["role"]
        .as_str()
        .or_else(|| session["user"]["role"].as_str())
        .map(String::from);

    info!("Login successful for {}", request.email);

    Ok(Json(LoginResponse {
        token,
        role,
        user: session["user"].clone(),
    }))
}

/// Token introspection for clients that want to check a stored session.
#[axum::debug_handler]
pub async fn validate(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;

    match verify_jwt(&token, &config.supabase_jwt_secret) {
        Ok(user) => Ok(Json(TokenResponse {
            valid: true,
            user_id: user.id,
            email: user.email,
            role: user.role,
        })),
        Err(err) => Err(AppError::Auth(err)),
    }
}

fn chrono_now() -> String {
    chrono::Utc::now().to_rfc3339()
}
