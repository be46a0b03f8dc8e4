use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::error::AppError;

/// Storage-layer failures, split by the HTTP status PostgREST/GoTrue
/// returned so callers can react to each case. `Conflict` is the one
/// the booking transaction depends on: a violated unique constraint
/// comes back as 409 and must stay distinguishable from other errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("storage rejected credentials: {0}")]
    Unauthorized(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Unauthorized(msg) => AppError::Auth(msg),
            DbError::NotFound(msg) => AppError::NotFound(msg),
            DbError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Database(other.to_string()),
        }
    }
}

/// Thin HTTP client over the Supabase REST and auth APIs. Constructed
/// from `AppConfig` and passed into services explicitly; there is no
/// ambient connection state anywhere else in the workspace.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key).unwrap());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            );
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => DbError::Unauthorized(error_text),
                404 => DbError::NotFound(error_text),
                409 => DbError::Conflict(error_text),
                code => DbError::Api { status: code, body: error_text },
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Insert a row and return the created representation. PostgREST
    /// answers 409 when the row trips a unique constraint; that maps to
    /// `DbError::Conflict`, not a retry.
    pub async fn insert_returning(
        &self,
        table_path: &str,
        auth_token: Option<&str>,
        row: Value,
    ) -> Result<Vec<Value>, DbError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        self.request_with_headers(Method::POST, table_path, auth_token, Some(row), Some(headers))
            .await
    }

    /// Patch matching rows and return the updated representation.
    pub async fn update_returning(
        &self,
        table_path: &str,
        auth_token: Option<&str>,
        patch: Value,
    ) -> Result<Vec<Value>, DbError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        self.request_with_headers(Method::PATCH, table_path, auth_token, Some(patch), Some(headers))
            .await
    }

    /// Fetch the authenticated user's record from the auth API.
    pub async fn get_auth_user(&self, auth_token: &str) -> Result<Value, DbError> {
        self.request(Method::GET, "/auth/v1/user", Some(auth_token), None).await
    }

    /// Change the authenticated user's password through the auth API.
    pub async fn update_auth_password(
        &self,
        auth_token: &str,
        new_password: &str,
    ) -> Result<Value, DbError> {
        self.request(
            Method::PUT,
            "/auth/v1/user",
            Some(auth_token),
            Some(json!({ "password": new_password })),
        )
        .await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
