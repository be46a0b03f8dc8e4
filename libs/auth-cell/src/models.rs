// libs/auth-cell/src/models.rs
use regex::Regex;
use serde::{Deserialize, Serialize};

use shared_models::error::AppError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub role: String,
}

impl RegisterRequest {
    /// Boundary validation; everything here fails as 400 before the auth
    /// provider is contacted.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AppError::Validation(
                "First and last name are required".to_string(),
            ));
        }

        let email_pattern = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
        if !email_pattern.is_match(&self.email) {
            return Err(AppError::Validation("A valid email address is required".to_string()));
        }

        if self.password.len() < 6 {
            return Err(AppError::Validation(
                "Password must be at least 6 characters long".to_string(),
            ));
        }

        // Admin accounts are provisioned out of band, never self-registered.
        if self.role != "patient" && self.role != "doctor" {
            return Err(AppError::Validation(
                "Role must be either patient or doctor".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Option<String>,
    pub user: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            first_name: "Aoife".to_string(),
            last_name: "Byrne".to_string(),
            email: "aoife@example.com".to_string(),
            phone: None,
            password: "secret123".to_string(),
            role: "patient".to_string(),
        }
    }

    #[test]
    fn a_complete_registration_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn bad_emails_are_rejected() {
        for email in ["", "not-an-email", "a@b", "two words@example.com"] {
            let mut req = request();
            req.email = email.to_string();
            assert!(req.validate().is_err(), "email {:?}", email);
        }
    }

    #[test]
    fn short_passwords_are_rejected() {
        let mut req = request();
        req.password = "12345".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn admin_self_registration_is_rejected() {
        let mut req = request();
        req.role = "admin".to_string();
        assert!(req.validate().is_err());
    }
}
