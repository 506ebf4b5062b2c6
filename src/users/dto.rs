use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::AppError,
    users::repo_types::{Role, User},
};

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trim + lowercase, then check the shape.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    Ok(email)
}

fn required(field: &str, value: String) -> Result<String, AppError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value)
}

fn optional(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    value.map(|v| required(field, v)).transpose()
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<Self, AppError> {
        let password = self.password;
        if password.is_empty() {
            return Err(AppError::validation("password is required"));
        }
        Ok(Self {
            first_name: required("firstName", self.first_name)?,
            last_name: required("lastName", self.last_name)?,
            email: normalize_email(&self.email)?,
            phone: required("phone", self.phone)?,
            password,
        })
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial profile update. Absent fields stay as they are.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(self) -> Result<Self, AppError> {
        if self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.password.is_none()
        {
            return Err(AppError::validation("Nothing to update"));
        }
        if matches!(self.password.as_deref(), Some("")) {
            return Err(AppError::validation("password must not be empty"));
        }
        Ok(Self {
            first_name: optional("firstName", self.first_name)?,
            last_name: optional("lastName", self.last_name)?,
            phone: optional("phone", self.phone)?,
            password: self.password,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(alias = "formPW")]
    pub new_password: String,
}

/// Returned by register and login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
    pub role: Role,
}

/// Identifiers returned by role change, update and reset.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email.clone(),
            role: u.role,
        }
    }
}

/// Outward view of an account: no hash, no reset state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            phone: u.phone,
            role: u.role,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<PublicUser>,
}
