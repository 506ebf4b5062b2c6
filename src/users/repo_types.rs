use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Client,
    Counselor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "Client",
            Role::Counselor => "Counselor",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    // Case-insensitive so `/role/admin` and `/role/Admin` both work.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "counselor" => Ok(Role::Counselor),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Row as stored in `users`.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: String,
    pub reset_id: Option<Uuid>,
    pub reset_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Account record. Not `Serialize`; outward payloads go through `dto::PublicUser`.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub reset: Option<PendingReset>,
    pub created_at: OffsetDateTime,
}

/// Outstanding forgot-password request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReset {
    pub reset_id: Uuid,
    pub expires_at: OffsetDateTime,
}

impl PendingReset {
    pub fn accepts(&self, presented: Uuid, now: OffsetDateTime) -> bool {
        self.reset_id == presented && now < self.expires_at
    }
}

impl TryFrom<UserRow> for User {
    type Error = UnknownRole;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let reset = match (r.reset_id, r.reset_expires_at) {
            (Some(reset_id), Some(expires_at)) => Some(PendingReset {
                reset_id,
                expires_at,
            }),
            _ => None,
        };
        Ok(Self {
            user_id: r.user_id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            phone: r.phone,
            password_hash: r.password_hash,
            role: r.role.parse()?,
            reset,
            created_at: r.created_at,
        })
    }
}

/// Fields for a fresh account; `password_hash` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}
