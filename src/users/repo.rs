use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, ProfileChanges, Role, User, UserRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("stored record has invalid role '{0}'")]
    InvalidRole(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistent account records, keyed by normalized email.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self) -> Result<Vec<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fails with `DuplicateEmail` when the email is taken.
    async fn insert(&self, new: NewUser) -> Result<User, StoreError>;

    async fn set_role(&self, email: &str, role: Role) -> Result<Option<User>, StoreError>;

    /// Returns `false` when no record matched.
    async fn delete_by_email(&self, email: &str) -> Result<bool, StoreError>;

    async fn update_profile(
        &self,
        email: &str,
        changes: ProfileChanges,
    ) -> Result<Option<User>, StoreError>;

    /// Replaces any outstanding reset. Returns `false` when no record matched.
    async fn set_reset(
        &self,
        email: &str,
        reset_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// Swaps the password hash and clears the reset state, but only while
    /// `reset_id` is still pending and unexpired at `now`.
    async fn consume_reset(
        &self,
        email: &str,
        reset_id: Uuid,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_user(row: UserRow) -> Result<User, StoreError> {
    User::try_from(row).map_err(|e| StoreError::InvalidRole(e.0))
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, first_name, last_name, email, phone, password_hash, role,
                   reset_id, reset_expires_at, created_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(into_user).collect()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, first_name, last_name, email, phone, password_hash, role,
                   reset_id, reset_expires_at, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (user_id, first_name, last_name, email, phone, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING user_id, first_name, last_name, email, phone, password_hash, role,
                      reset_id, reset_expires_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.password_hash)
        .bind(Role::default().as_str())
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;
        into_user(row)
    }

    async fn set_role(&self, email: &str, role: Role) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET role = $2
            WHERE email = $1
            RETURNING user_id, first_name, last_name, email, phone, password_hash, role,
                      reset_id, reset_expires_at, created_at
            "#,
        )
        .bind(email)
        .bind(role.as_str())
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn delete_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn update_profile(
        &self,
        email: &str,
        changes: ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET first_name    = COALESCE($2, first_name),
                   last_name     = COALESCE($3, last_name),
                   phone         = COALESCE($4, phone),
                   password_hash = COALESCE($5, password_hash)
             WHERE email = $1
            RETURNING user_id, first_name, last_name, email, phone, password_hash, role,
                      reset_id, reset_expires_at, created_at
            "#,
        )
        .bind(email)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.phone)
        .bind(changes.password_hash)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn set_reset(
        &self,
        email: &str,
        reset_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            "UPDATE users SET reset_id = $2, reset_expires_at = $3 WHERE email = $1",
        )
        .bind(email)
        .bind(reset_id)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn consume_reset(
        &self,
        email: &str,
        reset_id: Uuid,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET password_hash = $3, reset_id = NULL, reset_expires_at = NULL
             WHERE email = $1 AND reset_id = $2 AND reset_expires_at > $4
            RETURNING user_id, first_name, last_name, email, phone, password_hash, role,
                      reset_id, reset_expires_at, created_at
            "#,
        )
        .bind(email)
        .bind(reset_id)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }
}
