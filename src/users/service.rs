use std::sync::Arc;

use axum::extract::FromRef;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{hash_password, verify_password, JwtKeys},
    config::MAX_TTL_MINUTES,
    error::AppError,
    mail::{reset_link, Mailer, ResetEmail},
    state::AppState,
    users::{
        dto::{
            normalize_email, AuthResponse, LoginRequest, PublicUser, RegisterRequest,
            UpdateUserRequest, UserSummary,
        },
        repo::UserStore,
        repo_types::{NewUser, ProfileChanges, Role},
    },
};

const NOT_FOUND: &str = "Could not find a user for the provided email.";
const BAD_CREDENTIALS: &str = "Invalid credentials, could not log you in.";
const BAD_RESET: &str = "Invalid or expired reset link.";

/// Account lifecycle: registration, login, role and profile management,
/// and the forgot/reset password flow.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    keys: JwtKeys,
    frontend_origin: String,
    reset_ttl: Duration,
    mail_from: String,
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            mailer: Arc::clone(&state.mailer),
            keys: JwtKeys::from_ref(state),
            frontend_origin: state.config.reset.frontend_origin.clone(),
            reset_ttl: Duration::minutes(state.config.reset.ttl_minutes.clamp(1, MAX_TTL_MINUTES)),
            mail_from: state.config.mail.from.clone(),
        }
    }
}

impl AccountService {
    pub async fn list_users(&self) -> Result<Vec<PublicUser>, AppError> {
        let users = self.store.list().await?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    pub async fn register(&self, payload: RegisterRequest) -> Result<AuthResponse, AppError> {
        let payload = payload.validate()?;

        if self.store.find_by_email(&payload.email).await?.is_some() {
            warn!(email = %payload.email, "email already registered");
            return Err(AppError::Conflict(
                "User exists already, please login instead.".into(),
            ));
        }

        let password_hash = hash_password(&payload.password).map_err(|e| {
            error!(error = %e, "hash_password failed");
            AppError::internal(e)
        })?;

        let user = self
            .store
            .insert(NewUser {
                first_name: payload.first_name,
                last_name: payload.last_name,
                email: payload.email,
                phone: payload.phone,
                password_hash,
            })
            .await?;

        let token = self.sign(user.user_id, &user.email)?;

        info!(user_id = %user.user_id, email = %user.email, "user registered");
        Ok(AuthResponse {
            user_id: user.user_id,
            email: user.email,
            token,
            role: user.role,
        })
    }

    pub async fn login(&self, payload: LoginRequest) -> Result<AuthResponse, AppError> {
        let email = normalize_email(&payload.email)?;

        let Some(user) = self.store.find_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AppError::Auth(BAD_CREDENTIALS.into()));
        };

        let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
            error!(error = %e, user_id = %user.user_id, "verify_password failed");
            AppError::internal(e)
        })?;

        if !ok {
            warn!(email = %email, user_id = %user.user_id, "login invalid password");
            return Err(AppError::Auth(BAD_CREDENTIALS.into()));
        }

        let token = self.sign(user.user_id, &user.email)?;

        info!(user_id = %user.user_id, email = %user.email, "user logged in");
        Ok(AuthResponse {
            user_id: user.user_id,
            email: user.email,
            token,
            role: user.role,
        })
    }

    pub async fn change_role(&self, email: &str, role: &str) -> Result<UserSummary, AppError> {
        let email = normalize_email(email)?;
        let role = role
            .parse::<Role>()
            .map_err(|e| AppError::validation(e.to_string()))?;

        let user = self
            .store
            .set_role(&email, role)
            .await?
            .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;

        info!(user_id = %user.user_id, role = %user.role, "role changed");
        Ok(UserSummary::from(&user))
    }

    pub async fn delete_by_email(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email)?;
        if !self.store.delete_by_email(&email).await? {
            return Err(AppError::NotFound(NOT_FOUND.into()));
        }
        info!(email = %email, "user deleted");
        Ok(())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<PublicUser, AppError> {
        let email = normalize_email(email)?;
        self.store
            .find_by_email(&email)
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
    }

    pub async fn update_by_email(
        &self,
        email: &str,
        payload: UpdateUserRequest,
    ) -> Result<UserSummary, AppError> {
        let email = normalize_email(email)?;
        let payload = payload.validate()?;

        let password_hash = match payload.password.as_deref() {
            Some(plain) => Some(hash_password(plain).map_err(|e| {
                error!(error = %e, "hash_password failed");
                AppError::internal(e)
            })?),
            None => None,
        };
        let password_changed = password_hash.is_some();

        let user = self
            .store
            .update_profile(
                &email,
                ProfileChanges {
                    first_name: payload.first_name,
                    last_name: payload.last_name,
                    phone: payload.phone,
                    password_hash,
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;

        info!(user_id = %user.user_id, password_changed, "user updated");
        Ok(UserSummary::from(&user))
    }

    /// Stores a fresh reset id and mails the link. Mail delivery runs detached;
    /// its outcome never reaches the caller.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email)?;

        if self.store.find_by_email(&email).await?.is_none() {
            warn!(email = %email, "forgot password for unknown email");
            return Err(AppError::NotFound(NOT_FOUND.into()));
        }

        let reset_id = Uuid::new_v4();
        let expires_at = OffsetDateTime::now_utc()
            .checked_add(self.reset_ttl)
            .ok_or_else(|| AppError::internal(anyhow::anyhow!("reset expiry out of range")))?;
        let link = reset_link(&self.frontend_origin, reset_id, &email).map_err(|e| {
            error!(error = %e, "reset link could not be built");
            AppError::internal(e)
        })?;

        if !self.store.set_reset(&email, reset_id, expires_at).await? {
            return Err(AppError::NotFound(NOT_FOUND.into()));
        }

        let mail = ResetEmail::new(&email, &self.mail_from, &link);
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&mail).await {
                warn!(error = %e, to = %mail.to, "reset mail delivery failed");
            }
        });

        info!(email = %email, %expires_at, "password reset requested");
        Ok(())
    }

    pub async fn reset_password(
        &self,
        email: &str,
        reset_id: &str,
        new_password: &str,
    ) -> Result<UserSummary, AppError> {
        let email = normalize_email(email)?;
        if new_password.is_empty() {
            return Err(AppError::validation("newPassword is required"));
        }
        let Ok(reset_id) = Uuid::parse_str(reset_id) else {
            warn!(email = %email, "malformed reset id");
            return Err(AppError::Auth(BAD_RESET.into()));
        };

        let now = OffsetDateTime::now_utc();
        let pending = self
            .store
            .find_by_email(&email)
            .await?
            .and_then(|u| u.reset);
        if !pending.is_some_and(|p| p.accepts(reset_id, now)) {
            warn!(email = %email, "reset id mismatch or expired");
            return Err(AppError::Auth(BAD_RESET.into()));
        }

        let password_hash = hash_password(new_password).map_err(|e| {
            error!(error = %e, "hash_password failed");
            AppError::internal(e)
        })?;

        // Conditional on the reset id still being pending, so it is single-use.
        let Some(user) = self
            .store
            .consume_reset(&email, reset_id, now, &password_hash)
            .await?
        else {
            warn!(email = %email, "reset id consumed concurrently");
            return Err(AppError::Auth(BAD_RESET.into()));
        };

        info!(user_id = %user.user_id, "password reset");
        Ok(UserSummary::from(&user))
    }

    fn sign(&self, user_id: Uuid, email: &str) -> Result<String, AppError> {
        self.keys.sign(user_id, email).map_err(|e| {
            error!(error = %e, "jwt sign failed");
            AppError::internal(e)
        })
    }
}
