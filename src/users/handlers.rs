use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::AppError,
    state::AppState,
    users::{
        dto::{
            AuthResponse, LoginRequest, PublicUser, RegisterRequest, ResetPasswordRequest,
            UpdateUserRequest, UserSummary, UsersResponse,
        },
        service::AccountService,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route(
            "/users/:email",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/users/:email/role/:role", patch(change_role))
        .route("/users/:email/forgot", post(forgot_password))
        .route("/users/:email/reset/:reset_id", post(reset_password))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::validation(format!("Invalid inputs passed: {}", e.body_text())))
}

#[instrument(skip(svc))]
pub async fn list_users(
    State(svc): State<AccountService>,
) -> Result<Json<UsersResponse>, AppError> {
    let users = svc.list_users().await?;
    Ok(Json(UsersResponse { users }))
}

#[instrument(skip(svc, payload))]
pub async fn register(
    State(svc): State<AccountService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let res = svc.register(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(svc, payload))]
pub async fn login(
    State(svc): State<AccountService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(svc.login(body(payload)?).await?))
}

#[instrument(skip(svc))]
pub async fn change_role(
    State(svc): State<AccountService>,
    Path((email, role)): Path<(String, String)>,
) -> Result<Json<UserSummary>, AppError> {
    Ok(Json(svc.change_role(&email, &role).await?))
}

#[instrument(skip(svc))]
pub async fn delete_user(
    State(svc): State<AccountService>,
    Path(email): Path<String>,
) -> Result<StatusCode, AppError> {
    svc.delete_by_email(&email).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(svc))]
pub async fn get_user(
    State(svc): State<AccountService>,
    Path(email): Path<String>,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(svc.find_by_email(&email).await?))
}

#[instrument(skip(svc, payload))]
pub async fn update_user(
    State(svc): State<AccountService>,
    Path(email): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserSummary>, AppError> {
    Ok(Json(svc.update_by_email(&email, body(payload)?).await?))
}

#[instrument(skip(svc))]
pub async fn forgot_password(
    State(svc): State<AccountService>,
    Path(email): Path<String>,
) -> Result<StatusCode, AppError> {
    svc.forgot_password(&email).await?;
    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(svc, payload, reset_id))]
pub async fn reset_password(
    State(svc): State<AccountService>,
    Path((email, reset_id)): Path<(String, String)>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<UserSummary>, AppError> {
    let req = body(payload)?;
    Ok(Json(
        svc.reset_password(&email, &reset_id, &req.new_password)
            .await?,
    ))
}
