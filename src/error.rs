use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::users::repo::StoreError;

/// Every failure a request can end in. `into_response` is the single place
/// that turns them into HTTP.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    #[error("store failure: {0}")]
    Store(#[source] StoreError),

    #[error("internal failure: {0:#}")]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(e: impl Into<anyhow::Error>) -> Self {
        Self::Internal(e.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::Auth(_) => "auth",
            AppError::NotFound(_) => "not_found",
            AppError::Store(_) => "store",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => {
                AppError::Conflict("User exists already, please login instead.".into())
            }
            other => AppError::Store(other),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Store(_) | AppError::Internal(_) => {
                error!(error = %self, kind = self.kind(), "request failed");
                "Something went wrong, please try again later.".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                error: self.kind(),
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::validation("x").status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::Auth("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn duplicate_email_maps_to_conflict() {
        let err: AppError = StoreError::DuplicateEmail.into();
        assert!(matches!(err, AppError::Conflict(_)));
        let err: AppError = StoreError::InvalidRole("Root".into()).into();
        assert!(matches!(err, AppError::Store(_)));
    }

    #[tokio::test]
    async fn internal_details_are_not_exposed() {
        let (status, body) =
            body_json(AppError::internal(anyhow::anyhow!("argon2 exploded at $argon2id$"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal");
        assert!(!body["message"].as_str().unwrap().contains("argon2"));
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let (status, body) = body_json(AppError::NotFound("Could not find user.".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "Could not find user.");
    }
}
