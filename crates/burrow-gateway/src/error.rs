use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use burrow_core::StorageError;
use thiserror::Error;
use tracing::{error, warn};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("request body is empty")]
    EmptyBody,
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("access denied")]
    Unauthorized,
    #[error("failed to issue token: {0}")]
    TokenIssue(#[source] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::EmptyBody | AppError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::TokenIssue(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(err) => match err {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::Gone(_) => StatusCode::GONE,
                StorageError::Conflict(_) => StatusCode::CONFLICT,
                StorageError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedBody(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, "request failed");
            return status.into_response();
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("rejected request with invalid token");
        }

        (status, self.to_string()).into_response()
    }
}
