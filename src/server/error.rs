//! Error types for the server

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use super::views::{self, PageContext};
use crate::error::BmiError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Core(#[from] BmiError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = match &self {
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                "An internal error occurred"
            }
            ServerError::Core(e) => {
                tracing::error!(detail = %e, "Request failed");
                "An internal error occurred"
            }
        };

        let ctx = PageContext { user: None, flashes: &[] };
        (StatusCode::INTERNAL_SERVER_ERROR, Html(views::error(&ctx, message))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_are_not_leaked() {
        let err: ServerError = BmiError::DataError("secret path /etc/x".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
