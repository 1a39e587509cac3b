use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use policy::PolicyError;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{debug, error};

use crate::views::{Nav, error_page, redirect};

/// Errors a handler can end with. Each variant knows how it is shown.
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Template rendering failed
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Business rule rejected the request
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// The requested record does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Anything else that should never reach the user in detail
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Policy(PolicyError::NotPermitted { .. }) => {
                debug!("{}", self);
                redirect("/")
            }
            AppError::Policy(ref e) => {
                debug!("{}", e);
                error_page(StatusCode::BAD_REQUEST, &Nav::anonymous(), &e.to_string())
            }
            AppError::NotFound(ref what) => {
                debug!("{} not found", what);
                error_page(
                    StatusCode::NOT_FOUND,
                    &Nav::anonymous(),
                    &format!("{what} could not be found."),
                )
            }
            AppError::Database(_) | AppError::Template(_) | AppError::Internal(_) => {
                error!("{}", self);
                error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &Nav::anonymous(),
                    "Something went wrong while processing your request. Please try again.",
                )
            }
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
