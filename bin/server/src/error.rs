//! Domain error types for server operations.
//!
//! `ServerError` is the context of the rootcause reports returned by
//! startup. `ApiError` is what HTTP handlers return; internal details are
//! logged and never sent to the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

/// Startup and wiring errors.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// Database connection failed.
    Database { details: String },
    /// Migrations failed.
    Migration { details: String },
    /// A collaborator could not be constructed.
    Component { component: &'static str, details: String },
    /// Binding or serving HTTP failed.
    Http { details: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {details}"),
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::Migration { details } => write!(f, "migration failed: {details}"),
            Self::Component { component, details } => {
                write!(f, "failed to initialize {component}: {details}")
            }
            Self::Http { details } => write!(f, "http server error: {details}"),
        }
    }
}

impl std::error::Error for ServerError {}

/// Errors returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The request was malformed.
    BadRequest { message: String },
    /// Something failed on our side.
    Internal { details: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest { message } => write!(f, "bad request: {message}"),
            Self::Internal { details } => write!(f, "internal error: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
            Self::Internal { details } => {
                tracing::error!(error = %details, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
