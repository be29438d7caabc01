//! Shared error type across meterline crates.
//!
//! Every failure an application handler can raise is one of the `AppError`
//! variants. Status code, exception kind and client code are resolved from
//! the variant itself, so observers (request instrumentation, the error
//! boundary) read them from an [`ErrorReport`] instead of inspecting
//! messages after the fact.

use serde::Serialize;
use thiserror::Error;

use crate::classify;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCode {
    /// Resource does not exist.
    NotFound,
    /// Invalid input / malformed request.
    BadRequest,
    /// Resource already exists.
    Conflict,
    /// Operation not implemented.
    NotImplemented,
    /// Auth failed.
    Unauthorized,
    /// Operation or upstream timed out.
    Timeout,
    /// Upstream dependency failed.
    Upstream,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Conflict => "CONFLICT",
            ClientCode::NotImplemented => "NOT_IMPLEMENTED",
            ClientCode::Unauthorized => "UNAUTHORIZED",
            ClientCode::Timeout => "TIMEOUT",
            ClientCode::Upstream => "UPSTREAM",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not implemented: {0}")]
    Unimplemented(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("timeout: {message}")]
    Timeout { message: String, status: Option<u16> },
    #[error("external service failed: {message}")]
    ExternalService { message: String, status: Option<u16> },
    #[error("validation failed: {message}")]
    ProviderValidation { message: String, status: Option<u16> },
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code carried by the error value itself, if any.
    pub fn explicit_status(&self) -> Option<u16> {
        match self {
            AppError::Timeout { status, .. }
            | AppError::ExternalService { status, .. }
            | AppError::ProviderValidation { status, .. } => *status,
            AppError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Mapped HTTP status for the variant.
    pub fn status(&self) -> u16 {
        if let Some(s) = self.explicit_status() {
            return s;
        }
        match self {
            AppError::NotFound(_) => 404,
            AppError::InvalidArgument(_)
            | AppError::InvalidRequest(_)
            | AppError::ProviderValidation { .. } => 400,
            AppError::AlreadyExists(_) => 409,
            AppError::Unimplemented(_) => 501,
            AppError::Unauthorized(_) => 401,
            AppError::Timeout { .. } => 408,
            AppError::Http { status, .. } => *status,
            AppError::ExternalService { .. } | AppError::Config(_) | AppError::Internal(_) => 500,
        }
    }

    /// Exception-kind label used by `http_exceptions_total`.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NotFoundError",
            AppError::InvalidArgument(_) => "InvalidArgumentError",
            AppError::InvalidRequest(_) => "InvalidRequestError",
            AppError::AlreadyExists(_) => "AlreadyExistsError",
            AppError::Unimplemented(_) => "UnimplementedError",
            AppError::Unauthorized(_) => "AuthorizationError",
            AppError::Timeout { .. } => "TimeoutError",
            AppError::ExternalService { .. } => "ExternalServiceError",
            AppError::ProviderValidation { .. } => "ValidationError",
            AppError::Http { .. } => "HttpError",
            AppError::Config(_) => "ConfigError",
            AppError::Internal(msg) => classify::classify_message(msg),
        }
    }

    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            AppError::NotFound(_) => ClientCode::NotFound,
            AppError::InvalidArgument(_)
            | AppError::InvalidRequest(_)
            | AppError::ProviderValidation { .. } => ClientCode::BadRequest,
            AppError::AlreadyExists(_) => ClientCode::Conflict,
            AppError::Unimplemented(_) => ClientCode::NotImplemented,
            AppError::Unauthorized(_) => ClientCode::Unauthorized,
            AppError::Timeout { .. } => ClientCode::Timeout,
            AppError::ExternalService { .. } => ClientCode::Upstream,
            AppError::Http { status, .. } => classify::client_code_for_status(*status),
            AppError::Config(_) | AppError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Snapshot of everything an observer needs to know about this error.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            explicit_status: self.explicit_status(),
            status: self.status(),
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Classification of a raised error, resolved once where the error is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub explicit_status: Option<u16>,
    pub status: u16,
    pub kind: String,
    pub message: String,
}
