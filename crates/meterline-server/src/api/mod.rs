//! HTTP API surface: error mapping and account routes.

pub mod accounts;
pub mod error;

pub use error::ApiError;
