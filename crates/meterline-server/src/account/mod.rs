//! Account domain: model, repository port, in-memory adapter and service.
//!
//! The service is the only consumer of business metrics; handlers call the
//! service and never touch the repository directly.

pub mod model;
pub mod repository;
pub mod service;

pub use model::{Account, AccountInput};
pub use repository::{AccountRepository, InMemoryAccountRepository};
pub use service::AccountService;
