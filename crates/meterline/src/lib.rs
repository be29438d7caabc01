//! Top-level facade crate for meterline.
//!
//! Re-exports the core primitives and the HTTP server library so users can
//! depend on a single crate.

pub mod core {
    pub use meterline_core::*;
}

pub mod server {
    pub use meterline_server::*;
}
