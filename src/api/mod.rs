//! HTTP-facing surface of the analysis pipeline.
//!
//! Routing and upload handling live in the host service; this module only
//! turns pipeline failures into stable JSON error responses.

pub mod error;

pub use error::ApiError;
