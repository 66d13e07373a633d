//! # API Shared
//!
//! Shared definitions for the story service APIs.
//!
//! Contains:
//! - Request and response bodies (`wire` module), with OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the CLI for common functionality.

pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
