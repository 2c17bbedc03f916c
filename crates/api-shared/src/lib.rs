//! # API Shared
//!
//! Shared definitions for the WoundSnap APIs.
//!
//! Contains:
//! - Request and response schemas (`schemas` module)
//! - Shared services like `HealthService`
//! - API-key checking
//!
//! Used by `api-rest` and the `woundsnap-run` binary.

pub mod auth;
pub mod health;
pub mod schemas;

pub use auth::{validate_api_key, AuthError};
pub use health::HealthService;
pub use schemas::*;
