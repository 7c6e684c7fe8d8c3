//! Shared types for the talent platform
//!
//! Common types used across the billing services: holder identity,
//! metering decision types, error codes, and API response structures.

pub mod billing;
pub mod error;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

// Billing re-exports (for convenient access at call sites)
pub use billing::{CheckDecision, DenyReason, Holder, HolderType};
