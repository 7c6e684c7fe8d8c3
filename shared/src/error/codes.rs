//! Unified error codes for the talent platform
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Holder errors
//! - 5xxx: Billing/entitlement errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Admin token is missing or invalid
    AdminTokenInvalid = 1002,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,

    // ==================== 3xxx: Holder ====================
    /// Billing holder (user or org) not found
    HolderNotFound = 3001,
    /// No subscription exists for this holder
    SubscriptionNotFound = 3002,
    /// Malformed holder reference (unknown type string)
    HolderInvalid = 3003,

    // ==================== 5xxx: Billing / entitlements ====================
    /// Plan not found
    PlanNotFound = 5001,
    /// Plan delete rejected: referenced by an active subscription
    PlanInUse = 5002,
    /// Feature not found in the registry
    FeatureNotFound = 5003,
    /// Feature delete rejected: referenced by an entitlement row
    FeatureInUse = 5004,
    /// No entitlement row for `(plan, feature)`
    EntitlementNotFound = 5005,
    /// Feature is not part of the holder's plan
    FeatureNotInPlan = 5006,
    /// Feature is disabled on the holder's plan
    FeatureDisabled = 5007,
    /// Metered quota exceeded for this billing period
    QuotaExceeded = 5008,
    /// Payment event with this `(gateway, event_id)` was already processed
    DuplicatePaymentEvent = 5009,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Default human-readable message for this code
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",
            Self::InvalidRequest => "Invalid request",
            Self::NotAuthenticated => "Authentication required",
            Self::AdminTokenInvalid => "Admin token missing or invalid",
            Self::PermissionDenied => "Permission denied",
            Self::HolderNotFound => "Holder not found",
            Self::SubscriptionNotFound => "No subscription for holder",
            Self::HolderInvalid => "Malformed holder reference",
            Self::PlanNotFound => "Plan not found",
            Self::PlanInUse => "Plan is referenced by an active subscription",
            Self::FeatureNotFound => "Feature not found",
            Self::FeatureInUse => "Feature is referenced by a plan entitlement",
            Self::EntitlementNotFound => "No entitlement for this plan and feature",
            Self::FeatureNotInPlan => "Feature is not included in the current plan",
            Self::FeatureDisabled => "Feature is disabled on the current plan",
            Self::QuotaExceeded => "Monthly quota exceeded",
            Self::DuplicatePaymentEvent => "Payment event already processed",
            Self::InternalError => "Internal server error",
            Self::DatabaseError => "Database error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code.code()
    }
}

/// Error returned when deserializing an unknown numeric error code
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => Self::Success,
            1 => Self::Unknown,
            2 => Self::ValidationFailed,
            3 => Self::NotFound,
            4 => Self::AlreadyExists,
            5 => Self::InvalidRequest,
            1001 => Self::NotAuthenticated,
            1002 => Self::AdminTokenInvalid,
            2001 => Self::PermissionDenied,
            3001 => Self::HolderNotFound,
            3002 => Self::SubscriptionNotFound,
            3003 => Self::HolderInvalid,
            5001 => Self::PlanNotFound,
            5002 => Self::PlanInUse,
            5003 => Self::FeatureNotFound,
            5004 => Self::FeatureInUse,
            5005 => Self::EntitlementNotFound,
            5006 => Self::FeatureNotInPlan,
            5007 => Self::FeatureDisabled,
            5008 => Self::QuotaExceeded,
            5009 => Self::DuplicatePaymentEvent,
            9001 => Self::InternalError,
            9002 => Self::DatabaseError,
            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_u16() {
        for code in [
            ErrorCode::Success,
            ErrorCode::HolderNotFound,
            ErrorCode::PlanInUse,
            ErrorCode::QuotaExceeded,
            ErrorCode::DatabaseError,
        ] {
            assert_eq!(ErrorCode::try_from(code.code()).unwrap(), code);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(ErrorCode::try_from(4242).is_err());
    }
}
