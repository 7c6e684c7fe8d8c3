//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::HolderNotFound
            | Self::SubscriptionNotFound
            | Self::PlanNotFound
            | Self::FeatureNotFound
            | Self::EntitlementNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::PlanInUse
            | Self::FeatureInUse
            | Self::DuplicatePaymentEvent => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::AdminTokenInvalid => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            Self::PermissionDenied => StatusCode::FORBIDDEN,

            // 422 Unprocessable: expected denials when surfaced over HTTP
            Self::FeatureNotInPlan | Self::FeatureDisabled | Self::QuotaExceeded => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            // 400 Bad Request
            Self::Unknown
            | Self::ValidationFailed
            | Self::InvalidRequest
            | Self::HolderInvalid => StatusCode::BAD_REQUEST,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
