use thiserror::Error;

use crate::pricing::PricingError;
use crate::store::StoreError;

/// Violations of pure domain rules, independent of persistence.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid status transition from `{from}` to `{to}`")]
    InvalidTransition { from: String, to: String },
    #[error("proposal is accepted and locked; no further changes are permitted")]
    Locked,
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure taxonomy at the lifecycle-service boundary. Every variant crosses
/// the HTTP layer as a structured `{success:false, message}` payload; raw
/// internal errors never reach the caller.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Conventional HTTP status for this class of failure.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthenticated(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Locked => Self::Forbidden(error.to_string()),
            DomainError::InvalidTransition { .. } | DomainError::InvariantViolation(_) => {
                Self::Validation(error.to_string())
            }
        }
    }
}

impl From<PricingError> for ServiceError {
    fn from(error: PricingError) -> Self {
        // A parse failure must abort the operation, never degrade into a
        // zeroed snapshot.
        Self::Internal(error.to_string())
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::NotFound("record not found".to_owned()),
            StoreError::Backend(message) => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DomainError, ServiceError};
    use crate::pricing::PricingError;

    #[test]
    fn locked_maps_to_forbidden_distinct_from_ownership_denial() {
        let locked: ServiceError = DomainError::Locked.into();
        assert_eq!(locked.status_hint(), 403);
        assert!(locked.to_string().contains("locked"));

        let denied = ServiceError::Forbidden("you do not have access to this proposal".to_owned());
        assert_ne!(locked.to_string(), denied.to_string());
    }

    #[test]
    fn invalid_transition_names_both_statuses() {
        let error: ServiceError = DomainError::InvalidTransition {
            from: "accepted".to_owned(),
            to: "draft".to_owned(),
        }
        .into();
        assert_eq!(error.status_hint(), 400);
        let message = error.to_string();
        assert!(message.contains("accepted") && message.contains("draft"));
    }

    #[test]
    fn pricing_parse_failures_become_internal_errors() {
        let error: ServiceError = PricingError::NestedEncoding.into();
        assert_eq!(error.status_hint(), 500);
    }
}
