//! Error taxonomy for the runtime.
//!
//! Variants fall in five groups, see [`ErrorCategory`]:
//! - precondition failures are caller errors and are never retried;
//! - not-found outcomes are authentication/authorization failures, not faults;
//! - misconfiguration means a wiring defect and is fatal at the operation boundary;
//! - expiration is a normal session lifecycle outcome;
//! - store failures come from the account store collaborator.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Precondition,
    NotFound,
    Misconfiguration,
    Expiration,
    Store,
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("identifiers not set: the subject has not been authenticated")]
    IdentifiersNotSet,
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("no credentials found for [{0}]")]
    CredentialsNotFound(String),
    #[error("no authorization info found for [{0}]")]
    AuthzInfoNotFound(String),
    #[error("incorrect credentials for [{0}]")]
    IncorrectCredentials(String),
    #[error("authentication failed for [{0}]")]
    Authentication(String),
    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("unable to get cached credentials: {0}")]
    GetCachedCredentials(String),
    #[error("unable to cache credentials: {0}")]
    CacheCredentials(String),
    #[error("unable to clear cached credentials: {0}")]
    ClearCacheCredentials(String),
    #[error("realm misconfigured: {0}")]
    RealmMisconfigured(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid permission [{0}]")]
    InvalidPermission(String),

    #[error("session {0} has expired")]
    ExpiredSession(String),
    #[error("session {0} has been stopped")]
    StoppedSession(String),

    #[error(transparent)]
    AccountStore(#[from] anyhow::Error),
}

impl SecurityError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IdentifiersNotSet
            | Self::IllegalState(_)
            | Self::Unauthenticated
            | Self::Unauthorized(_) => ErrorCategory::Precondition,
            Self::CredentialsNotFound(_)
            | Self::AuthzInfoNotFound(_)
            | Self::IncorrectCredentials(_)
            | Self::Authentication(_)
            | Self::UnknownSession(_) => ErrorCategory::NotFound,
            Self::GetCachedCredentials(_)
            | Self::CacheCredentials(_)
            | Self::ClearCacheCredentials(_)
            | Self::RealmMisconfigured(_)
            | Self::InvalidArgument(_)
            | Self::InvalidPermission(_) => ErrorCategory::Misconfiguration,
            Self::ExpiredSession(_) | Self::StoppedSession(_) => ErrorCategory::Expiration,
            Self::AccountStore(_) => ErrorCategory::Store,
        }
    }

    /// True for failures a login attempt should report as "bad credentials".
    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::CredentialsNotFound(_)
                | Self::IncorrectCredentials(_)
                | Self::Authentication(_)
        )
    }
}

pub type Result<T, E = SecurityError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(
            SecurityError::IdentifiersNotSet.category(),
            ErrorCategory::Precondition
        );
        assert_eq!(
            SecurityError::AuthzInfoNotFound("thedude".into()).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            SecurityError::GetCachedCredentials("no resolver".into()).category(),
            ErrorCategory::Misconfiguration
        );
        assert_eq!(
            SecurityError::ExpiredSession("01H".into()).category(),
            ErrorCategory::Expiration
        );
        assert_eq!(
            SecurityError::from(anyhow::anyhow!("store down")).category(),
            ErrorCategory::Store
        );
    }

    #[test]
    fn authentication_failures() {
        assert!(SecurityError::IncorrectCredentials("thedude".into()).is_authentication_failure());
        assert!(!SecurityError::IdentifiersNotSet.is_authentication_failure());
        assert_eq!(
            SecurityError::CredentialsNotFound("walter".into()).to_string(),
            "no credentials found for [walter]"
        );
    }
}
