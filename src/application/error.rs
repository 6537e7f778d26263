use thiserror::Error;

use crate::domain::MAX_FREE_GRANT;

/// Reasons a grant can fail. Carried inside [`super::GrantOutcome`] rather
/// than returned as `Err`, so callers always get a balance back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("Invalid user ID")]
    InvalidUserId,

    #[error("Invalid credit amount")]
    InvalidAmount,

    #[error("Credit amount exceeds maximum free grant of {}", MAX_FREE_GRANT)]
    ExceedsMaxFreeGrant,

    #[error("Onboarding credits are not available for linked accounts")]
    LinkedAccount,

    #[error("Failed to grant credits: {0}")]
    Store(String),
}

impl GrantError {
    /// True for input-contract violations, which are rejected before any I/O.
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            GrantError::InvalidUserId | GrantError::InvalidAmount | GrantError::ExceedsMaxFreeGrant
        )
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid user ID: {0}")]
    InvalidUserId(i64),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
