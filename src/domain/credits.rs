use serde::{Deserialize, Serialize};

/// Credit balances and amounts are whole units, never negative once stored.
pub type Credits = i64;

/// Credits awarded once to a fresh, unlinked account.
pub const ONBOARDING_BONUS: Credits = 1;

/// Upper bound for a single free grant.
pub const MAX_FREE_GRANT: Credits = 10;

/// Cost of one feature use when the caller has no better figure.
pub const DEFAULT_COST: Credits = 1;

/// Returns true if `amount` is a usable consume/refund/check amount.
pub fn is_valid_amount(amount: Credits) -> bool {
    amount > 0
}

/// Outcome of a single atomic consume against one balance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumeResult {
    NewBalance(Credits),
    Insufficient,
    StoreError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundResult {
    NewBalance(Credits),
    StoreError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantResult {
    /// Bonus applied; carries the post-grant balance.
    Granted(Credits),
    /// Flag was already set; carries the untouched balance.
    AlreadyGranted(Credits),
    /// Carries the store's error message.
    StoreError(String),
}
