use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{Credits, LinkedIdentityId, PlatformUserId};

/// Row returned by the grant procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantRow {
    /// Balance after the call.
    pub credits: Credits,
    /// True if this call flipped the onboarding flag.
    pub granted: bool,
}

/// Backing store consumed by the ledger.
///
/// Every mutating method must be a single atomic operation on the store side:
/// the balance check and the write happen in one indivisible step. Callers
/// never compose a read with a later write.
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Look up the mapping row for `id`. `Ok(None)` means no row, or a row
    /// whose identity column is NULL.
    async fn find_link(&self, id: PlatformUserId) -> Result<Option<LinkedIdentityId>>;

    async fn read_unlinked_credits(&self, id: PlatformUserId) -> Result<Option<Credits>>;

    async fn read_linked_credits(&self, identity: &LinkedIdentityId) -> Result<Option<Credits>>;

    /// `Ok(None)` when the balance is below `amount` or no record exists.
    async fn consume_credits(&self, id: PlatformUserId, amount: Credits)
    -> Result<Option<Credits>>;

    async fn refund_credits(&self, id: PlatformUserId, amount: Credits) -> Result<Credits>;

    async fn grant_initial_credits(&self, id: PlatformUserId, amount: Credits)
    -> Result<GrantRow>;

    async fn consume_linked_credits(
        &self,
        identity: &LinkedIdentityId,
        amount: Credits,
    ) -> Result<Option<Credits>>;

    async fn refund_linked_credits(
        &self,
        identity: &LinkedIdentityId,
        amount: Credits,
    ) -> Result<Credits>;
}
