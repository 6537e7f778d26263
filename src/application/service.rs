use std::sync::Arc;

use crate::domain::{
    ConsumeResult, Credits, GrantResult, LinkStatus, MAX_FREE_GRANT, ONBOARDING_BONUS,
    PlatformUserId, RefundResult, Scope, is_valid_amount,
};
use crate::storage::{CreditStore, Repository, StoreConfig};

use super::{AccountLinkResolver, AppError, GrantError, LedgerGateway, LinkStatusCache};

/// Public credit ledger API.
///
/// Every operation is total: invalid input, missing records and store
/// failures all come back as ordinary values (`false`, `0`, or a failed
/// [`GrantOutcome`]). Input is validated before any store access.
///
/// The service holds no balance state of its own; cloning it is cheap and
/// clones share the link-status cache.
#[derive(Clone)]
pub struct CreditLedgerService {
    resolver: AccountLinkResolver,
    gateway: LedgerGateway,
}

/// Result of an onboarding grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantOutcome {
    pub success: bool,
    pub balance: Credits,
    pub already_granted: bool,
    pub error: Option<GrantError>,
}

impl GrantOutcome {
    fn granted(balance: Credits, already_granted: bool) -> Self {
        Self {
            success: true,
            balance,
            already_granted,
            error: None,
        }
    }

    fn failed(error: GrantError, balance: Credits) -> Self {
        Self {
            success: false,
            balance,
            already_granted: false,
            error: Some(error),
        }
    }
}

impl CreditLedgerService {
    /// Create a service over `store` with a cache of its own.
    pub fn new(store: Arc<dyn CreditStore>) -> Self {
        Self::with_cache(store, Arc::new(LinkStatusCache::new()))
    }

    /// Create a service that shares an existing link-status cache.
    pub fn with_cache(store: Arc<dyn CreditStore>, cache: Arc<LinkStatusCache>) -> Self {
        Self {
            resolver: AccountLinkResolver::new(Arc::clone(&store), cache),
            gateway: LedgerGateway::new(store),
        }
    }

    /// Initialize a new database with the given settings.
    pub async fn init(config: &StoreConfig) -> Result<Self, AppError> {
        let repo = Repository::init(config).await?;
        Ok(Self::new(Arc::new(repo)))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &StoreConfig) -> Result<Self, AppError> {
        let repo = Repository::connect(config).await?;
        Ok(Self::new(Arc::new(repo)))
    }

    // ========================
    // Read operations
    // ========================

    /// True iff the user's authoritative balance covers `amount`.
    pub async fn has_credits(&self, id: i64, amount: Credits) -> bool {
        let Some(id) = PlatformUserId::new(id) else {
            return false;
        };
        if !is_valid_amount(amount) {
            return false;
        }

        self.balance_of(id).await >= amount
    }

    /// Current balance, or 0 for invalid ids, missing records and store errors.
    pub async fn get_credit_balance(&self, id: i64) -> Credits {
        match PlatformUserId::new(id) {
            Some(id) => self.balance_of(id).await,
            None => 0,
        }
    }

    async fn balance_of(&self, id: PlatformUserId) -> Credits {
        let scope = self.scope_for(id).await;
        self.gateway.read(&scope).await.unwrap_or(0)
    }

    // ========================
    // Mutations
    // ========================

    /// Atomically spend `amount` credits. False if the balance is short.
    pub async fn consume_credits(&self, id: i64, amount: Credits) -> bool {
        let Some(id) = PlatformUserId::new(id) else {
            return false;
        };
        if !is_valid_amount(amount) {
            return false;
        }

        let scope = self.scope_for(id).await;
        match self.gateway.consume(&scope, amount).await {
            ConsumeResult::NewBalance(balance) => {
                tracing::debug!(%scope, amount, balance, "credits consumed");
                true
            }
            ConsumeResult::Insufficient => {
                tracing::debug!(%scope, amount, "insufficient credits");
                false
            }
            ConsumeResult::StoreError => false,
        }
    }

    /// Atomically give back `amount` credits, e.g. after a failed feature run.
    pub async fn refund_credits(&self, id: i64, amount: Credits) -> bool {
        let Some(id) = PlatformUserId::new(id) else {
            return false;
        };
        if !is_valid_amount(amount) {
            return false;
        }

        let scope = self.scope_for(id).await;
        match self.gateway.refund(&scope, amount).await {
            RefundResult::NewBalance(balance) => {
                tracing::debug!(%scope, amount, balance, "credits refunded");
                true
            }
            RefundResult::StoreError => false,
        }
    }

    /// Issue the one-time onboarding grant of `amount` credits.
    ///
    /// Repeated calls succeed with `already_granted` set and leave the
    /// balance alone. `amount` must be in `1..=MAX_FREE_GRANT`.
    pub async fn grant_initial_credits(&self, id: i64, amount: Credits) -> GrantOutcome {
        let Some(id) = PlatformUserId::new(id) else {
            return GrantOutcome::failed(GrantError::InvalidUserId, 0);
        };
        if !is_valid_amount(amount) {
            return GrantOutcome::failed(GrantError::InvalidAmount, 0);
        }
        if amount > MAX_FREE_GRANT {
            return GrantOutcome::failed(GrantError::ExceedsMaxFreeGrant, 0);
        }

        let scope = self.scope_for(id).await;
        if matches!(scope, Scope::Linked(_)) {
            tracing::warn!(%scope, "onboarding grant requested for a linked account");
            return GrantOutcome::failed(GrantError::LinkedAccount, 0);
        }

        match self.gateway.grant_once(&scope, amount).await {
            GrantResult::Granted(balance) => {
                tracing::info!(%scope, amount, balance, "onboarding credits granted");
                GrantOutcome::granted(balance, false)
            }
            GrantResult::AlreadyGranted(balance) => GrantOutcome::granted(balance, true),
            GrantResult::StoreError(message) => {
                GrantOutcome::failed(GrantError::Store(message), 0)
            }
        }
    }

    /// [`Self::grant_initial_credits`] with the standard onboarding bonus.
    pub async fn grant_onboarding_bonus(&self, id: i64) -> GrantOutcome {
        self.grant_initial_credits(id, ONBOARDING_BONUS).await
    }

    // ========================
    // Link status
    // ========================

    /// Resolved link status, or `None` for an invalid id.
    pub async fn link_status(&self, id: i64) -> Option<LinkStatus> {
        let id = PlatformUserId::new(id)?;
        Some(self.resolver.resolve(id).await)
    }

    /// Forget the cached status for one user. Call after merging their account.
    pub fn invalidate_link(&self, id: PlatformUserId) {
        self.resolver.clear(id);
    }

    pub fn invalidate_all_links(&self) {
        self.resolver.clear_all();
    }

    async fn scope_for(&self, id: PlatformUserId) -> Scope {
        self.resolver.resolve(id).await.scope_for(id)
    }
}
