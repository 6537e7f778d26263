use std::sync::Arc;

use crate::domain::{ConsumeResult, Credits, GrantResult, RefundResult, Scope};
use crate::storage::CreditStore;

/// Issues exactly one store operation per call, chosen by [`Scope`].
///
/// Store errors are logged here and folded into the `StoreError` variants;
/// nothing is retried.
#[derive(Clone)]
pub struct LedgerGateway {
    store: Arc<dyn CreditStore>,
}

impl LedgerGateway {
    pub fn new(store: Arc<dyn CreditStore>) -> Self {
        Self { store }
    }

    /// Point read. `None` covers both "no record" and store failure.
    pub async fn read(&self, scope: &Scope) -> Option<Credits> {
        let result = match scope {
            Scope::Unlinked(id) => self.store.read_unlinked_credits(*id).await,
            Scope::Linked(identity) => self.store.read_linked_credits(identity).await,
        };

        result.unwrap_or_else(|err| {
            tracing::error!(%scope, error = %format!("{:#}", err), "balance read failed");
            None
        })
    }

    pub async fn consume(&self, scope: &Scope, amount: Credits) -> ConsumeResult {
        let result = match scope {
            Scope::Unlinked(id) => self.store.consume_credits(*id, amount).await,
            Scope::Linked(identity) => self.store.consume_linked_credits(identity, amount).await,
        };

        match result {
            Ok(Some(balance)) => ConsumeResult::NewBalance(balance),
            Ok(None) => ConsumeResult::Insufficient,
            Err(err) => {
                tracing::error!(%scope, amount, error = %format!("{:#}", err), "consume failed");
                ConsumeResult::StoreError
            }
        }
    }

    pub async fn refund(&self, scope: &Scope, amount: Credits) -> RefundResult {
        let result = match scope {
            Scope::Unlinked(id) => self.store.refund_credits(*id, amount).await,
            Scope::Linked(identity) => self.store.refund_linked_credits(identity, amount).await,
        };

        match result {
            Ok(balance) => RefundResult::NewBalance(balance),
            Err(err) => {
                tracing::error!(%scope, amount, error = %format!("{:#}", err), "refund failed");
                RefundResult::StoreError
            }
        }
    }

    /// One-time onboarding grant. Only unlinked records carry the flag, so a
    /// linked scope is reported as a store error without touching the store.
    pub async fn grant_once(&self, scope: &Scope, amount: Credits) -> GrantResult {
        let id = match scope {
            Scope::Unlinked(id) => *id,
            Scope::Linked(_) => {
                tracing::error!(%scope, "no onboarding grant procedure for linked accounts");
                return GrantResult::StoreError(
                    "no onboarding grant procedure for linked accounts".to_string(),
                );
            }
        };

        match self.store.grant_initial_credits(id, amount).await {
            Ok(row) if row.granted => GrantResult::Granted(row.credits),
            Ok(row) => GrantResult::AlreadyGranted(row.credits),
            Err(err) => {
                let message = format!("{:#}", err);
                tracing::error!(%scope, amount, error = %message, "grant failed");
                GrantResult::StoreError(message)
            }
        }
    }
}
