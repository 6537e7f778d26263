use std::sync::Arc;

use crate::domain::{LinkStatus, PlatformUserId};
use crate::storage::CreditStore;

use super::LinkStatusCache;

/// Decides whether a platform user has been merged into a primary identity.
///
/// Never fails: a lookup error is logged and treated as "no mapping row", so
/// the caller falls back to the unlinked balance record.
#[derive(Clone)]
pub struct AccountLinkResolver {
    store: Arc<dyn CreditStore>,
    cache: Arc<LinkStatusCache>,
}

impl AccountLinkResolver {
    pub fn new(store: Arc<dyn CreditStore>, cache: Arc<LinkStatusCache>) -> Self {
        Self { store, cache }
    }

    pub async fn resolve(&self, id: PlatformUserId) -> LinkStatus {
        if let Some(status) = self.cache.get(id) {
            return status;
        }

        let status = match self.store.find_link(id).await {
            Ok(Some(identity)) => LinkStatus::Linked(identity),
            Ok(None) => LinkStatus::Unlinked,
            Err(err) => {
                tracing::warn!(
                    platform_user_id = %id,
                    error = %format!("{:#}", err),
                    "account link lookup failed, treating user as unlinked"
                );
                LinkStatus::Unlinked
            }
        };

        self.cache.set(id, status.clone());
        status
    }

    pub fn clear(&self, id: PlatformUserId) {
        self.cache.clear(id);
    }

    pub fn clear_all(&self) {
        self.cache.clear_all();
    }
}
