// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use credit_ledger::application::CreditLedgerService;
use credit_ledger::domain::{Credits, LinkedIdentityId, PlatformUserId};
use credit_ledger::storage::{CreditStore, GrantRow, Repository, StoreConfig};
use tempfile::TempDir;

/// Helper to create a migrated repository in a temporary directory
pub async fn test_repo() -> Result<(Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let repo = Repository::init(&StoreConfig::new(db_path.to_str().unwrap())).await?;
    Ok((repo, temp_dir))
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(CreditLedgerService, Repository, TempDir)> {
    let (repo, temp_dir) = test_repo().await?;
    let service = CreditLedgerService::new(Arc::new(repo.clone()));
    Ok((service, repo, temp_dir))
}

pub fn uid(raw: i64) -> PlatformUserId {
    PlatformUserId::new(raw).unwrap()
}

/// Store wrapper that records every call made through it.
pub struct SpyStore {
    inner: Repository,
    calls: Mutex<Vec<&'static str>>,
}

impl SpyStore {
    pub fn new(inner: Repository) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

#[async_trait]
impl CreditStore for SpyStore {
    async fn find_link(&self, id: PlatformUserId) -> Result<Option<LinkedIdentityId>> {
        self.record("find_link");
        self.inner.find_link(id).await
    }

    async fn read_unlinked_credits(&self, id: PlatformUserId) -> Result<Option<Credits>> {
        self.record("read_unlinked_credits");
        self.inner.read_unlinked_credits(id).await
    }

    async fn read_linked_credits(&self, identity: &LinkedIdentityId) -> Result<Option<Credits>> {
        self.record("read_linked_credits");
        self.inner.read_linked_credits(identity).await
    }

    async fn consume_credits(
        &self,
        id: PlatformUserId,
        amount: Credits,
    ) -> Result<Option<Credits>> {
        self.record("consume_credits");
        self.inner.consume_credits(id, amount).await
    }

    async fn refund_credits(&self, id: PlatformUserId, amount: Credits) -> Result<Credits> {
        self.record("refund_credits");
        self.inner.refund_credits(id, amount).await
    }

    async fn grant_initial_credits(&self, id: PlatformUserId, amount: Credits) -> Result<GrantRow> {
        self.record("grant_initial_credits");
        self.inner.grant_initial_credits(id, amount).await
    }

    async fn consume_linked_credits(
        &self,
        identity: &LinkedIdentityId,
        amount: Credits,
    ) -> Result<Option<Credits>> {
        self.record("consume_linked_credits");
        self.inner.consume_linked_credits(identity, amount).await
    }

    async fn refund_linked_credits(
        &self,
        identity: &LinkedIdentityId,
        amount: Credits,
    ) -> Result<Credits> {
        self.record("refund_linked_credits");
        self.inner.refund_linked_credits(identity, amount).await
    }
}

/// Store wrapper that fails selected operations.
pub struct FaultyStore {
    inner: Repository,
    failing_links: Mutex<HashSet<i64>>,
    balances_down: Mutex<bool>,
}

impl FaultyStore {
    pub fn new(inner: Repository) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing_links: Mutex::new(HashSet::new()),
            balances_down: Mutex::new(false),
        })
    }

    /// Make the link lookup for `id` fail with a transient error.
    pub fn fail_link_lookup(&self, id: i64) {
        self.failing_links.lock().unwrap().insert(id);
    }

    /// Make every balance read and procedure fail.
    pub fn take_balances_down(&self) {
        *self.balances_down.lock().unwrap() = true;
    }

    fn check_balances(&self) -> Result<()> {
        if *self.balances_down.lock().unwrap() {
            return Err(anyhow!("connection reset by peer"));
        }
        Ok(())
    }
}

#[async_trait]
impl CreditStore for FaultyStore {
    async fn find_link(&self, id: PlatformUserId) -> Result<Option<LinkedIdentityId>> {
        if self.failing_links.lock().unwrap().contains(&id.get()) {
            return Err(anyhow!("timed out waiting for link lookup"));
        }
        self.inner.find_link(id).await
    }

    async fn read_unlinked_credits(&self, id: PlatformUserId) -> Result<Option<Credits>> {
        self.check_balances()?;
        self.inner.read_unlinked_credits(id).await
    }

    async fn read_linked_credits(&self, identity: &LinkedIdentityId) -> Result<Option<Credits>> {
        self.check_balances()?;
        self.inner.read_linked_credits(identity).await
    }

    async fn consume_credits(
        &self,
        id: PlatformUserId,
        amount: Credits,
    ) -> Result<Option<Credits>> {
        self.check_balances()?;
        self.inner.consume_credits(id, amount).await
    }

    async fn refund_credits(&self, id: PlatformUserId, amount: Credits) -> Result<Credits> {
        self.check_balances()?;
        self.inner.refund_credits(id, amount).await
    }

    async fn grant_initial_credits(&self, id: PlatformUserId, amount: Credits) -> Result<GrantRow> {
        self.check_balances()?;
        self.inner.grant_initial_credits(id, amount).await
    }

    async fn consume_linked_credits(
        &self,
        identity: &LinkedIdentityId,
        amount: Credits,
    ) -> Result<Option<Credits>> {
        self.check_balances()?;
        self.inner.consume_linked_credits(identity, amount).await
    }

    async fn refund_linked_credits(
        &self,
        identity: &LinkedIdentityId,
        amount: Credits,
    ) -> Result<Credits> {
        self.check_balances()?;
        self.inner.refund_linked_credits(identity, amount).await
    }
}
