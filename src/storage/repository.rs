use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::domain::{Credits, LinkedIdentityId, PlatformUserId};

use super::{CreditStore, GrantRow, MIGRATION_001_INITIAL, StoreConfig};

/// SQLite-backed credit store.
///
/// Each balance mutation is a single statement (`UPDATE ... RETURNING` or an
/// upsert), so SQLite's statement atomicity is what rules out lost updates.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to an existing database.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        Self::open(config, false).await
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (create if missing + migrate).
    pub async fn init(config: &StoreConfig) -> Result<Self> {
        let repo = Self::open(config, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    async fn open(config: &StoreConfig, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", config.database_path))?;

        tracing::debug!(
            path = %config.database_path,
            max_connections = config.max_connections,
            "connected to credit store"
        );
        Ok(Self::new(pool))
    }

    // ========================
    // Seeding (merge and purchase flows live elsewhere)
    // ========================

    /// Record that `id` has been merged into `identity`.
    pub async fn link_account(
        &self,
        id: PlatformUserId,
        identity: &LinkedIdentityId,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO account_links (platform_user_id, linked_identity_id, linked_at)
            VALUES (?, ?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            ON CONFLICT(platform_user_id) DO UPDATE SET
                linked_identity_id = excluded.linked_identity_id,
                linked_at = excluded.linked_at
            "#,
        )
        .bind(id.get())
        .bind(identity.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to record account link")?;
        Ok(())
    }

    /// Add purchased credits to an unlinked balance.
    pub async fn top_up_unlinked(&self, id: PlatformUserId, amount: Credits) -> Result<Credits> {
        self.refund_credits(id, amount).await
    }

    /// Add purchased credits to a linked balance.
    pub async fn top_up_linked(
        &self,
        identity: &LinkedIdentityId,
        amount: Credits,
    ) -> Result<Credits> {
        self.refund_linked_credits(identity, amount).await
    }
}

#[async_trait]
impl CreditStore for Repository {
    async fn find_link(&self, id: PlatformUserId) -> Result<Option<LinkedIdentityId>> {
        let identity: Option<Option<String>> = sqlx::query_scalar(
            "SELECT linked_identity_id FROM account_links WHERE platform_user_id = ?",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up account link")?;

        Ok(identity
            .flatten()
            .filter(|s| !s.is_empty())
            .map(LinkedIdentityId::new))
    }

    async fn read_unlinked_credits(&self, id: PlatformUserId) -> Result<Option<Credits>> {
        sqlx::query_scalar("SELECT credits FROM unlinked_balances WHERE platform_user_id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read unlinked balance")
    }

    async fn read_linked_credits(&self, identity: &LinkedIdentityId) -> Result<Option<Credits>> {
        sqlx::query_scalar("SELECT credits FROM linked_balances WHERE linked_identity_id = ?")
            .bind(identity.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read linked balance")
    }

    async fn consume_credits(
        &self,
        id: PlatformUserId,
        amount: Credits,
    ) -> Result<Option<Credits>> {
        sqlx::query_scalar(
            r#"
            UPDATE unlinked_balances
            SET credits = credits - ?1,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE platform_user_id = ?2 AND credits >= ?1
            RETURNING credits
            "#,
        )
        .bind(amount)
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to consume credits")
    }

    async fn refund_credits(&self, id: PlatformUserId, amount: Credits) -> Result<Credits> {
        sqlx::query_scalar(
            r#"
            INSERT INTO unlinked_balances (platform_user_id, credits)
            VALUES (?, ?)
            ON CONFLICT(platform_user_id) DO UPDATE SET
                credits = credits + excluded.credits,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            RETURNING credits
            "#,
        )
        .bind(id.get())
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .context("Failed to refund credits")
    }

    async fn grant_initial_credits(&self, id: PlatformUserId, amount: Credits) -> Result<GrantRow> {
        let granted: Option<Credits> = sqlx::query_scalar(
            r#"
            INSERT INTO unlinked_balances (platform_user_id, credits, onboarding_granted)
            VALUES (?, ?, 1)
            ON CONFLICT(platform_user_id) DO UPDATE SET
                credits = credits + excluded.credits,
                onboarding_granted = 1,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE unlinked_balances.onboarding_granted = 0
            RETURNING credits
            "#,
        )
        .bind(id.get())
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to grant initial credits")?;

        match granted {
            Some(credits) => Ok(GrantRow {
                credits,
                granted: true,
            }),
            // The flag was already set and nothing was written; report the balance as it stands.
            None => {
                let credits = self.read_unlinked_credits(id).await?.unwrap_or(0);
                Ok(GrantRow {
                    credits,
                    granted: false,
                })
            }
        }
    }

    async fn consume_linked_credits(
        &self,
        identity: &LinkedIdentityId,
        amount: Credits,
    ) -> Result<Option<Credits>> {
        sqlx::query_scalar(
            r#"
            UPDATE linked_balances
            SET credits = credits - ?1,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE linked_identity_id = ?2 AND credits >= ?1
            RETURNING credits
            "#,
        )
        .bind(amount)
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to consume linked credits")
    }

    async fn refund_linked_credits(
        &self,
        identity: &LinkedIdentityId,
        amount: Credits,
    ) -> Result<Credits> {
        sqlx::query_scalar(
            r#"
            INSERT INTO linked_balances (linked_identity_id, credits)
            VALUES (?, ?)
            ON CONFLICT(linked_identity_id) DO UPDATE SET
                credits = credits + excluded.credits,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            RETURNING credits
            "#,
        )
        .bind(identity.as_str())
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .context("Failed to refund linked credits")
    }
}
