use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::application::{AppError, CreditLedgerService, GrantOutcome};
use crate::domain::{
    Credits, DEFAULT_COST, LinkStatus, LinkedIdentityId, ONBOARDING_BONUS, PlatformUserId,
};
use crate::storage::{
    DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DATABASE_PATH, DEFAULT_MAX_CONNECTIONS, Repository,
    StoreConfig,
};

/// Credit Ledger - credit balances for messaging-platform users
#[derive(Parser)]
#[command(name = "credit-ledger")]
#[command(about = "Grant, check and spend feature credits for platform users")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "CREDIT_LEDGER_DB", default_value = DEFAULT_DATABASE_PATH)]
    pub database: String,

    /// Maximum pooled connections to the database
    #[arg(long, env = "CREDIT_LEDGER_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Milliseconds a writer waits for the database lock
    #[arg(long, env = "CREDIT_LEDGER_BUSY_TIMEOUT_MS", default_value_t = DEFAULT_BUSY_TIMEOUT_MS)]
    pub busy_timeout_ms: u64,

    /// Emit JSON instead of plain text
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Show the authoritative balance for a platform user
    Balance {
        /// Platform user id
        user: i64,
    },

    /// Check whether a user can afford an amount
    Has {
        /// Platform user id
        user: i64,

        /// Credits required
        #[arg(short, long, default_value_t = DEFAULT_COST)]
        amount: Credits,
    },

    /// Spend credits
    Consume {
        /// Platform user id
        user: i64,

        /// Credits to spend
        #[arg(short, long, default_value_t = DEFAULT_COST)]
        amount: Credits,
    },

    /// Return previously spent credits
    Refund {
        /// Platform user id
        user: i64,

        /// Credits to return
        #[arg(short, long, default_value_t = DEFAULT_COST)]
        amount: Credits,
    },

    /// Issue the one-time onboarding grant
    Grant {
        /// Platform user id
        user: i64,

        /// Credits to grant (at most the free-grant cap)
        #[arg(short, long, default_value_t = ONBOARDING_BONUS)]
        amount: Credits,
    },

    /// Show whether a user is linked to a primary identity
    Resolve {
        /// Platform user id
        user: i64,
    },

    /// Record an account link (normally written by the merge flow)
    Link {
        /// Platform user id
        user: i64,

        /// Primary identity the user was merged into
        identity: String,
    },

    /// Add purchased credits to a linked identity (normally done by the purchase flow)
    TopUpLinked {
        /// Primary identity
        identity: String,

        /// Credits to add
        amount: Credits,
    },
}

impl Cli {
    /// Install the tracing subscriber. `RUST_LOG` wins over `--verbose`.
    pub fn init_tracing(&self) {
        let default = if self.verbose {
            "credit_ledger=debug"
        } else {
            "credit_ledger=info"
        };

        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
            )
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.database)
            .with_max_connections(self.max_connections)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    pub async fn run(self) -> Result<()> {
        let config = self.store_config();
        let json = self.json;

        match self.command {
            Commands::Init => {
                CreditLedgerService::init(&config).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Balance { user } => {
                let service = connect_service(&config).await?;
                let balance = service.get_credit_balance(user).await;
                if json {
                    println!("{}", json!({ "user": user, "balance": balance }));
                } else {
                    println!("User {}: {} credits", user, balance);
                }
            }

            Commands::Has { user, amount } => {
                let service = connect_service(&config).await?;
                let has = service.has_credits(user, amount).await;
                if json {
                    println!(
                        "{}",
                        json!({ "user": user, "amount": amount, "has_credits": has })
                    );
                } else if has {
                    println!("User {} has at least {} credits", user, amount);
                } else {
                    println!("User {} does not have {} credits", user, amount);
                }
            }

            Commands::Consume { user, amount } => {
                let service = connect_service(&config).await?;
                let ok = service.consume_credits(user, amount).await;
                print_mutation(json, ("consume", "Consumed"), user, amount, ok, &service).await;
                if !ok {
                    anyhow::bail!("Could not consume {} credits for user {}", amount, user);
                }
            }

            Commands::Refund { user, amount } => {
                let service = connect_service(&config).await?;
                let ok = service.refund_credits(user, amount).await;
                print_mutation(json, ("refund", "Refunded"), user, amount, ok, &service).await;
                if !ok {
                    anyhow::bail!("Could not refund {} credits for user {}", amount, user);
                }
            }

            Commands::Grant { user, amount } => {
                let service = connect_service(&config).await?;
                let outcome = service.grant_initial_credits(user, amount).await;
                print_grant(json, user, &outcome);
                if let Some(err) = outcome.error {
                    return Err(err.into());
                }
            }

            Commands::Resolve { user } => {
                let service = connect_service(&config).await?;
                let status = service
                    .link_status(user)
                    .await
                    .ok_or(AppError::InvalidUserId(user))?;
                if json {
                    println!("{}", json!({ "user": user, "link": status }));
                } else {
                    match status {
                        LinkStatus::Unlinked => println!("User {} is unlinked", user),
                        LinkStatus::Linked(identity) => {
                            println!("User {} is linked to {}", user, identity)
                        }
                    }
                }
            }

            Commands::Link { user, identity } => {
                let id = PlatformUserId::new(user).ok_or(AppError::InvalidUserId(user))?;
                let repo = connect_repository(&config).await?;
                let identity = LinkedIdentityId::new(identity);
                repo.link_account(id, &identity).await?;
                println!("Linked user {} to {}", id, identity);
            }

            Commands::TopUpLinked { identity, amount } => {
                if amount <= 0 {
                    anyhow::bail!("Amount must be positive");
                }
                let repo = connect_repository(&config).await?;
                let identity = LinkedIdentityId::new(identity);
                let balance = repo.top_up_linked(&identity, amount).await?;
                println!("{}: {} credits", identity, balance);
            }
        }

        Ok(())
    }
}

async fn connect_service(config: &StoreConfig) -> Result<CreditLedgerService> {
    CreditLedgerService::connect(config)
        .await
        .context("Database not found. Run 'credit-ledger init' first.")
}

async fn connect_repository(config: &StoreConfig) -> Result<Repository> {
    Repository::connect(config)
        .await
        .context("Database not found. Run 'credit-ledger init' first.")
}

async fn print_mutation(
    json: bool,
    (action, done): (&str, &str),
    user: i64,
    amount: Credits,
    ok: bool,
    service: &CreditLedgerService,
) {
    let balance = service.get_credit_balance(user).await;
    if json {
        println!(
            "{}",
            json!({
                "action": action,
                "user": user,
                "amount": amount,
                "success": ok,
                "balance": balance,
            })
        );
    } else if ok {
        println!("{} {} credits for user {} (balance: {})", done, amount, user, balance);
    } else {
        println!(
            "Failed to {} {} credits for user {} (balance: {})",
            action, amount, user, balance
        );
    }
}

fn print_grant(json: bool, user: i64, outcome: &GrantOutcome) {
    if json {
        println!(
            "{}",
            json!({
                "user": user,
                "success": outcome.success,
                "balance": outcome.balance,
                "already_granted": outcome.already_granted,
                "error": outcome.error.as_ref().map(ToString::to_string),
            })
        );
    } else if outcome.already_granted {
        println!(
            "User {} already received onboarding credits (balance: {})",
            user, outcome.balance
        );
    } else if outcome.success {
        println!(
            "Granted onboarding credits to user {} (balance: {})",
            user, outcome.balance
        );
    }
}
