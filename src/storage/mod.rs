mod config;
mod repository;
mod store;

pub use config::*;
pub use repository::*;
pub use store::*;

/// SQL migration for initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
