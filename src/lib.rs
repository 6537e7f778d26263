pub mod application;
pub mod cli;
pub mod domain;
pub mod storage;

pub use application::{CreditLedgerService, GrantOutcome};
pub use domain::*;
pub use storage::{CreditStore, Repository};
