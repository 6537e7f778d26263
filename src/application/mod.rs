// Application layer - link resolution, scope dispatch and the public ledger API.

pub mod cache;
pub mod error;
pub mod gateway;
pub mod resolver;
pub mod service;

pub use cache::*;
pub use error::*;
pub use gateway::*;
pub use resolver::*;
pub use service::*;
