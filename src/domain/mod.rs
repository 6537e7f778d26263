mod account;
mod credits;

pub use account::*;
pub use credits::*;
