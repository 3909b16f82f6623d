//! Helper utilities, functions, and macros shared across the coordinator
//! and node binaries.

#[macro_use]
mod print;

#[macro_use]
mod config;

mod error;
mod time;

pub use config::{CoordinatorConfig, NodeConfig};
pub use error::RingVoteError;
pub use print::{logger_init, me, set_me};
pub use time::Clock;
