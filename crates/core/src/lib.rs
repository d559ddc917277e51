// Tally core: job domain, lead state machine, ports and use cases.
// Adapters (SQLite, filesystem, RPC) live in their own crates.

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};
