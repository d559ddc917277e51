//! JSON-RPC API Layer
//!
//! Exposes job scheduling, job status and lead status changes over JSON-RPC 2.0.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
