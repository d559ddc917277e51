// Tally Infrastructure - SQLite Adapter
// Implements: JobBroker, InvoiceStore, LeadStore

mod connection;
mod error;
mod job_broker;
mod migration;
mod record_store;

pub use connection::create_pool;
pub use job_broker::SqliteJobBroker;
pub use migration::run_migrations;
pub use record_store::SqliteRecordStore;

// Note: sqlx::Error conversion is handled by error::map_sqlx_error
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
