//! SQLite connection pooling for the wine inventory service.
//!
//! A single `SqlitePool` backs both the shared tables (job queue, history
//! aggregate, alert state) and every tenant's four dynamically-provisioned
//! tables (spec §3). WAL mode and `synchronous=NORMAL` are applied on
//! connect for concurrent read throughput; write serialization for the
//! stock-movement path is handled by `BEGIN IMMEDIATE` transactions at the
//! call site (see `wine_store`), not by this crate.

pub mod error;
pub mod pool;

pub use error::{DbError, Result};
pub use pool::{create_pool, DbConfig, DbPool};
