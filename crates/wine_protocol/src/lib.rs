//! Shared types and utilities used across the wine-inventory service crates.
//!
//! This crate carries the concerns that cut across ingestion, storage and
//! alerting: stable hashing for dedup keys, tenant table-name slugging, and
//! IANA timezone handling for the daily scheduler.

pub mod idempotency;
pub mod naming;
pub mod tenant;
pub mod tz;

pub use idempotency::{hash_parts, short_hash};
pub use naming::{is_safe_output_id, safe_output_id};
pub use tenant::{Tenant, TenantTableKind};
pub use tz::{is_valid_timezone, REPORT_TIMEZONE};
