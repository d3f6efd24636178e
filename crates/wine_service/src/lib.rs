//! Wires ingestion, storage, alerting and scheduling together behind a
//! small set of plain async functions (spec §6): the CLI entry point in
//! `main.rs` is the only consumer, but everything here is exercised
//! directly in tests without going through it.

pub mod clients;
pub mod config;
pub mod notify;
pub mod service;
pub mod worker_pool;

pub use config::Config;
pub use notify::{AdminNotification, AdminNotifier, FileAdminNotifier, RecordingAdminNotifier};
pub use service::{IngestionApi, MovementApi, WineService};
pub use worker_pool::{IngestJob, IngestWorkerPool, WorkerContext};
