//! Error taxonomy for the alerting crate. Alert delivery never aborts the
//! ingestion pipeline, so callers mostly log these rather than propagate them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert sink rejected delivery: {0}")]
    SinkRejected(String),
}

pub type Result<T> = std::result::Result<T, AlertError>;
