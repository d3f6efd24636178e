//! Closed error taxonomy for job, store and movement operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] wine_db::DbError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("cannot transition a terminal job out of its final state")]
    TerminalJobTransition,

    #[error("no wine matched lookup term {0:?}")]
    WineNotFound(String),

    #[error("insufficient quantity: have {have}, need {need}")]
    InsufficientQuantity { have: i64, need: i64 },
}

pub type Result<T> = std::result::Result<T, StoreError>;
