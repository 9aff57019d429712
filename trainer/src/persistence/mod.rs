//! On-disk records of training results.

mod json_store;
mod result_store;

pub(crate) use json_store::{JsonStore, Storable};

pub use result_store::{PuzzleResultRecord, ResultStore, SessionRecord};

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
