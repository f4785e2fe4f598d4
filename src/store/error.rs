use thiserror::Error;

/// Failures of the persisted rule table.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode or decode rule conditions: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("rule {id} does not exist")]
    NotFound { id: i64 },

    #[error("rule {parent} is rule {id} or one of its descendants; refusing to create a cycle")]
    Cycle { id: i64, parent: i64 },
}
