use tandem_core::types::DbId;

/// Errors surfaced by a [`Gateway`](crate::Gateway).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
