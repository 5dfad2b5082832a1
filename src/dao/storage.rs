use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A live document already exists for the match.
    #[error("live document for match `{match_id}` already exists")]
    AlreadyExists { match_id: i64 },
    /// The targeted record does not exist.
    #[error("match `{match_id}` not found")]
    NotFound { match_id: i64 },
    /// The document changed underneath a conditional write.
    #[error("live document for match `{match_id}` was modified concurrently")]
    Conflict { match_id: i64 },
    /// The stored document refused the mutation.
    #[error("mutation rejected: {0}")]
    Rejected(#[from] MutationError),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Reasons a live document refuses a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("session already ended")]
    Finished,
    #[error("map {0} is not the current map")]
    NotCurrentMap(u32),
    #[error("map {0} was already declared")]
    AlreadyDeclared(u32),
    #[error("map {0} is tied")]
    Tied(u32),
    #[error("map {0} already has an MVP")]
    MvpAlreadySet(u32),
    #[error("map {0} has no MVP yet")]
    MvpMissing(u32),
    #[error("series already has {0} map(s)")]
    MapCapReached(usize),
}
