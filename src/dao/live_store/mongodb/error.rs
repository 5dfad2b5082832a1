use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::dao::models::MatchId;

/// Result alias for the MongoDB adapter.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert live document for match `{match_id}`")]
    InsertSession {
        match_id: MatchId,
        #[source]
        source: MongoError,
    },
    #[error("failed to load live document for match `{match_id}`")]
    LoadSession {
        match_id: MatchId,
        #[source]
        source: MongoError,
    },
    #[error("failed to write live document for match `{match_id}`")]
    WriteSession {
        match_id: MatchId,
        #[source]
        source: MongoError,
    },
    #[error("failed to list unfinished live documents")]
    ListUnfinished {
        #[source]
        source: MongoError,
    },
    #[error("failed to format document timestamp")]
    Timestamp {
        #[source]
        source: time::error::Format,
    },
}
