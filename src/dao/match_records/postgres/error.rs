use thiserror::Error;

use crate::dao::models::MatchId;

/// Result alias for the PostgreSQL adapter.
pub type PgResult<T> = std::result::Result<T, PgDaoError>;

#[derive(Debug, Error)]
pub enum PgDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to connect to PostgreSQL")]
    Connect {
        #[source]
        source: sqlx::Error,
    },
    #[error("PostgreSQL health check failed")]
    HealthPing {
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to read status of match `{match_id}`")]
    LoadStatus {
        match_id: MatchId,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to update status of match `{match_id}`")]
    UpdateStatus {
        match_id: MatchId,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to query matches ({query})")]
    QueryMatches {
        query: &'static str,
        #[source]
        source: sqlx::Error,
    },
}
