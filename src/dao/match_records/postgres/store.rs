use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::{PgPool, postgres::PgPoolOptions};
use time::{Date, Time};

use super::error::{PgDaoError, PgResult};
use crate::dao::{
    match_records::MatchRecordStore,
    models::{MatchId, MatchStatus, ScheduledMatch, SeriesFormat, TeamRef},
    storage::StorageResult,
};

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Columns shared by every match query; the opponent comes from the team registration.
const MATCH_COLUMNS: &str = "SELECT m.id_matches::int8 AS id, m.dt_match, m.dt_time, \
     m.id_status::int4 AS status, m.id_formato::int4 AS format_id, \
     t.id_teams::int8 AS opponent_id, t.nm_name AS opponent_name, \
     (m.bl_tempo::int4 = 1) AS tracked \
     FROM tb_matches m \
     JOIN tb_multivalorado mv ON m.id_multivalorado = mv.id_multivalorado \
     JOIN tb_teams t ON mv.id_teams = t.id_teams";

#[derive(sqlx::FromRow)]
struct MatchRow {
    id: i64,
    dt_match: Date,
    dt_time: Option<Time>,
    status: i32,
    format_id: i32,
    opponent_id: i64,
    opponent_name: String,
    tracked: Option<bool>,
}

impl From<MatchRow> for ScheduledMatch {
    fn from(row: MatchRow) -> Self {
        Self {
            id: row.id,
            date: row.dt_match,
            time: row.dt_time.unwrap_or(Time::MIDNIGHT),
            status: MatchStatus::from_code(row.status).unwrap_or(MatchStatus::Scheduled),
            format: SeriesFormat::from_format_id(row.format_id),
            opponent: TeamRef {
                id: row.opponent_id,
                name: row.opponent_name,
            },
            time_tracked: row.tracked.unwrap_or(false),
        }
    }
}

/// Match records stored in the `tb_matches` PostgreSQL schema.
#[derive(Debug, Clone)]
pub struct PgMatchRecords {
    pool: PgPool,
}

impl PgMatchRecords {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `DATABASE_URL`.
    pub async fn connect_from_env() -> PgResult<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| PgDaoError::MissingEnvVar { var: "DATABASE_URL" })?;
        Self::connect(&url).await
    }

    /// Open a pool on `url` and check it with a ping.
    pub async fn connect(url: &str) -> PgResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
            .map_err(|source| PgDaoError::Connect { source })?;
        Ok(Self::new(pool))
    }

    async fn status(&self, match_id: MatchId) -> PgResult<Option<MatchStatus>> {
        let code = sqlx::query_scalar::<_, i32>(
            "SELECT id_status::int4 FROM tb_matches WHERE id_matches = $1",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| PgDaoError::LoadStatus { match_id, source })?;

        Ok(code.and_then(MatchStatus::from_code))
    }

    async fn set_status(&self, match_id: MatchId, status: MatchStatus) -> PgResult<bool> {
        let result = sqlx::query("UPDATE tb_matches SET id_status = $1 WHERE id_matches = $2")
            .bind(status.code())
            .bind(match_id)
            .execute(&self.pool)
            .await
            .map_err(|source| PgDaoError::UpdateStatus { match_id, source })?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_live(&self) -> PgResult<Option<MatchId>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id_matches::int8 FROM tb_matches WHERE id_status = $1 LIMIT 1",
        )
        .bind(MatchStatus::Live.code())
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| PgDaoError::QueryMatches {
            query: "live",
            source,
        })
    }

    async fn tracked_matches_on(&self, date: Date) -> PgResult<Vec<ScheduledMatch>> {
        let sql = format!(
            "{MATCH_COLUMNS} WHERE m.dt_match = $1 AND m.bl_tempo = 1 AND m.id_status <> $2 \
             ORDER BY m.dt_time"
        );
        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(date)
            .bind(MatchStatus::Finished.code())
            .fetch_all(&self.pool)
            .await
            .map_err(|source| PgDaoError::QueryMatches {
                query: "tracked",
                source,
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_match(&self, match_id: MatchId) -> PgResult<Option<ScheduledMatch>> {
        let sql = format!("{MATCH_COLUMNS} WHERE m.id_matches = $1");
        let row = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| PgDaoError::QueryMatches {
                query: "by id",
                source,
            })?;

        Ok(row.map(Into::into))
    }

    async fn recent_finished(&self, limit: u32) -> PgResult<Vec<ScheduledMatch>> {
        let sql = format!(
            "{MATCH_COLUMNS} WHERE m.id_status = $1 ORDER BY m.dt_match DESC, m.dt_time DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(MatchStatus::Finished.code())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|source| PgDaoError::QueryMatches {
                query: "finished",
                source,
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn ping(&self) -> PgResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|source| PgDaoError::HealthPing { source })?;
        Ok(())
    }
}

impl MatchRecordStore for PgMatchRecords {
    fn status(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchStatus>>> {
        let store = self.clone();
        Box::pin(async move { store.status(match_id).await.map_err(Into::into) })
    }

    fn set_status(
        &self,
        match_id: MatchId,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.set_status(match_id, status).await.map_err(Into::into) })
    }

    fn find_live(&self) -> BoxFuture<'static, StorageResult<Option<MatchId>>> {
        let store = self.clone();
        Box::pin(async move { store.find_live().await.map_err(Into::into) })
    }

    fn tracked_matches_on(&self, date: Date) -> BoxFuture<'static, StorageResult<Vec<ScheduledMatch>>> {
        let store = self.clone();
        Box::pin(async move { store.tracked_matches_on(date).await.map_err(Into::into) })
    }

    fn find_match(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<Option<ScheduledMatch>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(match_id).await.map_err(Into::into) })
    }

    fn recent_finished(&self, limit: u32) -> BoxFuture<'static, StorageResult<Vec<ScheduledMatch>>> {
        let store = self.clone();
        Box::pin(async move { store.recent_finished(limit).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    /// The pool reopens connections on demand; a successful ping is the reconnect.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
