pub mod memory;
#[cfg(feature = "pg-records")]
pub mod postgres;

use futures::future::BoxFuture;
use time::Date;

use crate::dao::{
    models::{MatchId, MatchStatus, ScheduledMatch},
    storage::StorageResult,
};

/// Read/write access to the relational match records.
pub trait MatchRecordStore: Send + Sync {
    fn status(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchStatus>>>;
    /// Overwrite the status code; returns whether a record was updated.
    fn set_status(
        &self,
        match_id: MatchId,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Identifier of the record currently flagged live, if any.
    fn find_live(&self) -> BoxFuture<'static, StorageResult<Option<MatchId>>>;
    /// Time-tracked, unfinished matches scheduled on `date`.
    fn tracked_matches_on(&self, date: Date) -> BoxFuture<'static, StorageResult<Vec<ScheduledMatch>>>;
    fn find_match(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<Option<ScheduledMatch>>>;
    /// Most recent finished matches, newest first.
    fn recent_finished(&self, limit: u32) -> BoxFuture<'static, StorageResult<Vec<ScheduledMatch>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
