use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    dao::{
        match_records::MatchRecordStore,
        models::{MatchId, MatchStatus},
    },
    error::ServiceError,
};

/// Keeps the relational status code aligned with the live session lifecycle.
#[derive(Clone)]
pub struct StatusProjector {
    records: Arc<dyn MatchRecordStore>,
}

impl StatusProjector {
    pub fn new(records: Arc<dyn MatchRecordStore>) -> Self {
        Self { records }
    }

    /// Flag the match live. Returns `false` without writing when it already finished.
    pub async fn mark_live(&self, match_id: MatchId) -> Result<bool, ServiceError> {
        match self.current_status(match_id).await? {
            Some(MatchStatus::Finished) => {
                warn!(match_id, "match already finished; not marking it live");
                Ok(false)
            }
            Some(MatchStatus::Live) => Ok(true),
            Some(MatchStatus::Scheduled) => {
                self.write(match_id, MatchStatus::Live).await?;
                info!(match_id, "match status set to live");
                Ok(true)
            }
            None => Err(ServiceError::NotFound(format!("match {match_id}"))),
        }
    }

    /// Set status `finished`; `NotFound` when the record is missing.
    pub async fn mark_finished(&self, match_id: MatchId) -> Result<(), ServiceError> {
        self.write(match_id, MatchStatus::Finished).await?;
        info!(match_id, "match status set to finished");
        Ok(())
    }

    /// Stored status of `match_id`, `None` when unknown.
    pub async fn current_status(
        &self,
        match_id: MatchId,
    ) -> Result<Option<MatchStatus>, ServiceError> {
        Ok(self.records.status(match_id).await?)
    }

    async fn write(&self, match_id: MatchId, status: MatchStatus) -> Result<(), ServiceError> {
        if self.records.set_status(match_id, status).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("match {match_id}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{date, time};

    use super::*;
    use crate::dao::{
        match_records::memory::MemoryMatchRecords,
        models::{ScheduledMatch, SeriesFormat, TeamRef},
    };

    async fn projector_with(status: MatchStatus) -> (StatusProjector, MemoryMatchRecords) {
        let records = MemoryMatchRecords::new();
        records
            .insert(ScheduledMatch {
                id: 9,
                date: date!(2025 - 05 - 10),
                time: time!(14:00),
                status,
                format: SeriesFormat::Md3,
                opponent: TeamRef {
                    id: 2,
                    name: "NAVI".into(),
                },
                time_tracked: true,
            })
            .await;
        (StatusProjector::new(Arc::new(records.clone())), records)
    }

    #[tokio::test]
    async fn finished_match_is_never_marked_live() {
        let (projector, records) = projector_with(MatchStatus::Finished).await;
        assert!(!projector.mark_live(9).await.expect("mark live"));
        assert_eq!(
            records.status(9).await.expect("status"),
            Some(MatchStatus::Finished)
        );
    }

    #[tokio::test]
    async fn scheduled_match_goes_live_then_finished() {
        let (projector, _records) = projector_with(MatchStatus::Scheduled).await;
        assert!(projector.mark_live(9).await.expect("mark live"));
        assert_eq!(
            projector.current_status(9).await.expect("status"),
            Some(MatchStatus::Live)
        );
        projector.mark_finished(9).await.expect("finish");
        assert_eq!(
            projector.current_status(9).await.expect("status"),
            Some(MatchStatus::Finished)
        );
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let (projector, _records) = projector_with(MatchStatus::Scheduled).await;
        assert!(matches!(
            projector.mark_finished(77).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
