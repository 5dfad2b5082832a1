use tracing::{info, warn};

use crate::{
    dao::models::MatchId,
    error::ServiceError,
    state::{
        SharedState,
        state_machine::{LiveStage, PanelEvent},
    },
};

/// What startup reconciliation found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No match was flagged live.
    Clean,
    /// The live match was registered again.
    Resumed(MatchId),
    /// Status said live but the live document was missing; the match was closed.
    ClosedMissingDocument(MatchId),
    /// Status said live but the document already had a final result; the match was closed.
    ClosedFinished(MatchId),
}

/// Reconcile the registry with both stores. Runs once, before the monitor and any command.
pub async fn reconcile(state: &SharedState) -> Result<RecoveryOutcome, ServiceError> {
    if state.ensure_recovered().is_ok() {
        return Err(ServiceError::InvalidState(
            "session recovery already ran".into(),
        ));
    }

    let turn = state.command_turn().await;
    state.registry().reset().await;

    let outcome = match state.records().find_live().await? {
        None => {
            warn_orphan_documents(state).await;
            RecoveryOutcome::Clean
        }
        Some(match_id) => match state.live_store().get(match_id).await? {
            None => {
                warn!(
                    match_id,
                    "match flagged live without a live document; marking it finished"
                );
                state.projector().mark_finished(match_id).await?;
                RecoveryOutcome::ClosedMissingDocument(match_id)
            }
            Some(session) if session.is_finished() => {
                warn!(
                    match_id,
                    "match flagged live but its live document already ended; marking it finished"
                );
                state.projector().mark_finished(match_id).await?;
                state.registry().retire(match_id).await;
                RecoveryOutcome::ClosedFinished(match_id)
            }
            Some(session) => {
                if !state.registry().try_set_active(match_id).await {
                    return Err(ServiceError::InconsistentState(format!(
                        "match {match_id} could not be registered as live"
                    )));
                }
                let stage = LiveStage::derive(&session);
                state
                    .run_transition(&turn, PanelEvent::SessionOpened(stage), || async {
                        Ok::<_, ServiceError>(())
                    })
                    .await?;
                info!(match_id, stage = ?stage, "resumed live session");
                RecoveryOutcome::Resumed(match_id)
            }
        },
    };

    state.mark_recovered();
    Ok(outcome)
}

async fn warn_orphan_documents(state: &SharedState) {
    match state.live_store().find_unfinished().await {
        Ok(orphans) => {
            for session in orphans {
                warn!(
                    match_id = session.match_id,
                    "unfinished live document without a live match record"
                );
            }
        }
        Err(err) => warn!(error = %err, "failed to look for orphan live documents"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::{date, datetime, time};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            live_store::{LiveChange, LiveMatchStore, LiveMutation, memory::MemoryLiveStore},
            match_records::{MatchRecordStore, memory::MemoryMatchRecords},
            models::{
                LiveMatchSession, MatchStatus, ScheduledMatch, SeriesFormat, SeriesResult,
                TeamRef, Teams,
            },
        },
        state::{AppState, state_machine::PanelPhase},
    };

    async fn fixture(status: MatchStatus) -> (SharedState, MemoryLiveStore, MemoryMatchRecords) {
        let live = MemoryLiveStore::new();
        let records = MemoryMatchRecords::new();
        records
            .insert(ScheduledMatch {
                id: 42,
                date: date!(2025 - 06 - 01),
                time: time!(20:00),
                status,
                format: SeriesFormat::Md3,
                opponent: TeamRef {
                    id: 7,
                    name: "MIBR".into(),
                },
                time_tracked: true,
            })
            .await;
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(live.clone()),
            Arc::new(records.clone()),
        );
        (state, live, records)
    }

    fn document() -> LiveMatchSession {
        LiveMatchSession::open(
            42,
            SeriesFormat::Md3,
            Teams {
                home: TeamRef {
                    id: 0,
                    name: "FURIA".into(),
                },
                away: TeamRef {
                    id: 7,
                    name: "MIBR".into(),
                },
            },
            "session started automatically",
            0,
            datetime!(2025-06-01 20:00 UTC),
        )
    }

    #[tokio::test]
    async fn live_status_without_document_is_closed() {
        let (state, _live, records) = fixture(MatchStatus::Live).await;

        let outcome = reconcile(&state).await.expect("reconcile");
        assert_eq!(outcome, RecoveryOutcome::ClosedMissingDocument(42));
        assert_eq!(
            records.status(42).await.expect("status"),
            Some(MatchStatus::Finished)
        );
        assert_eq!(state.registry().active().await, None);
    }

    #[tokio::test]
    async fn live_status_with_document_resumes() {
        let (state, live, _records) = fixture(MatchStatus::Live).await;
        live.insert(document()).await;

        let outcome = reconcile(&state).await.expect("reconcile");
        assert_eq!(outcome, RecoveryOutcome::Resumed(42));
        assert!(state.registry().is_active(42).await);
        assert_eq!(
            state.snapshot().await.phase,
            PanelPhase::Live(LiveStage::Scoring)
        );
    }

    #[tokio::test]
    async fn ended_document_is_not_resurrected() {
        let (state, live, records) = fixture(MatchStatus::Live).await;
        live.insert(document()).await;
        live.update(
            42,
            LiveChange::new(
                LiveMutation::Finish {
                    result: SeriesResult::Draw,
                },
                0,
                "session ended",
                datetime!(2025-06-01 22:00 UTC),
            ),
        )
        .await
        .expect("finish");

        let outcome = reconcile(&state).await.expect("reconcile");
        assert_eq!(outcome, RecoveryOutcome::ClosedFinished(42));
        assert!(state.registry().is_retired(42).await);
        assert_eq!(
            records.status(42).await.expect("status"),
            Some(MatchStatus::Finished)
        );
    }

    #[tokio::test]
    async fn commands_wait_for_recovery_and_it_runs_once() {
        let (state, _live, _records) = fixture(MatchStatus::Scheduled).await;
        assert!(state.ensure_recovered().is_err());

        assert_eq!(
            reconcile(&state).await.expect("reconcile"),
            RecoveryOutcome::Clean
        );
        assert!(state.ensure_recovered().is_ok());
        assert!(reconcile(&state).await.is_err());
    }
}
