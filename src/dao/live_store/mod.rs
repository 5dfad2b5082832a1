pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use time::OffsetDateTime;

use crate::dao::{
    models::{
        ActorId, AdminLogEntry, EventContent, LiveEvent, LiveMatchSession, MapState, MatchId, Mvp,
        SeriesResult, Side,
    },
    storage::{MutationError, StorageResult},
};

/// Persistence adapter over one document per live match.
pub trait LiveMatchStore: Send + Sync {
    fn get(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<Option<LiveMatchSession>>>;
    /// Insert a freshly opened session; fails with `AlreadyExists` when a document is present.
    fn create(&self, session: LiveMatchSession) -> BoxFuture<'static, StorageResult<LiveMatchSession>>;
    /// Apply one mutation to the stored document and return the updated session.
    fn update(
        &self,
        match_id: MatchId,
        change: LiveChange,
    ) -> BoxFuture<'static, StorageResult<LiveMatchSession>>;
    /// Documents without a final result, most recently updated first.
    fn find_unfinished(&self) -> BoxFuture<'static, StorageResult<Vec<LiveMatchSession>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Mutation primitives applied to the live document.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveMutation {
    ScorePoint { map_number: u32, side: Side },
    DeclareMapWinner { map_number: u32 },
    RenameMap { map_number: u32, name: String },
    SetMvp { map_number: u32, mvp: Mvp },
    AppendMap { number: u32 },
    AppendEvent { map_number: u32, content: EventContent },
    Finish { result: SeriesResult },
}

/// A mutation together with the audit entry it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveChange {
    pub mutation: LiveMutation,
    pub actor_id: ActorId,
    pub action: String,
    pub at: OffsetDateTime,
}

impl LiveChange {
    /// Pair `mutation` with its audit entry.
    pub fn new(
        mutation: LiveMutation,
        actor_id: ActorId,
        action: impl Into<String>,
        at: OffsetDateTime,
    ) -> Self {
        Self {
            mutation,
            actor_id,
            action: action.into(),
            at,
        }
    }

    /// Apply the change in place, refusing anything that would break the document invariants.
    pub fn apply_to(&self, session: &mut LiveMatchSession) -> Result<(), MutationError> {
        if session.is_finished() {
            return Err(MutationError::Finished);
        }

        match &self.mutation {
            LiveMutation::ScorePoint { map_number, side } => {
                let declared = session.current_map_declared();
                let map = current_map(session, *map_number)?;
                if declared {
                    return Err(MutationError::AlreadyDeclared(*map_number));
                }
                map.score.increment(*side);
            }
            LiveMutation::DeclareMapWinner { map_number } => {
                let declared = session.current_map_declared();
                let map = current_map(session, *map_number)?;
                if declared {
                    return Err(MutationError::AlreadyDeclared(*map_number));
                }
                let winner = map.winner().ok_or(MutationError::Tied(*map_number))?;
                session.aggregate_score.increment(winner);
            }
            LiveMutation::RenameMap { map_number, name } => {
                let map = current_map(session, *map_number)?;
                map.name = Some(name.clone());
                session.current_map_name = Some(name.clone());
            }
            LiveMutation::SetMvp { map_number, mvp } => {
                let map = current_map(session, *map_number)?;
                if map.mvp.is_some() {
                    return Err(MutationError::MvpAlreadySet(*map_number));
                }
                map.mvp = Some(mvp.clone());
            }
            LiveMutation::AppendMap { number } => {
                let cap = session.format.map_count();
                if session.maps.len() >= cap {
                    return Err(MutationError::MapCapReached(cap));
                }
                if let Some(last) = session.current_map() {
                    if last.mvp.is_none() {
                        return Err(MutationError::MvpMissing(last.number));
                    }
                    if *number != last.number + 1 {
                        return Err(MutationError::NotCurrentMap(*number));
                    }
                }
                session.maps.push(MapState::empty(*number));
                session.current_map_name = None;
            }
            LiveMutation::AppendEvent {
                map_number,
                content,
            } => {
                let event = LiveEvent {
                    content: content.clone(),
                    actor_id: self.actor_id,
                    timestamp: self.at,
                };
                current_map(session, *map_number)?.events.push(event);
            }
            LiveMutation::Finish { result } => {
                session.final_result = Some(*result);
                session.mvp_of_series = session.best_mvp();
            }
        }

        session.admin_log.push(AdminLogEntry {
            action: self.action.clone(),
            actor_id: self.actor_id,
            timestamp: self.at,
        });
        session.last_updated_at = self.at;
        Ok(())
    }
}

fn current_map(session: &mut LiveMatchSession, number: u32) -> Result<&mut MapState, MutationError> {
    session
        .current_map_mut()
        .filter(|map| map.number == number)
        .ok_or(MutationError::NotCurrentMap(number))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::dao::models::{Score, SeriesFormat, TeamRef, Teams};

    fn session(format: SeriesFormat) -> LiveMatchSession {
        LiveMatchSession::open(
            3,
            format,
            Teams {
                home: TeamRef {
                    id: 0,
                    name: "Home".into(),
                },
                away: TeamRef {
                    id: 4,
                    name: "Away".into(),
                },
            },
            "started automatically",
            0,
            datetime!(2025-03-01 20:00 UTC),
        )
    }

    fn change(mutation: LiveMutation) -> LiveChange {
        LiveChange::new(mutation, 11, "test", datetime!(2025-03-01 20:05 UTC))
    }

    #[test]
    fn scoring_touches_only_the_current_map() {
        let mut doc = session(SeriesFormat::Md3);
        change(LiveMutation::ScorePoint {
            map_number: 1,
            side: Side::Away,
        })
        .apply_to(&mut doc)
        .expect("score");
        assert_eq!(doc.maps[0].score, Score { home: 0, away: 1 });
        assert_eq!(doc.admin_log.len(), 2);
        assert_eq!(doc.last_updated_at, datetime!(2025-03-01 20:05 UTC));

        let err = change(LiveMutation::ScorePoint {
            map_number: 2,
            side: Side::Home,
        })
        .apply_to(&mut doc)
        .unwrap_err();
        assert_eq!(err, MutationError::NotCurrentMap(2));
    }

    #[test]
    fn tied_map_cannot_be_declared() {
        let mut doc = session(SeriesFormat::Md1);
        let err = change(LiveMutation::DeclareMapWinner { map_number: 1 })
            .apply_to(&mut doc)
            .unwrap_err();
        assert_eq!(err, MutationError::Tied(1));
        assert_eq!(doc.aggregate_score, Score::default());
        assert_eq!(doc.admin_log.len(), 1);
    }

    #[test]
    fn map_win_counts_once() {
        let mut doc = session(SeriesFormat::Md3);
        doc.maps[0].score = Score { home: 16, away: 10 };
        let declare = change(LiveMutation::DeclareMapWinner { map_number: 1 });
        declare.apply_to(&mut doc).expect("declare");
        assert_eq!(doc.aggregate_score, Score { home: 1, away: 0 });

        assert_eq!(
            declare.apply_to(&mut doc).unwrap_err(),
            MutationError::AlreadyDeclared(1)
        );
        let score = change(LiveMutation::ScorePoint {
            map_number: 1,
            side: Side::Away,
        });
        assert_eq!(
            score.apply_to(&mut doc).unwrap_err(),
            MutationError::AlreadyDeclared(1)
        );
    }

    #[test]
    fn new_map_requires_previous_mvp_and_respects_cap() {
        let mut doc = session(SeriesFormat::Md3);
        let append = change(LiveMutation::AppendMap { number: 2 });
        assert_eq!(
            append.apply_to(&mut doc).unwrap_err(),
            MutationError::MvpMissing(1)
        );

        change(LiveMutation::SetMvp {
            map_number: 1,
            mvp: Mvp::from_kills_deaths("p", 10, 5),
        })
        .apply_to(&mut doc)
        .expect("mvp");
        append.apply_to(&mut doc).expect("append");
        assert_eq!(doc.maps.len(), 2);
        assert_eq!(doc.maps[1].number, 2);

        let mut md1 = session(SeriesFormat::Md1);
        md1.maps[0].mvp = Some(Mvp::from_kills_deaths("p", 1, 1));
        assert_eq!(
            append.apply_to(&mut md1).unwrap_err(),
            MutationError::MapCapReached(1)
        );
    }

    #[test]
    fn finished_document_rejects_everything() {
        let mut doc = session(SeriesFormat::Md1);
        doc.maps[0].mvp = Some(Mvp::from_kills_deaths("p", 30, 10));
        change(LiveMutation::Finish {
            result: SeriesResult::HomeWin,
        })
        .apply_to(&mut doc)
        .expect("finish");
        assert_eq!(doc.final_result, Some(SeriesResult::HomeWin));
        assert_eq!(doc.mvp_of_series.as_ref().map(|m| m.rating), Some(3.0));

        let err = change(LiveMutation::RenameMap {
            map_number: 1,
            name: "Nuke".into(),
        })
        .apply_to(&mut doc)
        .unwrap_err();
        assert_eq!(err, MutationError::Finished);
    }

    #[test]
    fn events_keep_order_and_actor() {
        let mut doc = session(SeriesFormat::Md1);
        for text in ["first", "second"] {
            change(LiveMutation::AppendEvent {
                map_number: 1,
                content: EventContent::Text { text: text.into() },
            })
            .apply_to(&mut doc)
            .expect("event");
        }
        let texts: Vec<_> = doc.maps[0]
            .events
            .iter()
            .map(|event| match &event.content {
                EventContent::Text { text } => text.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(texts, ["first", "second"]);
        assert!(doc.maps[0].events.iter().all(|event| event.actor_id == 11));
    }
}
