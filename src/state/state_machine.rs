use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::LiveMatchSession;

/// High-level phases of the admin control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPhase {
    /// No session is live; only a promotion can open the panel.
    Idle,
    /// A session is live and the panel is in one of its stages.
    Live(LiveStage),
}

/// Fine-grained stage while a session is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStage {
    /// Points, renames and events are accepted for the current map.
    Scoring,
    /// The map win was counted; nothing but the MVP line moves the series on.
    AwaitingMvp { map_number: u32 },
    /// A new map was appended and should be named.
    AwaitingMapName { map_number: u32 },
}

impl LiveStage {
    /// Rebuild the stage a stored document is in.
    pub fn derive(session: &LiveMatchSession) -> Self {
        let Some(map) = session.current_map() else {
            return LiveStage::Scoring;
        };
        if session.current_map_declared() && map.mvp.is_none() {
            LiveStage::AwaitingMvp {
                map_number: map.number,
            }
        } else if map.name.is_none() && map.number > 1 {
            LiveStage::AwaitingMapName {
                map_number: map.number,
            }
        } else {
            LiveStage::Scoring
        }
    }

    /// Whether point increments and a session end are allowed.
    pub fn accepts_scoring(self) -> bool {
        !matches!(self, LiveStage::AwaitingMvp { .. })
    }
}

/// Events that can be applied to the panel state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    /// A session was promoted or recovered in the given stage.
    SessionOpened(LiveStage),
    PointScored,
    /// The current map's winner was counted.
    MapWon { map_number: u32 },
    /// The MVP was stored; `next_map` is the appended map, `None` when the series ended.
    MvpRecorded { next_map: Option<u32> },
    MapRenamed,
    EventPosted,
    /// The session was ended by an admin.
    SessionClosed,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    pub from: PanelPhase,
    pub event: PanelEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    NoPending,
    IdMismatch { expected: PlanId, got: PlanId },
    PhaseMismatch { expected: PanelPhase, actual: PanelPhase },
    VersionMismatch { expected: usize, actual: usize },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    NoPending,
    IdMismatch { expected: PlanId, got: PlanId },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A validated transition waiting for its side effects to complete.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: PlanId,
    pub from: PanelPhase,
    pub to: PanelPhase,
    pub event: PanelEvent,
    pub version_next: usize,
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: PanelPhase,
    /// Increments on each applied transition.
    pub version: usize,
    pub pending: Option<PanelPhase>,
}

/// Admin panel flow: which commands the live session accepts next.
#[derive(Debug, Clone)]
pub struct PanelStateMachine {
    phase: PanelPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for PanelStateMachine {
    fn default() -> Self {
        Self {
            phase: PanelPhase::Idle,
            version: 0,
            pending: None,
        }
    }
}

impl PanelStateMachine {
    /// Idle machine at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PanelPhase {
        self.phase
    }

    /// Current live stage, `None` while idle.
    pub fn stage(&self) -> Option<LiveStage> {
        match self.phase {
            PanelPhase::Live(stage) => Some(stage),
            PanelPhase::Idle => None,
        }
    }

    /// Copy of the phase, version and pending target.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Validate that `event` can be applied and reserve the transition.
    pub fn plan(&mut self, event: PanelEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };
        self.pending = Some(plan.clone());
        Ok(plan)
    }

    /// Move to the planned phase.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<PanelPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;
        Ok(self.phase)
    }

    /// Drop the pending plan, leaving the phase untouched.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: PanelEvent) -> Result<PanelPhase, InvalidTransition> {
        use LiveStage::*;

        let next = match (self.phase, event) {
            (PanelPhase::Idle, PanelEvent::SessionOpened(stage)) => PanelPhase::Live(stage),
            (PanelPhase::Live(stage), PanelEvent::PointScored) if stage.accepts_scoring() => {
                PanelPhase::Live(stage)
            }
            (PanelPhase::Live(stage), PanelEvent::MapWon { map_number }) if stage.accepts_scoring() => {
                PanelPhase::Live(AwaitingMvp { map_number })
            }
            (PanelPhase::Live(AwaitingMvp { .. }), PanelEvent::MvpRecorded { next_map }) => {
                match next_map {
                    Some(map_number) => PanelPhase::Live(AwaitingMapName { map_number }),
                    None => PanelPhase::Idle,
                }
            }
            (PanelPhase::Live(AwaitingMapName { .. }), PanelEvent::MapRenamed) => {
                PanelPhase::Live(Scoring)
            }
            (PanelPhase::Live(stage), PanelEvent::MapRenamed | PanelEvent::EventPosted) => {
                PanelPhase::Live(stage)
            }
            (PanelPhase::Live(stage), PanelEvent::SessionClosed) if stage.accepts_scoring() => {
                PanelPhase::Idle
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::dao::models::{
        MapState, Mvp, Score, SeriesFormat, Side, TeamRef, Teams,
    };

    fn apply(sm: &mut PanelStateMachine, event: PanelEvent) -> PanelPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    fn live(stage: LiveStage) -> PanelPhase {
        PanelPhase::Live(stage)
    }

    #[test]
    fn initial_state_is_idle() {
        let sm = PanelStateMachine::new();
        assert_eq!(sm.phase(), PanelPhase::Idle);
        assert_eq!(sm.stage(), None);
    }

    #[test]
    fn full_series_path() {
        let mut sm = PanelStateMachine::new();

        assert_eq!(
            apply(&mut sm, PanelEvent::SessionOpened(LiveStage::Scoring)),
            live(LiveStage::Scoring)
        );
        assert_eq!(apply(&mut sm, PanelEvent::PointScored), live(LiveStage::Scoring));
        assert_eq!(
            apply(&mut sm, PanelEvent::MapWon { map_number: 1 }),
            live(LiveStage::AwaitingMvp { map_number: 1 })
        );
        assert_eq!(
            apply(&mut sm, PanelEvent::MvpRecorded { next_map: Some(2) }),
            live(LiveStage::AwaitingMapName { map_number: 2 })
        );
        assert_eq!(
            apply(&mut sm, PanelEvent::MapRenamed),
            live(LiveStage::Scoring)
        );
        apply(&mut sm, PanelEvent::MapWon { map_number: 2 });
        assert_eq!(
            apply(&mut sm, PanelEvent::MvpRecorded { next_map: None }),
            PanelPhase::Idle
        );
        assert_eq!(sm.snapshot().version, 7);
    }

    #[test]
    fn awaiting_mvp_blocks_scoring_and_ending() {
        let mut sm = PanelStateMachine::new();
        apply(&mut sm, PanelEvent::SessionOpened(LiveStage::Scoring));
        apply(&mut sm, PanelEvent::MapWon { map_number: 1 });

        for event in [
            PanelEvent::PointScored,
            PanelEvent::MapWon { map_number: 1 },
            PanelEvent::SessionClosed,
        ] {
            assert!(matches!(
                sm.plan(event),
                Err(PlanError::InvalidTransition(_))
            ));
        }
        assert_eq!(
            apply(&mut sm, PanelEvent::EventPosted),
            live(LiveStage::AwaitingMvp { map_number: 1 })
        );
    }

    #[test]
    fn scoring_is_tolerated_before_the_new_map_is_named() {
        let mut sm = PanelStateMachine::new();
        apply(
            &mut sm,
            PanelEvent::SessionOpened(LiveStage::AwaitingMapName { map_number: 2 }),
        );
        assert_eq!(
            apply(&mut sm, PanelEvent::PointScored),
            live(LiveStage::AwaitingMapName { map_number: 2 })
        );
        assert_eq!(apply(&mut sm, PanelEvent::SessionClosed), PanelPhase::Idle);
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = PanelStateMachine::new();
        let err = sm.plan(PanelEvent::PointScored).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, PanelPhase::Idle);
                assert_eq!(invalid.event, PanelEvent::PointScored);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = PanelStateMachine::new();
        let plan = sm
            .plan(PanelEvent::SessionOpened(LiveStage::Scoring))
            .unwrap();
        assert_eq!(sm.plan(PanelEvent::EventPosted).unwrap_err(), PlanError::AlreadyPending);
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), PanelPhase::Idle);
    }

    #[test]
    fn stage_is_derived_from_the_document() {
        let teams = Teams {
            home: TeamRef {
                id: 0,
                name: "Home".into(),
            },
            away: TeamRef {
                id: 1,
                name: "Away".into(),
            },
        };
        let mut doc = LiveMatchSession::open(
            1,
            SeriesFormat::Md3,
            teams,
            "started",
            0,
            datetime!(2025-03-01 20:00 UTC),
        );
        assert_eq!(LiveStage::derive(&doc), LiveStage::Scoring);

        doc.maps[0].score = Score { home: 2, away: 0 };
        doc.aggregate_score.increment(Side::Home);
        assert_eq!(
            LiveStage::derive(&doc),
            LiveStage::AwaitingMvp { map_number: 1 }
        );

        doc.maps[0].mvp = Some(Mvp::from_kills_deaths("p", 2, 1));
        doc.maps.push(MapState::empty(2));
        assert_eq!(
            LiveStage::derive(&doc),
            LiveStage::AwaitingMapName { map_number: 2 }
        );

        doc.maps[1].name = Some("Mirage".into());
        assert_eq!(LiveStage::derive(&doc), LiveStage::Scoring);
    }
}
