use time::OffsetDateTime;
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{ActorId, LiveMatchSession, MatchId, SYSTEM_ACTOR, ScheduledMatch, Teams},
        storage::StorageError,
    },
    dto::sse::LiveNotice,
    error::ServiceError,
    state::{
        CommandTurn, SharedState,
        registry::Claim,
        state_machine::{LiveStage, PanelEvent},
    },
};

/// What a promotion attempt did with one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// The match became the live session.
    Promoted,
    /// The match already was the live session.
    AlreadyLive,
    /// Another match holds the live slot.
    Conflict { active: MatchId },
    /// The match already ended and stays closed.
    Retired,
    /// Kickoff is outside the promotion window.
    OutsideWindow,
}

/// Run [`scan_once`] on the configured interval. Ticks never overlap; late ticks are skipped.
pub fn spawn(state: SharedState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(state.config().monitor_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match scan_once(&state, OffsetDateTime::now_utc()).await {
                Ok(outcomes) => debug!(candidates = outcomes.len(), "monitor tick done"),
                Err(err) => warn!(error = %err, "monitor tick failed"),
            }
        }
    })
}

/// Check today's tracked matches and promote the ones whose kickoff is within the window.
///
/// Every candidate gets its own outcome; one failure does not stop the others.
pub async fn scan_once(
    state: &SharedState,
    now: OffsetDateTime,
) -> Result<Vec<(MatchId, Result<Promotion, ServiceError>)>, ServiceError> {
    state.ensure_recovered()?;
    let offset = state.config().utc_offset;
    let today = now.to_offset(offset).date();
    let candidates = state.records().tracked_matches_on(today).await?;

    let mut outcomes = Vec::with_capacity(candidates.len());
    for record in candidates {
        let until_kickoff = record.kickoff(offset) - now;
        if !state.config().in_promotion_window(until_kickoff) {
            outcomes.push((record.id, Ok(Promotion::OutsideWindow)));
            continue;
        }

        let outcome = promote(state, &record, SYSTEM_ACTOR, "session started automatically").await;
        match &outcome {
            Ok(Promotion::Conflict { active }) => warn_conflict(state, *active, record.id),
            Ok(Promotion::Retired) => {
                debug!(match_id = record.id, "skipping match that already ended")
            }
            Ok(_) => {}
            Err(err) => warn!(match_id = record.id, error = %err, "failed to promote match"),
        }
        outcomes.push((record.id, outcome));
    }

    Ok(outcomes)
}

/// Make `record` the live session: status `live`, a fresh document, the registry slot and the
/// panel opened. Shared by the monitor and the manual trigger.
pub async fn promote(
    state: &SharedState,
    record: &ScheduledMatch,
    actor: ActorId,
    action: &str,
) -> Result<Promotion, ServiceError> {
    let turn = state.command_turn().await;

    match state.registry().claim(record.id).await {
        Claim::Claimed => {}
        Claim::AlreadyActive => return Ok(Promotion::AlreadyLive),
        Claim::Busy(active) => return Ok(Promotion::Conflict { active }),
        Claim::Retired => return Ok(Promotion::Retired),
    }

    let outcome = open_session(state, &turn, record, actor, action).await;
    if outcome.is_err() {
        state.registry().release(record.id).await;
    }
    outcome
}

async fn open_session(
    state: &SharedState,
    turn: &CommandTurn<'_>,
    record: &ScheduledMatch,
    actor: ActorId,
    action: &str,
) -> Result<Promotion, ServiceError> {
    let match_id = record.id;
    if !state.projector().mark_live(match_id).await? {
        state.registry().retire(match_id).await;
        return Ok(Promotion::Retired);
    }

    let teams = Teams {
        home: state.config().home_team.clone(),
        away: record.opponent.clone(),
    };
    let fresh = LiveMatchSession::open(
        match_id,
        record.format,
        teams,
        action,
        actor,
        OffsetDateTime::now_utc(),
    );

    let session = match state.live_store().create(fresh).await {
        Ok(session) => session,
        Err(StorageError::AlreadyExists { .. }) => {
            info!(match_id, "adopting existing live document");
            state.live_store().get(match_id).await?.ok_or_else(|| {
                ServiceError::InconsistentState(format!(
                    "live document of match {match_id} vanished during promotion"
                ))
            })?
        }
        Err(err) => return Err(err.into()),
    };

    if session.is_finished() {
        warn!(match_id, "live document already has a final result; closing the match");
        state.projector().mark_finished(match_id).await?;
        state.registry().retire(match_id).await;
        return Ok(Promotion::Retired);
    }

    let stage = LiveStage::derive(&session);
    state
        .run_transition(turn, PanelEvent::SessionOpened(stage), || async {
            Ok::<_, ServiceError>(())
        })
        .await?;

    info!(match_id, actor_id = actor, action, "live session opened");
    Ok(Promotion::Promoted)
}

fn warn_conflict(state: &SharedState, active: MatchId, candidate: MatchId) {
    let admins = state.conversations().panel_admins();
    if admins.is_empty() || !state.conversations().claim_conflict_warning() {
        return;
    }
    warn!(active, candidate, "another match is already live");
    state.broadcast().send_direct(
        admins,
        LiveNotice::info(format!(
            "another match is already live (match {active}); match {candidate} was not started"
        )),
    );
}
