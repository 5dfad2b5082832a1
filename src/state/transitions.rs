use crate::{
    dao::{
        live_store::LiveChange,
        models::{LiveMatchSession, MatchId},
    },
    error::ServiceError,
    state::{
        CommandTurn, SharedState,
        state_machine::{PanelEvent, PanelPhase},
    },
};

/// Write one change to the live document as the work of a panel transition.
pub async fn apply_live_change(
    state: &SharedState,
    turn: &CommandTurn<'_>,
    event: PanelEvent,
    match_id: MatchId,
    change: LiveChange,
) -> Result<(LiveMatchSession, PanelPhase), ServiceError> {
    let store = state.live_store().clone();
    state
        .run_transition(turn, event, || async move {
            Ok::<_, ServiceError>(store.update(match_id, change).await?)
        })
        .await
}
