use crate::{
    dao::models::{LiveMatchSession, MatchId, MatchStatus},
    dto::history::{FinishedMatchView, MatchEventsView, MatchSummaryView},
    error::ServiceError,
    state::SharedState,
};

/// How many finished matches the history list shows.
pub const RECENT_FINISHED_LIMIT: u32 = 5;

/// Latest finished matches, newest first.
pub async fn finished_matches(state: &SharedState) -> Result<Vec<FinishedMatchView>, ServiceError> {
    let records = state.records().recent_finished(RECENT_FINISHED_LIMIT).await?;
    Ok(records.into_iter().map(FinishedMatchView::from).collect())
}

/// Final summary of a finished match.
pub async fn match_summary(
    state: &SharedState,
    match_id: MatchId,
) -> Result<MatchSummaryView, ServiceError> {
    let session = finished_session(state, match_id).await?;
    Ok(MatchSummaryView::from(&session))
}

/// Events of a finished match grouped per map.
pub async fn match_events(
    state: &SharedState,
    match_id: MatchId,
) -> Result<MatchEventsView, ServiceError> {
    let session = finished_session(state, match_id).await?;
    Ok(MatchEventsView::from(&session))
}

/// Live document of a match whose relational status is finished.
async fn finished_session(
    state: &SharedState,
    match_id: MatchId,
) -> Result<LiveMatchSession, ServiceError> {
    if state.records().status(match_id).await? != Some(MatchStatus::Finished) {
        return Err(ServiceError::NotFound(format!("finished match {match_id}")));
    }
    state
        .live_store()
        .get(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("live history of match {match_id}")))
}
