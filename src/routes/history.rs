use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dao::models::MatchId,
    dto::history::{FinishedMatchView, MatchEventsView, MatchSummaryView},
    error::AppError,
    services::history_service,
    state::SharedState,
};

/// Read-only views over finished matches.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches/finished", get(list_finished))
        .route("/matches/{id}/summary", get(get_summary))
        .route("/matches/{id}/events", get(get_events))
}

#[utoipa::path(
    get,
    path = "/matches/finished",
    tag = "history",
    responses((status = 200, description = "Latest finished matches", body = [FinishedMatchView]))
)]
/// Latest finished matches.
pub async fn list_finished(
    State(state): State<SharedState>,
) -> Result<Json<Vec<FinishedMatchView>>, AppError> {
    Ok(Json(history_service::finished_matches(&state).await?))
}

#[utoipa::path(
    get,
    path = "/matches/{id}/summary",
    tag = "history",
    params(("id" = i64, Path, description = "Finished match")),
    responses(
        (status = 200, description = "Final summary", body = MatchSummaryView),
        (status = 404, description = "Match not finished or without live history")
    )
)]
/// Final score, verdict and per-map MVPs of a finished match.
pub async fn get_summary(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
) -> Result<Json<MatchSummaryView>, AppError> {
    Ok(Json(history_service::match_summary(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/matches/{id}/events",
    tag = "history",
    params(("id" = i64, Path, description = "Finished match")),
    responses(
        (status = 200, description = "Events per map", body = MatchEventsView),
        (status = 404, description = "Match not finished or without live history")
    )
)]
/// Per-map events of a finished match.
pub async fn get_events(
    State(state): State<SharedState>,
    Path(id): Path<MatchId>,
) -> Result<Json<MatchEventsView>, AppError> {
    Ok(Json(history_service::match_events(&state, id).await?))
}
