use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::{ActorId, EventContent, MatchId},
    dto::live::{
        CommandReply, InboundMessage, LiveCommand, MvpRequest, PanelView, RenameMapRequest,
    },
    error::AppError,
    services::live_control,
    state::SharedState,
};

const ACTOR_HEADER: &str = "x-actor-id";

/// Caller identity taken from the `x-actor-id` header.
pub struct Actor(pub ActorId);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<ActorId>().ok())
            .map(Actor)
            .ok_or_else(|| AppError::Unauthorized("missing or invalid `x-actor-id` header".into()))
    }
}

/// Live session endpoints: admin commands, free-form messages and the public snapshot.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/live", get(current_session))
        .route("/live/commands", post(run_command))
        .route("/live/messages", post(send_message))
        .route("/live/mvp", post(submit_mvp))
        .route("/live/events", post(post_event))
        .route("/live/map/name", post(rename_map))
        .route("/admin/live/start/{match_id}", post(start_match))
}

#[utoipa::path(
    get,
    path = "/live",
    tag = "live",
    responses(
        (status = 200, description = "Current live session", body = PanelView),
        (status = 404, description = "No active session")
    )
)]
/// Return the live session as seen from the panel.
pub async fn current_session(State(state): State<SharedState>) -> Result<Json<PanelView>, AppError> {
    Ok(Json(live_control::snapshot(&state).await?))
}

#[utoipa::path(
    post,
    path = "/live/commands",
    tag = "live",
    params(("x-actor-id" = i64, Header, description = "Identity of the caller")),
    request_body = LiveCommand,
    responses(
        (status = 200, description = "Command applied", body = CommandReply),
        (status = 401, description = "Caller is not an administrator"),
        (status = 404, description = "No active session"),
        (status = 409, description = "Command refused in the current state")
    )
)]
/// Run one command of the live vocabulary.
pub async fn run_command(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Json(command): Json<LiveCommand>,
) -> Result<Json<CommandReply>, AppError> {
    Ok(Json(live_control::handle_command(&state, actor, command).await?))
}

#[utoipa::path(
    post,
    path = "/live/messages",
    tag = "live",
    params(("x-actor-id" = i64, Header, description = "Identity of the caller")),
    request_body = InboundMessage,
    responses((status = 200, description = "Message handled", body = CommandReply))
)]
/// Deliver a free-form message; its meaning depends on the caller's pending prompt.
pub async fn send_message(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Json(message): Json<InboundMessage>,
) -> Result<Json<CommandReply>, AppError> {
    Ok(Json(live_control::handle_message(&state, actor, message).await?))
}

#[utoipa::path(
    post,
    path = "/live/mvp",
    tag = "live",
    params(("x-actor-id" = i64, Header, description = "Identity of the caller")),
    request_body = MvpRequest,
    responses((status = 200, description = "MVP recorded", body = CommandReply))
)]
/// Record the MVP of the map waiting for one.
pub async fn submit_mvp(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Valid(Json(payload)): Valid<Json<MvpRequest>>,
) -> Result<Json<CommandReply>, AppError> {
    let reply =
        live_control::set_mvp(&state, actor, &payload.name, payload.kills, payload.deaths).await?;
    Ok(Json(reply))
}

#[utoipa::path(
    post,
    path = "/live/events",
    tag = "live",
    params(("x-actor-id" = i64, Header, description = "Identity of the caller")),
    request_body = EventContent,
    responses((status = 200, description = "Event posted", body = CommandReply))
)]
/// Append an event to the current map.
pub async fn post_event(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Json(content): Json<EventContent>,
) -> Result<Json<CommandReply>, AppError> {
    Ok(Json(live_control::post_event(&state, actor, content).await?))
}

#[utoipa::path(
    post,
    path = "/live/map/name",
    tag = "live",
    params(("x-actor-id" = i64, Header, description = "Identity of the caller")),
    request_body = RenameMapRequest,
    responses((status = 200, description = "Map renamed", body = CommandReply))
)]
/// Name the current map.
pub async fn rename_map(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Valid(Json(payload)): Valid<Json<RenameMapRequest>>,
) -> Result<Json<CommandReply>, AppError> {
    Ok(Json(
        live_control::rename_map(&state, actor, &payload.name).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/admin/live/start/{match_id}",
    tag = "live",
    params(
        ("x-actor-id" = i64, Header, description = "Identity of the caller"),
        ("match_id" = i64, Path, description = "Match to put live")
    ),
    responses(
        (status = 200, description = "Session opened", body = CommandReply),
        (status = 409, description = "Another match is live or this one already ended")
    )
)]
/// Put a scheduled match live without waiting for the monitor.
pub async fn start_match(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Path(match_id): Path<MatchId>,
) -> Result<Json<CommandReply>, AppError> {
    Ok(Json(
        live_control::start_manually(&state, actor, match_id).await?,
    ))
}
