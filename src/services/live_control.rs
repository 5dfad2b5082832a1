use time::OffsetDateTime;
use tracing::{error, info};

use crate::{
    dao::{
        live_store::{LiveChange, LiveMutation},
        models::{
            ActorId, EventContent, LiveMatchSession, MatchId, MatchStatus, Mvp, SeriesResult, Side,
        },
    },
    dto::{
        live::{CommandReply, InboundMessage, LiveCommand, PanelView, ScoreboardView},
        sse::{LiveEventNotice, LiveNotice, MapRenamedNotice, MvpNotice, SessionEndedNotice},
        validation::{describe, parse_mvp_line, sanitize_map_name},
    },
    error::ServiceError,
    services::monitor::{self, Promotion},
    state::{
        CommandTurn, SharedState,
        conversation::ConversationState,
        state_machine::{LiveStage, PanelEvent, PanelPhase},
        transitions::apply_live_change,
    },
};

/// Dispatch one typed admin or spectator command.
pub async fn handle_command(
    state: &SharedState,
    actor: ActorId,
    command: LiveCommand,
) -> Result<CommandReply, ServiceError> {
    match command {
        LiveCommand::OpenPanel => open_panel(state, actor).await,
        LiveCommand::ScoreHome => score_point(state, actor, Side::Home).await,
        LiveCommand::ScoreAway => score_point(state, actor, Side::Away).await,
        LiveCommand::DeclareMapWin => declare_map_win(state, actor).await,
        LiveCommand::EndSession => end_session(state, actor).await,
        LiveCommand::RenameMap { name: Some(name) } => rename_map(state, actor, &name).await,
        LiveCommand::RenameMap { name: None } => begin_rename(state, actor).await,
        LiveCommand::Watch => watch(state, actor).await,
        LiveCommand::LeaveWatch => leave_watch(state, actor).await,
        LiveCommand::LeavePanel => leave_panel(state, actor).await,
    }
}

/// Route a free-form message according to the sender's conversation state.
pub async fn handle_message(
    state: &SharedState,
    actor: ActorId,
    message: InboundMessage,
) -> Result<CommandReply, ServiceError> {
    match state.conversations().get(actor) {
        ConversationState::AwaitingMvp { .. } => {
            let text = expect_text(&message, "the MVP line")?;
            submit_mvp_text(state, actor, &text).await
        }
        ConversationState::RenamingMap { map_number } => {
            let text = expect_text(&message, "the map name")?;
            rename_prompted_map(state, actor, map_number, &text).await
        }
        ConversationState::InPanel => post_event(state, actor, message.into_event()).await,
        ConversationState::Idle => Err(ServiceError::InvalidState(
            "nothing is waiting for a message; open the live panel first".into(),
        )),
    }
}

/// Open the admin panel for `actor` and describe the live session.
pub async fn open_panel(state: &SharedState, actor: ActorId) -> Result<CommandReply, ServiceError> {
    state.ensure_recovered()?;
    require_admin(state, actor)?;
    let session = active_session(state).await?;
    let stage = current_stage(state, &session).await;

    let current = state.conversations().get(actor);
    let next = match stage {
        LiveStage::AwaitingMvp { map_number } => ConversationState::AwaitingMvp { map_number },
        LiveStage::AwaitingMapName { map_number } if !current.in_panel() => {
            ConversationState::RenamingMap { map_number }
        }
        _ if current.in_panel() => current,
        _ => ConversationState::InPanel,
    };
    state.conversations().set(actor, next);
    info!(match_id = session.match_id, actor_id = actor, "live panel opened");

    Ok(panel_reply(
        state,
        actor,
        &session,
        stage,
        format!(
            "live panel: {} x {} ({})",
            session.teams.home.name,
            session.teams.away.name,
            session.format.label()
        ),
    ))
}

/// Add one point to `side` on the current map.
pub async fn score_point(
    state: &SharedState,
    actor: ActorId,
    side: Side,
) -> Result<CommandReply, ServiceError> {
    admit(state, actor)?;
    let turn = state.command_turn().await;
    let session = active_session(state).await?;
    ensure_scoring(current_stage(state, &session).await)?;
    let map_number = current_map_number(&session)?;

    let change = LiveChange::new(
        LiveMutation::ScorePoint { map_number, side },
        actor,
        format!("point for {} on map {map_number}", session.teams.name(side)),
        OffsetDateTime::now_utc(),
    );
    let (updated, phase) = apply_live_change(
        state,
        &turn,
        PanelEvent::PointScored,
        session.match_id,
        change,
    )
    .await?;

    publish_scoreboard(state, &updated).await;
    let score = updated.current_map().map(|map| map.score).unwrap_or_default();
    Ok(panel_reply(
        state,
        actor,
        &updated,
        stage_of(phase, &updated),
        format!(
            "map {map_number}: {} {} x {} {}",
            updated.teams.home.name, score.home, score.away, updated.teams.away.name
        ),
    ))
}

/// Count the current map for its leader and wait for the MVP.
pub async fn declare_map_win(
    state: &SharedState,
    actor: ActorId,
) -> Result<CommandReply, ServiceError> {
    admit(state, actor)?;
    let turn = state.command_turn().await;
    let session = active_session(state).await?;
    ensure_scoring(current_stage(state, &session).await)?;

    let map = session.current_map().ok_or_else(missing_maps)?;
    let map_number = map.number;
    let winner = map
        .winner()
        .ok_or(ServiceError::TiedMap { map_number })?;
    let action = format!(
        "map {map_number} won by {} ({}-{})",
        session.teams.name(winner),
        map.score.home,
        map.score.away
    );

    let change = LiveChange::new(
        LiveMutation::DeclareMapWinner { map_number },
        actor,
        action,
        OffsetDateTime::now_utc(),
    );
    let (updated, phase) = apply_live_change(
        state,
        &turn,
        PanelEvent::MapWon { map_number },
        session.match_id,
        change,
    )
    .await?;

    state
        .conversations()
        .set(actor, ConversationState::AwaitingMvp { map_number });
    publish_scoreboard(state, &updated).await;
    info!(match_id = updated.match_id, map_number, "map win declared");

    Ok(panel_reply(
        state,
        actor,
        &updated,
        stage_of(phase, &updated),
        format!(
            "map {map_number} won by {}; send the MVP as `<name> <kills>/<deaths>`",
            updated.teams.name(winner)
        ),
    ))
}

/// Parse `<name> <kills>/<deaths>` and record it as the MVP of the map awaiting one.
pub async fn submit_mvp_text(
    state: &SharedState,
    actor: ActorId,
    text: &str,
) -> Result<CommandReply, ServiceError> {
    admit(state, actor)?;
    let line = parse_mvp_line(text).map_err(|err| ServiceError::InvalidInput(describe(&err)))?;
    set_mvp(state, actor, &line.name, line.kills, line.deaths).await
}

/// Record the MVP of the declared map, then either open the next map or end the series.
pub async fn set_mvp(
    state: &SharedState,
    actor: ActorId,
    name: &str,
    kills: u32,
    deaths: u32,
) -> Result<CommandReply, ServiceError> {
    admit(state, actor)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("MVP name must not be empty".into()));
    }

    let turn = state.command_turn().await;
    let session = active_session(state).await?;
    let LiveStage::AwaitingMvp { map_number } = current_stage(state, &session).await else {
        return Err(ServiceError::InvalidState(
            "no map is waiting for an MVP".into(),
        ));
    };
    let map = session
        .current_map()
        .filter(|map| map.number == map_number)
        .ok_or_else(|| {
            ServiceError::InconsistentState(format!("map {map_number} is not the current map"))
        })?;

    // a retry after a failed follow-up write finds the MVP already stored
    let stored = map.mvp.clone();
    let mvp = stored
        .clone()
        .unwrap_or_else(|| Mvp::from_kills_deaths(name, kills, deaths));

    let ends = session.maps.len() >= session.format.map_count() || session.decided_by_aggregate();
    let result = SeriesResult::from_score(session.aggregate_score);
    let next_map = (!ends).then_some(map_number + 1);

    let at = OffsetDateTime::now_utc();
    let record_mvp = stored.is_none().then(|| {
        LiveChange::new(
            LiveMutation::SetMvp {
                map_number,
                mvp: mvp.clone(),
            },
            actor,
            format!(
                "MVP of map {map_number}: {} {} (rating {:.2})",
                mvp.name, mvp.kd, mvp.rating
            ),
            at,
        )
    });
    let follow_up = match next_map {
        Some(number) => LiveChange::new(
            LiveMutation::AppendMap { number },
            actor,
            format!("map {number} started"),
            at,
        ),
        None => LiveChange::new(
            LiveMutation::Finish { result },
            actor,
            format!("session ended: {}", result.label()),
            at,
        ),
    };

    let store = state.live_store().clone();
    let match_id = session.match_id;
    let (updated, phase) = state
        .run_transition(&turn, PanelEvent::MvpRecorded { next_map }, || async move {
            if let Some(change) = record_mvp {
                store.update(match_id, change).await?;
            }
            Ok::<_, ServiceError>(store.update(match_id, follow_up).await?)
        })
        .await?;

    state.conversations().settle_mvp_prompts(map_number);
    state
        .broadcast()
        .publish(LiveNotice::MvpRecorded(MvpNotice {
            map_number,
            mvp: mvp.clone(),
        }))
        .await;

    match next_map {
        Some(number) => {
            state
                .conversations()
                .set(actor, ConversationState::RenamingMap { map_number: number });
            publish_scoreboard(state, &updated).await;
            info!(match_id, map_number = number, "next map opened");
            Ok(panel_reply(
                state,
                actor,
                &updated,
                stage_of(phase, &updated),
                format!(
                    "MVP of map {map_number}: {} ({:.2}); map {number} started, send its name",
                    mvp.name, mvp.rating
                ),
            ))
        }
        None => {
            finalize(state, &turn, &updated, result).await;
            Ok(CommandReply::message(format!(
                "MVP of map {map_number}: {} ({:.2}); session ended: {}",
                mvp.name,
                mvp.rating,
                result.label()
            )))
        }
    }
}

/// Ask for the name of the current map in the next message.
pub async fn begin_rename(state: &SharedState, actor: ActorId) -> Result<CommandReply, ServiceError> {
    admit(state, actor)?;
    let session = active_session(state).await?;
    let map_number = current_map_number(&session)?;
    let stage = current_stage(state, &session).await;

    state
        .conversations()
        .set(actor, ConversationState::RenamingMap { map_number });
    Ok(panel_reply(
        state,
        actor,
        &session,
        stage,
        format!("send the name of map {map_number}"),
    ))
}

/// Set or overwrite the name of the current map.
pub async fn rename_map(
    state: &SharedState,
    actor: ActorId,
    raw_name: &str,
) -> Result<CommandReply, ServiceError> {
    rename_current_map(state, actor, raw_name, None).await
}

/// Answer to a rename prompt; refused once the prompted map is no longer the current one.
async fn rename_prompted_map(
    state: &SharedState,
    actor: ActorId,
    prompted: u32,
    raw_name: &str,
) -> Result<CommandReply, ServiceError> {
    rename_current_map(state, actor, raw_name, Some(prompted)).await
}

async fn rename_current_map(
    state: &SharedState,
    actor: ActorId,
    raw_name: &str,
    prompted: Option<u32>,
) -> Result<CommandReply, ServiceError> {
    admit(state, actor)?;
    let name = sanitize_map_name(raw_name).map_err(|err| ServiceError::InvalidInput(describe(&err)))?;

    let turn = state.command_turn().await;
    let session = active_session(state).await?;
    let map_number = current_map_number(&session)?;
    if let Some(prompted) = prompted.filter(|prompted| *prompted != map_number) {
        state.conversations().settle(actor);
        return Err(ServiceError::InvalidState(format!(
            "map {prompted} is no longer the current map (now map {map_number}); ask to rename again"
        )));
    }

    let change = LiveChange::new(
        LiveMutation::RenameMap {
            map_number,
            name: name.clone(),
        },
        actor,
        format!("map {map_number} renamed to {name}"),
        OffsetDateTime::now_utc(),
    );
    let (updated, phase) = apply_live_change(
        state,
        &turn,
        PanelEvent::MapRenamed,
        session.match_id,
        change,
    )
    .await?;

    if matches!(
        state.conversations().get(actor),
        ConversationState::RenamingMap { .. }
    ) {
        state.conversations().settle(actor);
    }
    state
        .broadcast()
        .publish(LiveNotice::MapRenamed(MapRenamedNotice {
            map_number,
            name: name.clone(),
        }))
        .await;

    Ok(panel_reply(
        state,
        actor,
        &updated,
        stage_of(phase, &updated),
        format!("map {map_number} is now {name}"),
    ))
}

/// Append a spectator-facing event to the current map.
pub async fn post_event(
    state: &SharedState,
    actor: ActorId,
    content: EventContent,
) -> Result<CommandReply, ServiceError> {
    admit(state, actor)?;
    ensure_event_content(&content)?;

    let turn = state.command_turn().await;
    let session = active_session(state).await?;
    let map_number = current_map_number(&session)?;

    let change = LiveChange::new(
        LiveMutation::AppendEvent {
            map_number,
            content: content.clone(),
        },
        actor,
        format!("{} event on map {map_number}", content.kind()),
        OffsetDateTime::now_utc(),
    );
    let (updated, _phase) = apply_live_change(
        state,
        &turn,
        PanelEvent::EventPosted,
        session.match_id,
        change,
    )
    .await?;

    if let Some(event) = updated
        .current_map()
        .and_then(|map| map.events.last())
        .cloned()
    {
        state
            .broadcast()
            .publish(LiveNotice::Event(LiveEventNotice { map_number, event }))
            .await;
    }

    Ok(CommandReply::message(format!(
        "{} event posted to map {map_number}",
        content.kind()
    )))
}

/// End the series with the per-map majority as result.
pub async fn end_session(state: &SharedState, actor: ActorId) -> Result<CommandReply, ServiceError> {
    admit(state, actor)?;
    let turn = state.command_turn().await;
    let session = active_session(state).await?;
    ensure_scoring(current_stage(state, &session).await)?;

    if let Some(map) = session.current_map() {
        if !map.score.is_blank() && map.mvp.is_none() {
            return Err(ServiceError::InvalidState(format!(
                "map {} needs a declared winner and an MVP before the session can end",
                map.number
            )));
        }
    }

    let result = SeriesResult::from_score(session.series_tally());
    let change = LiveChange::new(
        LiveMutation::Finish { result },
        actor,
        format!("session ended by admin: {}", result.label()),
        OffsetDateTime::now_utc(),
    );
    let (updated, _phase) = apply_live_change(
        state,
        &turn,
        PanelEvent::SessionClosed,
        session.match_id,
        change,
    )
    .await?;

    finalize(state, &turn, &updated, result).await;
    Ok(CommandReply::message(format!(
        "session ended: {}",
        result.label()
    )))
}

/// Subscribe `viewer` to the broadcast, replaying the current map first.
pub async fn watch(state: &SharedState, viewer: ActorId) -> Result<CommandReply, ServiceError> {
    state.ensure_recovered()?;
    let _turn = state.command_turn().await;
    let session = active_session(state).await?;

    let mut catch_up = vec![LiveNotice::Scoreboard(ScoreboardView::from(&session))];
    if let Some(map) = session.current_map() {
        if map.events.is_empty() {
            catch_up.push(LiveNotice::info(format!(
                "no events yet on map {}",
                map.number
            )));
        } else {
            catch_up.extend(map.events.iter().cloned().map(|event| {
                LiveNotice::Event(LiveEventNotice {
                    map_number: map.number,
                    event,
                })
            }));
        }
    }

    let added = state
        .broadcast()
        .subscribe_with_catch_up(viewer, catch_up)
        .await;
    let message = if added {
        info!(match_id = session.match_id, recipient = viewer, "viewer subscribed");
        format!(
            "watching {} x {}",
            session.teams.home.name, session.teams.away.name
        )
    } else {
        "already watching the live match".to_string()
    };
    Ok(CommandReply::message(message))
}

/// Remove `viewer` from the broadcast.
pub async fn leave_watch(state: &SharedState, viewer: ActorId) -> Result<CommandReply, ServiceError> {
    let message = if state.broadcast().unsubscribe(viewer).await {
        "stopped watching the live match"
    } else {
        "you were not watching the live match"
    };
    Ok(CommandReply::message(message))
}

/// Close the panel for `actor`, dropping any pending prompt and its subscription.
pub async fn leave_panel(state: &SharedState, actor: ActorId) -> Result<CommandReply, ServiceError> {
    state.conversations().set(actor, ConversationState::Idle);
    state.broadcast().unsubscribe(actor).await;
    Ok(CommandReply::message("left the live panel"))
}

/// Public view of the live session.
pub async fn snapshot(state: &SharedState) -> Result<PanelView, ServiceError> {
    state.ensure_recovered()?;
    let session = active_session(state).await?;
    let stage = current_stage(state, &session).await;
    Ok(PanelView::build(&session, stage, ConversationState::Idle))
}

/// Manual "go live" trigger for a scheduled match.
pub async fn start_manually(
    state: &SharedState,
    actor: ActorId,
    match_id: MatchId,
) -> Result<CommandReply, ServiceError> {
    admit(state, actor)?;
    let record = state
        .records()
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match {match_id}")))?;

    match monitor::promote(state, &record, actor, "session started manually").await? {
        Promotion::Promoted => {
            state.conversations().set(actor, ConversationState::InPanel);
            open_panel(state, actor).await
        }
        Promotion::AlreadyLive => Ok(CommandReply::message(format!(
            "match {match_id} is already live"
        ))),
        Promotion::Conflict { active } => Err(ServiceError::InvalidState(format!(
            "match {active} is already live"
        ))),
        Promotion::Retired => Err(ServiceError::SessionEnded),
        Promotion::OutsideWindow => Err(ServiceError::InvalidState(format!(
            "match {match_id} is outside the promotion window"
        ))),
    }
}

/// Close the bookkeeping of an ended session and tell everyone involved.
async fn finalize(
    state: &SharedState,
    _turn: &CommandTurn<'_>,
    session: &LiveMatchSession,
    result: SeriesResult,
) {
    let match_id = session.match_id;
    if let Err(err) = state.projector().mark_finished(match_id).await {
        error!(match_id, error = %err, "failed to mark ended session as finished");
    }
    state.registry().clear().await;

    let panel_admins = state.conversations().panel_admins();
    state.conversations().clear_all();

    let notice = LiveNotice::SessionEnded(SessionEndedNotice::from_session(session, result));
    let subscribers = state.broadcast().subscribers().await;
    state.broadcast().publish(notice.clone()).await;
    let unsubscribed: Vec<_> = panel_admins
        .into_iter()
        .filter(|admin| !subscribers.contains(admin))
        .collect();
    state.broadcast().send_direct(unsubscribed, notice);
    state.broadcast().clear().await;

    info!(match_id, result = result.label(), "live session ended");
}

/// Load the active session, refusing ended or inconsistent ones.
async fn active_session(state: &SharedState) -> Result<LiveMatchSession, ServiceError> {
    let match_id = state
        .registry()
        .active()
        .await
        .ok_or(ServiceError::NoActiveSession)?;

    let session = state.live_store().get(match_id).await?.ok_or_else(|| {
        ServiceError::InconsistentState(format!("match {match_id} is live without a live document"))
    })?;
    if session.is_finished() {
        return Err(ServiceError::SessionEnded);
    }
    if state.projector().current_status(match_id).await? == Some(MatchStatus::Finished) {
        return Err(ServiceError::SessionEnded);
    }
    Ok(session)
}

fn admit(state: &SharedState, actor: ActorId) -> Result<(), ServiceError> {
    state.ensure_recovered()?;
    require_admin(state, actor)?;
    state.ensure_available()
}

fn require_admin(state: &SharedState, actor: ActorId) -> Result<(), ServiceError> {
    if state.admins().is_admin(actor) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(format!(
            "actor {actor} is not an administrator"
        )))
    }
}

async fn current_stage(state: &SharedState, session: &LiveMatchSession) -> LiveStage {
    state
        .panel_stage()
        .await
        .unwrap_or_else(|| LiveStage::derive(session))
}

fn stage_of(phase: PanelPhase, session: &LiveMatchSession) -> LiveStage {
    match phase {
        PanelPhase::Live(stage) => stage,
        PanelPhase::Idle => LiveStage::derive(session),
    }
}

fn ensure_scoring(stage: LiveStage) -> Result<(), ServiceError> {
    match stage {
        LiveStage::AwaitingMvp { map_number } => Err(ServiceError::InvalidState(format!(
            "map {map_number} is waiting for its MVP"
        ))),
        LiveStage::Scoring | LiveStage::AwaitingMapName { .. } => Ok(()),
    }
}

fn current_map_number(session: &LiveMatchSession) -> Result<u32, ServiceError> {
    session
        .current_map()
        .map(|map| map.number)
        .ok_or_else(missing_maps)
}

fn missing_maps() -> ServiceError {
    ServiceError::InconsistentState("live document has no maps".into())
}

fn ensure_event_content(content: &EventContent) -> Result<(), ServiceError> {
    let blank = match content {
        EventContent::Text { text } => text.trim().is_empty(),
        EventContent::Link { url } => url.trim().is_empty(),
        EventContent::Photo { file_ref, .. } | EventContent::Video { file_ref, .. } => {
            file_ref.trim().is_empty()
        }
    };
    if blank {
        Err(ServiceError::InvalidInput(format!(
            "{} event must not be empty",
            content.kind()
        )))
    } else {
        Ok(())
    }
}

fn expect_text(message: &InboundMessage, what: &str) -> Result<String, ServiceError> {
    message
        .text()
        .map(str::to_owned)
        .ok_or_else(|| ServiceError::InvalidInput(format!("{what} must be sent as text")))
}

async fn publish_scoreboard(state: &SharedState, session: &LiveMatchSession) {
    state
        .broadcast()
        .publish(LiveNotice::Scoreboard(ScoreboardView::from(session)))
        .await;
}

fn panel_reply(
    state: &SharedState,
    actor: ActorId,
    session: &LiveMatchSession,
    stage: LiveStage,
    message: String,
) -> CommandReply {
    CommandReply::with_panel(
        message,
        PanelView::build(session, stage, state.conversations().get(actor)),
    )
}
