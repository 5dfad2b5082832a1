use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::{LiveEvent, LiveMatchSession, Mvp, Score, SeriesResult, Teams},
    dto::live::ScoreboardView,
};

const EVENT_SCOREBOARD: &str = "live.scoreboard";
const EVENT_LIVE_EVENT: &str = "live.event";
const EVENT_MAP_RENAMED: &str = "live.map_renamed";
const EVENT_MVP: &str = "live.mvp";
const EVENT_SESSION_ENDED: &str = "live.ended";
const EVENT_INFO: &str = "info";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to a recipient when its stream opens.
pub struct Handshake {
    pub recipient: i64,
    pub message: String,
    /// Whether a store is currently unreachable.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// A live event together with the map it belongs to.
pub struct LiveEventNotice {
    pub map_number: u32,
    pub event: LiveEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MapRenamedNotice {
    pub map_number: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MvpNotice {
    pub map_number: u32,
    pub mvp: Mvp,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Terminal summary sent when the session ends.
pub struct SessionEndedNotice {
    pub match_id: i64,
    pub result: SeriesResult,
    pub aggregate: Score,
    pub teams: Teams,
    pub mvp_of_series: Option<Mvp>,
}

impl SessionEndedNotice {
    /// Terminal summary of `session` with its final verdict.
    pub fn from_session(session: &LiveMatchSession, result: SeriesResult) -> Self {
        Self {
            match_id: session.match_id,
            result,
            aggregate: session.aggregate_score,
            teams: session.teams.clone(),
            mvp_of_series: session.mvp_of_series.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct InfoNotice {
    pub message: String,
}

/// Notification delivered to one recipient.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveNotice {
    Scoreboard(ScoreboardView),
    Event(LiveEventNotice),
    MapRenamed(MapRenamedNotice),
    MvpRecorded(MvpNotice),
    SessionEnded(SessionEndedNotice),
    Info(InfoNotice),
}

impl LiveNotice {
    /// Plain informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        LiveNotice::Info(InfoNotice {
            message: message.into(),
        })
    }

    /// SSE event name of the notice.
    pub fn event_name(&self) -> &'static str {
        match self {
            LiveNotice::Scoreboard(_) => EVENT_SCOREBOARD,
            LiveNotice::Event(_) => EVENT_LIVE_EVENT,
            LiveNotice::MapRenamed(_) => EVENT_MAP_RENAMED,
            LiveNotice::MvpRecorded(_) => EVENT_MVP,
            LiveNotice::SessionEnded(_) => EVENT_SESSION_ENDED,
            LiveNotice::Info(_) => EVENT_INFO,
        }
    }

    /// Encode the notice as a named SSE event.
    pub fn to_server_event(&self) -> serde_json::Result<ServerEvent> {
        let name = Some(self.event_name().to_string());
        match self {
            LiveNotice::Scoreboard(payload) => ServerEvent::json(name, payload),
            LiveNotice::Event(payload) => ServerEvent::json(name, payload),
            LiveNotice::MapRenamed(payload) => ServerEvent::json(name, payload),
            LiveNotice::MvpRecorded(payload) => ServerEvent::json(name, payload),
            LiveNotice::SessionEnded(payload) => ServerEvent::json(name, payload),
            LiveNotice::Info(payload) => ServerEvent::json(name, payload),
        }
    }
}
