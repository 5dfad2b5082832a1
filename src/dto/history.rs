use serde::Serialize;
use time::Date;
use utoipa::ToSchema;

use crate::{
    dao::models::{
        LiveEvent, LiveMatchSession, MatchId, Mvp, ScheduledMatch, Score, SeriesFormat,
        SeriesResult, Side, Teams,
    },
    dto::live::MapView,
};

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");

/// Row of the finished matches list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FinishedMatchView {
    pub match_id: MatchId,
    #[serde(with = "calendar_date")]
    #[schema(value_type = String, format = Date)]
    pub date: Date,
    pub opponent: String,
    pub format: SeriesFormat,
}

impl From<ScheduledMatch> for FinishedMatchView {
    fn from(record: ScheduledMatch) -> Self {
        Self {
            match_id: record.id,
            date: record.date,
            opponent: record.opponent.name,
            format: record.format,
        }
    }
}

/// Map line of a match summary.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MapSummary {
    #[serde(flatten)]
    pub map: MapView,
    /// `None` when the map ended tied or was never played.
    pub winner: Option<Side>,
}

/// Final summary of a finished match.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MatchSummaryView {
    pub match_id: MatchId,
    pub format: SeriesFormat,
    pub teams: Teams,
    pub aggregate: Score,
    pub result: SeriesResult,
    pub mvp_of_series: Option<Mvp>,
    pub maps: Vec<MapSummary>,
}

impl From<&LiveMatchSession> for MatchSummaryView {
    fn from(session: &LiveMatchSession) -> Self {
        Self {
            match_id: session.match_id,
            format: session.format,
            teams: session.teams.clone(),
            aggregate: session.aggregate_score,
            result: session
                .final_result
                .unwrap_or_else(|| SeriesResult::from_score(session.series_tally())),
            mvp_of_series: session.mvp_of_series.clone(),
            maps: session
                .maps
                .iter()
                .map(|map| MapSummary {
                    map: map.into(),
                    winner: map.winner(),
                })
                .collect(),
        }
    }
}

/// Events of one map in original order.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MapEvents {
    pub number: u32,
    pub name: Option<String>,
    pub events: Vec<LiveEvent>,
}

/// Per-map event history of a finished match.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MatchEventsView {
    pub match_id: MatchId,
    pub maps: Vec<MapEvents>,
}

impl From<&LiveMatchSession> for MatchEventsView {
    fn from(session: &LiveMatchSession) -> Self {
        Self {
            match_id: session.match_id,
            maps: session
                .maps
                .iter()
                .map(|map| MapEvents {
                    number: map.number,
                    name: map.name.clone(),
                    events: map.events.clone(),
                })
                .collect(),
        }
    }
}
