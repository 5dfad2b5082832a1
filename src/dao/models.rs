use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use utoipa::ToSchema;

/// Identifier shared by the relational match record and its live document.
pub type MatchId = i64;
/// Opaque identity of a user issuing commands or receiving notifications.
pub type ActorId = i64;
/// Actor recorded for automatic actions (monitor promotion, recovery).
pub const SYSTEM_ACTOR: ActorId = 0;

/// Best-of-N series format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SeriesFormat {
    #[serde(rename = "MD1")]
    Md1,
    #[serde(rename = "MD3")]
    Md3,
    #[serde(rename = "MD5")]
    Md5,
}

impl SeriesFormat {
    /// Map the relational format id (1, 2, 3) to a format; unknown ids fall back to MD1.
    pub fn from_format_id(id: i32) -> Self {
        match id {
            2 => SeriesFormat::Md3,
            3 => SeriesFormat::Md5,
            _ => SeriesFormat::Md1,
        }
    }

    /// Maximum number of maps in the series.
    pub fn map_count(self) -> usize {
        match self {
            SeriesFormat::Md1 => 1,
            SeriesFormat::Md3 => 3,
            SeriesFormat::Md5 => 5,
        }
    }

    /// Map wins needed to secure the series.
    pub fn maps_to_win(self) -> u32 {
        (self.map_count() / 2 + 1) as u32
    }

    /// Display label ("MD1", "MD3", "MD5").
    pub fn label(self) -> &'static str {
        match self {
            SeriesFormat::Md1 => "MD1",
            SeriesFormat::Md3 => "MD3",
            SeriesFormat::Md5 => "MD5",
        }
    }
}

/// One side of the series; `Home` is the fixed home team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

/// Home/away counters used for map scores and the aggregate series score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    /// Counter of `side`.
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::Home => self.home,
            Side::Away => self.away,
        }
    }

    /// Add one to the counter of `side`.
    pub fn increment(&mut self, side: Side) {
        match side {
            Side::Home => self.home += 1,
            Side::Away => self.away += 1,
        }
    }

    /// Side currently ahead, `None` on a tie.
    pub fn leader(&self) -> Option<Side> {
        match self.home.cmp(&self.away) {
            std::cmp::Ordering::Greater => Some(Side::Home),
            std::cmp::Ordering::Less => Some(Side::Away),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Both counters are equal, including 0-0.
    pub fn is_tied(&self) -> bool {
        self.home == self.away
    }

    /// True when no point was scored at all.
    pub fn is_blank(&self) -> bool {
        self.home == 0 && self.away == 0
    }

    /// Sum of both counters.
    pub fn total(&self) -> u32 {
        self.home + self.away
    }
}

/// Team identity as stored in the live document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TeamRef {
    pub id: i64,
    pub name: String,
}

/// Fixed home/away pair of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Teams {
    pub home: TeamRef,
    pub away: TeamRef,
}

impl Teams {
    /// Display name of `side`.
    pub fn name(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home.name,
            Side::Away => &self.away.name,
        }
    }
}

/// Most valuable player of a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Mvp {
    pub name: String,
    /// Raw `kills/deaths` text.
    pub kd: String,
    pub rating: f64,
}

impl Mvp {
    /// Build an MVP entry; the rating is `kills` when `deaths` is zero, else `kills / deaths`,
    /// rounded to two decimals.
    pub fn from_kills_deaths(name: impl Into<String>, kills: u32, deaths: u32) -> Self {
        let raw = if deaths == 0 {
            f64::from(kills)
        } else {
            f64::from(kills) / f64::from(deaths)
        };
        Self {
            name: name.into(),
            kd: format!("{kills}/{deaths}"),
            rating: (raw * 100.0).round() / 100.0,
        }
    }
}

/// Spectator-facing payload of a live event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventContent {
    Text {
        text: String,
    },
    Link {
        url: String,
    },
    Photo {
        #[serde(rename = "fileRef")]
        file_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Video {
        #[serde(rename = "fileRef")]
        file_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl EventContent {
    /// Lowercase tag of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            EventContent::Text { .. } => "text",
            EventContent::Link { .. } => "link",
            EventContent::Photo { .. } => "photo",
            EventContent::Video { .. } => "video",
        }
    }
}

/// Timestamped, actor-attributed event appended to a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveEvent {
    #[serde(flatten)]
    pub content: EventContent,
    pub actor_id: ActorId,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: OffsetDateTime,
}

/// State of one map within the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MapState {
    pub number: u32,
    pub name: Option<String>,
    pub score: Score,
    pub mvp: Option<Mvp>,
    #[serde(default)]
    pub events: Vec<LiveEvent>,
}

impl MapState {
    /// Fresh map with no name, a blank score and no events.
    pub fn empty(number: u32) -> Self {
        Self {
            number,
            name: None,
            score: Score::default(),
            mvp: None,
            events: Vec::new(),
        }
    }

    /// Side leading on this map, `None` on a tie.
    pub fn winner(&self) -> Option<Side> {
        self.score.leader()
    }
}

/// Audit trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminLogEntry {
    pub action: String,
    pub actor_id: ActorId,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: OffsetDateTime,
}

/// Outcome label recorded when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SeriesResult {
    #[serde(rename = "home wins")]
    HomeWin,
    #[serde(rename = "away wins")]
    AwayWin,
    #[serde(rename = "draw")]
    Draw,
}

impl SeriesResult {
    /// Verdict from a pair of home/away counters.
    pub fn from_score(score: Score) -> Self {
        match score.leader() {
            Some(Side::Home) => SeriesResult::HomeWin,
            Some(Side::Away) => SeriesResult::AwayWin,
            None => SeriesResult::Draw,
        }
    }

    /// Wire label of the verdict.
    pub fn label(self) -> &'static str {
        match self {
            SeriesResult::HomeWin => "home wins",
            SeriesResult::AwayWin => "away wins",
            SeriesResult::Draw => "draw",
        }
    }
}

/// Live detail document of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveMatchSession {
    pub match_id: MatchId,
    pub format: SeriesFormat,
    pub current_map_name: Option<String>,
    pub maps: Vec<MapState>,
    pub aggregate_score: Score,
    pub mvp_of_series: Option<Mvp>,
    pub teams: Teams,
    pub admin_log: Vec<AdminLogEntry>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub last_updated_at: OffsetDateTime,
    #[serde(default)]
    pub final_result: Option<SeriesResult>,
}

impl LiveMatchSession {
    /// Build the initial document: one empty map and a single opening log entry.
    pub fn open(
        match_id: MatchId,
        format: SeriesFormat,
        teams: Teams,
        action: impl Into<String>,
        actor_id: ActorId,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            match_id,
            format,
            current_map_name: None,
            maps: vec![MapState::empty(1)],
            aggregate_score: Score::default(),
            mvp_of_series: None,
            teams,
            admin_log: vec![AdminLogEntry {
                action: action.into(),
                actor_id,
                timestamp: now,
            }],
            last_updated_at: now,
            final_result: None,
        }
    }

    /// Last map of the series, the only one open to scoring.
    pub fn current_map(&self) -> Option<&MapState> {
        self.maps.last()
    }

    pub fn current_map_mut(&mut self) -> Option<&mut MapState> {
        self.maps.last_mut()
    }

    /// A final result was recorded.
    pub fn is_finished(&self) -> bool {
        self.final_result.is_some()
    }

    /// Count of maps won per side by comparing each map's score.
    pub fn series_tally(&self) -> Score {
        self.maps
            .iter()
            .filter_map(MapState::winner)
            .fold(Score::default(), |mut tally, side| {
                tally.increment(side);
                tally
            })
    }

    /// True once one side has secured more than half of the format's maps.
    pub fn decided_by_aggregate(&self) -> bool {
        let needed = self.format.maps_to_win();
        self.aggregate_score.home >= needed || self.aggregate_score.away >= needed
    }

    /// True when the current map's win was already counted in the aggregate.
    pub fn current_map_declared(&self) -> bool {
        let Some((_, earlier)) = self.maps.split_last() else {
            return false;
        };
        let decided_before = earlier.iter().filter(|map| !map.score.is_tied()).count() as u32;
        self.aggregate_score.total() > decided_before
    }

    /// Highest-rated MVP across all maps.
    pub fn best_mvp(&self) -> Option<Mvp> {
        self.maps
            .iter()
            .filter_map(|map| map.mvp.as_ref())
            .fold(None::<&Mvp>, |best, candidate| match best {
                Some(current) if current.rating >= candidate.rating => Some(current),
                _ => Some(candidate),
            })
            .cloned()
    }
}

/// Relational status codes; the integers are part of the stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
}

impl MatchStatus {
    /// Relational status code.
    pub fn code(self) -> i32 {
        match self {
            MatchStatus::Scheduled => 1,
            MatchStatus::Live => 2,
            MatchStatus::Finished => 3,
        }
    }

    /// Status for a stored code; unknown codes give `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(MatchStatus::Scheduled),
            2 => Some(MatchStatus::Live),
            3 => Some(MatchStatus::Finished),
            _ => None,
        }
    }
}

/// Relational match record as read by the monitor and the history views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledMatch {
    pub id: MatchId,
    pub date: Date,
    pub time: Time,
    pub status: MatchStatus,
    pub format: SeriesFormat,
    pub opponent: TeamRef,
    pub time_tracked: bool,
}

impl ScheduledMatch {
    /// Kickoff instant, interpreting the stored local date/time at `offset`.
    pub fn kickoff(&self, offset: UtcOffset) -> OffsetDateTime {
        PrimitiveDateTime::new(self.date, self.time).assume_offset(offset)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn teams() -> Teams {
        Teams {
            home: TeamRef {
                id: 0,
                name: "Home".into(),
            },
            away: TeamRef {
                id: 7,
                name: "Away".into(),
            },
        }
    }

    #[test]
    fn mvp_rating_is_rounded_ratio() {
        assert_eq!(Mvp::from_kills_deaths("KSCERATO", 23, 10).rating, 2.3);
        assert_eq!(Mvp::from_kills_deaths("a", 20, 3).rating, 6.67);
        assert_eq!(Mvp::from_kills_deaths("b", 12, 0).rating, 12.0);
        assert_eq!(Mvp::from_kills_deaths("c", 1, 2).kd, "1/2");
    }

    #[test]
    fn format_ids_and_thresholds() {
        assert_eq!(SeriesFormat::from_format_id(1), SeriesFormat::Md1);
        assert_eq!(SeriesFormat::from_format_id(2), SeriesFormat::Md3);
        assert_eq!(SeriesFormat::from_format_id(3), SeriesFormat::Md5);
        assert_eq!(SeriesFormat::from_format_id(42), SeriesFormat::Md1);
        assert_eq!(SeriesFormat::Md1.maps_to_win(), 1);
        assert_eq!(SeriesFormat::Md3.maps_to_win(), 2);
        assert_eq!(SeriesFormat::Md5.maps_to_win(), 3);
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [MatchStatus::Scheduled, MatchStatus::Live, MatchStatus::Finished] {
            assert_eq!(MatchStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(MatchStatus::from_code(0), None);
    }

    #[test]
    fn document_uses_camel_case_shape() {
        let now = datetime!(2025-03-01 20:00 UTC);
        let mut session =
            LiveMatchSession::open(5, SeriesFormat::Md3, teams(), "started", SYSTEM_ACTOR, now);
        session.maps[0].events.push(LiveEvent {
            content: EventContent::Photo {
                file_ref: "abc".into(),
                caption: None,
            },
            actor_id: 9,
            timestamp: now,
        });

        let value = serde_json::to_value(&session).expect("serialize");
        assert_eq!(value["matchId"], 5);
        assert_eq!(value["format"], "MD3");
        assert_eq!(value["aggregateScore"]["home"], 0);
        assert_eq!(value["maps"][0]["events"][0]["type"], "photo");
        assert_eq!(value["maps"][0]["events"][0]["fileRef"], "abc");
        assert_eq!(value["maps"][0]["events"][0]["actorId"], 9);
        assert!(value["maps"][0]["mvp"].is_null());
        assert_eq!(value["adminLog"][0]["action"], "started");

        let back: LiveMatchSession = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, session);
    }

    #[test]
    fn tally_counts_per_map_leaders() {
        let now = datetime!(2025-03-01 20:00 UTC);
        let mut session =
            LiveMatchSession::open(1, SeriesFormat::Md3, teams(), "started", SYSTEM_ACTOR, now);
        session.maps[0].score = Score { home: 16, away: 10 };
        let mut second = MapState::empty(2);
        second.score = Score { home: 9, away: 16 };
        session.maps.push(second);
        session.maps.push(MapState::empty(3));

        assert_eq!(session.series_tally(), Score { home: 1, away: 1 });
        assert_eq!(SeriesResult::from_score(session.series_tally()), SeriesResult::Draw);
    }

    #[test]
    fn current_map_declared_tracks_aggregate() {
        let now = datetime!(2025-03-01 20:00 UTC);
        let mut session =
            LiveMatchSession::open(1, SeriesFormat::Md3, teams(), "started", SYSTEM_ACTOR, now);
        session.maps[0].score = Score { home: 3, away: 1 };
        assert!(!session.current_map_declared());
        session.aggregate_score.increment(Side::Home);
        assert!(session.current_map_declared());
        session.maps.push(MapState::empty(2));
        assert!(!session.current_map_declared());
    }

    #[test]
    fn kickoff_uses_local_offset() {
        let record = ScheduledMatch {
            id: 1,
            date: time::macros::date!(2025 - 03 - 01),
            time: time::macros::time!(17:00),
            status: MatchStatus::Scheduled,
            format: SeriesFormat::Md1,
            opponent: TeamRef {
                id: 7,
                name: "Away".into(),
            },
            time_tracked: true,
        };
        let offset = UtcOffset::from_hms(-3, 0, 0).expect("offset");
        assert_eq!(record.kickoff(offset), datetime!(2025-03-01 20:00 UTC));
    }
}
