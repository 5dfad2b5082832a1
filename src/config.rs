//! Application-level configuration loading: home team, admin allow-list and live monitor tuning.

use std::{collections::HashSet, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use time::UtcOffset;
use tracing::{info, warn};

use crate::dao::models::{ActorId, TeamRef};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_MATCH_BACK_CONFIG_PATH";
/// Comma-separated admin ids; replaces the allow-list from the file when set.
const ADMIN_IDS_ENV: &str = "ADMIN_USER_IDS";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Fixed home side of every session.
    pub home_team: TeamRef,
    pub admin_ids: HashSet<ActorId>,
    pub monitor_interval: Duration,
    /// Earliest promotion point, in minutes relative to kickoff (negative: kickoff already passed).
    pub window_min_minutes: i64,
    /// Latest promotion point, in minutes before kickoff.
    pub window_max_minutes: i64,
    /// Offset used to read the stored kickoff date and time.
    pub utc_offset: UtcOffset,
    /// Per-recipient SSE queue length.
    pub sse_buffer: usize,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults, then apply env overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config = Self::from(raw);
                    info!(
                        path = %path.display(),
                        admins = config.admin_ids.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Ok(value) = env::var(ADMIN_IDS_ENV) {
            config.admin_ids = parse_admin_ids(&value);
            info!(admins = config.admin_ids.len(), "admin allow-list taken from environment");
        }
        config
    }

    /// Whether the time left until kickoff falls inside the promotion window (bounds inclusive).
    pub fn in_promotion_window(&self, until_kickoff: time::Duration) -> bool {
        until_kickoff >= time::Duration::minutes(self.window_min_minutes)
            && until_kickoff <= time::Duration::minutes(self.window_max_minutes)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            home_team: TeamRef {
                id: 0,
                name: "FURIA".into(),
            },
            admin_ids: HashSet::new(),
            monitor_interval: Duration::from_secs(60),
            window_min_minutes: -200,
            window_max_minutes: 1,
            utc_offset: UtcOffset::UTC,
            sse_buffer: 32,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    home_team: Option<RawTeam>,
    #[serde(default)]
    admin_ids: Vec<ActorId>,
    monitor_interval_secs: Option<u64>,
    promotion_window_minutes: Option<[i64; 2]>,
    utc_offset_hours: Option<i8>,
    sse_buffer: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    id: i64,
    name: String,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let (window_min_minutes, window_max_minutes) = raw
            .promotion_window_minutes
            .map(|[low, high]| (low.min(high), low.max(high)))
            .unwrap_or((defaults.window_min_minutes, defaults.window_max_minutes));

        Self {
            home_team: raw
                .home_team
                .map(|team| TeamRef {
                    id: team.id,
                    name: team.name,
                })
                .unwrap_or(defaults.home_team),
            admin_ids: raw.admin_ids.into_iter().collect(),
            monitor_interval: raw
                .monitor_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.monitor_interval),
            window_min_minutes,
            window_max_minutes,
            utc_offset: raw
                .utc_offset_hours
                .and_then(|hours| UtcOffset::from_hms(hours, 0, 0).ok())
                .unwrap_or(defaults.utc_offset),
            sse_buffer: raw
                .sse_buffer
                .filter(|size| *size > 0)
                .unwrap_or(defaults.sse_buffer),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn parse_admin_ids(value: &str) -> HashSet<ActorId> {
    value
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            match part.parse::<ActorId>() {
                Ok(id) => Some(id),
                Err(_) if part.is_empty() => None,
                Err(err) => {
                    warn!(value = part, error = %err, "ignoring malformed admin id");
                    None
                }
            }
        })
        .collect()
}
