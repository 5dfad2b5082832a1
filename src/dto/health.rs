use serde::Serialize;
use utoipa::ToSchema;

/// Reachability of one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    Up,
    Down,
}

impl StoreHealth {
    /// Up when the check succeeded.
    pub fn from_check<E>(result: &Result<(), E>) -> Self {
        if result.is_ok() {
            StoreHealth::Up
        } else {
            StoreHealth::Down
        }
    }
}

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    pub live_store: StoreHealth,
    pub match_records: StoreHealth,
}

impl HealthResponse {
    /// Combine store reachability and the degraded flag into one report.
    pub fn new(live_store: StoreHealth, match_records: StoreHealth, degraded: bool) -> Self {
        let healthy = !degraded && live_store == StoreHealth::Up && match_records == StoreHealth::Up;
        Self {
            status: if healthy { "ok" } else { "degraded" }.to_string(),
            live_store,
            match_records,
        }
    }
}
