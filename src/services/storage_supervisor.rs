use std::time::Duration;

use tokio::{task::JoinHandle, time::sleep};
use tracing::{info, warn};

use crate::{
    dao::{
        live_store::LiveMatchStore, match_records::MatchRecordStore, storage::StorageResult,
    },
    state::SharedState,
};

/// Timing of the health loop and of the reconnect attempts after a failed check.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorPolicy {
    pub poll_interval: Duration,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(10),
            max_reconnect_attempts: 3,
        }
    }
}

#[derive(Clone, Copy)]
enum Store<'a> {
    Live(&'a dyn LiveMatchStore),
    Records(&'a dyn MatchRecordStore),
}

impl Store<'_> {
    fn name(self) -> &'static str {
        match self {
            Store::Live(_) => "live store",
            Store::Records(_) => "match records",
        }
    }

    async fn health_check(self) -> StorageResult<()> {
        match self {
            Store::Live(store) => store.health_check().await,
            Store::Records(store) => store.health_check().await,
        }
    }

    async fn try_reconnect(self) -> StorageResult<()> {
        match self {
            Store::Live(store) => store.try_reconnect().await,
            Store::Records(store) => store.try_reconnect().await,
        }
    }
}

/// Run the health loop in the background.
pub fn spawn(state: SharedState, policy: SupervisorPolicy) -> JoinHandle<()> {
    tokio::spawn(run(state, policy))
}

/// Poll both stores forever, keeping the degraded flag in sync.
pub async fn run(state: SharedState, policy: SupervisorPolicy) {
    loop {
        check_once(&state, &policy).await;
        sleep(policy.poll_interval).await;
    }
}

/// Check both stores once, trying to reconnect the unhealthy ones. Returns whether both are up.
pub async fn check_once(state: &SharedState, policy: &SupervisorPolicy) -> bool {
    let live_ok = ensure_healthy(state, policy, Store::Live(state.live_store().as_ref())).await;
    let records_ok =
        ensure_healthy(state, policy, Store::Records(state.records().as_ref())).await;
    let healthy = live_ok && records_ok;

    if state.update_degraded(!healthy) && healthy {
        info!("storage healthy again; leaving degraded mode");
    }
    healthy
}

async fn ensure_healthy(state: &SharedState, policy: &SupervisorPolicy, store: Store<'_>) -> bool {
    let Err(err) = store.health_check().await else {
        return true;
    };

    if state.update_degraded(true) {
        warn!(store = store.name(), error = %err, "storage health check failed; entering degraded mode");
    } else {
        warn!(store = store.name(), error = %err, "storage health check failed");
    }

    let mut delay = policy.initial_delay;
    for attempt in 1..=policy.max_reconnect_attempts {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(store = store.name(), attempt, "storage reconnection succeeded");
                return true;
            }
            Err(reconnect_err) => {
                warn!(
                    store = store.name(),
                    attempt,
                    error = %reconnect_err,
                    "storage reconnect attempt failed"
                );
                sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
    warn!(
        store = store.name(),
        "exhausted storage reconnect attempts; staying in degraded mode"
    );
    false
}
