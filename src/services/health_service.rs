use tracing::warn;

use crate::{
    dto::health::{HealthResponse, StoreHealth},
    state::SharedState,
};

/// Ping both stores and report them together with the degraded flag.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let live = state.live_store().health_check().await;
    if let Err(err) = &live {
        warn!(error = %err, "live store health check failed");
    }
    let records = state.records().health_check().await;
    if let Err(err) = &records {
        warn!(error = %err, "match records health check failed");
    }

    HealthResponse::new(
        StoreHealth::from_check(&live),
        StoreHealth::from_check(&records),
        state.is_degraded(),
    )
}
