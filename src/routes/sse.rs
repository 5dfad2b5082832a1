use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{dao::models::ActorId, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/recipients/{recipient_id}",
    tag = "sse",
    params(("recipient_id" = i64, Path, description = "Viewer or admin receiving notices")),
    responses((status = 200, description = "Notice stream of one recipient", content_type = "text/event-stream", body = String))
)]
/// Stream live notices addressed to one recipient.
pub async fn recipient_stream(
    State(state): State<SharedState>,
    Path(recipient_id): Path<ActorId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let notifier = state.sse().clone();
    let (connection_id, receiver) = notifier.connect(recipient_id);
    info!(recipient = recipient_id, "new SSE connection");
    sse_service::send_handshake(&notifier, recipient_id, state.is_degraded());
    sse_service::to_sse_stream(notifier, recipient_id, connection_id, receiver)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/recipients/{recipient_id}", get(recipient_stream))
}
