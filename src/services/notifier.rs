use futures::future::BoxFuture;
use thiserror::Error;

use crate::{dao::models::ActorId, dto::sse::LiveNotice};

/// Why a notice could not be handed to a recipient.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("recipient `{0}` has no open stream")]
    NotConnected(ActorId),
    #[error("stream buffer of recipient `{0}` is full")]
    QueueFull(ActorId),
    #[error("stream of recipient `{0}` closed")]
    Closed(ActorId),
    #[error("failed to encode notice")]
    Encode(#[from] serde_json::Error),
}

/// "Send to recipient" capability used by the broadcast.
pub trait Notifier: Send + Sync {
    fn deliver(
        &self,
        recipient: ActorId,
        notice: LiveNotice,
    ) -> BoxFuture<'static, Result<(), DeliveryError>>;
}
