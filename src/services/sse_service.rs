use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use dashmap::DashMap;
use futures::{Stream, future::BoxFuture};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::ActorId,
    dto::sse::{Handshake, LiveNotice, ServerEvent},
    services::notifier::{DeliveryError, Notifier},
};

struct Connection {
    id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
}

/// Per-recipient SSE channels; the default [`Notifier`].
pub struct SseNotifier {
    connections: DashMap<ActorId, Connection>,
    buffer: usize,
}

impl SseNotifier {
    /// Notifier whose per-recipient queues hold `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            connections: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Open a stream for `recipient`, replacing any previous one.
    pub fn connect(&self, recipient: ActorId) -> (Uuid, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        if self
            .connections
            .insert(recipient, Connection { id, tx })
            .is_some()
        {
            debug!(recipient, "replaced previous SSE stream");
        }
        (id, rx)
    }

    /// Drop the stream of `recipient` if it is still the one identified by `connection_id`.
    pub fn disconnect(&self, recipient: ActorId, connection_id: Uuid) {
        self.connections
            .remove_if(&recipient, |_, connection| connection.id == connection_id);
    }

    /// Whether `recipient` has an open stream.
    pub fn is_connected(&self, recipient: ActorId) -> bool {
        self.connections.contains_key(&recipient)
    }

    fn push(&self, recipient: ActorId, event: ServerEvent) -> Result<(), DeliveryError> {
        let tx = self
            .connections
            .get(&recipient)
            .map(|connection| connection.tx.clone())
            .ok_or(DeliveryError::NotConnected(recipient))?;

        tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::QueueFull(recipient),
            TrySendError::Closed(_) => DeliveryError::Closed(recipient),
        })
    }
}

impl Notifier for SseNotifier {
    fn deliver(
        &self,
        recipient: ActorId,
        notice: LiveNotice,
    ) -> BoxFuture<'static, Result<(), DeliveryError>> {
        let result = notice
            .to_server_event()
            .map_err(DeliveryError::from)
            .and_then(|event| self.push(recipient, event));
        Box::pin(async move { result })
    }
}

/// Queue the handshake as the first event of a freshly opened stream.
pub fn send_handshake(notifier: &SseNotifier, recipient: ActorId, degraded: bool) {
    let handshake = Handshake {
        recipient,
        message: "live stream connected".into(),
        degraded,
    };
    if let Ok(event) = ServerEvent::json(Some("handshake".to_string()), &handshake) {
        let _ = notifier.push(recipient, event);
    }
}

/// Convert a recipient channel into an SSE response, unregistering the recipient once the
/// client disconnects.
pub fn to_sse_stream(
    notifier: Arc<SseNotifier>,
    recipient: ActorId,
    connection_id: Uuid,
    mut receiver: mpsc::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = receiver.recv() => {
                    let Some(payload) = next else { break };
                    let mut event = Event::default().data(payload.data);
                    if let Some(name) = payload.event {
                        event = event.event(name);
                    }
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        notifier.disconnect(recipient, connection_id);
        info!(recipient, "SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deliver_fails_without_an_open_stream() {
        let notifier = SseNotifier::new(4);
        let err = notifier
            .deliver(7, LiveNotice::info("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::NotConnected(7)));
    }

    #[tokio::test]
    async fn deliver_reports_a_full_buffer() {
        let notifier = SseNotifier::new(1);
        let (_id, mut rx) = notifier.connect(7);

        notifier
            .deliver(7, LiveNotice::info("first"))
            .await
            .expect("first fits");
        let err = notifier
            .deliver(7, LiveNotice::info("second"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::QueueFull(7)));

        let received = rx.recv().await.expect("event");
        assert_eq!(received.event.as_deref(), Some("info"));
    }

    #[tokio::test]
    async fn stale_disconnect_keeps_the_newer_stream() {
        let notifier = SseNotifier::new(4);
        let (old, _old_rx) = notifier.connect(3);
        let (_new, _new_rx) = notifier.connect(3);
        notifier.disconnect(3, old);
        assert!(notifier.is_connected(3));
    }
}
