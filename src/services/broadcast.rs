use std::sync::Arc;

use indexmap::IndexSet;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, warn};

use crate::{dao::models::ActorId, dto::sse::LiveNotice, services::notifier::Notifier};

enum Job {
    Deliver {
        recipients: Vec<ActorId>,
        notice: LiveNotice,
    },
    Flush(oneshot::Sender<()>),
}

/// Subscriber set plus a single delivery worker.
///
/// Jobs are queued in `publish` order and delivered one recipient at a time, so every
/// subscriber observes notices in the order they were published. A failed delivery is
/// logged and never removes the recipient.
pub struct SpectatorBroadcast {
    subscribers: RwLock<IndexSet<ActorId>>,
    jobs: mpsc::UnboundedSender<Job>,
}

impl SpectatorBroadcast {
    /// Spawn the delivery worker on the current runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(notifier, rx));
        Self {
            subscribers: RwLock::new(IndexSet::new()),
            jobs,
        }
    }

    /// Add `viewer`; returns `false` when it was already subscribed.
    pub async fn subscribe(&self, viewer: ActorId) -> bool {
        self.subscribers.write().await.insert(viewer)
    }

    /// Add `viewer` and queue `catch_up` for it ahead of any later publish. Nothing is
    /// replayed when the viewer was already subscribed.
    pub async fn subscribe_with_catch_up(&self, viewer: ActorId, catch_up: Vec<LiveNotice>) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let added = subscribers.insert(viewer);
        if added {
            for notice in catch_up {
                self.enqueue(vec![viewer], notice);
            }
        }
        added
    }

    /// Remove `viewer`; returns `false` when it was not subscribed.
    pub async fn unsubscribe(&self, viewer: ActorId) -> bool {
        self.subscribers.write().await.shift_remove(&viewer)
    }

    /// Fan `notice` out to the current subscriber snapshot.
    pub async fn publish(&self, notice: LiveNotice) {
        let subscribers = self.subscribers.read().await;
        if subscribers.is_empty() {
            return;
        }
        self.enqueue(subscribers.iter().copied().collect(), notice);
    }

    /// Deliver `notice` to explicit recipients, subscribed or not.
    pub fn send_direct(&self, recipients: Vec<ActorId>, notice: LiveNotice) {
        if !recipients.is_empty() {
            self.enqueue(recipients, notice);
        }
    }

    /// Drop every subscriber.
    pub async fn clear(&self) {
        self.subscribers.write().await.clear();
    }

    /// Subscribers in subscription order.
    pub async fn subscribers(&self) -> Vec<ActorId> {
        self.subscribers.read().await.iter().copied().collect()
    }

    pub async fn is_subscribed(&self, viewer: ActorId) -> bool {
        self.subscribers.read().await.contains(&viewer)
    }

    /// Wait until every job queued before this call was delivered.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.jobs.send(Job::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn enqueue(&self, recipients: Vec<ActorId>, notice: LiveNotice) {
        if self.jobs.send(Job::Deliver { recipients, notice }).is_err() {
            warn!("broadcast worker stopped; notice dropped");
        }
    }
}

async fn run_worker(notifier: Arc<dyn Notifier>, mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Deliver { recipients, notice } => {
                let event = notice.event_name();
                for recipient in recipients {
                    match notifier.deliver(recipient, notice.clone()).await {
                        Ok(()) => debug!(recipient, event, "notice delivered"),
                        Err(err) => warn!(recipient, event, error = %err, "failed to deliver notice"),
                    }
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::future::BoxFuture;

    use super::*;
    use crate::services::notifier::DeliveryError;

    #[derive(Default)]
    struct Recorder {
        delivered: Mutex<Vec<(ActorId, &'static str)>>,
        failing: Vec<ActorId>,
    }

    impl Notifier for Recorder {
        fn deliver(
            &self,
            recipient: ActorId,
            notice: LiveNotice,
        ) -> BoxFuture<'static, Result<(), DeliveryError>> {
            let result = if self.failing.contains(&recipient) {
                Err(DeliveryError::NotConnected(recipient))
            } else {
                self.delivered
                    .lock()
                    .expect("recorder lock")
                    .push((recipient, notice.event_name()));
                Ok(())
            };
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn subscribe_is_idempotent() {
        let broadcast = SpectatorBroadcast::spawn(Arc::new(Recorder::default()));
        assert!(broadcast.subscribe(5).await);
        assert!(!broadcast.subscribe(5).await);
        assert_eq!(broadcast.subscribers().await, vec![5]);
        assert!(broadcast.unsubscribe(5).await);
        assert!(!broadcast.unsubscribe(5).await);
    }

    #[tokio::test]
    async fn failing_recipient_does_not_block_the_rest() {
        let recorder = Arc::new(Recorder {
            failing: vec![2],
            ..Recorder::default()
        });
        let broadcast = SpectatorBroadcast::spawn(recorder.clone());
        for viewer in [1, 2, 3] {
            broadcast.subscribe(viewer).await;
        }

        broadcast.publish(LiveNotice::info("first")).await;
        broadcast.publish(LiveNotice::info("second")).await;
        broadcast.flush().await;

        let delivered = recorder.delivered.lock().expect("recorder lock").clone();
        assert_eq!(delivered.len(), 4);
        assert!(delivered.iter().all(|(recipient, _)| *recipient != 2));
        assert!(broadcast.is_subscribed(2).await);
    }

    #[tokio::test]
    async fn catch_up_precedes_later_publishes() {
        let recorder = Arc::new(Recorder::default());
        let broadcast = SpectatorBroadcast::spawn(recorder.clone());

        broadcast
            .subscribe_with_catch_up(
                4,
                vec![LiveNotice::MapRenamed(crate::dto::sse::MapRenamedNotice {
                    map_number: 1,
                    name: "Mirage".into(),
                })],
            )
            .await;
        broadcast.publish(LiveNotice::info("live")).await;
        broadcast.flush().await;

        let delivered = recorder.delivered.lock().expect("recorder lock").clone();
        assert_eq!(delivered, vec![(4, "live.map_renamed"), (4, "info")]);
    }
}
