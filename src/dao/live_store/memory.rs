use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use super::{LiveChange, LiveMatchStore};
use crate::dao::{
    models::{LiveMatchSession, MatchId},
    storage::{StorageError, StorageResult},
};

/// Process-local live store used by tests and the `memory` storage backend.
#[derive(Clone, Default)]
pub struct MemoryLiveStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    documents: Mutex<HashMap<MatchId, LiveMatchSession>>,
    unavailable: AtomicBool,
}

impl MemoryLiveStore {
    /// Empty store, reachable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `Unavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Store a document as-is, bypassing the create guard.
    pub async fn insert(&self, session: LiveMatchSession) {
        self.inner
            .documents
            .lock()
            .await
            .insert(session.match_id, session);
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory live store offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "simulated outage"),
            ));
        }
        Ok(())
    }

    async fn get(&self, match_id: MatchId) -> StorageResult<Option<LiveMatchSession>> {
        self.ensure_available()?;
        Ok(self.inner.documents.lock().await.get(&match_id).cloned())
    }

    async fn create(&self, session: LiveMatchSession) -> StorageResult<LiveMatchSession> {
        self.ensure_available()?;
        let mut documents = self.inner.documents.lock().await;
        if documents.contains_key(&session.match_id) {
            return Err(StorageError::AlreadyExists {
                match_id: session.match_id,
            });
        }
        documents.insert(session.match_id, session.clone());
        Ok(session)
    }

    async fn update(&self, match_id: MatchId, change: LiveChange) -> StorageResult<LiveMatchSession> {
        self.ensure_available()?;
        let mut documents = self.inner.documents.lock().await;
        let stored = documents
            .get_mut(&match_id)
            .ok_or(StorageError::NotFound { match_id })?;

        let mut next = stored.clone();
        change.apply_to(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    async fn find_unfinished(&self) -> StorageResult<Vec<LiveMatchSession>> {
        self.ensure_available()?;
        let documents = self.inner.documents.lock().await;
        let mut unfinished: Vec<_> = documents
            .values()
            .filter(|session| !session.is_finished())
            .cloned()
            .collect();
        unfinished.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        Ok(unfinished)
    }
}

impl LiveMatchStore for MemoryLiveStore {
    fn get(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<Option<LiveMatchSession>>> {
        let store = self.clone();
        Box::pin(async move { store.get(match_id).await })
    }

    fn create(&self, session: LiveMatchSession) -> BoxFuture<'static, StorageResult<LiveMatchSession>> {
        let store = self.clone();
        Box::pin(async move { store.create(session).await })
    }

    fn update(
        &self,
        match_id: MatchId,
        change: LiveChange,
    ) -> BoxFuture<'static, StorageResult<LiveMatchSession>> {
        let store = self.clone();
        Box::pin(async move { store.update(match_id, change).await })
    }

    fn find_unfinished(&self) -> BoxFuture<'static, StorageResult<Vec<LiveMatchSession>>> {
        let store = self.clone();
        Box::pin(async move { store.find_unfinished().await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_available() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_available() })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::dao::{
        live_store::LiveMutation,
        models::{SeriesFormat, Side, TeamRef, Teams},
        storage::MutationError,
    };

    fn opened(match_id: MatchId) -> LiveMatchSession {
        LiveMatchSession::open(
            match_id,
            SeriesFormat::Md1,
            Teams {
                home: TeamRef {
                    id: 0,
                    name: "Home".into(),
                },
                away: TeamRef {
                    id: 2,
                    name: "Away".into(),
                },
            },
            "started automatically",
            0,
            datetime!(2025-03-01 20:00 UTC),
        )
    }

    #[tokio::test]
    async fn create_twice_reports_already_exists() {
        let store = MemoryLiveStore::new();
        LiveMatchStore::create(&store, opened(1)).await.expect("first");
        let err = LiveMatchStore::create(&store, opened(1)).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { match_id: 1 }));
    }

    #[tokio::test]
    async fn rejected_mutation_leaves_document_untouched() {
        let store = MemoryLiveStore::new();
        LiveMatchStore::create(&store, opened(1)).await.expect("create");
        let change = LiveChange::new(
            LiveMutation::DeclareMapWinner { map_number: 1 },
            5,
            "map win",
            datetime!(2025-03-01 20:10 UTC),
        );
        let err = LiveMatchStore::update(&store, 1, change).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(MutationError::Tied(1))));

        let stored = LiveMatchStore::get(&store, 1).await.expect("get").expect("doc");
        assert_eq!(stored.admin_log.len(), 1);
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = MemoryLiveStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            LiveMatchStore::get(&store, 1).await,
            Err(StorageError::Unavailable { .. })
        ));
        store.set_unavailable(false);
        let change = LiveChange::new(
            LiveMutation::ScorePoint {
                map_number: 1,
                side: Side::Home,
            },
            5,
            "point",
            datetime!(2025-03-01 20:10 UTC),
        );
        assert!(matches!(
            LiveMatchStore::update(&store, 1, change).await,
            Err(StorageError::NotFound { match_id: 1 })
        ));
    }
}
