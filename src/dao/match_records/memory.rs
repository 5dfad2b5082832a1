use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use time::Date;
use tokio::sync::Mutex;

use super::MatchRecordStore;
use crate::dao::{
    models::{MatchId, MatchStatus, ScheduledMatch},
    storage::{StorageError, StorageResult},
};

/// Process-local match records used by tests and the `memory` storage backend.
#[derive(Clone, Default)]
pub struct MemoryMatchRecords {
    inner: Arc<RecordsInner>,
}

#[derive(Default)]
struct RecordsInner {
    matches: Mutex<HashMap<MatchId, ScheduledMatch>>,
    unavailable: AtomicBool,
}

impl MemoryMatchRecords {
    /// Empty record set, reachable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub async fn insert(&self, record: ScheduledMatch) {
        self.inner.matches.lock().await.insert(record.id, record);
    }

    /// Simulate an outage: every call fails with `Unavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory match records offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "simulated outage"),
            ));
        }
        Ok(())
    }

    async fn select<F>(&self, keep: F) -> StorageResult<Vec<ScheduledMatch>>
    where
        F: Fn(&ScheduledMatch) -> bool,
    {
        self.ensure_available()?;
        let matches = self.inner.matches.lock().await;
        let mut selected: Vec<_> = matches.values().filter(|record| keep(record)).cloned().collect();
        selected.sort_by_key(|record| (record.date, record.time, record.id));
        Ok(selected)
    }
}

impl MatchRecordStore for MemoryMatchRecords {
    fn status(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchStatus>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_available()?;
            let matches = store.inner.matches.lock().await;
            Ok(matches.get(&match_id).map(|record| record.status))
        })
    }

    fn set_status(
        &self,
        match_id: MatchId,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_available()?;
            let mut matches = store.inner.matches.lock().await;
            Ok(match matches.get_mut(&match_id) {
                Some(record) => {
                    record.status = status;
                    true
                }
                None => false,
            })
        })
    }

    fn find_live(&self) -> BoxFuture<'static, StorageResult<Option<MatchId>>> {
        let store = self.clone();
        Box::pin(async move {
            let live = store
                .select(|record| record.status == MatchStatus::Live)
                .await?;
            Ok(live.first().map(|record| record.id))
        })
    }

    fn tracked_matches_on(&self, date: Date) -> BoxFuture<'static, StorageResult<Vec<ScheduledMatch>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .select(|record| {
                    record.date == date
                        && record.time_tracked
                        && record.status != MatchStatus::Finished
                })
                .await
        })
    }

    fn find_match(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<Option<ScheduledMatch>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_available()?;
            Ok(store.inner.matches.lock().await.get(&match_id).cloned())
        })
    }

    fn recent_finished(&self, limit: u32) -> BoxFuture<'static, StorageResult<Vec<ScheduledMatch>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut finished = store
                .select(|record| record.status == MatchStatus::Finished)
                .await?;
            finished.reverse();
            finished.truncate(limit as usize);
            Ok(finished)
        })
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
