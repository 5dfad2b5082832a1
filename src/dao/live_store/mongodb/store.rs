use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use time::format_description::well_known::Rfc3339;
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::{RetryPolicy, establish_connection},
    error::{MongoDaoError, MongoResult},
};
use crate::dao::{
    live_store::{LiveChange, LiveMatchStore},
    models::{LiveMatchSession, MatchId},
    storage::{StorageError, StorageResult},
};

const LIVE_COLLECTION_NAME: &str = "live_matches";
const DUPLICATE_KEY: i32 = 11000;

/// Live document store backed by one MongoDB document per match.
#[derive(Clone)]
pub struct MongoLiveStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(
            &self.config.options,
            &self.config.database_name,
            RetryPolicy::RECONNECT,
        )
        .await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoLiveStore {
    /// Connect to MongoDB and make sure the `matchId` index exists.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(
            &config.options,
            &config.database_name,
            RetryPolicy::STARTUP,
        )
        .await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { client, database }),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = mongodb::IndexModel::builder()
            .keys(doc! { "matchId": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("live_match_id_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        self.collection()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: LIVE_COLLECTION_NAME,
                index: "matchId",
                source,
            })?;
        Ok(())
    }

    async fn collection(&self) -> Collection<LiveMatchSession> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<LiveMatchSession>(LIVE_COLLECTION_NAME)
    }

    async fn get(&self, match_id: MatchId) -> MongoResult<Option<LiveMatchSession>> {
        self.collection()
            .await
            .find_one(doc! { "matchId": match_id })
            .await
            .map_err(|source| MongoDaoError::LoadSession { match_id, source })
    }

    async fn create(&self, session: LiveMatchSession) -> StorageResult<LiveMatchSession> {
        let match_id = session.match_id;
        match self.collection().await.insert_one(&session).await {
            Ok(_) => Ok(session),
            Err(err) if is_duplicate_key(&err) => Err(StorageError::AlreadyExists { match_id }),
            Err(source) => Err(MongoDaoError::InsertSession { match_id, source }.into()),
        }
    }

    /// Read, apply and write back, conditioned on the `lastUpdatedAt` that was read.
    async fn update(&self, match_id: MatchId, change: LiveChange) -> StorageResult<LiveMatchSession> {
        let mut session = self
            .get(match_id)
            .await?
            .ok_or(StorageError::NotFound { match_id })?;
        let read_stamp = session
            .last_updated_at
            .format(&Rfc3339)
            .map_err(|source| MongoDaoError::Timestamp { source })?;

        change.apply_to(&mut session)?;

        let result = self
            .collection()
            .await
            .replace_one(
                doc! { "matchId": match_id, "lastUpdatedAt": read_stamp },
                &session,
            )
            .await
            .map_err(|source| MongoDaoError::WriteSession { match_id, source })?;

        if result.matched_count == 0 {
            return Err(StorageError::Conflict { match_id });
        }
        Ok(session)
    }

    async fn find_unfinished(&self) -> MongoResult<Vec<LiveMatchSession>> {
        self.collection()
            .await
            .find(doc! { "finalResult": null })
            .sort(doc! { "lastUpdatedAt": -1 })
            .await
            .map_err(|source| MongoDaoError::ListUnfinished { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListUnfinished { source })
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

impl LiveMatchStore for MongoLiveStore {
    fn get(&self, match_id: MatchId) -> BoxFuture<'static, StorageResult<Option<LiveMatchSession>>> {
        let store = self.clone();
        Box::pin(async move { store.get(match_id).await.map_err(Into::into) })
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
        Box::pin(async move { store.find_unfinished().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
