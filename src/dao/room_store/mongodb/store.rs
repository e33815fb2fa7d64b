use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::MongoRoomDocument,
};
use crate::dao::{
    models::{RoomEntity, RoomListItemEntity},
    room_store::RoomStore,
    storage::StorageResult,
};

const ROOM_COLLECTION_NAME: &str = "rooms";
/// Server-side error code for unique key violations.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB-backed room store with versioned compare-and-swap writes.
#[derive(Clone)]
pub struct MongoRoomStore {
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
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;

        // Discovery filters on (status, is_public); the sweeper scans by
        // deadline.
        let discovery_index = mongodb::IndexModel::builder()
            .keys(doc! {"status": 1, "is_public": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_discovery_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(discovery_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "status,is_public",
                source,
            })?;

        let deadline_index = mongodb::IndexModel::builder()
            .keys(doc! {"auto_delete_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_deadline_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(deadline_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "auto_delete_at",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn insert_room(&self, room: RoomEntity) -> MongoResult<()> {
        let code = room.code.clone();
        let document: MongoRoomDocument = room.into();
        let collection = self.collection().await;

        collection.insert_one(&document).await.map_err(|err| {
            if is_duplicate_key(&err) {
                MongoDaoError::DuplicateRoom { code: code.clone() }
            } else {
                MongoDaoError::InsertRoom { code: code.clone(), source: err }
            }
        })?;

        Ok(())
    }

    async fn find_room(&self, code: &str) -> MongoResult<Option<RoomEntity>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc! {"_id": code})
            .await
            .map_err(|source| MongoDaoError::LoadRoom {
                code: code.to_owned(),
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn update_room(&self, expected_version: u64, room: RoomEntity) -> MongoResult<()> {
        let code = room.code.clone();
        let document: MongoRoomDocument = room.into();
        let collection = self.collection().await;

        let result = collection
            .replace_one(
                doc! {"_id": &code, "version": expected_version as i64},
                &document,
            )
            .await
            .map_err(|source| MongoDaoError::SaveRoom {
                code: code.clone(),
                source,
            })?;

        if result.matched_count == 0 {
            // Either a concurrent writer advanced the version or the room
            // was deleted under us; both resolve through a fresh read.
            return Err(MongoDaoError::StaleRoom { code });
        }

        Ok(())
    }

    async fn remove_room(&self, code: &str, expected_version: u64) -> MongoResult<()> {
        let collection = self.collection().await;

        let result = collection
            .delete_one(doc! {"_id": code, "version": expected_version as i64})
            .await
            .map_err(|source| MongoDaoError::DeleteRoom {
                code: code.to_owned(),
                source,
            })?;

        if result.deleted_count == 0 && self.find_room(code).await?.is_some() {
            return Err(MongoDaoError::StaleRoom {
                code: code.to_owned(),
            });
        }

        Ok(())
    }

    async fn delete_room(&self, code: &str) -> MongoResult<bool> {
        let collection = self.collection().await;
        let result = collection
            .delete_one(doc! {"_id": code})
            .await
            .map_err(|source| MongoDaoError::DeleteRoom {
                code: code.to_owned(),
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn list_rooms(&self) -> MongoResult<Vec<RoomListItemEntity>> {
        let collection = self.collection().await;

        let documents: Vec<MongoRoomDocument> = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListRooms { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListRooms { source })?;

        Ok(documents
            .into_iter()
            .map(|document| {
                let entity: RoomEntity = document.into();
                RoomListItemEntity::from(&entity)
            })
            .collect())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        _ => false,
    }
}

impl RoomStore for MongoRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room(room).await.map_err(Into::into) })
    }

    fn find_room(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(&code).await.map_err(Into::into) })
    }

    fn update_room(
        &self,
        expected_version: u64,
        room: RoomEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_room(expected_version, room)
                .await
                .map_err(Into::into)
        })
    }

    fn remove_room(
        &self,
        code: String,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .remove_room(&code, expected_version)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_room(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_room(&code).await.map_err(Into::into) })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_rooms().await.map_err(Into::into) })
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
