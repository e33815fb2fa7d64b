//! In-process store backend implementing the same versioned CAS contract as
//! the database-backed stores. Used by the test suite and for local runs
//! without a database.

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::{
    models::{RoomEntity, RoomListItemEntity},
    room_store::RoomStore,
    storage::{StorageError, StorageResult},
};

/// DashMap-backed room store keyed by room code.
#[derive(Debug, Default, Clone)]
pub struct MemoryRoomStore {
    rooms: std::sync::Arc<DashMap<String, RoomEntity>>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, room: RoomEntity) -> StorageResult<()> {
        match self.rooms.entry(room.code.clone()) {
            dashmap::Entry::Occupied(_) => Err(StorageError::AlreadyExists { code: room.code }),
            dashmap::Entry::Vacant(slot) => {
                slot.insert(room);
                Ok(())
            }
        }
    }

    fn update(&self, expected_version: u64, room: RoomEntity) -> StorageResult<()> {
        // The entry guard keeps the check-and-replace atomic per key.
        match self.rooms.entry(room.code.clone()) {
            dashmap::Entry::Occupied(mut slot) => {
                if slot.get().version != expected_version {
                    return Err(StorageError::VersionConflict { code: room.code });
                }
                slot.insert(room);
                Ok(())
            }
            dashmap::Entry::Vacant(_) => Err(StorageError::VersionConflict { code: room.code }),
        }
    }

    fn remove(&self, code: &str, expected_version: u64) -> StorageResult<()> {
        match self.rooms.entry(code.to_owned()) {
            dashmap::Entry::Occupied(slot) => {
                if slot.get().version != expected_version {
                    return Err(StorageError::VersionConflict {
                        code: code.to_owned(),
                    });
                }
                slot.remove();
                Ok(())
            }
            // Already gone: deleting a deleted room is a no-op.
            dashmap::Entry::Vacant(_) => Ok(()),
        }
    }
}

impl RoomStore for MemoryRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert(room) })
    }

    fn find_room(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.rooms.get(&code).map(|entry| entry.clone())) })
    }

    fn update_room(
        &self,
        expected_version: u64,
        room: RoomEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update(expected_version, room) })
    }

    fn remove_room(
        &self,
        code: String,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.remove(&code, expected_version) })
    }

    fn delete_room(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.rooms.remove(&code).is_some()) })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .rooms
                .iter()
                .map(|entry| RoomListItemEntity::from(entry.value()))
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use uuid::Uuid;

    use super::*;
    use crate::state::room::{Difficulty, Room};

    fn sample_entity(code: &str) -> RoomEntity {
        Room::new(
            code.into(),
            "cas test".into(),
            "general".into(),
            Difficulty::Easy,
            true,
            Vec::new(),
            Uuid::new_v4(),
            4,
            0,
            SystemTime::now(),
            Duration::from_secs(300),
        )
        .into()
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = MemoryRoomStore::new();
        store.insert_room(sample_entity("AAAAAA")).await.unwrap();

        let err = store.insert_room(sample_entity("AAAAAA")).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn stale_update_is_rejected() {
        let store = MemoryRoomStore::new();
        store.insert_room(sample_entity("BBBBBB")).await.unwrap();

        let mut winner = store.find_room("BBBBBB".into()).await.unwrap().unwrap();
        winner.version += 1;
        store.update_room(0, winner.clone()).await.unwrap();

        // A writer still holding version 0 must lose.
        let mut loser = sample_entity("BBBBBB");
        loser.version = 1;
        let err = store.update_room(0, loser).await.unwrap_err();
        assert!(err.is_version_conflict());
    }

    #[tokio::test]
    async fn remove_is_idempotent_but_version_checked() {
        let store = MemoryRoomStore::new();
        store.insert_room(sample_entity("CCCCCC")).await.unwrap();

        let err = store.remove_room("CCCCCC".into(), 7).await.unwrap_err();
        assert!(err.is_version_conflict());

        store.remove_room("CCCCCC".into(), 0).await.unwrap();
        // Second delete of the same room is a no-op, not an error.
        store.remove_room("CCCCCC".into(), 0).await.unwrap();
        assert!(!store.delete_room("CCCCCC".into()).await.unwrap());
    }
}
