use std::sync::Arc;

use tracing::debug;

use crate::{
    dao::{
        models::RoomListItemEntity,
        room_store::RoomStore,
        storage::StorageError,
    },
    error::ServiceError,
    state::room::{Room, generate_room_code},
};

/// Upper bound on optimistic retries for one logical room transaction.
const MAX_TX_ATTEMPTS: u32 = 5;
/// Upper bound on room-code generation attempts before giving up.
const MAX_CODE_ATTEMPTS: u32 = 8;

/// What a transaction closure decided to do with the room.
pub enum RoomWriteBack {
    /// Persist the mutated room.
    Persist(Room),
    /// Physically remove the room from the store.
    Delete,
    /// Leave the stored room untouched; the read was enough.
    Keep,
}

/// Transactional access to room documents.
///
/// Every state-changing operation goes through [`RoomRepository::mutate`]:
/// read the current snapshot, validate and mutate against exactly that
/// snapshot, then write back with a compare-and-swap on the version token.
/// A concurrent writer makes the CAS fail and the whole closure re-runs on
/// a fresh snapshot, so no update is ever lost and no two writers can both
/// believe they applied the "last" mutation.
pub struct RoomRepository {
    store: Arc<dyn RoomStore>,
}

impl std::fmt::Debug for RoomRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRepository").finish_non_exhaustive()
    }
}

impl RoomRepository {
    /// Wrap a store handle.
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }

    /// Insert a brand-new room under a freshly generated code.
    ///
    /// `build` receives the candidate code; collisions are retried with a
    /// new code a bounded number of times.
    pub async fn create<F>(&self, build: F) -> Result<Room, ServiceError>
    where
        F: Fn(String) -> Room,
    {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_room_code();
            let room = build(code.clone());
            match self.store.insert_room(room.clone().into()).await {
                Ok(()) => return Ok(room),
                Err(StorageError::AlreadyExists { .. }) => {
                    debug!(room_code = %code, "room code collision, regenerating");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ServiceError::Contention)
    }

    /// Point read of a room, failing with `NotFound` when absent.
    pub async fn fetch(&self, code: &str) -> Result<Room, ServiceError> {
        self.store
            .find_room(code.to_owned())
            .await?
            .map(Room::from)
            .ok_or_else(|| ServiceError::NotFound(format!("room `{code}` not found")))
    }

    /// Run a read-validate-mutate-write transaction against one room.
    ///
    /// The closure sees the current snapshot and returns the write-back
    /// decision plus a caller value. Validation errors abort without
    /// writing; version conflicts retry on a fresh snapshot up to
    /// [`MAX_TX_ATTEMPTS`] times before surfacing as transient contention.
    pub async fn mutate<F, T>(&self, code: &str, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut(Room) -> Result<(RoomWriteBack, T), ServiceError>,
    {
        for attempt in 1..=MAX_TX_ATTEMPTS {
            let room = self.fetch(code).await?;
            let expected_version = room.version;

            let (decision, value) = op(room)?;

            let write = match decision {
                RoomWriteBack::Persist(mut updated) => {
                    updated.version = expected_version + 1;
                    self.store
                        .update_room(expected_version, updated.into())
                        .await
                }
                RoomWriteBack::Delete => {
                    self.store
                        .remove_room(code.to_owned(), expected_version)
                        .await
                }
                RoomWriteBack::Keep => Ok(()),
            };

            match write {
                Ok(()) => return Ok(value),
                Err(err) if err.is_version_conflict() => {
                    debug!(room_code = %code, attempt, "room transaction conflicted, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ServiceError::Contention)
    }

    /// Unconditionally delete a room; absent rooms are a no-op.
    pub async fn delete(&self, code: &str) -> Result<bool, ServiceError> {
        Ok(self.store.delete_room(code.to_owned()).await?)
    }

    /// Scan every room as a list subset.
    pub async fn list(&self) -> Result<Vec<RoomListItemEntity>, ServiceError> {
        Ok(self.store.list_rooms().await?)
    }
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use std::time::{Duration, SystemTime};

    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::room_store::memory::MemoryRoomStore,
        state::room::{Difficulty, Room},
    };

    fn repository() -> RoomRepository {
        RoomRepository::new(Arc::new(MemoryRoomStore::new()))
    }

    fn build_room(code: String) -> Room {
        Room::new(
            code,
            "tx test".into(),
            "general".into(),
            Difficulty::Medium,
            true,
            Vec::new(),
            Uuid::new_v4(),
            4,
            0,
            SystemTime::now(),
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn create_then_fetch_round_trips() {
        let repo = repository();
        let room = repo.create(build_room).await.unwrap();

        let fetched = repo.fetch(&room.code).await.unwrap();
        assert_eq!(fetched.name, "tx test");
        assert_eq!(fetched.version, 0);
    }

    #[tokio::test]
    async fn mutate_increments_the_version() {
        let repo = repository();
        let room = repo.create(build_room).await.unwrap();

        repo.mutate(&room.code, |mut snapshot| {
            snapshot.prize_pool += 1;
            Ok((RoomWriteBack::Persist(snapshot), ()))
        })
        .await
        .unwrap();

        let fetched = repo.fetch(&room.code).await.unwrap();
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.prize_pool, 1);
    }

    #[tokio::test]
    async fn failing_closure_leaves_the_room_untouched() {
        let repo = repository();
        let room = repo.create(build_room).await.unwrap();

        let err = repo
            .mutate::<_, ()>(&room.code, |_snapshot| {
                Err(ServiceError::Conflict("nope".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let fetched = repo.fetch(&room.code).await.unwrap();
        assert_eq!(fetched.version, 0);
    }

    #[tokio::test]
    async fn delete_decision_removes_the_room() {
        let repo = repository();
        let room = repo.create(build_room).await.unwrap();

        repo.mutate(&room.code, |_snapshot| Ok((RoomWriteBack::Delete, ())))
            .await
            .unwrap();

        assert!(matches!(
            repo.fetch(&room.code).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        // Deleting again is a no-op, not an error.
        assert!(!repo.delete(&room.code).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutations_all_apply() {
        let repo = Arc::new(repository());
        let room = repo.create(build_room).await.unwrap();

        // With 4 contenders a writer can lose at most 3 CAS races, which
        // stays within the transaction retry budget.
        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = Arc::clone(&repo);
            let code = room.code.clone();
            handles.push(tokio::spawn(async move {
                repo.mutate(&code, |mut snapshot| {
                    snapshot.prize_pool += 1;
                    Ok((RoomWriteBack::Persist(snapshot), ()))
                })
                .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let fetched = repo.fetch(&room.code).await.unwrap();
        assert_eq!(fetched.prize_pool, 4);
        assert_eq!(fetched.version, 4);
    }
}
