#[cfg(feature = "memory-store")]
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{RoomEntity, RoomListItemEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for room documents.
///
/// The room is the unit of mutual exclusion: `update_room` and
/// `remove_room` are compare-and-swap operations against the entity's
/// `version` field, so concurrent writers against the same room serialize
/// and the loser observes [`StorageError::VersionConflict`] instead of
/// silently overwriting.
///
/// [`StorageError::VersionConflict`]: crate::dao::storage::StorageError::VersionConflict
pub trait RoomStore: Send + Sync {
    /// Insert a new room; fails with `AlreadyExists` on a code collision.
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Point read of a room by code.
    fn find_room(&self, code: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Replace a room if its stored version equals `expected_version`.
    ///
    /// The provided entity must already carry the incremented version.
    fn update_room(
        &self,
        expected_version: u64,
        room: RoomEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a room if its stored version equals `expected_version`.
    ///
    /// An absent room is a success (the delete is idempotent); a version
    /// mismatch is a `VersionConflict`.
    fn remove_room(
        &self,
        code: String,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Unconditionally delete a room; returns whether anything was removed.
    fn delete_room(&self, code: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// List every room as a scan-friendly subset.
    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
