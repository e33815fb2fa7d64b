mod connection;
mod error;
mod models;
pub mod config;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoRoomStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::DuplicateRoom { code } => StorageError::AlreadyExists { code },
            MongoDaoError::StaleRoom { code } => StorageError::VersionConflict { code },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
