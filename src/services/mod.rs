//! Business logic sitting between the HTTP routes and the storage layer.

pub mod answer_service;
pub mod discovery_service;
pub mod documentation;
pub mod health_service;
pub mod question_bank;
pub mod room_service;
pub mod storage_supervisor;
pub mod sweeper;
pub mod timeout_service;

#[cfg(all(test, feature = "memory-store"))]
pub(crate) mod testing;
