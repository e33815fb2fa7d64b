//! Persistence layer: entities, the `RoomStore` abstraction, and the
//! transactional room repository built on top of it.

pub mod models;
pub mod room;
pub mod room_store;
pub mod storage;
