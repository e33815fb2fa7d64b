use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{
        ParticipantEntity, QuestionEntity, RoomEntity, RoomResultsEntity, TimeExtensionEntity,
    },
    state::{lifecycle::RoomStatus, room::Difficulty},
};

/// Room document as stored in the `rooms` collection.
///
/// Top-level timestamps use native BSON dates so the collection can be
/// queried by deadline; nested participant/answer timestamps round-trip
/// through serde untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    code: String,
    version: u64,
    name: String,
    topic: String,
    difficulty: Difficulty,
    status: RoomStatus,
    is_public: bool,
    questions: Vec<QuestionEntity>,
    participants: Vec<ParticipantEntity>,
    host_id: Uuid,
    max_participants: usize,
    entry_fee: u32,
    prize_pool: u32,
    created_at: DateTime,
    started_at: Option<DateTime>,
    completed_at: Option<DateTime>,
    last_activity: DateTime,
    auto_delete_at: DateTime,
    extension_history: Vec<TimeExtensionEntity>,
    results: Option<RoomResultsEntity>,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            code: value.code,
            version: value.version,
            name: value.name,
            topic: value.topic,
            difficulty: value.difficulty,
            status: value.status,
            is_public: value.is_public,
            questions: value.questions,
            participants: value.participants,
            host_id: value.host_id,
            max_participants: value.max_participants,
            entry_fee: value.entry_fee,
            prize_pool: value.prize_pool,
            created_at: DateTime::from_system_time(value.created_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            completed_at: value.completed_at.map(DateTime::from_system_time),
            last_activity: DateTime::from_system_time(value.last_activity),
            auto_delete_at: DateTime::from_system_time(value.auto_delete_at),
            extension_history: value.extension_history,
            results: value.results,
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            code: value.code,
            version: value.version,
            name: value.name,
            topic: value.topic,
            difficulty: value.difficulty,
            status: value.status,
            is_public: value.is_public,
            questions: value.questions,
            participants: value.participants,
            host_id: value.host_id,
            max_participants: value.max_participants,
            entry_fee: value.entry_fee,
            prize_pool: value.prize_pool,
            created_at: value.created_at.to_system_time(),
            started_at: value.started_at.map(|at| at.to_system_time()),
            completed_at: value.completed_at.map(|at| at.to_system_time()),
            last_activity: value.last_activity.to_system_time(),
            auto_delete_at: value.auto_delete_at.to_system_time(),
            extension_history: value.extension_history,
            results: value.results,
        }
    }
}
