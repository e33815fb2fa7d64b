//! Payloads exposed by the public room discovery listing.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::RoomListItemEntity,
    dto::format_system_time,
    state::room::Difficulty,
};

/// One joinable room as shown in the discovery listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicRoomSummary {
    /// Code used to join the room.
    pub code: String,
    /// Display name of the room.
    pub name: String,
    /// Topic of the question set.
    pub topic: String,
    /// Difficulty of the question set.
    pub difficulty: Difficulty,
    /// Number of questions in the room.
    pub question_count: usize,
    /// Participants counted as active right now.
    pub active_participants: usize,
    /// Capacity limit.
    pub max_participants: usize,
    /// Entry fee charged per join.
    pub entry_fee: u32,
    /// Creation timestamp.
    pub created_at: String,
}

impl PublicRoomSummary {
    /// Project a list item together with its precomputed active count.
    pub fn project(entity: &RoomListItemEntity, active_participants: usize) -> Self {
        Self {
            code: entity.code.clone(),
            name: entity.name.clone(),
            topic: entity.topic.clone(),
            difficulty: entity.difficulty,
            question_count: entity.question_count,
            active_participants,
            max_participants: entity.max_participants,
            entry_fee: entity.entry_fee,
            created_at: format_system_time(entity.created_at),
        }
    }
}
