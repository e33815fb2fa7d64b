use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    lifecycle::RoomStatus,
    room::Difficulty,
};

/// Question entry fixed into a room at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionEntity {
    /// Identifier assigned by the question provider.
    pub id: Uuid,
    /// Prompt text shown to participants.
    pub prompt: String,
    /// Answer options, in display order.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_answer: usize,
    /// Explanation revealed after a participant has answered.
    pub explanation: String,
    /// Per-question time limit in whole seconds.
    pub time_limit_secs: u32,
}

/// Write-once answer record persisted inside a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRecordEntity {
    /// Index of the answered question.
    pub question_index: usize,
    /// Option the participant chose.
    pub chosen_option: usize,
    /// Reported response latency in whole seconds.
    pub response_time_secs: u32,
    /// Whether the chosen option was correct.
    pub is_correct: bool,
    /// Score awarded for this answer.
    pub score_awarded: u32,
    /// When the answer was recorded.
    pub submitted_at: SystemTime,
}

/// Participant state persisted inside a room document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantEntity {
    /// Identity supplied by the upstream identity provider.
    pub user_id: Uuid,
    /// Display name supplied by the upstream identity provider.
    pub user_name: String,
    /// Accumulated score.
    pub score: u32,
    /// Count of correct answers.
    pub correct_answers: u32,
    /// Index of the next question this participant must answer.
    pub current_question_index: usize,
    /// Running mean of response latencies over answered questions.
    pub average_response_time_secs: f64,
    /// True once the participant has answered the last question.
    pub is_finished: bool,
    /// Readiness flag, meaningful only while the room is waiting.
    pub is_ready: bool,
    /// Number of deadline extensions granted to this participant.
    pub time_extensions: u32,
    /// Last observed activity.
    pub last_activity: SystemTime,
    /// Answers recorded so far, append-only.
    pub answers: Vec<AnswerRecordEntity>,
}

/// Audit entry for a granted deadline extension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeExtensionEntity {
    /// Participant who requested the extension.
    pub user_id: Uuid,
    /// When the extension was granted.
    pub granted_at: SystemTime,
    /// Deadline in effect after the extension.
    pub new_deadline: SystemTime,
}

/// Persisted leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntryEntity {
    /// 1-based rank after tie-breaking.
    pub rank: u32,
    /// Participant identity.
    pub user_id: Uuid,
    /// Participant display name.
    pub user_name: String,
    /// Final score.
    pub score: u32,
    /// Final count of correct answers.
    pub correct_answers: u32,
    /// Final running mean of response latencies.
    pub average_response_time_secs: f64,
}

/// Final results persisted once a room completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomResultsEntity {
    /// Ordered leaderboard.
    pub leaderboard: Vec<LeaderboardEntryEntity>,
    /// Winner, i.e. the first leaderboard entry.
    pub winner_id: Uuid,
    /// Prize pool at the time of completion.
    pub total_prize: u32,
    /// When the room transitioned to completed.
    pub completed_at: SystemTime,
}

/// Aggregate room entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomEntity {
    /// Short unique identifier, primary key.
    pub code: String,
    /// Display name of the room.
    pub name: String,
    /// Subject/topic requested from the question provider.
    pub topic: String,
    /// Difficulty requested from the question provider.
    pub difficulty: Difficulty,
    /// Current lifecycle status.
    pub status: RoomStatus,
    /// Whether the room appears in the public discovery listing.
    pub is_public: bool,
    /// Questions fixed at creation.
    pub questions: Vec<QuestionEntity>,
    /// Participants in join order.
    pub participants: Vec<ParticipantEntity>,
    /// Participant authorized to start the room.
    pub host_id: Uuid,
    /// Capacity limit.
    pub max_participants: usize,
    /// Entry fee charged per join.
    pub entry_fee: u32,
    /// Accumulated prize pool.
    pub prize_pool: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// When the room transitioned to active, if it did.
    pub started_at: Option<SystemTime>,
    /// When the room transitioned to completed, if it did.
    pub completed_at: Option<SystemTime>,
    /// Last observed activity on the room.
    pub last_activity: SystemTime,
    /// Deadline after which the sweeper deletes the room.
    pub auto_delete_at: SystemTime,
    /// Audit trail of granted deadline extensions.
    pub extension_history: Vec<TimeExtensionEntity>,
    /// Final results, present only for completed rooms.
    pub results: Option<RoomResultsEntity>,
    /// Optimistic-concurrency token incremented on every write.
    pub version: u64,
}

/// Participant subset carried by room list items; enough for the sweeper's
/// inactivity predicate and the discovery active-count filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantBriefEntity {
    /// Participant identity.
    pub user_id: Uuid,
    /// Last observed activity.
    pub last_activity: SystemTime,
}

/// Room subset returned by list scans (sweeper and discovery).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomListItemEntity {
    /// Short unique identifier.
    pub code: String,
    /// Display name of the room.
    pub name: String,
    /// Subject/topic of the room.
    pub topic: String,
    /// Difficulty of the room.
    pub difficulty: Difficulty,
    /// Current lifecycle status.
    pub status: RoomStatus,
    /// Whether the room appears in the public discovery listing.
    pub is_public: bool,
    /// Capacity limit.
    pub max_participants: usize,
    /// Entry fee charged per join.
    pub entry_fee: u32,
    /// Number of questions in the room.
    pub question_count: usize,
    /// Participant identities and activity stamps.
    pub participants: Vec<ParticipantBriefEntity>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// When the room transitioned to completed, if it did.
    pub completed_at: Option<SystemTime>,
    /// Deadline after which the sweeper deletes the room.
    pub auto_delete_at: SystemTime,
}

impl From<&ParticipantEntity> for ParticipantBriefEntity {
    fn from(value: &ParticipantEntity) -> Self {
        Self {
            user_id: value.user_id,
            last_activity: value.last_activity,
        }
    }
}

impl From<&RoomEntity> for RoomListItemEntity {
    fn from(entity: &RoomEntity) -> Self {
        Self {
            code: entity.code.clone(),
            name: entity.name.clone(),
            topic: entity.topic.clone(),
            difficulty: entity.difficulty,
            status: entity.status,
            is_public: entity.is_public,
            max_participants: entity.max_participants,
            entry_fee: entity.entry_fee,
            question_count: entity.questions.len(),
            participants: entity.participants.iter().map(Into::into).collect(),
            created_at: entity.created_at,
            completed_at: entity.completed_at,
            auto_delete_at: entity.auto_delete_at,
        }
    }
}
