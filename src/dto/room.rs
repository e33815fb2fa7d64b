//! Request and response payloads for the room lifecycle routes.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::{
        lifecycle::RoomStatus,
        room::{
            Difficulty, LeaderboardEntry, Participant, QuizQuestion, Room, RoomResults,
            TimeExtension,
        },
    },
};

/// Payload used to create a brand-new quiz room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Display name of the room.
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    /// Topic requested from the question provider.
    #[validate(length(min = 1, max = 64))]
    pub topic: String,
    /// Difficulty requested from the question provider.
    pub difficulty: Difficulty,
    /// Number of questions to fix into the room.
    #[validate(range(min = 1, max = 20))]
    pub question_count: usize,
    /// Capacity limit for the participant list.
    #[validate(range(min = 2, max = 16))]
    pub max_participants: usize,
    /// Entry fee charged per join; settlement is external.
    #[validate(range(max = 10_000))]
    pub entry_fee: u32,
    /// Whether the room appears in the public discovery listing.
    #[serde(default = "default_is_public")]
    pub is_public: bool,
    /// Identity of the creating user, recorded as host.
    pub host_id: Uuid,
}

fn default_is_public() -> bool {
    true
}

/// Payload used to join an existing waiting room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    /// Identity of the joining user.
    pub user_id: Uuid,
    /// Display name of the joining user.
    #[validate(length(min = 1, max = 32))]
    pub user_name: String,
}

/// Payload used to toggle a readiness flag while waiting.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReadyRequest {
    /// Identity of the participant.
    pub user_id: Uuid,
    /// Desired readiness state.
    pub is_ready: bool,
}

/// Payload used by the host to start the quiz.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartRequest {
    /// Identity of the caller; must be the room host.
    pub user_id: Uuid,
}

/// Payload carrying one answer submission.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerRequest {
    /// Identity of the answering participant.
    pub user_id: Uuid,
    /// Index of the question being answered; must match the participant's cursor.
    pub question_index: usize,
    /// Index of the chosen option.
    pub answer: usize,
    /// Client-reported response latency in whole seconds.
    #[validate(range(max = 3_600))]
    pub response_time_secs: u32,
}

/// Payload requesting a room deadline extension.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtendRequest {
    /// Identity of the requesting participant.
    pub user_id: Uuid,
}

/// Payload used to leave a room voluntarily.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LeaveRequest {
    /// Identity of the departing participant.
    pub user_id: Uuid,
}

/// Query parameters accepted by the room state poll.
#[derive(Debug, Deserialize, IntoParams)]
pub struct StateQuery {
    /// Identity of the polling participant; activity is stamped when present.
    pub user_id: Option<Uuid>,
}

/// Public projection of one participant.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantSummary {
    /// Identity supplied by the upstream identity provider.
    pub user_id: Uuid,
    /// Display name shown to other participants.
    pub user_name: String,
    /// Accumulated score.
    pub score: u32,
    /// Count of correct answers so far.
    pub correct_answers: u32,
    /// Index of the question this participant must answer next.
    pub current_question_index: usize,
    /// Running mean of response latencies in seconds.
    pub average_response_time_secs: f64,
    /// True once the participant has answered the last question.
    pub is_finished: bool,
    /// Readiness flag, meaningful only while the room is waiting.
    pub is_ready: bool,
    /// True for the participant currently holding the host role.
    pub is_host: bool,
    /// Deadline extensions used by this participant.
    pub time_extensions: u32,
}

impl ParticipantSummary {
    fn project(participant: &Participant, host_id: Uuid) -> Self {
        Self {
            user_id: participant.user_id,
            user_name: participant.user_name.clone(),
            score: participant.score,
            correct_answers: participant.correct_answers,
            current_question_index: participant.current_question_index,
            average_response_time_secs: participant.average_response_time_secs,
            is_finished: participant.is_finished,
            is_ready: participant.is_ready,
            is_host: participant.user_id == host_id,
            time_extensions: participant.time_extensions,
        }
    }
}

/// Question projection keeping the correct answer hidden until the caller
/// has locked in their own answer for it.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    /// Index of the question within the room.
    pub index: usize,
    /// Identifier assigned by the question provider.
    pub id: Uuid,
    /// Prompt text.
    pub prompt: String,
    /// Answer options, in display order.
    pub options: Vec<String>,
    /// Per-question time limit in whole seconds.
    pub time_limit_secs: u32,
    /// Index of the correct option, present once the caller has answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<usize>,
    /// Explanation of the correct answer, present once the caller has answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuestionView {
    fn project(index: usize, question: &QuizQuestion, answered: bool) -> Self {
        Self {
            index,
            id: question.id,
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            time_limit_secs: question.time_limit_secs,
            correct_answer: answered.then_some(question.correct_answer),
            explanation: answered.then(|| question.explanation.clone()),
        }
    }
}

/// One row of the final leaderboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardRow {
    /// 1-based rank after tie-breaking.
    pub rank: u32,
    /// Identity of the ranked participant.
    pub user_id: Uuid,
    /// Display name of the ranked participant.
    pub user_name: String,
    /// Final score.
    pub score: u32,
    /// Count of correct answers.
    pub correct_answers: u32,
    /// Average response latency in seconds, the tie-breaker.
    pub average_response_time_secs: f64,
}

impl From<&LeaderboardEntry> for LeaderboardRow {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            rank: entry.rank,
            user_id: entry.user_id,
            user_name: entry.user_name.clone(),
            score: entry.score,
            correct_answers: entry.correct_answers,
            average_response_time_secs: entry.average_response_time_secs,
        }
    }
}

/// Final results of a completed room.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResultsSummary {
    /// Participants ordered by score, ties broken by faster average latency.
    pub leaderboard: Vec<LeaderboardRow>,
    /// Winner, i.e. the first leaderboard entry.
    pub winner_id: Uuid,
    /// Prize pool at the time of completion.
    pub total_prize: u32,
    /// When the room completed, RFC 3339.
    pub completed_at: String,
}

impl From<&RoomResults> for ResultsSummary {
    fn from(results: &RoomResults) -> Self {
        Self {
            leaderboard: results.leaderboard.iter().map(Into::into).collect(),
            winner_id: results.winner_id,
            total_prize: results.total_prize,
            completed_at: format_system_time(results.completed_at),
        }
    }
}

/// Audit row for one granted deadline extension.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExtensionSummary {
    /// Participant who requested the extension.
    pub user_id: Uuid,
    /// When the extension was granted, RFC 3339.
    pub granted_at: String,
    /// Deadline in effect after the extension, RFC 3339.
    pub new_deadline: String,
}

impl From<&TimeExtension> for ExtensionSummary {
    fn from(extension: &TimeExtension) -> Self {
        Self {
            user_id: extension.user_id,
            granted_at: format_system_time(extension.granted_at),
            new_deadline: format_system_time(extension.new_deadline),
        }
    }
}

/// Full room projection returned by the lifecycle routes.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomSnapshot {
    /// Room code, the primary identifier.
    pub code: String,
    /// Display name of the room.
    pub name: String,
    /// Topic requested from the question provider.
    pub topic: String,
    /// Difficulty requested from the question provider.
    pub difficulty: Difficulty,
    /// Lifecycle status ("waiting", "active", or "completed").
    pub status: RoomStatus,
    /// Whether the room appears in the public discovery listing.
    pub is_public: bool,
    /// Participant currently holding the host role.
    pub host_id: Uuid,
    /// Capacity limit for the participant list.
    pub max_participants: usize,
    /// Entry fee charged per join.
    pub entry_fee: u32,
    /// Accumulated prize pool.
    pub prize_pool: u32,
    /// Number of questions fixed into the room.
    pub question_count: usize,
    /// Participants in join order.
    pub participants: Vec<ParticipantSummary>,
    /// Question at the calling participant's cursor while the room is
    /// active; a finished caller keeps the last question, with its answer
    /// and explanation revealed.
    pub current_question: Option<QuestionView>,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
    /// When the room went active, RFC 3339.
    pub started_at: Option<String>,
    /// When the room completed, RFC 3339.
    pub completed_at: Option<String>,
    /// Deadline after which the sweeper deletes the room, RFC 3339.
    pub auto_delete_at: String,
    /// Audit trail of granted deadline extensions.
    pub extension_history: Vec<ExtensionSummary>,
    /// Final results, present only once the room is completed.
    pub results: Option<ResultsSummary>,
}

impl RoomSnapshot {
    /// Project a room for a specific caller.
    ///
    /// The current question is resolved against the caller's own cursor, so
    /// two participants polling the same room can see different questions.
    pub fn for_caller(room: &Room, caller: Option<Uuid>) -> Self {
        let current_question = caller
            .filter(|_| room.status == RoomStatus::Active)
            .and_then(|user_id| room.participant(user_id))
            .and_then(|participant| {
                let index = participant.current_question_index;
                room.questions.get(index).map(|question| {
                    // The cursor holds on the last question once a
                    // participant finishes, and its recorded answer unlocks
                    // the reveal for clients that missed the submit response.
                    let answered = participant
                        .answers
                        .iter()
                        .any(|record| record.question_index == index);
                    QuestionView::project(index, question, answered)
                })
            });

        Self {
            code: room.code.clone(),
            name: room.name.clone(),
            topic: room.topic.clone(),
            difficulty: room.difficulty,
            status: room.status,
            is_public: room.is_public,
            host_id: room.host_id,
            max_participants: room.max_participants,
            entry_fee: room.entry_fee,
            prize_pool: room.prize_pool,
            question_count: room.questions.len(),
            participants: room
                .participants
                .iter()
                .map(|participant| ParticipantSummary::project(participant, room.host_id))
                .collect(),
            current_question,
            created_at: format_system_time(room.created_at),
            started_at: room.started_at.map(format_system_time),
            completed_at: room.completed_at.map(format_system_time),
            auto_delete_at: format_system_time(room.auto_delete_at),
            extension_history: room.extension_history.iter().map(Into::into).collect(),
            results: room.results.as_ref().map(Into::into),
        }
    }
}

/// Outcome of one scored answer submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerOutcome {
    /// Whether the chosen option was correct.
    pub is_correct: bool,
    /// Points awarded for this answer (base plus time bonus).
    pub score_awarded: u32,
    /// Index of the correct option, revealed now that the answer is locked in.
    pub correct_answer: usize,
    /// Explanation of the correct answer.
    pub explanation: String,
    /// Participant's total score after this answer.
    pub total_score: u32,
    /// True once the caller has answered the last question.
    pub is_finished: bool,
    /// Index of the caller's next question.
    pub next_question_index: usize,
    /// True when this answer completed the whole room.
    pub room_completed: bool,
}

/// Outcome of a granted deadline extension.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExtendOutcome {
    /// Deadline in effect after the extension.
    pub new_deadline: String,
    /// Extensions used by the requesting participant so far.
    pub extensions_used: u32,
    /// Extensions the requesting participant may still request.
    pub extensions_remaining: u32,
}

impl ExtendOutcome {
    /// Build an outcome from the raw deadline timestamp.
    pub fn new(new_deadline: SystemTime, extensions_used: u32, extensions_remaining: u32) -> Self {
        Self {
            new_deadline: format_system_time(new_deadline),
            extensions_used,
            extensions_remaining,
        }
    }
}

/// Outcome of a voluntary departure.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveOutcome {
    /// True when the departure deleted the room outright.
    pub room_deleted: bool,
    /// New host, when the departing user owned the room.
    pub new_host_id: Option<Uuid>,
}
