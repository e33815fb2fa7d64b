use std::time::{Duration, SystemTime};

use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{
        AnswerRecordEntity, LeaderboardEntryEntity, ParticipantEntity, QuestionEntity, RoomEntity,
        RoomResultsEntity, TimeExtensionEntity,
    },
    state::lifecycle::RoomStatus,
};

/// Number of characters in a room code.
pub const ROOM_CODE_LENGTH: usize = 6;
/// Alphabet used for room codes; ambiguous glyphs (0/O, 1/I) are excluded.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Difficulty requested from the question content provider at room creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One question of a room, immutable once the room is created.
#[derive(Debug, Clone)]
pub struct QuizQuestion {
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
    /// Per-question time limit in whole seconds; answering faster earns a bonus.
    pub time_limit_secs: u32,
}

/// Write-once record of one participant's answer to one question.
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    /// Index of the answered question.
    pub question_index: usize,
    /// Option the participant chose.
    pub chosen_option: usize,
    /// Reported response latency in whole seconds.
    pub response_time_secs: u32,
    /// Whether the chosen option was correct.
    pub is_correct: bool,
    /// Score awarded for this answer (base + time bonus).
    pub score_awarded: u32,
    /// When the answer was recorded.
    pub submitted_at: SystemTime,
}

/// Per-user session state within a room.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Identity supplied by the upstream identity provider.
    pub user_id: Uuid,
    /// Display name supplied by the upstream identity provider.
    pub user_name: String,
    /// Accumulated score; monotonically non-decreasing.
    pub score: u32,
    /// Count of correct answers; monotonically non-decreasing.
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
    /// Last observed activity, used by the inactivity-eviction policy.
    pub last_activity: SystemTime,
    /// Answers recorded so far, append-only, indexed by question.
    pub answers: Vec<AnswerRecord>,
}

impl Participant {
    /// Build a fresh participant with zeroed stats.
    pub fn new(user_id: Uuid, user_name: String, now: SystemTime) -> Self {
        Self {
            user_id,
            user_name,
            score: 0,
            correct_answers: 0,
            current_question_index: 0,
            average_response_time_secs: 0.0,
            is_finished: false,
            is_ready: false,
            time_extensions: 0,
            last_activity: now,
            answers: Vec::new(),
        }
    }

    /// Whether this participant has shown any activity within `threshold` of `now`.
    pub fn is_active(&self, now: SystemTime, threshold: Duration) -> bool {
        now.duration_since(self.last_activity).unwrap_or_default() <= threshold
    }
}

/// Audit entry recorded whenever a deadline extension is granted.
#[derive(Debug, Clone)]
pub struct TimeExtension {
    /// Participant who requested the extension.
    pub user_id: Uuid,
    /// When the extension was granted.
    pub granted_at: SystemTime,
    /// Deadline in effect after the extension.
    pub new_deadline: SystemTime,
}

/// One row of the final leaderboard.
#[derive(Debug, Clone)]
pub struct LeaderboardEntry {
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

/// Final results, populated only once a room is completed.
#[derive(Debug, Clone)]
pub struct RoomResults {
    /// Participants ordered by score descending, ties broken by faster
    /// average response time.
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Winner, i.e. the first leaderboard entry.
    pub winner_id: Uuid,
    /// Prize pool at the time of completion.
    pub total_prize: u32,
    /// When the room transitioned to completed.
    pub completed_at: SystemTime,
}

/// Outcome of pruning inactive participants from a room.
#[derive(Debug, Default)]
pub struct PruneOutcome {
    /// Identifiers of the evicted participants.
    pub removed: Vec<Uuid>,
    /// New host, when the eviction removed the previous one.
    pub new_host_id: Option<Uuid>,
    /// True when the eviction left the room without participants.
    pub emptied: bool,
}

impl PruneOutcome {
    /// Whether the prune changed the room at all.
    pub fn changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// One multiplayer quiz session, the unit of concurrency control.
#[derive(Debug, Clone)]
pub struct Room {
    /// Short unique identifier, primary key in the store.
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
    /// Questions fixed at creation, immutable thereafter.
    pub questions: Vec<QuizQuestion>,
    /// Participants in join order, unique by user id.
    pub participants: Vec<Participant>,
    /// Participant authorized to start the room; reassigned on departure.
    pub host_id: Uuid,
    /// Capacity limit for `participants`.
    pub max_participants: usize,
    /// Entry fee charged per join; settlement is external.
    pub entry_fee: u32,
    /// Accumulated prize pool: `entry_fee` per join.
    pub prize_pool: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// When the room transitioned to active, if it did.
    pub started_at: Option<SystemTime>,
    /// When the room transitioned to completed, if it did.
    pub completed_at: Option<SystemTime>,
    /// Last observed activity on the room as a whole.
    pub last_activity: SystemTime,
    /// Deadline after which the sweeper deletes the room.
    pub auto_delete_at: SystemTime,
    /// Audit trail of granted deadline extensions.
    pub extension_history: Vec<TimeExtension>,
    /// Final results, present only when `status` is completed.
    pub results: Option<RoomResults>,
    /// Optimistic-concurrency token incremented on every write.
    pub version: u64,
}

impl Room {
    /// Build a new waiting room around an immutable question set.
    ///
    /// The host is recorded as owner but joins like any other participant.
    pub fn new(
        code: String,
        name: String,
        topic: String,
        difficulty: Difficulty,
        is_public: bool,
        questions: Vec<QuizQuestion>,
        host_id: Uuid,
        max_participants: usize,
        entry_fee: u32,
        now: SystemTime,
        base_window: Duration,
    ) -> Self {
        Self {
            code,
            name,
            topic,
            difficulty,
            status: RoomStatus::Waiting,
            is_public,
            questions,
            participants: Vec::new(),
            host_id,
            max_participants,
            entry_fee,
            prize_pool: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
            last_activity: now,
            auto_delete_at: now + base_window,
            extension_history: Vec::new(),
            results: None,
            version: 0,
        }
    }

    /// Find a participant by user id.
    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Find a participant by user id, mutably.
    pub fn participant_mut(&mut self, user_id: Uuid) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }

    /// Whether the participant list has reached the configured capacity.
    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_participants
    }

    /// Append a participant and account for their entry fee.
    ///
    /// Callers must have validated status, capacity, and uniqueness first.
    pub fn add_participant(&mut self, user_id: Uuid, user_name: String, now: SystemTime) {
        self.participants
            .push(Participant::new(user_id, user_name, now));
        self.prize_pool += self.entry_fee;
        self.last_activity = now;
    }

    /// Remove a participant, reassigning the host when the departing user
    /// owned the room. Returns the new host id when reassignment happened.
    ///
    /// The replacement is the first remaining participant in list order;
    /// deterministic by construction, not fair.
    pub fn remove_participant(&mut self, user_id: Uuid) -> Option<Uuid> {
        self.participants.retain(|p| p.user_id != user_id);

        if self.host_id == user_id {
            if let Some(next) = self.participants.first() {
                self.host_id = next.user_id;
                return Some(next.user_id);
            }
        }
        None
    }

    /// Number of participants considered active at `now`.
    pub fn active_participant_count(&self, now: SystemTime, threshold: Duration) -> usize {
        self.participants
            .iter()
            .filter(|p| p.is_active(now, threshold))
            .count()
    }

    /// Evict participants whose last activity exceeds the inactivity
    /// threshold, reassigning the host with the same tie-break rule as a
    /// voluntary departure.
    pub fn prune_inactive(&mut self, now: SystemTime, threshold: Duration) -> PruneOutcome {
        let mut outcome = PruneOutcome::default();

        let evicted: Vec<Uuid> = self
            .participants
            .iter()
            .filter(|p| !p.is_active(now, threshold))
            .map(|p| p.user_id)
            .collect();

        for user_id in evicted {
            let reassigned = self.remove_participant(user_id);
            if reassigned.is_some() {
                outcome.new_host_id = reassigned;
            }
            outcome.removed.push(user_id);
        }

        outcome.emptied = outcome.changed() && self.participants.is_empty();
        outcome
    }

    /// Whether every participant has finished the question set.
    pub fn all_finished(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|p| p.is_finished)
    }

    /// Push the auto-delete deadline forward, never moving it backwards.
    pub fn extend_deadline(&mut self, candidate: SystemTime) {
        if candidate > self.auto_delete_at {
            self.auto_delete_at = candidate;
        }
    }
}

/// Generate a fresh room code from the unambiguous alphabet.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[index] as char
        })
        .collect()
}

impl From<QuestionEntity> for QuizQuestion {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            prompt: value.prompt,
            options: value.options,
            correct_answer: value.correct_answer,
            explanation: value.explanation,
            time_limit_secs: value.time_limit_secs,
        }
    }
}

impl From<QuizQuestion> for QuestionEntity {
    fn from(value: QuizQuestion) -> Self {
        Self {
            id: value.id,
            prompt: value.prompt,
            options: value.options,
            correct_answer: value.correct_answer,
            explanation: value.explanation,
            time_limit_secs: value.time_limit_secs,
        }
    }
}

impl From<AnswerRecordEntity> for AnswerRecord {
    fn from(value: AnswerRecordEntity) -> Self {
        Self {
            question_index: value.question_index,
            chosen_option: value.chosen_option,
            response_time_secs: value.response_time_secs,
            is_correct: value.is_correct,
            score_awarded: value.score_awarded,
            submitted_at: value.submitted_at,
        }
    }
}

impl From<AnswerRecord> for AnswerRecordEntity {
    fn from(value: AnswerRecord) -> Self {
        Self {
            question_index: value.question_index,
            chosen_option: value.chosen_option,
            response_time_secs: value.response_time_secs,
            is_correct: value.is_correct,
            score_awarded: value.score_awarded,
            submitted_at: value.submitted_at,
        }
    }
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            user_id: value.user_id,
            user_name: value.user_name,
            score: value.score,
            correct_answers: value.correct_answers,
            current_question_index: value.current_question_index,
            average_response_time_secs: value.average_response_time_secs,
            is_finished: value.is_finished,
            is_ready: value.is_ready,
            time_extensions: value.time_extensions,
            last_activity: value.last_activity,
            answers: value.answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Participant> for ParticipantEntity {
    fn from(value: Participant) -> Self {
        Self {
            user_id: value.user_id,
            user_name: value.user_name,
            score: value.score,
            correct_answers: value.correct_answers,
            current_question_index: value.current_question_index,
            average_response_time_secs: value.average_response_time_secs,
            is_finished: value.is_finished,
            is_ready: value.is_ready,
            time_extensions: value.time_extensions,
            last_activity: value.last_activity,
            answers: value.answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<TimeExtensionEntity> for TimeExtension {
    fn from(value: TimeExtensionEntity) -> Self {
        Self {
            user_id: value.user_id,
            granted_at: value.granted_at,
            new_deadline: value.new_deadline,
        }
    }
}

impl From<TimeExtension> for TimeExtensionEntity {
    fn from(value: TimeExtension) -> Self {
        Self {
            user_id: value.user_id,
            granted_at: value.granted_at,
            new_deadline: value.new_deadline,
        }
    }
}

impl From<LeaderboardEntryEntity> for LeaderboardEntry {
    fn from(value: LeaderboardEntryEntity) -> Self {
        Self {
            rank: value.rank,
            user_id: value.user_id,
            user_name: value.user_name,
            score: value.score,
            correct_answers: value.correct_answers,
            average_response_time_secs: value.average_response_time_secs,
        }
    }
}

impl From<LeaderboardEntry> for LeaderboardEntryEntity {
    fn from(value: LeaderboardEntry) -> Self {
        Self {
            rank: value.rank,
            user_id: value.user_id,
            user_name: value.user_name,
            score: value.score,
            correct_answers: value.correct_answers,
            average_response_time_secs: value.average_response_time_secs,
        }
    }
}

impl From<RoomResultsEntity> for RoomResults {
    fn from(value: RoomResultsEntity) -> Self {
        Self {
            leaderboard: value.leaderboard.into_iter().map(Into::into).collect(),
            winner_id: value.winner_id,
            total_prize: value.total_prize,
            completed_at: value.completed_at,
        }
    }
}

impl From<RoomResults> for RoomResultsEntity {
    fn from(value: RoomResults) -> Self {
        Self {
            leaderboard: value.leaderboard.into_iter().map(Into::into).collect(),
            winner_id: value.winner_id,
            total_prize: value.total_prize,
            completed_at: value.completed_at,
        }
    }
}

impl From<RoomEntity> for Room {
    fn from(value: RoomEntity) -> Self {
        Self {
            code: value.code,
            name: value.name,
            topic: value.topic,
            difficulty: value.difficulty,
            status: value.status,
            is_public: value.is_public,
            questions: value.questions.into_iter().map(Into::into).collect(),
            participants: value.participants.into_iter().map(Into::into).collect(),
            host_id: value.host_id,
            max_participants: value.max_participants,
            entry_fee: value.entry_fee,
            prize_pool: value.prize_pool,
            created_at: value.created_at,
            started_at: value.started_at,
            completed_at: value.completed_at,
            last_activity: value.last_activity,
            auto_delete_at: value.auto_delete_at,
            extension_history: value.extension_history.into_iter().map(Into::into).collect(),
            results: value.results.map(Into::into),
            version: value.version,
        }
    }
}

impl From<Room> for RoomEntity {
    fn from(value: Room) -> Self {
        Self {
            code: value.code,
            name: value.name,
            topic: value.topic,
            difficulty: value.difficulty,
            status: value.status,
            is_public: value.is_public,
            questions: value.questions.into_iter().map(Into::into).collect(),
            participants: value.participants.into_iter().map(Into::into).collect(),
            host_id: value.host_id,
            max_participants: value.max_participants,
            entry_fee: value.entry_fee,
            prize_pool: value.prize_pool,
            created_at: value.created_at,
            started_at: value.started_at,
            completed_at: value.completed_at,
            last_activity: value.last_activity,
            auto_delete_at: value.auto_delete_at,
            extension_history: value.extension_history.into_iter().map(Into::into).collect(),
            results: value.results.map(Into::into),
            version: value.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute() -> Duration {
        Duration::from_secs(60)
    }

    fn sample_room(now: SystemTime) -> Room {
        Room::new(
            "ABC234".into(),
            "test room".into(),
            "general".into(),
            Difficulty::Easy,
            true,
            Vec::new(),
            Uuid::new_v4(),
            4,
            5,
            now,
            Duration::from_secs(300),
        )
    }

    #[test]
    fn room_codes_use_the_restricted_alphabet() {
        for _ in 0..64 {
            let code = generate_room_code();
            assert_eq!(code.len(), ROOM_CODE_LENGTH);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn prize_pool_tracks_entry_fees() {
        let now = SystemTime::now();
        let mut room = sample_room(now);

        room.add_participant(Uuid::new_v4(), "a".into(), now);
        assert_eq!(room.prize_pool, 5);
        room.add_participant(Uuid::new_v4(), "b".into(), now);
        assert_eq!(room.prize_pool, 10);
        assert_eq!(room.prize_pool, room.entry_fee * room.participants.len() as u32);
    }

    #[test]
    fn host_departure_promotes_first_remaining_participant() {
        let now = SystemTime::now();
        let mut room = sample_room(now);

        let host = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();
        room.host_id = host;
        room.add_participant(host, "host".into(), now);
        room.add_participant(second, "second".into(), now);
        room.add_participant(third, "third".into(), now);

        let new_host = room.remove_participant(host);
        assert_eq!(new_host, Some(second));
        assert_eq!(room.host_id, second);
    }

    #[test]
    fn non_host_departure_keeps_the_host() {
        let now = SystemTime::now();
        let mut room = sample_room(now);

        let host = Uuid::new_v4();
        let second = Uuid::new_v4();
        room.host_id = host;
        room.add_participant(host, "host".into(), now);
        room.add_participant(second, "second".into(), now);

        assert_eq!(room.remove_participant(second), None);
        assert_eq!(room.host_id, host);
    }

    #[test]
    fn prune_evicts_stale_participants_and_reassigns_host() {
        let start = SystemTime::UNIX_EPOCH;
        let mut room = sample_room(start);

        let host = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        room.host_id = host;
        room.add_participant(host, "host".into(), start);
        room.add_participant(fresh, "fresh".into(), start);
        room.participant_mut(fresh).unwrap().last_activity = start + minute() * 10;

        let outcome = room.prune_inactive(start + minute() * 10, minute() * 5);
        assert_eq!(outcome.removed, vec![host]);
        assert_eq!(outcome.new_host_id, Some(fresh));
        assert!(!outcome.emptied);
        assert_eq!(room.participants.len(), 1);
    }

    #[test]
    fn prune_reports_emptied_room() {
        let start = SystemTime::UNIX_EPOCH;
        let mut room = sample_room(start);
        room.add_participant(Uuid::new_v4(), "alone".into(), start);

        let outcome = room.prune_inactive(start + minute() * 10, minute() * 5);
        assert!(outcome.emptied);
        assert!(room.participants.is_empty());
    }

    #[test]
    fn deadline_extension_is_monotonic() {
        let now = SystemTime::now();
        let mut room = sample_room(now);
        let original = room.auto_delete_at;

        room.extend_deadline(original - minute());
        assert_eq!(room.auto_delete_at, original);

        room.extend_deadline(original + minute());
        assert_eq!(room.auto_delete_at, original + minute());
    }
}
