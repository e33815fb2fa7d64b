//! Shared fixtures for service-level tests.

use std::sync::Arc;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::room_store::memory::MemoryRoomStore,
    dto::room::{CreateRoomRequest, JoinRoomRequest, RoomSnapshot},
    error::ServiceError,
    services::{
        question_bank::{QuestionSource, QuestionSourceError},
        room_service,
    },
    state::{
        AppState, SharedState,
        room::{Difficulty, QuizQuestion},
    },
};

/// Question source returning a fixed, deterministic question set.
pub struct FixedQuestions {
    questions: Vec<QuizQuestion>,
}

impl FixedQuestions {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        Self { questions }
    }
}

impl QuestionSource for FixedQuestions {
    fn fetch(
        &self,
        topic: String,
        difficulty: Difficulty,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<QuizQuestion>, QuestionSourceError>> {
        let questions = self.questions.clone();
        Box::pin(async move {
            if questions.len() < count {
                return Err(QuestionSourceError::NotEnough {
                    topic,
                    difficulty,
                    available: questions.len(),
                    requested: count,
                });
            }
            Ok(questions.into_iter().take(count).collect())
        })
    }
}

/// Build a question where option 0 is correct.
pub fn question(time_limit_secs: u32) -> QuizQuestion {
    QuizQuestion {
        id: Uuid::new_v4(),
        prompt: "fixture prompt".into(),
        options: vec!["right".into(), "wrong".into(), "also wrong".into()],
        correct_answer: 0,
        explanation: "fixture explanation".into(),
        time_limit_secs,
    }
}

/// Application state backed by an installed in-memory store and a fixed
/// question set of `question_count` questions with a 30s time limit each.
pub async fn state_with_questions(question_count: usize) -> SharedState {
    state_with(AppConfig::default(), question_count).await
}

/// Same as [`state_with_questions`] but with custom policy values.
pub async fn state_with(config: AppConfig, question_count: usize) -> SharedState {
    let questions: Vec<QuizQuestion> = (0..question_count).map(|_| question(30)).collect();
    let state = AppState::new(config, Arc::new(FixedQuestions::new(questions)));
    state
        .set_room_store(Arc::new(MemoryRoomStore::new()))
        .await;
    state
}

/// Create a room with two questions and default lobby settings.
pub async fn create_room(
    state: &SharedState,
    host_id: Uuid,
    entry_fee: u32,
    question_count: usize,
) -> Result<RoomSnapshot, ServiceError> {
    room_service::create_room(
        state,
        CreateRoomRequest {
            name: "fixture room".into(),
            topic: "general".into(),
            difficulty: Difficulty::Easy,
            question_count,
            max_participants: 4,
            entry_fee,
            is_public: true,
            host_id,
        },
    )
    .await
}

/// Join a room under a generated display name.
pub async fn join(
    state: &SharedState,
    code: &str,
    user_id: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    room_service::join_room(
        state,
        code,
        JoinRoomRequest {
            user_id,
            user_name: format!("user-{}", &user_id.to_string()[..8]),
        },
    )
    .await
}
