//! Answer validation, scoring, and room completion.
//!
//! Each participant advances a private cursor through the shared question
//! set. Scoring is deterministic: 100 base points for a correct answer plus
//! 2 points per unused second of the question's time limit. The answer that
//! finishes the last unfinished participant also completes the room and
//! freezes the final leaderboard, all inside one transaction.

use std::{
    cmp::Ordering,
    time::{Duration, SystemTime},
};

use tracing::info;

use crate::{
    dao::room::RoomWriteBack,
    dto::room::{AnswerOutcome, AnswerRequest},
    error::ServiceError,
    services::timeout_service,
    state::{
        SharedState,
        lifecycle::RoomStatus,
        room::{AnswerRecord, LeaderboardEntry, Participant, QuizQuestion, Room, RoomResults},
    },
};

/// Points granted for any correct answer, before the time bonus.
const BASE_SCORE: u32 = 100;
/// Bonus points per second of the time limit left unused.
const TIME_BONUS_PER_SECOND: u32 = 2;

/// Points awarded for one answer.
pub fn score_answer(question: &QuizQuestion, chosen: usize, response_time_secs: u32) -> u32 {
    if chosen != question.correct_answer {
        return 0;
    }
    let unused = question.time_limit_secs.saturating_sub(response_time_secs);
    BASE_SCORE + unused * TIME_BONUS_PER_SECOND
}

/// Order participants into the final leaderboard.
///
/// Score descending; ties are broken by faster average response time.
pub fn rank_participants(participants: &[Participant]) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<&Participant> = participants.iter().collect();
    ordered.sort_by(|a, b| {
        b.score.cmp(&a.score).then_with(|| {
            a.average_response_time_secs
                .partial_cmp(&b.average_response_time_secs)
                .unwrap_or(Ordering::Equal)
        })
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, participant)| LeaderboardEntry {
            rank: index as u32 + 1,
            user_id: participant.user_id,
            user_name: participant.user_name.clone(),
            score: participant.score,
            correct_answers: participant.correct_answers,
            average_response_time_secs: participant.average_response_time_secs,
        })
        .collect()
}

/// Complete an active room once every remaining participant has finished.
///
/// Ranks the leaderboard, freezes the results, and keeps the room readable
/// for the grace period. Returns whether the transition ran, so callers can
/// schedule the deferred cleanup outside their transaction. Departures can
/// trigger this just like answers: removing the last unfinished participant
/// leaves a room where everyone left standing is done.
pub fn complete_if_finished(
    room: &mut Room,
    now: SystemTime,
    grace: Duration,
) -> Result<bool, ServiceError> {
    if room.status != RoomStatus::Active || !room.all_finished() {
        return Ok(false);
    }

    room.status = room.status.validate_transition(RoomStatus::Completed)?;
    let leaderboard = rank_participants(&room.participants);
    if let Some(winner_id) = leaderboard.first().map(|entry| entry.user_id) {
        room.results = Some(RoomResults {
            leaderboard,
            winner_id,
            total_prize: room.prize_pool,
            completed_at: now,
        });
    }
    room.completed_at = Some(now);
    // Completed rooms stay readable for the grace period, then the deferred
    // deletion or the sweeper reaps them.
    room.extend_deadline(now + grace);
    Ok(true)
}

/// Record and score one answer.
///
/// The submitted index must match the caller's cursor exactly; replays and
/// skipped-ahead submissions are rejected without touching the stored
/// answer history.
pub async fn submit_answer(
    state: &SharedState,
    code: &str,
    request: AnswerRequest,
) -> Result<AnswerOutcome, ServiceError> {
    let repo = state.repository().await?;
    let config = state.config().clone();

    let outcome = repo
        .mutate(code, |mut room| {
            if room.status != RoomStatus::Active {
                return Err(ServiceError::InvalidState(format!(
                    "room `{code}` is not active"
                )));
            }

            let question_total = room.questions.len();
            let (cursor, answered) = room
                .participant(request.user_id)
                .map(|p| (p.current_question_index, p.answers.len()))
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "user `{}` is not in room `{code}`",
                        request.user_id
                    ))
                })?;

            // A finished participant keeps the cursor on the last question,
            // so the duplicate check must look at the recorded answers too.
            if request.question_index < cursor || answered > request.question_index {
                return Err(ServiceError::Conflict(format!(
                    "question {} was already answered",
                    request.question_index
                )));
            }
            if request.question_index > cursor {
                return Err(ServiceError::Conflict(format!(
                    "question {} is not open yet, the current question is {cursor}",
                    request.question_index
                )));
            }

            let question = room
                .questions
                .get(request.question_index)
                .cloned()
                .ok_or_else(|| {
                    ServiceError::InvalidInput(format!(
                        "question {} does not exist",
                        request.question_index
                    ))
                })?;
            if request.answer >= question.options.len() {
                return Err(ServiceError::InvalidInput(format!(
                    "answer index {} is out of range for {} options",
                    request.answer,
                    question.options.len()
                )));
            }

            let is_correct = request.answer == question.correct_answer;
            let awarded = score_answer(&question, request.answer, request.response_time_secs);
            let now = SystemTime::now();

            let Some(participant) = room.participant_mut(request.user_id) else {
                return Err(ServiceError::NotFound(format!(
                    "user `{}` is not in room `{code}`",
                    request.user_id
                )));
            };

            participant.answers.push(AnswerRecord {
                question_index: request.question_index,
                chosen_option: request.answer,
                response_time_secs: request.response_time_secs,
                is_correct,
                score_awarded: awarded,
                submitted_at: now,
            });
            participant.score += awarded;
            if is_correct {
                participant.correct_answers += 1;
            }
            let count = participant.answers.len() as f64;
            participant.average_response_time_secs +=
                (f64::from(request.response_time_secs) - participant.average_response_time_secs)
                    / count;

            if request.question_index + 1 < question_total {
                participant.current_question_index += 1;
            } else {
                participant.is_finished = true;
            }
            participant.last_activity = now;

            let total_score = participant.score;
            let is_finished = participant.is_finished;
            let next_question_index = participant.current_question_index;

            room.last_activity = now;
            // Active play keeps the room alive without explicit extensions.
            room.extend_deadline(now + config.base_window);

            let room_completed = complete_if_finished(&mut room, now, config.completion_grace)?;

            Ok((
                RoomWriteBack::Persist(room),
                AnswerOutcome {
                    is_correct,
                    score_awarded: awarded,
                    correct_answer: question.correct_answer,
                    explanation: question.explanation.clone(),
                    total_score,
                    is_finished,
                    next_question_index,
                    room_completed,
                },
            ))
        })
        .await?;

    if outcome.room_completed {
        info!(room_code = %code, "all participants finished, room completed");
        timeout_service::schedule_completion_cleanup(state.clone(), code.to_owned());
    }

    Ok(outcome)
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        dto::room::ReadyRequest,
        services::{room_service, testing},
        state::room::Room,
    };

    fn fixture_question(time_limit_secs: u32) -> QuizQuestion {
        testing::question(time_limit_secs)
    }

    async fn active_room_with_two(
        state: &crate::state::SharedState,
        host: Uuid,
        other: Uuid,
        entry_fee: u32,
    ) -> String {
        let created = testing::create_room(state, host, entry_fee, 2).await.unwrap();
        testing::join(state, &created.code, host).await.unwrap();
        testing::join(state, &created.code, other).await.unwrap();
        room_service::set_ready(
            state,
            &created.code,
            ReadyRequest {
                user_id: other,
                is_ready: true,
            },
        )
        .await
        .unwrap();
        room_service::start_room(state, &created.code, host)
            .await
            .unwrap();
        created.code
    }

    fn answer(user_id: Uuid, question_index: usize, answer: usize, secs: u32) -> AnswerRequest {
        AnswerRequest {
            user_id,
            question_index,
            answer,
            response_time_secs: secs,
        }
    }

    #[test]
    fn scoring_rewards_speed_only_when_correct() {
        let question = fixture_question(30);

        // Correct in 10s: 100 base + 20 unused seconds * 2.
        assert_eq!(score_answer(&question, 0, 10), 140);
        // Correct exactly at the limit: base only.
        assert_eq!(score_answer(&question, 0, 30), 100);
        // Correct past the limit: no negative bonus.
        assert_eq!(score_answer(&question, 0, 45), 100);
        // Wrong answers score nothing, however fast.
        assert_eq!(score_answer(&question, 1, 1), 0);
    }

    #[test]
    fn completion_requires_an_active_room_where_everyone_finished() {
        let now = SystemTime::now();
        let grace = std::time::Duration::from_secs(300);
        let mut room = Room::new(
            "ABC234".into(),
            "r".into(),
            "general".into(),
            crate::state::room::Difficulty::Easy,
            true,
            vec![fixture_question(30)],
            Uuid::new_v4(),
            4,
            0,
            now,
            std::time::Duration::from_secs(300),
        );
        room.add_participant(Uuid::new_v4(), "a".into(), now);

        // Waiting rooms never complete, finished participant or not.
        room.participants[0].is_finished = true;
        assert!(!complete_if_finished(&mut room, now, grace).unwrap());

        room.status = RoomStatus::Active;
        room.participants[0].is_finished = false;
        assert!(!complete_if_finished(&mut room, now, grace).unwrap());

        room.participants[0].is_finished = true;
        assert!(complete_if_finished(&mut room, now, grace).unwrap());
        assert_eq!(room.status, RoomStatus::Completed);
        assert!(room.results.is_some());
        assert!(room.completed_at.is_some());

        // Already completed: the transition must not run twice.
        assert!(!complete_if_finished(&mut room, now, grace).unwrap());
    }

    #[test]
    fn ranking_breaks_score_ties_by_faster_average() {
        let now = SystemTime::now();
        let mut participants = Vec::new();
        for (name, score, avg) in [("slow", 80, 5.0), ("fast", 80, 3.0), ("last", 50, 10.0)] {
            let mut p = Participant::new(Uuid::new_v4(), name.into(), now);
            p.score = score;
            p.average_response_time_secs = avg;
            participants.push(p);
        }

        let leaderboard = rank_participants(&participants);
        let names: Vec<&str> = leaderboard.iter().map(|e| e.user_name.as_str()).collect();
        assert_eq!(names, vec!["fast", "slow", "last"]);
        assert_eq!(
            leaderboard.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn answers_advance_the_cursor_and_accumulate_score() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let other = Uuid::new_v4();
        let code = active_room_with_two(&state, host, other, 0).await;

        let first = submit_answer(&state, &code, answer(host, 0, 0, 10))
            .await
            .unwrap();
        assert!(first.is_correct);
        assert_eq!(first.score_awarded, 140);
        assert_eq!(first.next_question_index, 1);
        assert!(!first.is_finished);

        let second = submit_answer(&state, &code, answer(host, 1, 1, 5))
            .await
            .unwrap();
        assert!(!second.is_correct);
        assert_eq!(second.score_awarded, 0);
        assert!(second.is_finished);
        assert_eq!(second.total_score, 140);
        // The other participant has not finished, so the room stays active.
        assert!(!second.room_completed);
    }

    #[tokio::test]
    async fn duplicate_answers_are_rejected_and_the_first_record_stands() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let other = Uuid::new_v4();
        let code = active_room_with_two(&state, host, other, 0).await;

        submit_answer(&state, &code, answer(host, 0, 0, 10))
            .await
            .unwrap();

        let err = submit_answer(&state, &code, answer(host, 0, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let room: Room = state
            .repository()
            .await
            .unwrap()
            .fetch(&code)
            .await
            .unwrap();
        let participant = room.participant(host).unwrap();
        assert_eq!(participant.answers.len(), 1);
        assert_eq!(participant.answers[0].chosen_option, 0);
        assert_eq!(participant.score, 140);
    }

    #[tokio::test]
    async fn skipping_ahead_is_rejected() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let other = Uuid::new_v4();
        let code = active_room_with_two(&state, host, other, 0).await;

        let err = submit_answer(&state, &code, answer(host, 1, 0, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn replaying_the_final_question_is_rejected() {
        let state = testing::state_with_questions(1).await;
        let host = Uuid::new_v4();
        let other = Uuid::new_v4();
        let created = testing::create_room(&state, host, 0, 1).await.unwrap();
        testing::join(&state, &created.code, host).await.unwrap();
        testing::join(&state, &created.code, other).await.unwrap();
        room_service::set_ready(
            &state,
            &created.code,
            ReadyRequest {
                user_id: other,
                is_ready: true,
            },
        )
        .await
        .unwrap();
        room_service::start_room(&state, &created.code, host)
            .await
            .unwrap();

        let outcome = submit_answer(&state, &created.code, answer(host, 0, 0, 5))
            .await
            .unwrap();
        // The cursor holds on the last question once finished.
        assert!(outcome.is_finished);
        assert_eq!(outcome.next_question_index, 0);

        let err = submit_answer(&state, &created.code, answer(host, 0, 0, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn out_of_range_option_is_rejected() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let other = Uuid::new_v4();
        let code = active_room_with_two(&state, host, other, 0).await;

        let err = submit_answer(&state, &code, answer(host, 0, 99, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn answering_a_waiting_room_is_rejected() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let created = testing::create_room(&state, host, 0, 2).await.unwrap();
        testing::join(&state, &created.code, host).await.unwrap();

        let err = submit_answer(&state, &created.code, answer(host, 0, 0, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn the_last_finisher_completes_the_room_exactly_once() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let other = Uuid::new_v4();
        // Entry fee 5 per head: the prize pool must end up at 10.
        let code = active_room_with_two(&state, host, other, 5).await;

        submit_answer(&state, &code, answer(host, 0, 0, 10))
            .await
            .unwrap();
        submit_answer(&state, &code, answer(host, 1, 0, 10))
            .await
            .unwrap();
        submit_answer(&state, &code, answer(other, 0, 0, 20))
            .await
            .unwrap();
        let last = submit_answer(&state, &code, answer(other, 1, 1, 20))
            .await
            .unwrap();
        assert!(last.room_completed);

        let room: Room = state
            .repository()
            .await
            .unwrap()
            .fetch(&code)
            .await
            .unwrap();
        assert_eq!(room.status, RoomStatus::Completed);
        assert!(room.completed_at.is_some());

        let results = room.results.as_ref().unwrap();
        assert_eq!(results.total_prize, 10);
        assert_eq!(results.winner_id, host);
        assert_eq!(results.leaderboard.len(), 2);
        assert_eq!(results.leaderboard[0].user_id, host);
        assert_eq!(results.leaderboard[0].rank, 1);
        assert_eq!(results.leaderboard[1].user_id, other);

        // Any further submission hits the completed-room guard, so the
        // completion side effects cannot run twice.
        let err = submit_answer(&state, &code, answer(other, 1, 1, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn concurrent_submissions_from_both_participants_both_land() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let other = Uuid::new_v4();
        let code = active_room_with_two(&state, host, other, 0).await;

        let a = {
            let state = state.clone();
            let code = code.clone();
            tokio::spawn(async move { submit_answer(&state, &code, answer(host, 0, 0, 5)).await })
        };
        let b = {
            let state = state.clone();
            let code = code.clone();
            tokio::spawn(async move { submit_answer(&state, &code, answer(other, 0, 0, 7)).await })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let room: Room = state
            .repository()
            .await
            .unwrap()
            .fetch(&code)
            .await
            .unwrap();
        assert_eq!(room.participant(host).unwrap().answers.len(), 1);
        assert_eq!(room.participant(other).unwrap().answers.len(), 1);
    }

    #[tokio::test]
    async fn average_response_time_is_a_running_mean() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let other = Uuid::new_v4();
        let code = active_room_with_two(&state, host, other, 0).await;

        submit_answer(&state, &code, answer(host, 0, 0, 10))
            .await
            .unwrap();
        submit_answer(&state, &code, answer(host, 1, 0, 20))
            .await
            .unwrap();

        let room: Room = state
            .repository()
            .await
            .unwrap()
            .fetch(&code)
            .await
            .unwrap();
        let avg = room.participant(host).unwrap().average_response_time_secs;
        assert!((avg - 15.0).abs() < f64::EPSILON);
    }
}
