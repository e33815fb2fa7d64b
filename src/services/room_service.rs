//! Room lifecycle operations: creation, lobby management, start, departure,
//! and the polling endpoint that doubles as the activity heartbeat.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::room::RoomWriteBack,
    dto::room::{CreateRoomRequest, JoinRoomRequest, LeaveOutcome, ReadyRequest, RoomSnapshot},
    error::ServiceError,
    services::{answer_service, timeout_service},
    state::{SharedState, lifecycle::RoomStatus, room::Room},
};

/// Minimum number of participants required to start a room.
const MIN_PARTICIPANTS_TO_START: usize = 2;

/// Create a new waiting room around a freshly fetched question set.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomSnapshot, ServiceError> {
    let questions = state
        .question_source()
        .fetch(request.topic.clone(), request.difficulty, request.question_count)
        .await?;

    let repo = state.repository().await?;
    let config = state.config();
    let now = SystemTime::now();

    let room = repo
        .create(|code| {
            Room::new(
                code,
                request.name.clone(),
                request.topic.clone(),
                request.difficulty,
                request.is_public,
                questions.clone(),
                request.host_id,
                request.max_participants,
                request.entry_fee,
                now,
                config.base_window,
            )
        })
        .await?;

    info!(
        room_code = %room.code,
        host_id = %room.host_id,
        questions = room.questions.len(),
        "room created"
    );
    Ok(RoomSnapshot::for_caller(&room, None))
}

/// Join a waiting room, charging the entry fee into the prize pool.
pub async fn join_room(
    state: &SharedState,
    code: &str,
    request: JoinRoomRequest,
) -> Result<RoomSnapshot, ServiceError> {
    let repo = state.repository().await?;
    let config = state.config().clone();

    let snapshot = repo
        .mutate(code, |mut room| {
            if !room.status.is_waiting() {
                return Err(ServiceError::InvalidState(format!(
                    "room `{code}` is no longer accepting participants"
                )));
            }
            if room.participant(request.user_id).is_some() {
                return Err(ServiceError::Conflict(format!(
                    "user `{}` already joined room `{code}`",
                    request.user_id
                )));
            }
            if room.is_full() {
                return Err(ServiceError::Conflict(format!(
                    "room `{code}` is full ({} participants)",
                    room.max_participants
                )));
            }

            let now = SystemTime::now();
            room.add_participant(request.user_id, request.user_name.clone(), now);
            timeout_service::refresh_waiting_deadline(&mut room, now, &config);

            let snapshot = RoomSnapshot::for_caller(&room, Some(request.user_id));
            Ok((RoomWriteBack::Persist(room), snapshot))
        })
        .await?;

    info!(room_code = %code, user_id = %request.user_id, "participant joined");
    Ok(snapshot)
}

/// Toggle a participant's readiness flag while the room is waiting.
pub async fn set_ready(
    state: &SharedState,
    code: &str,
    request: ReadyRequest,
) -> Result<RoomSnapshot, ServiceError> {
    let repo = state.repository().await?;
    let config = state.config().clone();

    repo.mutate(code, |mut room| {
        if !room.status.is_waiting() {
            return Err(ServiceError::InvalidState(format!(
                "readiness can only change while room `{code}` is waiting"
            )));
        }

        let now = SystemTime::now();
        let Some(participant) = room.participant_mut(request.user_id) else {
            return Err(ServiceError::NotFound(format!(
                "user `{}` is not in room `{code}`",
                request.user_id
            )));
        };
        participant.is_ready = request.is_ready;
        participant.last_activity = now;

        room.last_activity = now;
        timeout_service::refresh_waiting_deadline(&mut room, now, &config);

        let snapshot = RoomSnapshot::for_caller(&room, Some(request.user_id));
        Ok((RoomWriteBack::Persist(room), snapshot))
    })
    .await
}

/// Start the quiz. Only the host may start, and only once every other
/// participant has declared readiness.
pub async fn start_room(
    state: &SharedState,
    code: &str,
    user_id: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    let repo = state.repository().await?;
    let config = state.config().clone();

    let snapshot = repo
        .mutate(code, |mut room| {
            if room.participant(user_id).is_none() {
                return Err(ServiceError::NotFound(format!(
                    "user `{user_id}` is not in room `{code}`"
                )));
            }
            if room.host_id != user_id {
                return Err(ServiceError::Unauthorized(format!(
                    "only the host can start room `{code}`"
                )));
            }

            room.status = room.status.validate_transition(RoomStatus::Active)?;

            if room.participants.len() < MIN_PARTICIPANTS_TO_START {
                return Err(ServiceError::InvalidState(format!(
                    "at least {MIN_PARTICIPANTS_TO_START} participants are required to start"
                )));
            }
            if let Some(unready) = room
                .participants
                .iter()
                .find(|p| p.user_id != room.host_id && !p.is_ready)
            {
                return Err(ServiceError::InvalidState(format!(
                    "participant `{}` is not ready",
                    unready.user_id
                )));
            }

            let now = SystemTime::now();
            room.started_at = Some(now);
            room.last_activity = now;
            room.extend_deadline(now + config.base_window);
            for participant in &mut room.participants {
                participant.last_activity = now;
            }

            let snapshot = RoomSnapshot::for_caller(&room, Some(user_id));
            Ok((RoomWriteBack::Persist(room), snapshot))
        })
        .await?;

    info!(room_code = %code, host_id = %user_id, "room started");
    Ok(snapshot)
}

/// Leave a room voluntarily.
///
/// An emptied or already completed room is deleted outright; otherwise the
/// host role moves to the first remaining participant when needed. Removing
/// the last unfinished participant from an active room completes it for
/// everyone who finished.
pub async fn leave_room(
    state: &SharedState,
    code: &str,
    user_id: Uuid,
) -> Result<LeaveOutcome, ServiceError> {
    let repo = state.repository().await?;
    let config = state.config().clone();

    let (outcome, completed) = repo
        .mutate(code, |mut room| {
            if room.participant(user_id).is_none() {
                return Err(ServiceError::NotFound(format!(
                    "user `{user_id}` is not in room `{code}`"
                )));
            }

            let new_host_id = room.remove_participant(user_id);

            if room.participants.is_empty() || room.status == RoomStatus::Completed {
                return Ok((
                    RoomWriteBack::Delete,
                    (
                        LeaveOutcome {
                            room_deleted: true,
                            new_host_id: None,
                        },
                        false,
                    ),
                ));
            }

            let now = SystemTime::now();
            let completed =
                answer_service::complete_if_finished(&mut room, now, config.completion_grace)?;
            room.last_activity = now;
            Ok((
                RoomWriteBack::Persist(room),
                (
                    LeaveOutcome {
                        room_deleted: false,
                        new_host_id,
                    },
                    completed,
                ),
            ))
        })
        .await?;

    info!(
        room_code = %code,
        %user_id,
        room_deleted = outcome.room_deleted,
        "participant left"
    );
    if completed {
        info!(room_code = %code, "departure left only finished participants, room completed");
        timeout_service::schedule_completion_cleanup(state.clone(), code.to_owned());
    }
    Ok(outcome)
}

/// Poll the room state.
///
/// The poll is also the activity heartbeat: the caller's own activity is
/// stamped before inactive participants are pruned, so a live poller can
/// never evict itself. Waiting rooms additionally get their deadline
/// refreshed, capped by the waiting-room ceiling.
pub async fn get_state(
    state: &SharedState,
    code: &str,
    caller: Option<Uuid>,
) -> Result<RoomSnapshot, ServiceError> {
    let repo = state.repository().await?;
    let config = state.config().clone();

    let (snapshot, completed) = repo
        .mutate(code, |mut room| {
            let now = SystemTime::now();
            let mut dirty = false;

            if let Some(user_id) = caller {
                if let Some(participant) = room.participant_mut(user_id) {
                    participant.last_activity = now;
                    room.last_activity = now;
                    dirty = true;
                }
            }

            let prune = room.prune_inactive(now, config.inactivity_threshold);
            if prune.changed() {
                debug!(
                    room_code = %code,
                    evicted = prune.removed.len(),
                    new_host = ?prune.new_host_id,
                    "pruned inactive participants"
                );
                dirty = true;
            }
            if prune.emptied {
                return Ok((RoomWriteBack::Delete, (None, false)));
            }

            // Pruning the last unfinished participant can leave a room where
            // everyone remaining is done.
            let completed =
                answer_service::complete_if_finished(&mut room, now, config.completion_grace)?;
            dirty |= completed;

            if room.status.is_waiting() {
                let before = room.auto_delete_at;
                timeout_service::refresh_waiting_deadline(&mut room, now, &config);
                dirty |= room.auto_delete_at != before;
            }

            let snapshot = Some(RoomSnapshot::for_caller(&room, caller));
            if dirty {
                Ok((RoomWriteBack::Persist(room), (snapshot, completed)))
            } else {
                Ok((RoomWriteBack::Keep, (snapshot, completed)))
            }
        })
        .await?;

    if completed {
        info!(room_code = %code, "pruning left only finished participants, room completed");
        timeout_service::schedule_completion_cleanup(state.clone(), code.to_owned());
    }

    snapshot.ok_or_else(|| ServiceError::NotFound(format!("room `{code}` expired")))
}
