//! Deadline management: participant-requested extensions, poll-driven
//! waiting-room refreshes, and the deferred deletion of completed rooms.

use std::time::SystemTime;

use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::room::{RoomRepository, RoomWriteBack},
    dto::room::ExtendOutcome,
    error::ServiceError,
    state::{
        SharedState,
        lifecycle::RoomStatus,
        room::{Room, TimeExtension},
    },
};

/// Grant a deadline extension to a participant, within their quota.
///
/// The extension is measured from the later of the current deadline and now,
/// so a nearly expired room still gains the full extension duration.
pub async fn extend_deadline(
    state: &SharedState,
    code: &str,
    user_id: Uuid,
) -> Result<ExtendOutcome, ServiceError> {
    let repo = state.repository().await?;
    let config = state.config().clone();

    let outcome = repo
        .mutate(code, |mut room| {
            if room.status == RoomStatus::Completed {
                return Err(ServiceError::InvalidState(format!(
                    "room `{code}` is already completed"
                )));
            }

            let now = SystemTime::now();
            let Some(participant) = room.participant_mut(user_id) else {
                return Err(ServiceError::NotFound(format!(
                    "user `{user_id}` is not in room `{code}`"
                )));
            };

            if participant.time_extensions >= config.max_extensions {
                return Err(ServiceError::Conflict(format!(
                    "extension limit of {} reached",
                    config.max_extensions
                )));
            }

            participant.time_extensions += 1;
            participant.last_activity = now;
            let used = participant.time_extensions;

            let new_deadline = room.auto_delete_at.max(now) + config.extension_duration;
            room.auto_delete_at = new_deadline;
            room.extension_history.push(TimeExtension {
                user_id,
                granted_at: now,
                new_deadline,
            });
            room.last_activity = now;

            Ok((
                RoomWriteBack::Persist(room),
                ExtendOutcome::new(new_deadline, used, config.max_extensions - used),
            ))
        })
        .await?;

    info!(room_code = %code, %user_id, "deadline extension granted");
    Ok(outcome)
}

/// Refresh the deadline of a waiting room after observed lobby activity.
///
/// The refresh never pushes the deadline past the waiting-room ceiling
/// measured from creation, so an abandoned lobby cannot be kept alive
/// forever by polling alone.
pub fn refresh_waiting_deadline(room: &mut Room, now: SystemTime, config: &AppConfig) {
    let ceiling = room.created_at + config.waiting_room_ceiling;
    let candidate = (now + config.base_window).min(ceiling);
    room.extend_deadline(candidate);
}

/// Schedule the deferred deletion of a completed room.
///
/// The deadline stamped at completion keeps the deletion durable across
/// restarts via the sweeper; this timer only makes the common case prompt.
pub fn schedule_completion_cleanup(state: SharedState, code: String) {
    let grace = state.config().completion_grace;

    tokio::spawn(async move {
        sleep(grace).await;

        let Some(store) = state.room_store().await else {
            debug!(room_code = %code, "skipping deferred deletion, storage degraded");
            return;
        };
        let repo = RoomRepository::new(store);

        match repo.fetch(&code).await {
            Ok(room) if room.status == RoomStatus::Completed => {
                match repo.delete(&code).await {
                    Ok(true) => {
                        info!(room_code = %code, "deleted completed room after grace period");
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(room_code = %code, error = %err, "deferred room deletion failed");
                    }
                }
            }
            // The room was already reaped or somehow went back into play.
            Ok(_) | Err(ServiceError::NotFound(_)) => {}
            Err(err) => {
                warn!(room_code = %code, error = %err, "deferred room deletion failed");
            }
        }
    });
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::services::testing;

    #[tokio::test]
    async fn extension_pushes_the_deadline_and_records_an_audit_entry() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let created = testing::create_room(&state, host, 0, 2).await.unwrap();
        testing::join(&state, &created.code, host).await.unwrap();

        let before = state
            .repository()
            .await
            .unwrap()
            .fetch(&created.code)
            .await
            .unwrap();

        let outcome = extend_deadline(&state, &created.code, host).await.unwrap();
        assert_eq!(outcome.extensions_used, 1);
        assert_eq!(outcome.extensions_remaining, 2);

        let after = state
            .repository()
            .await
            .unwrap()
            .fetch(&created.code)
            .await
            .unwrap();
        assert!(after.auto_delete_at > before.auto_delete_at);
        assert_eq!(after.extension_history.len(), 1);
        assert_eq!(after.extension_history[0].user_id, host);
    }

    #[tokio::test]
    async fn exhausted_quota_rejects_without_touching_the_deadline() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let created = testing::create_room(&state, host, 0, 2).await.unwrap();
        testing::join(&state, &created.code, host).await.unwrap();

        for _ in 0..3 {
            extend_deadline(&state, &created.code, host).await.unwrap();
        }
        let before = state
            .repository()
            .await
            .unwrap()
            .fetch(&created.code)
            .await
            .unwrap();

        let err = extend_deadline(&state, &created.code, host)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let after = state
            .repository()
            .await
            .unwrap()
            .fetch(&created.code)
            .await
            .unwrap();
        assert_eq!(after.auto_delete_at, before.auto_delete_at);
        assert_eq!(after.extension_history.len(), 3);
        assert_eq!(
            after.participant(host).unwrap().time_extensions,
            3
        );
    }

    #[tokio::test]
    async fn extension_by_a_stranger_is_rejected() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let created = testing::create_room(&state, host, 0, 2).await.unwrap();
        testing::join(&state, &created.code, host).await.unwrap();

        let err = extend_deadline(&state, &created.code, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn waiting_refresh_is_capped_by_the_ceiling() {
        let config = AppConfig::default();
        let created = SystemTime::UNIX_EPOCH;
        let mut room = Room::new(
            "ABC234".into(),
            "r".into(),
            "general".into(),
            crate::state::room::Difficulty::Easy,
            true,
            Vec::new(),
            Uuid::new_v4(),
            4,
            0,
            created,
            config.base_window,
        );

        // Early in the lobby the refresh grants the full base window.
        let early = created + Duration::from_secs(60);
        refresh_waiting_deadline(&mut room, early, &config);
        assert_eq!(room.auto_delete_at, early + config.base_window);

        // Near the ceiling the refresh is clamped to it.
        let late = created + config.waiting_room_ceiling - Duration::from_secs(10);
        refresh_waiting_deadline(&mut room, late, &config);
        assert_eq!(room.auto_delete_at, created + config.waiting_room_ceiling);

        // Past the ceiling the deadline no longer moves.
        let past = created + config.waiting_room_ceiling + Duration::from_secs(600);
        refresh_waiting_deadline(&mut room, past, &config);
        assert_eq!(room.auto_delete_at, created + config.waiting_room_ceiling);
    }
}
