//! Background sweep deleting expired rooms.
//!
//! The sweep is the durable backstop behind every deletion path: deferred
//! completion cleanups, abandoned lobbies, and rooms whose every participant
//! went silent all end here eventually, even across process restarts.

use std::{
    fmt,
    time::{Duration, SystemTime},
};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    dao::models::RoomListItemEntity,
    dto::admin::SweepReport,
    error::ServiceError,
    state::{SharedState, lifecycle::RoomStatus},
};

/// Why the sweeper decided to delete a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepReason {
    /// Completed longer ago than the completed-room maximum age.
    CompletedAged,
    /// No participants at all.
    Empty,
    /// The auto-delete deadline has passed.
    DeadlinePassed,
    /// Every participant exceeded the inactivity threshold.
    AllInactive,
    /// Still waiting past the waiting-room ceiling.
    WaitingAged,
}

impl fmt::Display for SweepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SweepReason::CompletedAged => "completed past max age",
            SweepReason::Empty => "no participants",
            SweepReason::DeadlinePassed => "deadline passed",
            SweepReason::AllInactive => "all participants inactive",
            SweepReason::WaitingAged => "waiting past ceiling",
        };
        f.write_str(label)
    }
}

fn age(since: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(since).unwrap_or_default()
}

/// Decide whether a room is expired at `now`, and why.
///
/// The waiting-room ceiling check ignores the auto-delete deadline on
/// purpose: a lobby kept alive by polling alone must still die eventually.
pub fn expired_reason(
    room: &RoomListItemEntity,
    now: SystemTime,
    config: &AppConfig,
) -> Option<SweepReason> {
    if room.status == RoomStatus::Completed
        && let Some(completed_at) = room.completed_at
        && age(completed_at, now) > config.completed_max_age
    {
        return Some(SweepReason::CompletedAged);
    }

    if room.participants.is_empty() {
        return Some(SweepReason::Empty);
    }

    if now > room.auto_delete_at {
        return Some(SweepReason::DeadlinePassed);
    }

    if room
        .participants
        .iter()
        .all(|p| age(p.last_activity, now) > config.inactivity_threshold)
    {
        return Some(SweepReason::AllInactive);
    }

    if room.status == RoomStatus::Waiting
        && age(room.created_at, now) > config.waiting_room_ceiling
    {
        return Some(SweepReason::WaitingAged);
    }

    None
}

/// Run one sweep over the whole room collection.
///
/// Individual deletion failures are logged and skipped so one bad room
/// cannot stall the rest of the sweep.
pub async fn sweep_once(state: &SharedState) -> Result<SweepReport, ServiceError> {
    let repo = state.repository().await?;
    let config = state.config();
    let now = SystemTime::now();

    let rooms = repo.list().await?;
    let mut report = SweepReport {
        scanned: rooms.len(),
        deleted: 0,
    };

    for room in &rooms {
        let Some(reason) = expired_reason(room, now, config) else {
            continue;
        };

        match repo.delete(&room.code).await {
            Ok(true) => {
                info!(room_code = %room.code, %reason, "swept expired room");
                report.deleted += 1;
            }
            // Someone else deleted it between the scan and now.
            Ok(false) => {}
            Err(err) => {
                warn!(
                    room_code = %room.code,
                    %reason,
                    error = %err,
                    "failed to delete expired room, continuing sweep"
                );
            }
        }
    }

    Ok(report)
}

/// Periodic sweep loop; pauses while storage is degraded.
pub async fn run(state: SharedState) {
    let interval = state.config().sweep_interval;
    let mut degraded = state.degraded_watcher();

    loop {
        sleep(interval).await;

        if *degraded.borrow_and_update() {
            debug!("cleanup sweep paused until storage recovers");
            if degraded.wait_for(|flag| !*flag).await.is_err() {
                // The state was dropped; nothing left to sweep.
                return;
            }
        }

        match sweep_once(&state).await {
            Ok(report) if report.deleted > 0 => {
                info!(
                    scanned = report.scanned,
                    deleted = report.deleted,
                    "cleanup sweep finished"
                );
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "cleanup sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::dao::models::ParticipantBriefEntity;
    use crate::state::room::Difficulty;

    fn minutes(count: u64) -> Duration {
        Duration::from_secs(count * 60)
    }

    fn list_item(now: SystemTime) -> RoomListItemEntity {
        RoomListItemEntity {
            code: "ABC234".into(),
            name: "sweep fixture".into(),
            topic: "general".into(),
            difficulty: Difficulty::Easy,
            status: RoomStatus::Waiting,
            is_public: true,
            max_participants: 4,
            entry_fee: 0,
            question_count: 2,
            participants: vec![ParticipantBriefEntity {
                user_id: Uuid::new_v4(),
                last_activity: now,
            }],
            created_at: now,
            completed_at: None,
            auto_delete_at: now + minutes(5),
        }
    }

    #[test]
    fn a_healthy_room_is_not_swept() {
        let now = SystemTime::UNIX_EPOCH + minutes(100);
        let room = list_item(now);
        assert_eq!(expired_reason(&room, now, &AppConfig::default()), None);
    }

    #[test]
    fn empty_rooms_are_swept() {
        let now = SystemTime::UNIX_EPOCH + minutes(100);
        let mut room = list_item(now);
        room.participants.clear();
        assert_eq!(
            expired_reason(&room, now, &AppConfig::default()),
            Some(SweepReason::Empty)
        );
    }

    #[test]
    fn a_passed_deadline_sweeps_the_room() {
        let now = SystemTime::UNIX_EPOCH + minutes(100);
        let mut room = list_item(now);
        room.auto_delete_at = now - minutes(1);
        assert_eq!(
            expired_reason(&room, now, &AppConfig::default()),
            Some(SweepReason::DeadlinePassed)
        );
    }

    #[test]
    fn a_room_where_everyone_went_silent_is_swept() {
        let now = SystemTime::UNIX_EPOCH + minutes(100);
        let mut room = list_item(now);
        for participant in &mut room.participants {
            participant.last_activity = now - minutes(6);
        }
        assert_eq!(
            expired_reason(&room, now, &AppConfig::default()),
            Some(SweepReason::AllInactive)
        );
    }

    #[test]
    fn a_waiting_room_past_the_ceiling_is_swept_despite_its_deadline() {
        let created = SystemTime::UNIX_EPOCH + minutes(100);
        let now = created + minutes(31);
        let mut room = list_item(created);
        // Fresh activity and a future deadline must not save it.
        room.participants[0].last_activity = now;
        room.auto_delete_at = now + minutes(5);
        assert_eq!(
            expired_reason(&room, now, &AppConfig::default()),
            Some(SweepReason::WaitingAged)
        );
    }

    #[test]
    fn an_aged_completed_room_is_swept() {
        let now = SystemTime::UNIX_EPOCH + minutes(300);
        let mut room = list_item(now);
        room.status = RoomStatus::Completed;
        room.completed_at = Some(now - minutes(61));
        room.participants[0].last_activity = now;
        room.auto_delete_at = now + minutes(5);
        assert_eq!(
            expired_reason(&room, now, &AppConfig::default()),
            Some(SweepReason::CompletedAged)
        );
    }

    #[cfg(feature = "memory-store")]
    mod sweep_once_tests {
        use super::*;
        use crate::{
            dao::room::RoomWriteBack,
            services::testing,
        };

        #[tokio::test]
        async fn sweep_deletes_aged_lobbies_and_keeps_fresh_ones() {
            let state = testing::state_with_questions(2).await;
            let host = Uuid::new_v4();

            let fresh = testing::create_room(&state, host, 0, 2).await.unwrap();
            testing::join(&state, &fresh.code, host).await.unwrap();

            let stale = testing::create_room(&state, Uuid::new_v4(), 0, 2)
                .await
                .unwrap();
            let stale_user = Uuid::new_v4();
            testing::join(&state, &stale.code, stale_user).await.unwrap();

            // Age the second lobby past the waiting-room ceiling while
            // keeping its participant active and its deadline in the future.
            let repo = state.repository().await.unwrap();
            repo.mutate(&stale.code, |mut room| {
                room.created_at = SystemTime::now() - minutes(31);
                Ok((RoomWriteBack::Persist(room), ()))
            })
            .await
            .unwrap();

            let report = sweep_once(&state).await.unwrap();
            assert_eq!(report.scanned, 2);
            assert_eq!(report.deleted, 1);

            assert!(repo.fetch(&fresh.code).await.is_ok());
            assert!(matches!(
                repo.fetch(&stale.code).await.unwrap_err(),
                crate::error::ServiceError::NotFound(_)
            ));
        }
    }
}
