//! Public room discovery listing.

use std::time::SystemTime;

use crate::{
    dto::public::PublicRoomSummary,
    error::ServiceError,
    state::{SharedState, lifecycle::RoomStatus},
};

/// List public waiting rooms that still have a free seat.
///
/// Capacity is measured against active participants only, so a lobby held
/// open by ghosts still shows up as joinable. Newest rooms come first and
/// the listing is capped by the configured discovery limit.
pub async fn list_public_rooms(
    state: &SharedState,
) -> Result<Vec<PublicRoomSummary>, ServiceError> {
    let repo = state.repository().await?;
    let config = state.config();
    let now = SystemTime::now();

    let mut open: Vec<(SystemTime, PublicRoomSummary)> = repo
        .list()
        .await?
        .iter()
        .filter(|room| room.status == RoomStatus::Waiting && room.is_public)
        .filter_map(|room| {
            let active = room
                .participants
                .iter()
                .filter(|p| {
                    now.duration_since(p.last_activity).unwrap_or_default()
                        <= config.inactivity_threshold
                })
                .count();
            (active < room.max_participants)
                .then(|| (room.created_at, PublicRoomSummary::project(room, active)))
        })
        .collect();

    open.sort_by(|a, b| b.0.cmp(&a.0));
    open.truncate(config.discovery_limit);

    Ok(open.into_iter().map(|(_, summary)| summary).collect())
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        dto::room::ReadyRequest,
        services::{room_service, testing},
    };

    #[tokio::test]
    async fn listing_skips_private_active_and_full_rooms() {
        let state = testing::state_with_questions(2).await;

        // Public waiting room with a free seat: listed.
        let open_host = Uuid::new_v4();
        let open = testing::create_room(&state, open_host, 0, 2).await.unwrap();
        testing::join(&state, &open.code, open_host).await.unwrap();

        // Private room: hidden.
        let hidden = room_service::create_room(
            &state,
            crate::dto::room::CreateRoomRequest {
                name: "private".into(),
                topic: "general".into(),
                difficulty: crate::state::room::Difficulty::Easy,
                question_count: 2,
                max_participants: 4,
                entry_fee: 0,
                is_public: false,
                host_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap();

        // Started room: hidden.
        let started_host = Uuid::new_v4();
        let started_other = Uuid::new_v4();
        let started = testing::create_room(&state, started_host, 0, 2)
            .await
            .unwrap();
        testing::join(&state, &started.code, started_host)
            .await
            .unwrap();
        testing::join(&state, &started.code, started_other)
            .await
            .unwrap();
        room_service::set_ready(
            &state,
            &started.code,
            ReadyRequest {
                user_id: started_other,
                is_ready: true,
            },
        )
        .await
        .unwrap();
        room_service::start_room(&state, &started.code, started_host)
            .await
            .unwrap();

        let listing = list_public_rooms(&state).await.unwrap();
        let codes: Vec<&str> = listing.iter().map(|r| r.code.as_str()).collect();
        assert!(codes.contains(&open.code.as_str()));
        assert!(!codes.contains(&hidden.code.as_str()));
        assert!(!codes.contains(&started.code.as_str()));
    }

    #[tokio::test]
    async fn listing_reports_active_participant_counts() {
        let state = testing::state_with_questions(2).await;
        let host = Uuid::new_v4();
        let created = testing::create_room(&state, host, 0, 2).await.unwrap();
        testing::join(&state, &created.code, host).await.unwrap();
        testing::join(&state, &created.code, Uuid::new_v4())
            .await
            .unwrap();

        let listing = list_public_rooms(&state).await.unwrap();
        let entry = listing
            .iter()
            .find(|r| r.code == created.code)
            .expect("room should be listed");
        assert_eq!(entry.active_participants, 2);
        assert_eq!(entry.max_participants, 4);
    }
}
