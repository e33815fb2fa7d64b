use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// High-level statuses a room can be in.
///
/// Deletion is physical removal from the store, not a status: a completed
/// room stays readable until the deferred deletion or the sweeper reaps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Lobby phase: participants join, toggle readiness, and the host starts.
    Waiting,
    /// Competition is running; answers are being accepted.
    Active,
    /// Every participant finished; final results are available.
    Completed,
}

/// Error returned when attempting an illegal status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    /// Status the room was in when the transition was requested.
    pub from: RoomStatus,
    /// Status the transition would have moved to.
    pub to: RoomStatus,
}

impl RoomStatus {
    /// Validate a requested transition against the room state machine.
    ///
    /// The only legal edges are `Waiting -> Active` and `Active -> Completed`;
    /// no transition skips a state or moves backwards.
    pub fn validate_transition(self, to: RoomStatus) -> Result<RoomStatus, InvalidTransition> {
        match (self, to) {
            (RoomStatus::Waiting, RoomStatus::Active)
            | (RoomStatus::Active, RoomStatus::Completed) => Ok(to),
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }

    /// Whether the room still accepts join/ready/leave lobby operations.
    pub fn is_waiting(self) -> bool {
        matches!(self, RoomStatus::Waiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_edges_are_accepted() {
        assert_eq!(
            RoomStatus::Waiting.validate_transition(RoomStatus::Active),
            Ok(RoomStatus::Active)
        );
        assert_eq!(
            RoomStatus::Active.validate_transition(RoomStatus::Completed),
            Ok(RoomStatus::Completed)
        );
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let err = RoomStatus::Waiting
            .validate_transition(RoomStatus::Completed)
            .unwrap_err();
        assert_eq!(err.from, RoomStatus::Waiting);
        assert_eq!(err.to, RoomStatus::Completed);
    }

    #[test]
    fn moving_backwards_is_rejected() {
        assert!(
            RoomStatus::Active
                .validate_transition(RoomStatus::Waiting)
                .is_err()
        );
        assert!(
            RoomStatus::Completed
                .validate_transition(RoomStatus::Active)
                .is_err()
        );
        assert!(
            RoomStatus::Completed
                .validate_transition(RoomStatus::Waiting)
                .is_err()
        );
    }

    #[test]
    fn self_transitions_are_rejected() {
        for status in [RoomStatus::Waiting, RoomStatus::Active, RoomStatus::Completed] {
            assert!(status.validate_transition(status).is_err());
        }
    }
}
