//! Payloads for operational endpoints.

use serde::Serialize;
use utoipa::ToSchema;

/// Result of one cleanup sweep over the room collection.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SweepReport {
    /// Rooms examined by the sweep.
    pub scanned: usize,
    /// Rooms deleted as expired.
    pub deleted: usize,
}
