use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::public::PublicRoomSummary, error::AppError, services::discovery_service,
    state::SharedState,
};

/// List public waiting rooms with a free seat, newest first.
#[utoipa::path(
    get,
    path = "/rooms/public",
    tag = "public",
    responses(
        (status = 200, description = "Joinable public rooms", body = [PublicRoomSummary]),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn list_public_rooms(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PublicRoomSummary>>, AppError> {
    let rooms = discovery_service::list_public_rooms(&state).await?;
    Ok(Json(rooms))
}

/// Configure the discovery routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/public", get(list_public_rooms))
}
