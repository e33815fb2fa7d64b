//! Room lifecycle routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        admin::SweepReport,
        room::{
            AnswerOutcome, AnswerRequest, CreateRoomRequest, ExtendOutcome, ExtendRequest,
            JoinRoomRequest, LeaveOutcome, LeaveRequest, ReadyRequest, RoomSnapshot, StartRequest,
            StateQuery,
        },
        validation::validate_room_code,
    },
    error::AppError,
    services::{answer_service, room_service, sweeper, timeout_service},
    state::SharedState,
};

/// Configure the room routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/rooms", post(create_room))
        .route("/rooms/cleanup", post(sweep_rooms))
        .route("/rooms/{code}/join", post(join_room))
        .route("/rooms/{code}/ready", post(set_ready))
        .route("/rooms/{code}/start", post(start_room))
        .route("/rooms/{code}/answer", post(submit_answer))
        .route("/rooms/{code}/extend", post(extend_deadline))
        .route("/rooms/{code}/leave", post(leave_room))
        .route("/rooms/{code}/state", get(get_state))
}

/// Reject malformed room codes before they reach the storage layer.
fn check_code(code: &str) -> Result<(), AppError> {
    validate_room_code(code).map_err(|err| AppError::BadRequest(format!("invalid room code: {err}")))
}

/// Create a new quiz room around a freshly fetched question set.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "room",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomSnapshot),
        (status = 400, description = "Invalid payload"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    payload.validate()?;
    let snapshot = room_service::create_room(&state, payload).await?;
    Ok(Json(snapshot))
}

/// Join a waiting room.
#[utoipa::path(
    post,
    path = "/rooms/{code}/join",
    tag = "room",
    params(("code" = String, Path, description = "Room code")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined", body = RoomSnapshot),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Room full, already joined, or no longer waiting")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    check_code(&code)?;
    payload.validate()?;
    let snapshot = room_service::join_room(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Toggle a readiness flag while the room is waiting.
#[utoipa::path(
    post,
    path = "/rooms/{code}/ready",
    tag = "room",
    params(("code" = String, Path, description = "Room code")),
    request_body = ReadyRequest,
    responses(
        (status = 200, description = "Readiness updated", body = RoomSnapshot),
        (status = 404, description = "Room or participant not found")
    )
)]
pub async fn set_ready(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<ReadyRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    check_code(&code)?;
    let snapshot = room_service::set_ready(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Start the quiz; host only.
#[utoipa::path(
    post,
    path = "/rooms/{code}/start",
    tag = "room",
    params(("code" = String, Path, description = "Room code")),
    request_body = StartRequest,
    responses(
        (status = 200, description = "Room started", body = RoomSnapshot),
        (status = 401, description = "Caller is not the host"),
        (status = 409, description = "Not enough participants, not everyone ready, or already started")
    )
)]
pub async fn start_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<StartRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    check_code(&code)?;
    let snapshot = room_service::start_room(&state, &code, payload.user_id).await?;
    Ok(Json(snapshot))
}

/// Submit an answer to the caller's current question.
#[utoipa::path(
    post,
    path = "/rooms/{code}/answer",
    tag = "room",
    params(("code" = String, Path, description = "Room code")),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer scored", body = AnswerOutcome),
        (status = 409, description = "Duplicate, out-of-order, or room not active")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerOutcome>, AppError> {
    check_code(&code)?;
    payload.validate()?;
    let outcome = answer_service::submit_answer(&state, &code, payload).await?;
    Ok(Json(outcome))
}

/// Request a deadline extension.
#[utoipa::path(
    post,
    path = "/rooms/{code}/extend",
    tag = "room",
    params(("code" = String, Path, description = "Room code")),
    request_body = ExtendRequest,
    responses(
        (status = 200, description = "Extension granted", body = ExtendOutcome),
        (status = 409, description = "Extension quota exhausted")
    )
)]
pub async fn extend_deadline(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<ExtendRequest>,
) -> Result<Json<ExtendOutcome>, AppError> {
    check_code(&code)?;
    let outcome = timeout_service::extend_deadline(&state, &code, payload.user_id).await?;
    Ok(Json(outcome))
}

/// Leave a room voluntarily.
#[utoipa::path(
    post,
    path = "/rooms/{code}/leave",
    tag = "room",
    params(("code" = String, Path, description = "Room code")),
    request_body = LeaveRequest,
    responses(
        (status = 200, description = "Departure processed", body = LeaveOutcome),
        (status = 404, description = "Room or participant not found")
    )
)]
pub async fn leave_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<LeaveRequest>,
) -> Result<Json<LeaveOutcome>, AppError> {
    check_code(&code)?;
    let outcome = room_service::leave_room(&state, &code, payload.user_id).await?;
    Ok(Json(outcome))
}

/// Poll the room state; doubles as the caller's activity heartbeat.
#[utoipa::path(
    get,
    path = "/rooms/{code}/state",
    tag = "room",
    params(
        ("code" = String, Path, description = "Room code"),
        StateQuery
    ),
    responses(
        (status = 200, description = "Current room state", body = RoomSnapshot),
        (status = 404, description = "Room not found or expired")
    )
)]
pub async fn get_state(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Query(query): Query<StateQuery>,
) -> Result<Json<RoomSnapshot>, AppError> {
    check_code(&code)?;
    let snapshot = room_service::get_state(&state, &code, query.user_id).await?;
    Ok(Json(snapshot))
}

/// Trigger one cleanup sweep over the whole room collection.
#[utoipa::path(
    post,
    path = "/rooms/cleanup",
    tag = "room",
    responses(
        (status = 200, description = "Sweep finished", body = SweepReport),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn sweep_rooms(
    State(state): State<SharedState>,
) -> Result<Json<SweepReport>, AppError> {
    let report = sweeper::sweep_once(&state).await?;
    Ok(Json(report))
}
