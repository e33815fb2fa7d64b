use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz rooms backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::room::create_room,
        crate::routes::room::join_room,
        crate::routes::room::set_ready,
        crate::routes::room::start_room,
        crate::routes::room::submit_answer,
        crate::routes::room::extend_deadline,
        crate::routes::room::leave_room,
        crate::routes::room::get_state,
        crate::routes::room::sweep_rooms,
        crate::routes::public::list_public_rooms,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::ReadyRequest,
            crate::dto::room::StartRequest,
            crate::dto::room::AnswerRequest,
            crate::dto::room::ExtendRequest,
            crate::dto::room::LeaveRequest,
            crate::dto::room::RoomSnapshot,
            crate::dto::room::ParticipantSummary,
            crate::dto::room::QuestionView,
            crate::dto::room::AnswerOutcome,
            crate::dto::room::ExtendOutcome,
            crate::dto::room::LeaveOutcome,
            crate::dto::room::ResultsSummary,
            crate::dto::room::LeaderboardRow,
            crate::dto::room::ExtensionSummary,
            crate::dto::public::PublicRoomSummary,
            crate::dto::admin::SweepReport,
            crate::state::lifecycle::RoomStatus,
            crate::state::room::Difficulty,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "room", description = "Room lifecycle, answering, and deadline operations"),
        (name = "public", description = "Public room discovery"),
    )
)]
pub struct ApiDoc;
