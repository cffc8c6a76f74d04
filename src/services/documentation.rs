use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz battle backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::battle::create_battle,
        crate::routes::battle::list_battles,
        crate::routes::battle::battle_snapshot,
        crate::routes::battle::start_battle,
        crate::routes::battle::close_round,
        crate::routes::battle::advance_battle,
        crate::routes::group::join_battle,
        crate::routes::group::resolve_join_code,
        crate::routes::answer::submit_answer,
        crate::routes::sse::battle_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::battle::CreateBattleRequest,
            crate::dto::battle::QuestionInput,
            crate::dto::battle::BattleSummary,
            crate::dto::battle::BattleListResponse,
            crate::dto::battle::BattleSnapshot,
            crate::dto::battle::ActionResponse,
            crate::dto::group::JoinGroupRequest,
            crate::dto::group::StudentInput,
            crate::dto::group::JoinGroupResponse,
            crate::dto::group::ResolveJoinCodeResponse,
            crate::dto::answer::SubmitAnswerRequest,
            crate::dto::answer::SubmitAnswerResponse,
            crate::dto::common::GroupSummary,
            crate::dto::common::StudentSummary,
            crate::dto::common::OpenQuestion,
            crate::dto::common::RevealedQuestion,
            crate::dto::common::ChoiceSnapshot,
            crate::dto::phase::VisibleBattlePhase,
            crate::dto::sse::BattleStatusEvent,
            crate::dto::sse::GroupUpdateEvent,
            crate::dto::sse::RoundOpenedEvent,
            crate::dto::sse::RoundClosedEvent,
            crate::dto::sse::RoundResultSummary,
            crate::dto::sse::BattleFinishedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "battle", description = "Battle lifecycle commands and projections"),
        (name = "group", description = "Group registration and join codes"),
        (name = "answer", description = "Answer submission"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
