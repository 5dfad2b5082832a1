use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the live match backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::recipient_stream,
        crate::routes::live::current_session,
        crate::routes::live::run_command,
        crate::routes::live::send_message,
        crate::routes::live::submit_mvp,
        crate::routes::live::post_event,
        crate::routes::live::rename_map,
        crate::routes::live::start_match,
        crate::routes::history::list_finished,
        crate::routes::history::get_summary,
        crate::routes::history::get_events,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::StoreHealth,
            crate::dto::live::LiveCommand,
            crate::dto::live::InboundMessage,
            crate::dto::live::MvpRequest,
            crate::dto::live::RenameMapRequest,
            crate::dto::live::PanelView,
            crate::dto::live::PanelStage,
            crate::dto::live::MapView,
            crate::dto::live::ScoreboardView,
            crate::dto::live::CommandReply,
            crate::dto::history::FinishedMatchView,
            crate::dto::history::MatchSummaryView,
            crate::dto::history::MapSummary,
            crate::dto::history::MatchEventsView,
            crate::dto::history::MapEvents,
            crate::dto::sse::Handshake,
            crate::dto::sse::LiveEventNotice,
            crate::dto::sse::MapRenamedNotice,
            crate::dto::sse::MvpNotice,
            crate::dto::sse::SessionEndedNotice,
            crate::dto::sse::InfoNotice,
            crate::dao::models::EventContent,
            crate::dao::models::SeriesResult,
            crate::dao::models::Score,
            crate::dao::models::Mvp,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent notice streams"),
        (name = "live", description = "Live session panel and spectator operations"),
        (name = "history", description = "Finished match views"),
    )
)]
pub struct ApiDoc;
