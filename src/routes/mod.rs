use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

pub mod health;
pub mod history;
pub mod live;
pub mod sse;

/// Compose every route tree and the Swagger UI, then bind the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let swagger: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    health::router()
        .merge(sse::router())
        .merge(live::router())
        .merge(history::router())
        .merge(swagger)
        .with_state(state)
}
