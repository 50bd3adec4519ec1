//! Route definitions

use std::sync::Arc;
use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::warn;

use crate::auth::session_layer;

use super::{handlers, state::AppState, views};

async fn handle_405() -> impl IntoResponse {
    let ctx = views::PageContext { user: None, flashes: &[] };
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Html(views::error(&ctx, "Method not allowed")),
    )
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let sessions = Arc::clone(&state.sessions);
    let static_dir = state.config.static_dir.clone();

    let mut app = Router::new()
        .route("/", get(handlers::home))
        .route("/signup", get(handlers::signup_page).post(handlers::signup))
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/logout", get(handlers::logout))
        .route("/form", get(handlers::form))
        .route("/predict", post(handlers::predict))
        .route("/about", get(handlers::about))
        .route("/database", get(handlers::database))
        .route("/model_performance", get(handlers::model_performance))
        .route("/data-analysis", get(handlers::data_analysis))
        .route("/health", get(handlers::health_check))
        .route("/api/models", get(handlers::list_models))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handle_405)
        .with_state(state);

    let static_path = std::path::Path::new(&static_dir);
    if static_path.is_dir() {
        app = app.nest_service("/static", ServeDir::new(static_path));
    } else {
        warn!(static_dir = %static_dir, "Static directory not found, assets will not be served");
    }

    app.layer(axum_middleware::from_fn_with_state(sessions, session_layer))
        .layer(TraceLayer::new_for_http())
}
