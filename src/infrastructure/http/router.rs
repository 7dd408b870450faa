use crate::infrastructure::http::controllers;
use crate::infrastructure::http::middleware::{optional_principal, require_principal, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    // Reading posts is open to anonymous visitors
    let public_api = Router::new()
        .route("/api/posts", get(controllers::posts::list_posts))
        .route("/api/posts/:id", get(controllers::posts::get_post))
        .layer(axum::middleware::from_fn(optional_principal));

    // Build protected routes (require an authenticated principal)
    let protected = Router::new()
        .route("/api/posts", post(controllers::posts::create_post))
        .route(
            "/api/posts/:id",
            put(controllers::posts::commit_edit).delete(controllers::posts::commit_delete),
        )
        .route("/api/posts/:id/edit", get(controllers::posts::begin_edit))
        .route(
            "/api/posts/:id/delete",
            get(controllers::posts::begin_delete),
        )
        .layer(axum::middleware::from_fn(require_principal));

    // Build public routes
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .merge(public_api)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> &'static str {
    "Postlock Blog Service"
}

async fn health_handler() -> &'static str {
    "OK"
}
