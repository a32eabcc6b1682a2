use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/sites", get(handlers::list_sites))
        .route("/api/train_all", post(handlers::train_all))
        .route("/api/forecast", get(handlers::get_forecast))
        .route("/api/export_csv", get(handlers::export_csv))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
