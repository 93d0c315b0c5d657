use axum::http::Method;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use super::handlers::{health, index, job_status, metrics, predict, train};
use super::state::AppState;

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/predict", get(index).post(predict))
        .route("/train", post(train))
        .route("/train/jobs/:id", get(job_status))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .layer(cors)
        .with_state(state)
}
