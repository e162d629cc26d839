use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/profile", get(handlers::get_profile))
        .route("/api/history", get(handlers::get_history))
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/log", get(handlers::get_log))
        .route("/api/tasks", post(handlers::register_task))
        .route("/api/tasks/weight", post(handlers::set_weight))
        .route("/api/tasks/stat", post(handlers::set_stat))
        .route("/api/tasks/delete", post(handlers::delete_task))
        .route("/api/tasks/complete", post(handlers::complete_task))
        .route("/api/tasks/fail", post(handlers::fail_task))
        .route("/api/mode", post(handlers::set_mode))
        .route("/api/cycle", post(handlers::advance_cycle))
        .route("/api/reset", post(handlers::hard_reset))
        .with_state(state)
}
