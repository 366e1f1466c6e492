use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/admin", get(handlers::admin_page))
        .route("/api/capacity", get(handlers::get_capacity))
        .route("/api/admin/login", post(handlers::login))
        .route("/api/admin/logout", post(handlers::logout))
        .route("/api/admin/session", get(handlers::get_session))
        .route("/api/admin/summary", get(handlers::get_summary))
        .route("/api/admin/entries", post(handlers::register_entry))
        .route("/api/admin/capacity", post(handlers::record_capacity))
        .route("/api/admin/reports", get(handlers::get_reports))
        .route("/api/admin/reports/:date/csv", get(handlers::report_csv))
        .route("/api/admin/export/today", post(handlers::export_today))
        .route("/api/admin/export/today/:format", get(handlers::export_today_file))
        .with_state(state)
}
