use crate::display::{CapacityView, CompactView};
use crate::errors::AppError;
use crate::export::{ExportFile, ExportFormat, ExportSummary, daily_csv};
use crate::models::{
    CapacityRecord, CapacityRequest, DailyReport, EntryRecord, LoginRequest, SessionResponse,
    SummaryResponse,
};
use crate::revenue::recent_entries;
use crate::session::SessionState;
use crate::state::{AppState, RECENT_ENTRIES};
use crate::ui::{render_admin, render_login, render_public};
use axum::{
    Json,
    extract::{Path, State},
    response::Html,
};
use chrono::{NaiveDate, Utc};

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let occupancy = state.dashboard.lock().await.occupancy;
    Html(render_public(&CapacityView::from(occupancy)))
}

pub async fn admin_page(State(state): State<AppState>) -> Html<String> {
    if state.gate.lock().await.is_authenticated() {
        Html(render_admin(state.config.price_per_entry))
    } else {
        Html(render_login())
    }
}

pub async fn get_capacity(State(state): State<AppState>) -> Json<CapacityView> {
    let occupancy = state.dashboard.lock().await.occupancy;
    Json(CapacityView::from(occupancy))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.gate.lock().await.login(&payload.password, Utc::now()).await?;
    Ok(Json(to_session(session)))
}

pub async fn logout(State(state): State<AppState>) -> Result<Json<SessionResponse>, AppError> {
    state.gate.lock().await.logout().await?;
    state.reset_dashboard().await;
    Ok(Json(to_session(SessionState::Unauthenticated)))
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let session = state.gate.lock().await.state();
    Json(to_session(session))
}

pub async fn get_summary(State(state): State<AppState>) -> Result<Json<SummaryResponse>, AppError> {
    require_admin(&state).await?;
    let dashboard = state.dashboard.lock().await;
    let aggregates = &dashboard.aggregates;
    Ok(Json(SummaryResponse {
        total_revenue: aggregates.total_revenue,
        total_entries: aggregates.total_entries,
        price_per_entry: state.config.price_per_entry,
        today: aggregates.today.clone(),
        yesterday: aggregates.yesterday.clone(),
        recent_entries: recent_entries(&dashboard.entries, RECENT_ENTRIES),
        capacity: CapacityView::from(dashboard.occupancy),
        compact: CompactView::pair(dashboard.occupancy),
        last_update: dashboard.last_update,
    }))
}

pub async fn register_entry(State(state): State<AppState>) -> Result<Json<EntryRecord>, AppError> {
    require_admin(&state).await?;
    let entry = state.register_entry().await?;
    Ok(Json(entry))
}

pub async fn record_capacity(
    State(state): State<AppState>,
    Json(payload): Json<CapacityRequest>,
) -> Result<Json<CapacityRecord>, AppError> {
    require_admin(&state).await?;
    let record = state.record_capacity(payload.available).await?;
    Ok(Json(record))
}

pub async fn get_reports(State(state): State<AppState>) -> Result<Json<Vec<DailyReport>>, AppError> {
    require_admin(&state).await?;
    let dashboard = state.dashboard.lock().await;
    Ok(Json(dashboard.aggregates.reports.clone()))
}

pub async fn report_csv(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<ExportFile, AppError> {
    require_admin(&state).await?;
    let dashboard = state.dashboard.lock().await;
    Ok(daily_csv(&dashboard.aggregates.reports, date)?)
}

pub async fn export_today(State(state): State<AppState>) -> Result<Json<ExportSummary>, AppError> {
    require_admin(&state).await?;
    let payload = state.export_today().await?;
    Ok(Json(payload.summary()))
}

pub async fn export_today_file(
    State(state): State<AppState>,
    Path(format): Path<ExportFormat>,
) -> Result<ExportFile, AppError> {
    require_admin(&state).await?;
    let payload = state.export_today().await?;
    Ok(payload.file(format))
}

async fn require_admin(state: &AppState) -> Result<(), AppError> {
    if state.gate.lock().await.is_authenticated() {
        Ok(())
    } else {
        Err(AppError::unauthorized("admin login required"))
    }
}

fn to_session(state: SessionState) -> SessionResponse {
    match state {
        SessionState::Unauthenticated => SessionResponse {
            authenticated: false,
            login_time: None,
        },
        SessionState::Authenticated { login_time } => SessionResponse {
            authenticated: true,
            login_time: Some(login_time),
        },
    }
}
