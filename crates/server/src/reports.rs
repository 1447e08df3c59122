//! Read-only report endpoints. Bodies are the engine's report types, with
//! amounts in minor units.

use api_types::report::{CalendarQuery, ExportQuery, RangeQuery};
use axum::{
    Extension, Json,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::Datelike;

use crate::{
    ServerError,
    server::{ServerState, UserId},
    types::report::{Calendar, DashboardSummary, MonthlyTotal, PeriodSummary},
};

pub async fn dashboard(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
) -> Result<Json<DashboardSummary>, ServerError> {
    let summary = state.engine.dashboard(&user_id, state.now()).await?;
    Ok(Json(summary))
}

pub async fn calendar(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Calendar>, ServerError> {
    let today = state.now().date();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month() as i32);
    let calendar = state.engine.calendar(&user_id, year, month, today).await?;
    Ok(Json(calendar))
}

pub async fn summary(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<PeriodSummary>, ServerError> {
    let summary = state
        .engine
        .period_summary(&user_id, query.from, query.to)
        .await?;
    Ok(Json(summary))
}

pub async fn monthly(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<MonthlyTotal>>, ServerError> {
    Ok(Json(state.engine.monthly_totals(&user_id).await?))
}

pub async fn export_csv(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ServerError> {
    let mut body = Vec::new();
    state
        .engine
        .export_csv(&user_id, query.from, query.to, &mut body)
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"expenses.csv\"",
            ),
        ],
        body,
    ))
}
