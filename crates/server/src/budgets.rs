//! Budgets API endpoints

use api_types::budget::{
    BudgetListResponse, BudgetNew, BudgetQuery, BudgetSaved, BudgetUpdate, BudgetView,
    TopUpNew, TopUpResult,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{
    BudgetAdded, BudgetCmd, BudgetStatus, MoneyCents, Period, TopUp, TopUpCmd, UpdateBudgetCmd,
};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{ServerState, UserId},
};

fn map_budget(status: BudgetStatus) -> BudgetView {
    BudgetView {
        id: status.budget.id,
        display_id: status.budget.display_id,
        category_id: status.budget.category_id,
        category_name: status.category_name,
        amount_minor: status.budget.amount.cents(),
        month: status.budget.period.month(),
        year: status.budget.period.year(),
        spent_minor: status.spent.cents(),
        remaining_minor: status.remaining.cents(),
        percentage_used: status.percentage_used,
        version: status.budget.version,
    }
}

fn map_top_up(top_up: TopUp) -> TopUpResult {
    let message = top_up.message();
    TopUpResult {
        merged_minor: top_up.reconciliation.merged_amount.cents(),
        merged_groups: top_up.reconciliation.merged_groups,
        budget: map_budget(top_up.budget),
        message,
    }
}

pub async fn list(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Query(query): Query<BudgetQuery>,
) -> Result<Json<BudgetListResponse>, ServerError> {
    let period = match (query.year, query.month) {
        (Some(year), Some(month)) => Some(Period::new(year, month)?),
        (None, None) => None,
        _ => {
            return Err(ServerError::Generic(
                "provide both month and year, or neither".to_string(),
            ));
        }
    };
    let budgets = state
        .engine
        .list_budgets(&user_id, period)
        .await?
        .into_iter()
        .map(map_budget)
        .collect();
    Ok(Json(BudgetListResponse { budgets }))
}

pub async fn create(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Json(payload): Json<BudgetNew>,
) -> Result<(StatusCode, Json<BudgetSaved>), ServerError> {
    let period = Period::new(payload.year, payload.month)?;
    let added = state
        .engine
        .add_budget(BudgetCmd::new(
            user_id,
            payload.category_id,
            MoneyCents::new(payload.amount_minor),
            period,
        ))
        .await?;

    Ok(match added {
        BudgetAdded::Created(status) => (
            StatusCode::CREATED,
            Json(BudgetSaved::Created {
                budget: map_budget(status),
            }),
        ),
        BudgetAdded::ToppedUp(top_up) => {
            (StatusCode::OK, Json(BudgetSaved::ToppedUp(map_top_up(top_up))))
        }
    })
}

pub async fn get(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
) -> Result<Json<BudgetView>, ServerError> {
    let status = state.engine.budget_status(&user_id, budget_id).await?;
    Ok(Json(map_budget(status)))
}

pub async fn update(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
    Json(payload): Json<BudgetUpdate>,
) -> Result<Json<BudgetView>, ServerError> {
    let status = state
        .engine
        .update_budget(UpdateBudgetCmd::new(
            user_id,
            budget_id,
            payload.category_id,
            MoneyCents::new(payload.amount_minor),
        ))
        .await?;
    Ok(Json(map_budget(status)))
}

pub async fn delete(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    if !state.engine.delete_budget(&user_id, budget_id).await? {
        tracing::debug!(%budget_id, "delete of missing budget ignored");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn top_up(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
    Json(payload): Json<TopUpNew>,
) -> Result<Json<TopUpResult>, ServerError> {
    let top_up = state
        .engine
        .top_up(TopUpCmd::new(
            user_id,
            budget_id,
            MoneyCents::new(payload.amount_minor),
        ))
        .await?;
    Ok(Json(map_top_up(top_up)))
}
