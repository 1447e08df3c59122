//! Expenses API endpoints

use std::collections::HashMap;

use api_types::expense::{
    AllocationOutcome as ApiOutcome, ExpenseCreated, ExpenseListResponse, ExpenseNew,
    ExpenseQuery, ExpenseUpdate, ExpenseView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{AllocationOutcome, ExpenseCmd, ExpenseFilter, MoneyCents, UpdateExpenseCmd};
use uuid::Uuid;

use crate::{
    ServerError, categories,
    server::{ServerState, UserId},
};

fn map_outcome(outcome: AllocationOutcome) -> ApiOutcome {
    match outcome {
        AllocationOutcome::Normal => ApiOutcome::Normal,
        AllocationOutcome::Split => ApiOutcome::Split,
        AllocationOutcome::FullOverage => ApiOutcome::FullOverage,
        AllocationOutcome::NoBudget => ApiOutcome::NoBudget,
    }
}

fn map_expense(expense: engine::Expense, names: &HashMap<i32, String>) -> ExpenseView {
    let label = expense.display_label(names.get(&expense.category_id).map(String::as_str));
    ExpenseView {
        id: expense.id,
        display_id: expense.display_id,
        category_id: expense.category_id,
        label,
        custom_category_name: expense.custom_category_name,
        amount_minor: expense.amount.cents(),
        description: expense.description,
        expense_date: expense.expense_date,
        created_at: expense.created_at,
        is_over_budget: expense.is_over_budget,
        transaction_group_id: expense.transaction_group_id,
    }
}

pub async fn list(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Query(query): Query<ExpenseQuery>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    let filter = ExpenseFilter {
        from: query.from,
        to: query.to,
        category_id: query.category_id,
        min_amount: query.min_amount_minor.map(MoneyCents::new),
        max_amount: query.max_amount_minor.map(MoneyCents::new),
    };
    let names = categories::names(&state).await?;
    let expenses = state
        .engine
        .list_expenses(&user_id, &filter)
        .await?
        .into_iter()
        .map(|expense| map_expense(expense, &names))
        .collect();
    Ok(Json(ExpenseListResponse { expenses }))
}

pub async fn create(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseCreated>), ServerError> {
    let expense_date = payload.expense_date.unwrap_or_else(|| state.now());
    let mut cmd = ExpenseCmd::new(
        user_id,
        payload.category_id,
        MoneyCents::new(payload.amount_minor),
        expense_date,
    )
    .description(payload.description.unwrap_or_default());
    if let Some(name) = payload.custom_category_name {
        cmd = cmd.custom_category_name(name);
    }

    let allocation = state.engine.record_expense(cmd).await?;
    let names = categories::names(&state).await?;
    let message = allocation.message();
    let expenses = allocation
        .planned
        .into_iter()
        .chain(allocation.unplanned)
        .map(|expense| map_expense(expense, &names))
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(ExpenseCreated {
            outcome: map_outcome(allocation.outcome),
            transaction_group_id: allocation.transaction_group_id,
            message,
            expenses,
        }),
    ))
}

pub async fn get(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state.engine.expense(&user_id, expense_id).await?;
    let names = categories::names(&state).await?;
    Ok(Json(map_expense(expense, &names)))
}

pub async fn update(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let mut cmd = UpdateExpenseCmd::new(
        user_id,
        expense_id,
        payload.category_id,
        MoneyCents::new(payload.amount_minor),
        payload.expense_date,
    )
    .description(payload.description.unwrap_or_default());
    if let Some(name) = payload.custom_category_name {
        cmd = cmd.custom_category_name(name);
    }

    let expense = state.engine.update_expense(cmd).await?;
    let names = categories::names(&state).await?;
    Ok(Json(map_expense(expense, &names)))
}

pub async fn delete(
    Extension(UserId(user_id)): Extension<UserId>,
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    if !state.engine.delete_expense(&user_id, expense_id).await? {
        tracing::debug!(%expense_id, "delete of missing expense ignored");
    }
    Ok(StatusCode::NO_CONTENT)
}
