//! Command structs for engine operations.
//!
//! These types group parameters for write operations (record expense, add or
//! top up a budget, edits), keeping call sites readable and avoiding long
//! argument lists.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{MoneyCents, Period};

/// Record a new expense.
#[derive(Clone, Debug)]
pub struct ExpenseCmd {
    pub user_id: String,
    pub category_id: i32,
    pub amount: MoneyCents,
    pub description: String,
    pub custom_category_name: Option<String>,
    /// Local time of record; also selects the budget period.
    pub expense_date: NaiveDateTime,
}

impl ExpenseCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        category_id: i32,
        amount: MoneyCents,
        expense_date: NaiveDateTime,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category_id,
            amount,
            description: String::new(),
            custom_category_name: None,
            expense_date,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn custom_category_name(mut self, name: impl Into<String>) -> Self {
        self.custom_category_name = Some(name.into());
        self
    }
}

/// Add a budget for a category and month.
///
/// If the user already has a budget for that key, the amount is added to it
/// (a top-up) instead of creating a second row.
#[derive(Clone, Debug)]
pub struct BudgetCmd {
    pub user_id: String,
    pub category_id: i32,
    pub amount: MoneyCents,
    pub period: Period,
}

impl BudgetCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        category_id: i32,
        amount: MoneyCents,
        period: Period,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category_id,
            amount,
            period,
        }
    }
}

/// Add funds to an existing budget.
#[derive(Clone, Debug)]
pub struct TopUpCmd {
    pub user_id: String,
    pub budget_id: Uuid,
    pub amount: MoneyCents,
}

impl TopUpCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, budget_id: Uuid, amount: MoneyCents) -> Self {
        Self {
            user_id: user_id.into(),
            budget_id,
            amount,
        }
    }
}

/// Replace a budget's category and amount.
#[derive(Clone, Debug)]
pub struct UpdateBudgetCmd {
    pub user_id: String,
    pub budget_id: Uuid,
    pub category_id: i32,
    pub amount: MoneyCents,
}

impl UpdateBudgetCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        budget_id: Uuid,
        category_id: i32,
        amount: MoneyCents,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            budget_id,
            category_id,
            amount,
        }
    }
}

/// Edit an existing expense.
///
/// Display id, creation time, over-budget flag and transaction group are
/// kept from the stored row.
#[derive(Clone, Debug)]
pub struct UpdateExpenseCmd {
    pub user_id: String,
    pub expense_id: Uuid,
    pub category_id: i32,
    pub amount: MoneyCents,
    pub description: String,
    pub custom_category_name: Option<String>,
    pub expense_date: NaiveDateTime,
}

impl UpdateExpenseCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        expense_id: Uuid,
        category_id: i32,
        amount: MoneyCents,
        expense_date: NaiveDateTime,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            expense_id,
            category_id,
            amount,
            description: String::new(),
            custom_category_name: None,
            expense_date,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn custom_category_name(mut self, name: impl Into<String>) -> Self {
        self.custom_category_name = Some(name.into());
        self
    }
}
