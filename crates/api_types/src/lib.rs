use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod category {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryView {
        pub id: i32,
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryListResponse {
        pub categories: Vec<CategoryView>,
    }
}

pub mod expense {
    use super::*;

    /// How a new expense was booked against its budget.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AllocationOutcome {
        Normal,
        Split,
        FullOverage,
        NoBudget,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub category_id: i32,
        pub amount_minor: i64,
        pub description: Option<String>,
        pub custom_category_name: Option<String>,
        /// Local time of the expense. Defaults to now in the server timezone.
        pub expense_date: Option<NaiveDateTime>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseUpdate {
        pub category_id: i32,
        pub amount_minor: i64,
        pub description: Option<String>,
        pub custom_category_name: Option<String>,
        pub expense_date: NaiveDateTime,
    }

    /// Query string of `GET /expenses`.
    ///
    /// Dates are inclusive; `to` covers the whole day.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseQuery {
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
        pub category_id: Option<i32>,
        pub min_amount_minor: Option<i64>,
        pub max_amount_minor: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: Uuid,
        pub display_id: i64,
        pub category_id: i32,
        /// Custom label when set, otherwise the category name.
        pub label: String,
        pub custom_category_name: Option<String>,
        pub amount_minor: i64,
        pub description: String,
        pub expense_date: NaiveDateTime,
        pub created_at: DateTime<Utc>,
        pub is_over_budget: bool,
        pub transaction_group_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseCreated {
        pub outcome: AllocationOutcome,
        pub transaction_group_id: Uuid,
        pub message: String,
        /// Planned row first, when present.
        pub expenses: Vec<ExpenseView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseListResponse {
        pub expenses: Vec<ExpenseView>,
    }
}

pub mod budget {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetNew {
        pub category_id: i32,
        pub amount_minor: i64,
        pub month: u32,
        pub year: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetUpdate {
        pub category_id: i32,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TopUpNew {
        pub amount_minor: i64,
    }

    /// Query string of `GET /budgets`; both or neither.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct BudgetQuery {
        pub month: Option<u32>,
        pub year: Option<i32>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetView {
        pub id: Uuid,
        pub display_id: i64,
        pub category_id: i32,
        pub category_name: String,
        pub amount_minor: i64,
        pub month: u32,
        pub year: i32,
        pub spent_minor: i64,
        /// Negative when the budget is exceeded.
        pub remaining_minor: i64,
        pub percentage_used: f64,
        pub version: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetListResponse {
        pub budgets: Vec<BudgetView>,
    }

    /// Response of a top-up, explicit or through `POST /budgets` on an
    /// existing key.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TopUpResult {
        pub budget: BudgetView,
        pub merged_minor: i64,
        pub merged_groups: usize,
        pub message: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum BudgetSaved {
        Created { budget: BudgetView },
        ToppedUp(TopUpResult),
    }
}

pub mod report {
    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct CalendarQuery {
        pub year: Option<i32>,
        /// May overflow: 13 is January of the next year, 0 December of the
        /// previous one.
        pub month: Option<i32>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RangeQuery {
        pub from: NaiveDate,
        pub to: NaiveDate,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExportQuery {
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
    }
}
