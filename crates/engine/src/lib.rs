//! Spendwise engine.
//!
//! The engine owns the ledger (expenses and monthly budgets) and the rules
//! that keep it consistent:
//!
//! - **allocation**: a recorded expense is inserted whole or split into a
//!   planned and an unplanned row sharing a transaction group;
//! - **reconciliation**: topping up a budget folds unplanned groups back into
//!   the planned bucket, oldest first;
//! - **aggregation**: spent/remaining amounts are always recomputed from the
//!   expense rows, never stored.
//!
//! All writes go through [`Engine`], one database transaction per operation.

pub use budgets::{Budget, BudgetStatus};
pub use categories::Category;
pub use commands::{BudgetCmd, ExpenseCmd, TopUpCmd, UpdateBudgetCmd, UpdateExpenseCmd};
pub use error::EngineError;
pub use expenses::Expense;
pub use money::MoneyCents;
pub use ops::{
    Allocation, AllocationOutcome, AllocationPlan, BudgetAdded, Engine, EngineBuilder,
    ExpenseFilter, Reconciliation, TopUp, plan_allocation,
};
pub use period::Period;
pub use reports::{
    Calendar, CalendarCategory, CalendarDay, CategoryTotal, DashboardSummary, MonthlyTotal,
    PeriodSummary,
};

mod budgets;
mod categories;
mod commands;
mod error;
mod expenses;
mod labels;
mod money;
mod ops;
mod period;
mod reports;
mod sequences;

type ResultEngine<T> = Result<T, EngineError>;
