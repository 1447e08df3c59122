//! Allocation of a new expense against its category budget.

use chrono::Utc;
use sea_orm::{ConnectionTrait, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    Expense, ExpenseCmd, MoneyCents, Period, ResultEngine, expenses,
    labels::{normalize_label, over_budget_description, unplanned_label},
    sequences,
};

use super::{Engine, PeriodKey, ensure_positive, spend::SpendScope, with_tx};

/// What happened to a recorded expense, as reported to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationOutcome {
    /// Fully covered by the budget.
    Normal,
    /// Partly covered: one planned and one unplanned row.
    Split,
    /// Budget already used up: the whole expense is unplanned.
    FullOverage,
    /// No budget for the category this month: the whole expense is unplanned.
    NoBudget,
}

/// How an amount is distributed between the planned and unplanned buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocationPlan {
    NoBudget,
    Normal,
    FullOverage,
    Split {
        planned: MoneyCents,
        unplanned: MoneyCents,
    },
}

impl AllocationPlan {
    #[must_use]
    pub fn outcome(self) -> AllocationOutcome {
        match self {
            Self::NoBudget => AllocationOutcome::NoBudget,
            Self::Normal => AllocationOutcome::Normal,
            Self::FullOverage => AllocationOutcome::FullOverage,
            Self::Split { .. } => AllocationOutcome::Split,
        }
    }
}

/// Decide how an expense of `amount` is allocated.
///
/// `remaining` is the budget ceiling minus what was already spent, or `None`
/// when no budget exists. An amount that exactly fits is `Normal`; a split
/// needs a strictly positive remainder.
///
/// ```rust
/// use engine::{AllocationPlan, MoneyCents, plan_allocation};
///
/// let plan = plan_allocation(MoneyCents::new(5_000), Some(MoneyCents::new(2_000)));
/// assert_eq!(
///     plan,
///     AllocationPlan::Split {
///         planned: MoneyCents::new(2_000),
///         unplanned: MoneyCents::new(3_000),
///     }
/// );
/// ```
#[must_use]
pub fn plan_allocation(amount: MoneyCents, remaining: Option<MoneyCents>) -> AllocationPlan {
    match remaining {
        None => AllocationPlan::NoBudget,
        Some(remaining) if amount <= remaining => AllocationPlan::Normal,
        Some(remaining) if !remaining.is_positive() => AllocationPlan::FullOverage,
        Some(remaining) => AllocationPlan::Split {
            planned: remaining,
            unplanned: amount - remaining,
        },
    }
}

/// Rows persisted for one recorded expense.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
    pub outcome: AllocationOutcome,
    pub transaction_group_id: Uuid,
    /// Row within budget, if any.
    pub planned: Option<Expense>,
    /// Row over budget (or without a budget), if any.
    pub unplanned: Option<Expense>,
}

impl Allocation {
    /// Persisted rows, planned first.
    pub fn rows(&self) -> impl Iterator<Item = &Expense> {
        self.planned.iter().chain(self.unplanned.iter())
    }

    /// Total amount across the rows; always the submitted amount.
    #[must_use]
    pub fn total(&self) -> MoneyCents {
        self.rows().map(|row| row.amount).sum()
    }

    /// User-facing summary of the outcome.
    #[must_use]
    pub fn message(&self) -> String {
        match self.outcome {
            AllocationOutcome::Split => {
                let planned = self.planned.as_ref().map(|e| e.amount).unwrap_or_default();
                let unplanned = self.unplanned.as_ref().map(|e| e.amount).unwrap_or_default();
                format!(
                    "Expense split: {planned} within budget, {unplanned} marked as over-budget."
                )
            }
            AllocationOutcome::FullOverage => {
                "Budget exceeded! This entire expense is marked as over-budget.".to_string()
            }
            AllocationOutcome::Normal | AllocationOutcome::NoBudget => {
                "Expense added successfully!".to_string()
            }
        }
    }
}

impl Engine {
    /// Record an expense, splitting it against the budget of its category
    /// for the month of `expense_date`.
    ///
    /// - no budget: one row, `is_over_budget = true`;
    /// - fits the remaining budget: one planned row;
    /// - budget exhausted: one unplanned row, annotated;
    /// - partly fits: a planned row for the remainder and an annotated
    ///   unplanned row for the rest.
    ///
    /// Every submission gets a fresh transaction group id shared by its rows.
    /// Both rows are written in one transaction; budgets are not modified.
    pub async fn record_expense(&self, cmd: ExpenseCmd) -> ResultEngine<Allocation> {
        ensure_positive(cmd.amount, "expense")?;
        let period = Period::of(cmd.expense_date.date());
        let _guard = self
            .locks
            .acquire(PeriodKey::new(&cmd.user_id, cmd.category_id, period))
            .await;

        with_tx!(self, |db_tx| {
            let category = self.require_category(&db_tx, cmd.category_id).await?;
            let budget = self
                .find_budget(&db_tx, &cmd.user_id, cmd.category_id, period)
                .await?;
            let remaining = match &budget {
                Some(budget) => {
                    let spent = self
                        .spent_in(&db_tx, &cmd.user_id, cmd.category_id, period, SpendScope::All)
                        .await?;
                    Some(MoneyCents::new(budget.amount_minor) - spent)
                }
                None => None,
            };

            let plan = plan_allocation(cmd.amount, remaining);
            let group_id = Uuid::new_v4();
            let draft = ExpenseDraft::new(&cmd, group_id);
            let description = cmd.description.trim();
            let custom_label = normalize_label(cmd.custom_category_name.as_deref());

            let (planned, unplanned) = match plan {
                AllocationPlan::NoBudget => (
                    None,
                    Some(draft.row(cmd.amount, true, custom_label, description.to_string())),
                ),
                AllocationPlan::Normal => (
                    Some(draft.row(cmd.amount, false, custom_label, description.to_string())),
                    None,
                ),
                AllocationPlan::FullOverage => (
                    None,
                    Some(draft.row(
                        cmd.amount,
                        true,
                        Some(unplanned_label(&category.name)),
                        over_budget_description(description),
                    )),
                ),
                AllocationPlan::Split { planned, unplanned } => (
                    Some(draft.row(planned, false, custom_label, description.to_string())),
                    Some(draft.row(
                        unplanned,
                        true,
                        Some(unplanned_label(&category.name)),
                        over_budget_description(description),
                    )),
                ),
            };

            let planned = match planned {
                Some(row) => Some(self.insert_expense(&db_tx, row).await?),
                None => None,
            };
            let unplanned = match unplanned {
                Some(row) => Some(self.insert_expense(&db_tx, row).await?),
                None => None,
            };

            tracing::debug!(
                user_id = %cmd.user_id,
                category_id = cmd.category_id,
                %period,
                outcome = ?plan.outcome(),
                "expense recorded"
            );
            Ok(Allocation {
                outcome: plan.outcome(),
                transaction_group_id: group_id,
                planned,
                unplanned,
            })
        })
    }

    /// Assign the next display id and insert the row.
    async fn insert_expense<C: ConnectionTrait>(
        &self,
        db: &C,
        mut expense: Expense,
    ) -> ResultEngine<Expense> {
        expense.display_id = sequences::next_value(db, sequences::EXPENSES).await?;
        expenses::ActiveModel::from(&expense).insert(db).await?;
        Ok(expense)
    }
}

/// Fields shared by the rows produced from one submission.
struct ExpenseDraft<'a> {
    cmd: &'a ExpenseCmd,
    group_id: Uuid,
    created_at: DateTimeUtc,
}

impl<'a> ExpenseDraft<'a> {
    fn new(cmd: &'a ExpenseCmd, group_id: Uuid) -> Self {
        Self {
            cmd,
            group_id,
            created_at: Utc::now(),
        }
    }

    fn row(
        &self,
        amount: MoneyCents,
        is_over_budget: bool,
        custom_category_name: Option<String>,
        description: String,
    ) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            display_id: 0,
            user_id: self.cmd.user_id.clone(),
            category_id: self.cmd.category_id,
            custom_category_name,
            amount,
            description,
            expense_date: self.cmd.expense_date,
            created_at: self.created_at,
            is_over_budget,
            transaction_group_id: Some(self.group_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cents(value: i64) -> MoneyCents {
        MoneyCents::new(value)
    }

    #[test]
    fn no_budget_is_unplanned() {
        assert_eq!(plan_allocation(cents(2_000), None), AllocationPlan::NoBudget);
    }

    #[test]
    fn amount_within_remaining_is_normal() {
        assert_eq!(plan_allocation(cents(1_000), Some(cents(2_000))), AllocationPlan::Normal);
    }

    #[test]
    fn exact_fit_is_normal_not_split() {
        assert_eq!(plan_allocation(cents(2_000), Some(cents(2_000))), AllocationPlan::Normal);
    }

    #[test]
    fn zero_or_negative_remaining_is_full_overage() {
        assert_eq!(plan_allocation(cents(500), Some(cents(0))), AllocationPlan::FullOverage);
        assert_eq!(plan_allocation(cents(500), Some(cents(-300))), AllocationPlan::FullOverage);
    }

    #[test]
    fn partial_fit_splits_remaining_and_rest() {
        let plan = plan_allocation(cents(5_000), Some(cents(2_000)));
        assert_eq!(
            plan,
            AllocationPlan::Split {
                planned: cents(2_000),
                unplanned: cents(3_000),
            }
        );
        assert_eq!(plan.outcome(), AllocationOutcome::Split);
    }

    #[test]
    fn split_never_loses_a_cent() {
        for (amount, remaining) in [(1, 0), (101, 100), (9_999, 1), (10_000, 9_999)] {
            match plan_allocation(cents(amount), Some(cents(remaining))) {
                AllocationPlan::Split { planned, unplanned } => {
                    assert_eq!(planned + unplanned, cents(amount));
                    assert!(planned.is_positive() && unplanned.is_positive());
                }
                AllocationPlan::FullOverage => assert_eq!(remaining, 0),
                other => panic!("unexpected plan {other:?}"),
            }
        }
    }
}
