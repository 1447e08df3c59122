//! Folding unplanned spend back into a budget after it grows.
//!
//! Unplanned rows are grouped by transaction group and considered strictly
//! oldest first. A group is merged only when its whole total fits the room
//! left by planned spend; the first group that does not fit stops the pass,
//! so a later, smaller group never jumps the queue.

use std::collections::HashMap;

use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use crate::{
    Budget, BudgetStatus, EngineError, MoneyCents, ResultEngine, TopUpCmd, budgets, expenses,
    labels::{strip_over_budget, strip_unplanned_label},
};

use super::{Engine, PeriodKey, ensure_positive, spend::SpendScope, with_tx};

/// What a reconciliation pass moved back into the planned bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub merged_amount: MoneyCents,
    pub merged_groups: usize,
}

/// Result of growing a budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopUp {
    pub budget: BudgetStatus,
    pub reconciliation: Reconciliation,
}

impl TopUp {
    #[must_use]
    pub fn message(&self) -> String {
        let Reconciliation {
            merged_amount,
            merged_groups,
        } = self.reconciliation;
        match merged_groups {
            0 => format!(
                "Budget topped up! New total: {}.",
                self.budget.budget.amount
            ),
            1 => format!(
                "Budget topped up! Merged {merged_amount} from 1 transaction back into your budget."
            ),
            n => format!(
                "Budget topped up! Merged {merged_amount} from {n} transactions back into your budget."
            ),
        }
    }
}

/// Unplanned rows of one submission.
#[derive(Clone, Debug)]
pub(super) struct UnplannedGroup {
    group_id: Uuid,
    rows: Vec<expenses::Model>,
    total: MoneyCents,
}

/// Group unplanned rows by transaction group, ordered by the earliest
/// `created_at` of each group with the smallest display id breaking ties.
///
/// Rows without a group id are never merged and are skipped.
pub(super) fn group_unplanned(rows: Vec<expenses::Model>) -> Vec<UnplannedGroup> {
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut groups: Vec<UnplannedGroup> = Vec::new();

    for row in rows {
        let Some(group_id) = row.transaction_group_id else {
            continue;
        };
        let slot = *index.entry(group_id).or_insert_with(|| {
            groups.push(UnplannedGroup {
                group_id,
                rows: Vec::new(),
                total: MoneyCents::ZERO,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.total += MoneyCents::new(row.amount_minor);
        group.rows.push(row);
    }

    groups.sort_by_key(|group| {
        let created_at = group.rows.iter().map(|r| r.created_at).min();
        let display_id = group.rows.iter().map(|r| r.display_id).min();
        (created_at, display_id)
    });
    groups
}

/// Number of leading groups that fit into `budget - planned_spent`.
///
/// ```text
/// budget 100, planned 80, groups [50, 30] -> 0 (50 blocks the queue)
/// budget 150, planned 100, groups [30]    -> 1
/// ```
pub(super) fn fifo_fit(
    budget: MoneyCents,
    planned_spent: MoneyCents,
    totals: &[MoneyCents],
) -> usize {
    let mut available = budget - planned_spent;
    let mut count = 0;
    for total in totals {
        if *total > available {
            break;
        }
        available -= *total;
        count += 1;
    }
    count
}

impl Engine {
    /// Grow a budget by `amount` and reconcile unplanned spend against the
    /// new ceiling.
    pub async fn top_up(&self, cmd: TopUpCmd) -> ResultEngine<TopUp> {
        ensure_positive(cmd.amount, "top-up")?;
        let budget = self
            .require_budget(&self.database, &cmd.user_id, cmd.budget_id)
            .await?;
        let period = budget.period()?;
        let _guard = self
            .locks
            .acquire(PeriodKey::new(&cmd.user_id, budget.category_id, period))
            .await;

        with_tx!(self, |db_tx| {
            let current = self
                .require_budget(&db_tx, &cmd.user_id, cmd.budget_id)
                .await?;
            if current.category_id != budget.category_id || current.period()? != period {
                return Err(EngineError::Conflict(
                    "budget was modified concurrently".to_string(),
                ));
            }
            self.top_up_in(&db_tx, current, cmd.amount).await
        })
    }

    /// Top-up body shared with `add_budget`; the caller holds the key's lock
    /// and the transaction.
    pub(super) async fn top_up_in<C: ConnectionTrait>(
        &self,
        db: &C,
        model: budgets::Model,
        amount: MoneyCents,
    ) -> ResultEngine<TopUp> {
        let new_amount = MoneyCents::new(model.amount_minor)
            .checked_add(amount)
            .filter(|total| *total <= MoneyCents::MAX_AMOUNT)
            .ok_or_else(|| {
                EngineError::InvalidAmount(format!(
                    "budget amount must be <= {}",
                    MoneyCents::MAX_AMOUNT
                ))
            })?;
        let updated = apply_top_up(db, &model, new_amount).await?;
        let category = self.require_category(db, updated.category_id).await?;
        let reconciliation = self.reconcile(db, &updated, &category.name).await?;

        let period = updated.period()?;
        let spent = self
            .spent_in(db, &updated.user_id, updated.category_id, period, SpendScope::All)
            .await?;
        tracing::info!(
            budget_id = %updated.id,
            user_id = %updated.user_id,
            %period,
            merged_groups = reconciliation.merged_groups,
            merged_amount = %reconciliation.merged_amount,
            "budget topped up"
        );
        Ok(TopUp {
            budget: BudgetStatus::new(Budget::try_from(updated)?, category.name, spent),
            reconciliation,
        })
    }

    /// Merge the oldest unplanned groups that fit into the budget.
    async fn reconcile<C: ConnectionTrait>(
        &self,
        db: &C,
        budget: &budgets::Model,
        category_name: &str,
    ) -> ResultEngine<Reconciliation> {
        let period = budget.period()?;
        let rows = expenses::Entity::find()
            .filter(expenses::Column::UserId.eq(budget.user_id.as_str()))
            .filter(expenses::Column::CategoryId.eq(budget.category_id))
            .filter(expenses::Column::ExpenseDate.gte(period.start()))
            .filter(expenses::Column::ExpenseDate.lt(period.end()))
            .filter(expenses::Column::IsOverBudget.eq(true))
            .order_by_asc(expenses::Column::CreatedAt)
            .order_by_asc(expenses::Column::DisplayId)
            .all(db)
            .await?;
        if rows.is_empty() {
            return Ok(Reconciliation::default());
        }

        let groups = group_unplanned(rows);
        let planned_spent = self
            .spent_in(
                db,
                &budget.user_id,
                budget.category_id,
                period,
                SpendScope::Planned,
            )
            .await?;
        let totals: Vec<MoneyCents> = groups.iter().map(|g| g.total).collect();
        let fit = fifo_fit(MoneyCents::new(budget.amount_minor), planned_spent, &totals);

        let mut reconciliation = Reconciliation::default();
        for group in groups.into_iter().take(fit) {
            reconciliation.merged_amount += group.total;
            reconciliation.merged_groups += 1;
            merge_group(db, budget, group, category_name).await?;
        }
        Ok(reconciliation)
    }
}

/// Conditional amount update: succeeds only if nobody bumped `version` since
/// `model` was read.
pub(super) async fn apply_top_up<C: ConnectionTrait>(
    db: &C,
    model: &budgets::Model,
    new_amount: MoneyCents,
) -> ResultEngine<budgets::Model> {
    let result = budgets::Entity::update_many()
        .col_expr(budgets::Column::AmountMinor, Expr::value(new_amount.cents()))
        .col_expr(
            budgets::Column::Version,
            Expr::col(budgets::Column::Version).add(1),
        )
        .filter(budgets::Column::Id.eq(model.id))
        .filter(budgets::Column::Version.eq(model.version))
        .exec(db)
        .await?;
    if result.rows_affected != 1 {
        return Err(EngineError::Conflict(
            "budget was modified concurrently".to_string(),
        ));
    }
    Ok(budgets::Model {
        amount_minor: new_amount.cents(),
        version: model.version + 1,
        ..model.clone()
    })
}

/// Move one unplanned group into the planned bucket.
///
/// With a planned sibling of the same group still under `budget` (same user,
/// category and month) the amounts are summed into it and the unplanned rows
/// removed; otherwise the rows are flipped in place.
async fn merge_group<C: ConnectionTrait>(
    db: &C,
    budget: &budgets::Model,
    group: UnplannedGroup,
    category_name: &str,
) -> ResultEngine<()> {
    let period = budget.period()?;
    let sibling = expenses::Entity::find()
        .filter(expenses::Column::TransactionGroupId.eq(group.group_id))
        .filter(expenses::Column::IsOverBudget.eq(false))
        .filter(expenses::Column::UserId.eq(budget.user_id.as_str()))
        .filter(expenses::Column::CategoryId.eq(budget.category_id))
        .filter(expenses::Column::ExpenseDate.gte(period.start()))
        .filter(expenses::Column::ExpenseDate.lt(period.end()))
        .order_by_asc(expenses::Column::DisplayId)
        .one(db)
        .await?;

    match sibling {
        Some(sibling) => {
            let amount = MoneyCents::new(sibling.amount_minor) + group.total;
            let description = strip_over_budget(&sibling.description);
            let mut active: expenses::ActiveModel = sibling.into();
            active.amount_minor = ActiveValue::Set(amount.cents());
            active.description = ActiveValue::Set(description);
            active.update(db).await?;

            let ids: Vec<Uuid> = group.rows.iter().map(|r| r.id).collect();
            expenses::Entity::delete_many()
                .filter(expenses::Column::Id.is_in(ids))
                .exec(db)
                .await?;
        }
        None => {
            for row in group.rows {
                let description = strip_over_budget(&row.description);
                let label = strip_unplanned_label(row.custom_category_name.as_deref(), category_name);
                let mut active: expenses::ActiveModel = row.into();
                active.is_over_budget = ActiveValue::Set(false);
                active.description = ActiveValue::Set(description);
                active.custom_category_name = ActiveValue::Set(label);
                active.update(db).await?;
            }
        }
    }
    Ok(())
}
