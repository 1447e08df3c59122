use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, Expense, MoneyCents, Period, ResultEngine, UpdateExpenseCmd, expenses,
    labels::normalize_label,
};

use super::{Engine, PeriodKey, ensure_positive, with_tx};

/// Predicates for [`Engine::list_expenses`]. Every field is optional; date
/// bounds are inclusive and `to` covers the whole day.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category_id: Option<i32>,
    pub min_amount: Option<MoneyCents>,
    pub max_amount: Option<MoneyCents>,
}

impl ExpenseFilter {
    #[must_use]
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn category(mut self, category_id: i32) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

impl Engine {
    /// One expense owned by `user_id`.
    pub async fn expense(&self, user_id: &str, expense_id: Uuid) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id)
            .filter(expenses::Column::UserId.eq(user_id))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
        Ok(model.into())
    }

    /// Expenses of `user_id` matching `filter`, newest first.
    pub async fn list_expenses(
        &self,
        user_id: &str,
        filter: &ExpenseFilter,
    ) -> ResultEngine<Vec<Expense>> {
        let mut query = expenses::Entity::find().filter(expenses::Column::UserId.eq(user_id));
        if let Some(from) = filter.from {
            query = query.filter(expenses::Column::ExpenseDate.gte(start_of(from)));
        }
        if let Some(next_day) = filter.to.and_then(|to| to.succ_opt()) {
            query = query.filter(expenses::Column::ExpenseDate.lt(start_of(next_day)));
        }
        if let Some(category_id) = filter.category_id {
            query = query.filter(expenses::Column::CategoryId.eq(category_id));
        }
        if let Some(min) = filter.min_amount {
            query = query.filter(expenses::Column::AmountMinor.gte(min.cents()));
        }
        if let Some(max) = filter.max_amount {
            query = query.filter(expenses::Column::AmountMinor.lte(max.cents()));
        }

        let models = query
            .order_by_desc(expenses::Column::ExpenseDate)
            .order_by_desc(expenses::Column::DisplayId)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    /// Apply a user edit to an expense.
    ///
    /// Display id, creation time, over-budget flag and transaction group are
    /// kept as stored.
    pub async fn update_expense(&self, cmd: UpdateExpenseCmd) -> ResultEngine<Expense> {
        ensure_positive(cmd.amount, "expense")?;
        let current = self.expense(&cmd.user_id, cmd.expense_id).await?;
        let _guards = self
            .locks
            .acquire_all(vec![
                PeriodKey::new(
                    &cmd.user_id,
                    current.category_id,
                    Period::of(current.expense_date.date()),
                ),
                PeriodKey::new(
                    &cmd.user_id,
                    cmd.category_id,
                    Period::of(cmd.expense_date.date()),
                ),
            ])
            .await;

        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, cmd.category_id).await?;
            let model = expenses::Entity::find_by_id(cmd.expense_id)
                .filter(expenses::Column::UserId.eq(cmd.user_id.as_str()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;

            let mut active: expenses::ActiveModel = model.into();
            active.category_id = ActiveValue::Set(cmd.category_id);
            active.custom_category_name =
                ActiveValue::Set(normalize_label(cmd.custom_category_name.as_deref()));
            active.amount_minor = ActiveValue::Set(cmd.amount.cents());
            active.description = ActiveValue::Set(cmd.description.trim().to_string());
            active.expense_date = ActiveValue::Set(cmd.expense_date);
            let model = active.update(&db_tx).await?;
            Ok(Expense::from(model))
        })
    }

    /// Delete one expense. Returns `false` when there was nothing to delete.
    pub async fn delete_expense(&self, user_id: &str, expense_id: Uuid) -> ResultEngine<bool> {
        let result = expenses::Entity::delete_many()
            .filter(expenses::Column::Id.eq(expense_id))
            .filter(expenses::Column::UserId.eq(user_id))
            .exec(&self.database)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Delete every expense, of every user, dated before `cutoff`.
    pub async fn purge_expenses_before(&self, cutoff: NaiveDateTime) -> ResultEngine<u64> {
        let result = expenses::Entity::delete_many()
            .filter(expenses::Column::ExpenseDate.lt(cutoff))
            .exec(&self.database)
            .await?;
        if result.rows_affected > 0 {
            tracing::info!(%cutoff, deleted = result.rows_affected, "expired expenses purged");
        }
        Ok(result.rows_affected)
    }
}

fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}
