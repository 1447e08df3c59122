use chrono::Utc;
use sea_orm::{
    ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use crate::{
    Budget, BudgetCmd, BudgetStatus, EngineError, Period, ResultEngine, UpdateBudgetCmd,
    budgets, sequences,
};

use super::{Engine, PeriodKey, TopUp, ensure_positive, spend::SpendScope, with_tx};

/// Outcome of [`Engine::add_budget`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetAdded {
    /// No budget existed for the key; a new one was created.
    Created(BudgetStatus),
    /// A budget already existed and was topped up.
    ToppedUp(TopUp),
}

impl BudgetAdded {
    #[must_use]
    pub fn status(&self) -> &BudgetStatus {
        match self {
            Self::Created(status) => status,
            Self::ToppedUp(top_up) => &top_up.budget,
        }
    }
}

impl Engine {
    /// Create the budget for (user, category, period), or top up the one
    /// that already exists.
    pub async fn add_budget(&self, cmd: BudgetCmd) -> ResultEngine<BudgetAdded> {
        ensure_positive(cmd.amount, "budget")?;
        let _guard = self
            .locks
            .acquire(PeriodKey::new(&cmd.user_id, cmd.category_id, cmd.period))
            .await;

        with_tx!(self, |db_tx| {
            let category = self.require_category(&db_tx, cmd.category_id).await?;
            match self
                .find_budget(&db_tx, &cmd.user_id, cmd.category_id, cmd.period)
                .await?
            {
                Some(existing) => self
                    .top_up_in(&db_tx, existing, cmd.amount)
                    .await
                    .map(BudgetAdded::ToppedUp),
                None => self
                    .create_budget(&db_tx, &cmd, category.name)
                    .await
                    .map(BudgetAdded::Created),
            }
        })
    }

    async fn create_budget<C: ConnectionTrait>(
        &self,
        db: &C,
        cmd: &BudgetCmd,
        category_name: String,
    ) -> ResultEngine<BudgetStatus> {
        let model = budgets::Model {
            id: Uuid::new_v4(),
            display_id: sequences::next_value(db, sequences::BUDGETS).await?,
            user_id: cmd.user_id.clone(),
            category_id: cmd.category_id,
            amount_minor: cmd.amount.cents(),
            month: cmd.period.month() as i32,
            year: cmd.period.year(),
            created_at: Utc::now(),
            version: 0,
        };
        let model = budgets::ActiveModel::from(model).insert(db).await?;
        tracing::info!(
            budget_id = %model.id,
            user_id = %cmd.user_id,
            period = %cmd.period,
            "budget created"
        );
        self.status_in(db, model, category_name).await
    }

    /// Replace a budget's category and amount. Spent rows are not touched.
    pub async fn update_budget(&self, cmd: UpdateBudgetCmd) -> ResultEngine<BudgetStatus> {
        ensure_positive(cmd.amount, "budget")?;
        let budget = self
            .require_budget(&self.database, &cmd.user_id, cmd.budget_id)
            .await?;
        let period = budget.period()?;
        let _guards = self
            .locks
            .acquire_all(vec![
                PeriodKey::new(&cmd.user_id, budget.category_id, period),
                PeriodKey::new(&cmd.user_id, cmd.category_id, period),
            ])
            .await;

        with_tx!(self, |db_tx| {
            let category = self.require_category(&db_tx, cmd.category_id).await?;
            if let Some(other) = self
                .find_budget(&db_tx, &cmd.user_id, cmd.category_id, period)
                .await?
                && other.id != budget.id
            {
                return Err(EngineError::ExistingKey(format!(
                    "a {} budget already exists for {period}",
                    category.name
                )));
            }

            let result = budgets::Entity::update_many()
                .col_expr(budgets::Column::CategoryId, Expr::value(cmd.category_id))
                .col_expr(budgets::Column::AmountMinor, Expr::value(cmd.amount.cents()))
                .col_expr(
                    budgets::Column::Version,
                    Expr::col(budgets::Column::Version).add(1),
                )
                .filter(budgets::Column::Id.eq(budget.id))
                .filter(budgets::Column::Version.eq(budget.version))
                .exec(&db_tx)
                .await?;
            if result.rows_affected != 1 {
                return Err(EngineError::Conflict(
                    "budget was modified concurrently".to_string(),
                ));
            }

            let updated = budgets::Model {
                category_id: cmd.category_id,
                amount_minor: cmd.amount.cents(),
                version: budget.version + 1,
                ..budget.clone()
            };
            let spent = self
                .spent_in(&db_tx, &cmd.user_id, cmd.category_id, period, SpendScope::All)
                .await?;
            Ok(BudgetStatus::new(
                Budget::try_from(updated)?,
                category.name,
                spent,
            ))
        })
    }

    /// Delete a budget. Returns `false` when there was nothing to delete.
    pub async fn delete_budget(&self, user_id: &str, budget_id: Uuid) -> ResultEngine<bool> {
        let result = budgets::Entity::delete_many()
            .filter(budgets::Column::Id.eq(budget_id))
            .filter(budgets::Column::UserId.eq(user_id))
            .exec(&self.database)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Budget with its spent, remaining and percentage derived from the
    /// current expense rows.
    pub async fn budget_status(&self, user_id: &str, budget_id: Uuid) -> ResultEngine<BudgetStatus> {
        let model = self
            .require_budget(&self.database, user_id, budget_id)
            .await?;
        let category = self.require_category(&self.database, model.category_id).await?;
        self.status_in(&self.database, model, category.name).await
    }

    /// Budgets of `user_id`, optionally restricted to one period; newest
    /// period first, then by category.
    pub async fn list_budgets(
        &self,
        user_id: &str,
        period: Option<Period>,
    ) -> ResultEngine<Vec<BudgetStatus>> {
        let mut query = budgets::Entity::find().filter(budgets::Column::UserId.eq(user_id));
        if let Some(period) = period {
            query = query
                .filter(budgets::Column::Year.eq(period.year()))
                .filter(budgets::Column::Month.eq(period.month() as i32));
        }
        let models = query
            .order_by_desc(budgets::Column::Year)
            .order_by_desc(budgets::Column::Month)
            .order_by_asc(budgets::Column::CategoryId)
            .all(&self.database)
            .await?;

        let names = self.category_names(&self.database).await?;
        let mut statuses = Vec::with_capacity(models.len());
        for model in models {
            let name = names
                .get(&model.category_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            statuses.push(self.status_in(&self.database, model, name).await?);
        }
        Ok(statuses)
    }

    pub(super) async fn status_in<C: ConnectionTrait>(
        &self,
        db: &C,
        model: budgets::Model,
        category_name: String,
    ) -> ResultEngine<BudgetStatus> {
        let budget = Budget::try_from(model)?;
        let spent = self
            .spent_in(
                db,
                &budget.user_id,
                budget.category_id,
                budget.period,
                SpendScope::All,
            )
            .await?;
        Ok(BudgetStatus::new(budget, category_name, spent))
    }
}
