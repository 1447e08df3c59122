use std::collections::HashMap;

use sea_orm::{ConnectionTrait, DatabaseConnection, QueryFilter, QueryOrder, prelude::*};

use crate::{EngineError, MoneyCents, Period, ResultEngine};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// An early `?` inside the block drops the transaction, which rolls it back.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

mod allocation;
mod budgets;
mod expenses;
mod locks;
mod reconciliation;
mod reports;
mod spend;

pub use allocation::{Allocation, AllocationOutcome, AllocationPlan, plan_allocation};
pub use budgets::BudgetAdded;
pub use expenses::ExpenseFilter;
pub use reconciliation::{Reconciliation, TopUp};

use locks::{PeriodKey, PeriodLocks};

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    locks: PeriodLocks,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The static category list, ordered by id.
    pub async fn categories(&self) -> ResultEngine<Vec<crate::Category>> {
        let models = crate::categories::Entity::find()
            .order_by_asc(crate::categories::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn require_category<C: ConnectionTrait>(
        &self,
        db: &C,
        category_id: i32,
    ) -> ResultEngine<crate::categories::Model> {
        crate::categories::Entity::find_by_id(category_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("category {category_id}")))
    }

    async fn category_names<C: ConnectionTrait>(&self, db: &C) -> ResultEngine<HashMap<i32, String>> {
        let models = crate::categories::Entity::find().all(db).await?;
        Ok(models.into_iter().map(|c| (c.id, c.name)).collect())
    }

    /// Budget row for a (user, category, period) key, if any.
    async fn find_budget<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
        category_id: i32,
        period: Period,
    ) -> ResultEngine<Option<crate::budgets::Model>> {
        Ok(crate::budgets::Entity::find()
            .filter(crate::budgets::Column::UserId.eq(user_id))
            .filter(crate::budgets::Column::CategoryId.eq(category_id))
            .filter(crate::budgets::Column::Year.eq(period.year()))
            .filter(crate::budgets::Column::Month.eq(period.month() as i32))
            .one(db)
            .await?)
    }

    /// Budget by id, only if owned by `user_id`.
    async fn require_budget<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
        budget_id: Uuid,
    ) -> ResultEngine<crate::budgets::Model> {
        crate::budgets::Entity::find_by_id(budget_id)
            .filter(crate::budgets::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("budget not exists".to_string()))
    }
}

fn ensure_positive(amount: MoneyCents, label: &str) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "{label} amount must be > 0"
        )));
    }
    if amount > MoneyCents::MAX_AMOUNT {
        return Err(EngineError::InvalidAmount(format!(
            "{label} amount must be <= {}",
            MoneyCents::MAX_AMOUNT
        )));
    }
    Ok(())
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            locks: PeriodLocks::default(),
        })
    }
}
