//! Spend aggregation.
//!
//! "Spent" is never stored: every read sums the matching expense rows again,
//! so a stored total can never drift from the rows it summarises.

use sea_orm::{ConnectionTrait, QueryFilter, QuerySelect, prelude::*, sea_query::Expr};

use crate::{MoneyCents, Period, ResultEngine, expenses};

use super::Engine;

/// Which expense rows count towards a spent total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum SpendScope {
    /// Planned and unplanned rows.
    All,
    /// Only rows within budget (`is_over_budget = false`).
    Planned,
}

impl Engine {
    /// Total spent by `user_id` on `category_id` during `period`, planned and
    /// unplanned rows alike.
    pub async fn spent_amount(
        &self,
        user_id: &str,
        category_id: i32,
        period: Period,
    ) -> ResultEngine<MoneyCents> {
        self.spent_in(&self.database, user_id, category_id, period, SpendScope::All)
            .await
    }

    /// Like [`Engine::spent_amount`], restricted to planned rows.
    pub async fn planned_spent_amount(
        &self,
        user_id: &str,
        category_id: i32,
        period: Period,
    ) -> ResultEngine<MoneyCents> {
        self.spent_in(
            &self.database,
            user_id,
            category_id,
            period,
            SpendScope::Planned,
        )
        .await
    }

    pub(super) async fn spent_in<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
        category_id: i32,
        period: Period,
        scope: SpendScope,
    ) -> ResultEngine<MoneyCents> {
        let mut query = expenses::Entity::find()
            .select_only()
            .column_as(Expr::col(expenses::Column::AmountMinor).sum(), "total")
            .filter(expenses::Column::UserId.eq(user_id))
            .filter(expenses::Column::CategoryId.eq(category_id))
            .filter(expenses::Column::ExpenseDate.gte(period.start()))
            .filter(expenses::Column::ExpenseDate.lt(period.end()));
        if scope == SpendScope::Planned {
            query = query.filter(expenses::Column::IsOverBudget.eq(false));
        }

        let total: Option<Option<i64>> = query.into_tuple().one(db).await?;
        Ok(MoneyCents::new(total.flatten().unwrap_or(0)))
    }
}
