//! Monthly per-category budgets.
//!
//! A `Budget` is a pure record: the amount spent against it is never stored
//! on the row. [`BudgetStatus`] carries the derived values and is produced
//! fresh by the engine on every read.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{MoneyCents, Period, ResultEngine};

/// One category's spending ceiling for one calendar month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub display_id: i64,
    pub user_id: String,
    pub category_id: i32,
    pub amount: MoneyCents,
    pub period: Period,
    pub created_at: DateTime<Utc>,
    /// Bumped on every amount change; writers compare it before updating.
    pub version: i64,
}

/// A budget together with the amounts derived from its expenses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub budget: Budget,
    pub category_name: String,
    pub spent: MoneyCents,
    pub remaining: MoneyCents,
    pub percentage_used: f64,
}

impl BudgetStatus {
    pub(crate) fn new(budget: Budget, category_name: String, spent: MoneyCents) -> Self {
        let remaining = budget.amount - spent;
        let percentage_used = spent.percentage_of(budget.amount);
        Self {
            budget,
            category_name,
            spent,
            remaining,
            percentage_used,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub display_id: i64,
    pub user_id: String,
    pub category_id: i32,
    pub amount_minor: i64,
    pub month: i32,
    pub year: i32,
    pub created_at: DateTimeUtc,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Category,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub(crate) fn period(&self) -> ResultEngine<Period> {
        Period::new(self.year, u32::try_from(self.month).unwrap_or(0))
    }
}

impl TryFrom<Model> for Budget {
    type Error = crate::EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let period = model.period()?;
        Ok(Self {
            id: model.id,
            display_id: model.display_id,
            user_id: model.user_id,
            category_id: model.category_id,
            amount: MoneyCents::new(model.amount_minor),
            period,
            created_at: model.created_at,
            version: model.version,
        })
    }
}
