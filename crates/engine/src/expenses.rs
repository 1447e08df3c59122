//! Recorded expenses.
//!
//! A single user submission produces one or two rows sharing a
//! `transaction_group_id`: a planned row (`is_over_budget = false`) and/or an
//! unplanned row (`is_over_budget = true`).

use chrono::NaiveDateTime;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::MoneyCents;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub display_id: i64,
    pub user_id: String,
    pub category_id: i32,
    pub custom_category_name: Option<String>,
    pub amount: MoneyCents,
    pub description: String,
    /// Local time of record.
    pub expense_date: NaiveDateTime,
    pub created_at: DateTimeUtc,
    pub is_over_budget: bool,
    pub transaction_group_id: Option<Uuid>,
}

impl Expense {
    /// Label shown in reports: the custom label when present, otherwise the
    /// category name.
    #[must_use]
    pub fn display_label(&self, category_name: Option<&str>) -> String {
        match (&self.custom_category_name, category_name) {
            (Some(custom), _) => custom.clone(),
            (None, Some(name)) => name.to_string(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub display_id: i64,
    pub user_id: String,
    pub category_id: i32,
    pub custom_category_name: Option<String>,
    pub amount_minor: i64,
    pub description: String,
    pub expense_date: DateTime,
    pub created_at: DateTimeUtc,
    pub is_over_budget: bool,
    pub transaction_group_id: Option<Uuid>,
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

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id),
            display_id: ActiveValue::Set(expense.display_id),
            user_id: ActiveValue::Set(expense.user_id.clone()),
            category_id: ActiveValue::Set(expense.category_id),
            custom_category_name: ActiveValue::Set(expense.custom_category_name.clone()),
            amount_minor: ActiveValue::Set(expense.amount.cents()),
            description: ActiveValue::Set(expense.description.clone()),
            expense_date: ActiveValue::Set(expense.expense_date),
            created_at: ActiveValue::Set(expense.created_at),
            is_over_budget: ActiveValue::Set(expense.is_over_budget),
            transaction_group_id: ActiveValue::Set(expense.transaction_group_id),
        }
    }
}

impl From<Model> for Expense {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            display_id: model.display_id,
            user_id: model.user_id,
            category_id: model.category_id,
            custom_category_name: model.custom_category_name,
            amount: MoneyCents::new(model.amount_minor),
            description: model.description,
            expense_date: model.expense_date,
            created_at: model.created_at,
            is_over_budget: model.is_over_budget,
            transaction_group_id: model.transaction_group_id,
        }
    }
}
