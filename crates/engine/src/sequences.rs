//! Named counters backing the sequential display ids.

use sea_orm::{ConnectionTrait, Statement, entity::prelude::*};

use crate::{EngineError, ResultEngine};

pub(crate) const EXPENSES: &str = "expenses";
pub(crate) const BUDGETS: &str = "budgets";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    pub value: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Allocate the next value of sequence `name`.
///
/// The increment is a single `UPDATE`, so inside a transaction it takes the
/// write lock before the value is read back: two writers can never observe
/// the same number.
pub(crate) async fn next_value<C: ConnectionTrait>(db: &C, name: &str) -> ResultEngine<i64> {
    let backend = db.get_database_backend();
    let result = db
        .execute(Statement::from_sql_and_values(
            backend,
            "UPDATE sequences SET value = value + 1 WHERE name = ?;",
            vec![name.into()],
        ))
        .await?;
    if result.rows_affected() != 1 {
        return Err(EngineError::KeyNotFound(format!("sequence {name}")));
    }

    let model = Entity::find_by_id(name.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("sequence {name}")))?;
    Ok(model.value)
}
