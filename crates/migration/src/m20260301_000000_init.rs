//! Initial schema migration.
//!
//! Creates the complete Spendwise schema:
//!
//! - `categories`: static reference list (seeded)
//! - `sequences`: named counters backing display ids (seeded)
//! - `budgets`: monthly per-category spending ceilings
//! - `expenses`: recorded spending, planned or unplanned

use sea_orm::{ConnectionTrait, Statement};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Categories seeded on a fresh database, in id order.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["Food", "Bills", "Transportation", "Others"];

/// Sequences seeded on a fresh database.
const SEQUENCES: [&str; 2] = ["expenses", "budgets"];

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum Sequences {
    Table,
    Name,
    Value,
}

#[derive(Iden)]
enum Budgets {
    Table,
    Id,
    DisplayId,
    UserId,
    CategoryId,
    AmountMinor,
    Month,
    Year,
    CreatedAt,
    Version,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    DisplayId,
    UserId,
    CategoryId,
    CustomCategoryName,
    AmountMinor,
    Description,
    ExpenseDate,
    CreatedAt,
    IsOverBudget,
    TransactionGroupId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Categories::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Sequences
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Sequences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sequences::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Sequences::Value)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Budgets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Budgets::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Budgets::DisplayId).big_integer().not_null())
                    .col(ColumnDef::new(Budgets::UserId).string().not_null())
                    .col(ColumnDef::new(Budgets::CategoryId).integer().not_null())
                    .col(ColumnDef::new(Budgets::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Budgets::Month).integer().not_null())
                    .col(ColumnDef::new(Budgets::Year).integer().not_null())
                    .col(ColumnDef::new(Budgets::CreatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Budgets::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-category_id")
                            .from(Budgets::Table, Budgets::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-user_id-period")
                    .table(Budgets::Table)
                    .col(Budgets::UserId)
                    .col(Budgets::Year)
                    .col(Budgets::Month)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Expenses::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Expenses::DisplayId).big_integer().not_null())
                    .col(ColumnDef::new(Expenses::UserId).string().not_null())
                    .col(ColumnDef::new(Expenses::CategoryId).integer().not_null())
                    .col(ColumnDef::new(Expenses::CustomCategoryName).string())
                    .col(ColumnDef::new(Expenses::AmountMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Expenses::Description)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Expenses::ExpenseDate).date_time().not_null())
                    .col(ColumnDef::new(Expenses::CreatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Expenses::IsOverBudget)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Expenses::TransactionGroupId).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-category_id")
                            .from(Expenses::Table, Expenses::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-user_id-category_id-expense_date")
                    .table(Expenses::Table)
                    .col(Expenses::UserId)
                    .col(Expenses::CategoryId)
                    .col(Expenses::ExpenseDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-transaction_group_id")
                    .table(Expenses::Table)
                    .col(Expenses::TransactionGroupId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Seed data
        // ───────────────────────────────────────────────────────────────────
        let db = manager.get_connection();
        let backend = db.get_database_backend();

        for name in DEFAULT_CATEGORIES {
            db.execute(Statement::from_sql_and_values(
                backend,
                "INSERT INTO categories (name) VALUES (?);",
                vec![name.into()],
            ))
            .await?;
        }

        for name in SEQUENCES {
            db.execute(Statement::from_sql_and_values(
                backend,
                "INSERT INTO sequences (name, value) VALUES (?, 0);",
                vec![name.into()],
            ))
            .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sequences::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await
    }
}
