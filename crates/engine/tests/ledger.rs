use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

use engine::{
    AllocationOutcome, BudgetAdded, BudgetCmd, Engine, EngineError, ExpenseCmd, ExpenseFilter,
    MoneyCents, Period, TopUpCmd, UpdateBudgetCmd, UpdateExpenseCmd,
};
use migration::MigratorTrait;
use uuid::Uuid;

const FOOD: i32 = 1;
const BILLS: i32 = 2;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn march() -> Period {
    Period::new(2026, 3).unwrap()
}

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn usd(units: i64) -> MoneyCents {
    MoneyCents::new(units * 100)
}

async fn budget(engine: &Engine, user: &str, category_id: i32, amount: MoneyCents) -> Uuid {
    let added = engine
        .add_budget(BudgetCmd::new(user, category_id, amount, march()))
        .await
        .unwrap();
    added.status().budget.id
}

async fn spend(engine: &Engine, user: &str, category_id: i32, amount: MoneyCents, day: u32) -> engine::Allocation {
    engine
        .record_expense(ExpenseCmd::new(user, category_id, amount, at(day, 12)).description("meal"))
        .await
        .unwrap()
}

#[tokio::test]
async fn expense_within_budget_is_planned() {
    let (engine, _db) = engine_with_db().await;
    budget(&engine, "alice", FOOD, usd(100)).await;

    let allocation = engine
        .record_expense(
            ExpenseCmd::new("alice", FOOD, usd(80), at(2, 12))
                .description(" groceries ")
                .custom_category_name("  Market "),
        )
        .await
        .unwrap();

    assert_eq!(allocation.outcome, AllocationOutcome::Normal);
    assert!(allocation.unplanned.is_none());
    let planned = allocation.planned.unwrap();
    assert!(!planned.is_over_budget);
    assert_eq!(planned.amount, usd(80));
    assert_eq!(planned.description, "groceries");
    assert_eq!(planned.custom_category_name.as_deref(), Some("Market"));
    assert_eq!(planned.transaction_group_id, Some(allocation.transaction_group_id));
    assert_eq!(planned.display_id, 1);
}

#[tokio::test]
async fn expense_crossing_the_limit_is_split() {
    let (engine, _db) = engine_with_db().await;
    budget(&engine, "alice", FOOD, usd(100)).await;
    spend(&engine, "alice", FOOD, usd(80), 2).await;

    let allocation = engine
        .record_expense(ExpenseCmd::new("alice", FOOD, usd(50), at(3, 19)).description("dinner"))
        .await
        .unwrap();

    assert_eq!(allocation.outcome, AllocationOutcome::Split);
    let planned = allocation.planned.clone().unwrap();
    let unplanned = allocation.unplanned.clone().unwrap();
    assert_eq!(planned.amount, usd(20));
    assert!(!planned.is_over_budget);
    assert_eq!(planned.description, "dinner");
    assert_eq!(unplanned.amount, usd(30));
    assert!(unplanned.is_over_budget);
    assert_eq!(unplanned.description, "Over budget - dinner");
    assert_eq!(unplanned.custom_category_name.as_deref(), Some("Food (Unplanned)"));
    assert_eq!(planned.transaction_group_id, unplanned.transaction_group_id);
    assert_eq!(planned.expense_date, unplanned.expense_date);
    assert_eq!(planned.created_at, unplanned.created_at);
    assert!(planned.display_id < unplanned.display_id);
    assert_eq!(allocation.total(), usd(50));
    assert!(allocation.message().contains("20.00"));

    let spent = engine.spent_amount("alice", FOOD, march()).await.unwrap();
    assert_eq!(spent, usd(130));
}

#[tokio::test]
async fn exact_fit_is_normal_and_exhausted_budget_is_full_overage() {
    let (engine, _db) = engine_with_db().await;
    budget(&engine, "alice", FOOD, usd(100)).await;

    let first = spend(&engine, "alice", FOOD, usd(100), 2).await;
    assert_eq!(first.outcome, AllocationOutcome::Normal);

    let second = spend(&engine, "alice", FOOD, usd(5), 3).await;
    assert_eq!(second.outcome, AllocationOutcome::FullOverage);
    assert!(second.planned.is_none());
    let row = second.unplanned.unwrap();
    assert!(row.is_over_budget);
    assert_eq!(row.amount, usd(5));
    assert_eq!(row.description, "Over budget - meal");
}

#[tokio::test]
async fn expense_without_budget_is_unplanned_and_unannotated() {
    let (engine, _db) = engine_with_db().await;

    let allocation = engine
        .record_expense(
            ExpenseCmd::new("alice", BILLS, usd(20), at(4, 8))
                .description("water")
                .custom_category_name("Utilities"),
        )
        .await
        .unwrap();

    assert_eq!(allocation.outcome, AllocationOutcome::NoBudget);
    assert_eq!(allocation.rows().count(), 1);
    let row = allocation.unplanned.unwrap();
    assert!(row.is_over_budget);
    assert_eq!(row.description, "water");
    assert_eq!(row.custom_category_name.as_deref(), Some("Utilities"));
}

#[tokio::test]
async fn record_expense_rejects_bad_input() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .record_expense(ExpenseCmd::new("alice", FOOD, MoneyCents::ZERO, at(1, 9)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = engine
        .record_expense(ExpenseCmd::new("alice", 99, usd(1), at(1, 9)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    assert!(engine.list_expenses("alice", &ExpenseFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn amounts_above_the_ceiling_are_rejected() {
    let (engine, _db) = engine_with_db().await;
    let huge = MoneyCents::new(i64::MAX / 2 + 1);

    let err = engine
        .record_expense(ExpenseCmd::new("alice", BILLS, huge, at(1, 9)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    let err = engine
        .add_budget(BudgetCmd::new("alice", FOOD, huge, march()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    // Two maximal expenses still add up in the reports.
    for day in [1, 2] {
        engine
            .record_expense(ExpenseCmd::new("alice", BILLS, MoneyCents::MAX_AMOUNT, at(day, 9)))
            .await
            .unwrap();
    }
    let dashboard = engine.dashboard("alice", at(2, 10)).await.unwrap();
    assert_eq!(
        dashboard.total_monthly_expenses,
        MoneyCents::new(MoneyCents::MAX_AMOUNT.cents() * 2)
    );

    let budget_id = budget(&engine, "alice", FOOD, MoneyCents::MAX_AMOUNT).await;
    let err = engine
        .top_up(TopUpCmd::new("alice", budget_id, usd(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[tokio::test]
async fn failed_split_leaves_no_partial_rows() {
    let (engine, db) = engine_with_db().await;
    budget(&engine, "alice", FOOD, usd(100)).await;
    spend(&engine, "alice", FOOD, usd(80), 2).await;
    db.execute_unprepared(
        "CREATE TRIGGER reject_unplanned BEFORE INSERT ON expenses \
         WHEN NEW.is_over_budget = 1 BEGIN SELECT RAISE(ABORT, 'rejected'); END",
    )
    .await
    .unwrap();

    let err = engine
        .record_expense(ExpenseCmd::new("alice", FOOD, usd(50), at(3, 19)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Database(_)));
    let rows = engine.list_expenses("alice", &ExpenseFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(engine.spent_amount("alice", FOOD, march()).await.unwrap(), usd(80));

    db.execute_unprepared("DROP TRIGGER reject_unplanned")
        .await
        .unwrap();
    let retry = spend(&engine, "alice", FOOD, usd(50), 3).await;
    assert_eq!(retry.outcome, AllocationOutcome::Split);
    // The planned insert of the failed attempt did not consume a display id.
    assert_eq!(retry.planned.unwrap().display_id, 2);
}

#[tokio::test]
async fn failed_merge_rolls_back_the_top_up() {
    let (engine, db) = engine_with_db().await;
    let budget_id = budget(&engine, "alice", FOOD, usd(100)).await;
    spend(&engine, "alice", FOOD, usd(80), 2).await;
    let split = spend(&engine, "alice", FOOD, usd(50), 3).await;
    db.execute_unprepared(
        "CREATE TRIGGER reject_delete BEFORE DELETE ON expenses \
         BEGIN SELECT RAISE(ABORT, 'rejected'); END",
    )
    .await
    .unwrap();

    let err = engine
        .top_up(TopUpCmd::new("alice", budget_id, usd(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Database(_)));

    let status = engine.budget_status("alice", budget_id).await.unwrap();
    assert_eq!(status.budget.amount, usd(100));
    assert_eq!(status.budget.version, 0);
    let planned = engine.expense("alice", split.planned.unwrap().id).await.unwrap();
    assert_eq!(planned.amount, usd(20));
    let unplanned = engine.expense("alice", split.unplanned.unwrap().id).await.unwrap();
    assert!(unplanned.is_over_budget);
    assert_eq!(unplanned.amount, usd(30));
}

#[tokio::test]
async fn top_up_merges_the_split_back_into_its_planned_row() {
    let (engine, _db) = engine_with_db().await;
    let budget_id = budget(&engine, "alice", FOOD, usd(100)).await;
    spend(&engine, "alice", FOOD, usd(80), 2).await;
    let split = engine
        .record_expense(ExpenseCmd::new("alice", FOOD, usd(50), at(3, 19)).description("dinner"))
        .await
        .unwrap();

    let top_up = engine
        .top_up(TopUpCmd::new("alice", budget_id, usd(50)))
        .await
        .unwrap();

    assert_eq!(top_up.reconciliation.merged_amount, usd(30));
    assert_eq!(top_up.reconciliation.merged_groups, 1);
    assert_eq!(top_up.budget.budget.amount, usd(150));
    assert_eq!(top_up.budget.budget.version, 1);
    assert_eq!(top_up.budget.spent, usd(130));
    assert_eq!(top_up.budget.remaining, usd(20));
    assert!(top_up.message().contains("30.00"));
    assert!(top_up.message().contains("from 1 transaction "));

    let rows = engine
        .list_expenses("alice", &ExpenseFilter::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|e| !e.is_over_budget));
    let merged = engine
        .expense("alice", split.planned.unwrap().id)
        .await
        .unwrap();
    assert_eq!(merged.amount, usd(50));
    assert_eq!(merged.description, "dinner");
    assert_eq!(
        engine.expense("alice", split.unplanned.unwrap().id).await.unwrap_err(),
        EngineError::KeyNotFound("expense not exists".to_string())
    );
    assert_eq!(engine.spent_amount("alice", FOOD, march()).await.unwrap(), usd(130));
}

#[tokio::test]
async fn top_up_never_merges_into_a_sibling_moved_to_another_category() {
    let (engine, _db) = engine_with_db().await;
    let budget_id = budget(&engine, "alice", FOOD, usd(100)).await;
    spend(&engine, "alice", FOOD, usd(80), 2).await;
    let split = spend(&engine, "alice", FOOD, usd(50), 3).await;
    let planned = split.planned.unwrap();
    let unplanned = split.unplanned.unwrap();
    engine
        .update_expense(
            UpdateExpenseCmd::new("alice", planned.id, BILLS, planned.amount, planned.expense_date)
                .description("meal"),
        )
        .await
        .unwrap();
    let food_before = engine.spent_amount("alice", FOOD, march()).await.unwrap();
    let bills_before = engine.spent_amount("alice", BILLS, march()).await.unwrap();

    let top_up = engine
        .top_up(TopUpCmd::new("alice", budget_id, usd(50)))
        .await
        .unwrap();

    assert_eq!(top_up.reconciliation.merged_groups, 1);
    assert_eq!(top_up.reconciliation.merged_amount, usd(30));
    assert_eq!(engine.spent_amount("alice", FOOD, march()).await.unwrap(), food_before);
    assert_eq!(engine.spent_amount("alice", BILLS, march()).await.unwrap(), bills_before);
    assert_eq!(food_before, usd(110));
    assert_eq!(bills_before, usd(20));

    let flipped = engine.expense("alice", unplanned.id).await.unwrap();
    assert!(!flipped.is_over_budget);
    assert_eq!(flipped.category_id, FOOD);
    assert_eq!(flipped.amount, usd(30));
    assert_eq!(flipped.custom_category_name, None);
    let moved = engine.expense("alice", planned.id).await.unwrap();
    assert_eq!(moved.category_id, BILLS);
    assert_eq!(moved.amount, usd(20));
}

#[tokio::test]
async fn reconciliation_is_strict_fifo() {
    let (engine, _db) = engine_with_db().await;
    let budget_id = budget(&engine, "alice", FOOD, usd(100)).await;
    spend(&engine, "alice", FOOD, usd(100), 1).await;
    let g1 = spend(&engine, "alice", FOOD, usd(50), 2).await;
    let g2 = spend(&engine, "alice", FOOD, usd(30), 3).await;
    assert_eq!(g1.outcome, AllocationOutcome::FullOverage);
    assert_eq!(g2.outcome, AllocationOutcome::FullOverage);

    // 40 of room: the older 50 blocks the younger 30.
    let blocked = engine
        .top_up(TopUpCmd::new("alice", budget_id, usd(40)))
        .await
        .unwrap();
    assert_eq!(blocked.reconciliation.merged_groups, 0);
    assert_eq!(blocked.reconciliation.merged_amount, MoneyCents::ZERO);

    let next = engine
        .top_up(TopUpCmd::new("alice", budget_id, usd(10)))
        .await
        .unwrap();
    assert_eq!(next.reconciliation.merged_groups, 1);
    assert_eq!(next.reconciliation.merged_amount, usd(50));

    let first = engine.expense("alice", g1.unplanned.unwrap().id).await.unwrap();
    assert!(!first.is_over_budget);
    assert_eq!(first.description, "meal");
    assert_eq!(first.custom_category_name, None);
    let second = engine.expense("alice", g2.unplanned.unwrap().id).await.unwrap();
    assert!(second.is_over_budget);
    assert_eq!(engine.spent_amount("alice", FOOD, march()).await.unwrap(), usd(180));
    assert_eq!(
        engine.planned_spent_amount("alice", FOOD, march()).await.unwrap(),
        usd(150)
    );
}

#[tokio::test]
async fn spent_amount_is_idempotent() {
    let (engine, _db) = engine_with_db().await;
    spend(&engine, "alice", FOOD, usd(12), 5).await;
    spend(&engine, "alice", FOOD, usd(8), 6).await;

    let first = engine.spent_amount("alice", FOOD, march()).await.unwrap();
    let second = engine.spent_amount("alice", FOOD, march()).await.unwrap();
    assert_eq!(first, usd(20));
    assert_eq!(first, second);
    let april = Period::new(2026, 4).unwrap();
    assert_eq!(engine.spent_amount("alice", FOOD, april).await.unwrap(), MoneyCents::ZERO);
}

#[tokio::test]
async fn add_budget_on_existing_key_tops_up() {
    let (engine, _db) = engine_with_db().await;
    let created = engine
        .add_budget(BudgetCmd::new("alice", FOOD, usd(10), march()))
        .await
        .unwrap();
    assert!(matches!(created, BudgetAdded::Created(_)));
    spend(&engine, "alice", FOOD, usd(15), 2).await;

    let again = engine
        .add_budget(BudgetCmd::new("alice", FOOD, usd(10), march()))
        .await
        .unwrap();

    let BudgetAdded::ToppedUp(top_up) = again else {
        panic!("expected a top-up");
    };
    assert_eq!(top_up.budget.budget.id, created.status().budget.id);
    assert_eq!(top_up.budget.budget.amount, usd(20));
    assert_eq!(top_up.reconciliation.merged_amount, usd(5));
    assert_eq!(engine.list_budgets("alice", Some(march())).await.unwrap().len(), 1);
}

#[tokio::test]
async fn budgets_and_expenses_are_private_to_their_owner() {
    let (engine, _db) = engine_with_db().await;
    let budget_id = budget(&engine, "alice", FOOD, usd(100)).await;
    let allocation = spend(&engine, "alice", FOOD, usd(10), 2).await;
    let expense_id = allocation.planned.unwrap().id;

    let err = engine
        .top_up(TopUpCmd::new("bob", budget_id, usd(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    assert!(engine.budget_status("bob", budget_id).await.is_err());
    assert!(engine.expense("bob", expense_id).await.is_err());
    assert!(!engine.delete_expense("bob", expense_id).await.unwrap());
    assert!(!engine.delete_budget("bob", budget_id).await.unwrap());
    assert!(engine.list_budgets("bob", None).await.unwrap().is_empty());

    // bob's spend never counts against alice's budget
    let bob = spend(&engine, "bob", FOOD, usd(500), 2).await;
    assert_eq!(bob.outcome, AllocationOutcome::NoBudget);
    let status = engine.budget_status("alice", budget_id).await.unwrap();
    assert_eq!(status.spent, usd(10));
}

#[tokio::test]
async fn update_budget_changes_in_place_and_rejects_collisions() {
    let (engine, _db) = engine_with_db().await;
    let food = budget(&engine, "alice", FOOD, usd(100)).await;
    budget(&engine, "alice", BILLS, usd(50)).await;
    spend(&engine, "alice", FOOD, usd(120), 2).await;

    let err = engine
        .update_budget(UpdateBudgetCmd::new("alice", food, BILLS, usd(70)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let status = engine
        .update_budget(UpdateBudgetCmd::new("alice", food, FOOD, usd(200)))
        .await
        .unwrap();
    assert_eq!(status.budget.amount, usd(200));
    assert_eq!(status.budget.version, 1);
    assert_eq!(status.spent, usd(120));

    // editing never reconciles
    let rows = engine
        .list_expenses("alice", &ExpenseFilter::default().category(FOOD))
        .await
        .unwrap();
    assert_eq!(rows.iter().filter(|e| e.is_over_budget).count(), 1);

    assert!(engine.delete_budget("alice", food).await.unwrap());
    assert!(!engine.delete_budget("alice", food).await.unwrap());
}

#[tokio::test]
async fn update_expense_keeps_identity_fields() {
    let (engine, _db) = engine_with_db().await;
    budget(&engine, "alice", FOOD, usd(10)).await;
    let split = spend(&engine, "alice", FOOD, usd(15), 2).await;
    let row = split.unplanned.unwrap();

    let updated = engine
        .update_expense(
            UpdateExpenseCmd::new("alice", row.id, BILLS, usd(7), at(9, 10))
                .description("fixed")
                .custom_category_name(" "),
        )
        .await
        .unwrap();

    assert_eq!(updated.id, row.id);
    assert_eq!(updated.display_id, row.display_id);
    assert_eq!(updated.created_at, row.created_at);
    assert_eq!(updated.transaction_group_id, row.transaction_group_id);
    assert!(updated.is_over_budget);
    assert_eq!(updated.category_id, BILLS);
    assert_eq!(updated.amount, usd(7));
    assert_eq!(updated.custom_category_name, None);

    let err = engine
        .update_expense(UpdateExpenseCmd::new("alice", Uuid::new_v4(), FOOD, usd(1), at(1, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn list_expenses_filters_and_orders_newest_first() {
    let (engine, _db) = engine_with_db().await;
    spend(&engine, "alice", FOOD, usd(5), 1).await;
    spend(&engine, "alice", BILLS, usd(50), 10).await;
    spend(&engine, "alice", FOOD, usd(15), 20).await;

    let all = engine.list_expenses("alice", &ExpenseFilter::default()).await.unwrap();
    let days: Vec<u32> = all.iter().map(|e| chrono::Datelike::day(&e.expense_date)).collect();
    assert_eq!(days, vec![20, 10, 1]);

    let until_tenth = ExpenseFilter::between(
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
    );
    assert_eq!(engine.list_expenses("alice", &until_tenth).await.unwrap().len(), 2);

    let food = ExpenseFilter {
        min_amount: Some(usd(10)),
        ..ExpenseFilter::default().category(FOOD)
    };
    let rows = engine.list_expenses("alice", &food).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, usd(15));
}

#[tokio::test]
async fn purge_removes_only_expired_expenses() {
    let (engine, _db) = engine_with_db().await;
    spend(&engine, "alice", FOOD, usd(5), 1).await;
    spend(&engine, "bob", FOOD, usd(5), 2).await;
    spend(&engine, "alice", FOOD, usd(5), 20).await;

    let deleted = engine.purge_expenses_before(at(10, 0)).await.unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(engine.list_expenses("alice", &ExpenseFilter::default()).await.unwrap().len(), 1);
    assert!(engine.list_expenses("bob", &ExpenseFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_expenses_never_overspend_the_planned_bucket() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);
    budget(&engine, "alice", FOOD, usd(100)).await;

    let mut handles = Vec::new();
    for day in 1..=4 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            spend(&engine, "alice", FOOD, usd(40), day).await
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let planned = engine.planned_spent_amount("alice", FOOD, march()).await.unwrap();
    let total = engine.spent_amount("alice", FOOD, march()).await.unwrap();
    assert_eq!(planned, usd(100));
    assert_eq!(total, usd(160));
}
