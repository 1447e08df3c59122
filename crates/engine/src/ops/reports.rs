use std::{
    collections::{HashMap, HashSet},
    io::Write,
};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use sea_orm::{Condition, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, prelude::*};

use crate::{
    Calendar, DashboardSummary, EngineError, Expense, MonthlyTotal, MoneyCents, Period,
    PeriodSummary, ResultEngine, budgets, expenses, reports,
};

use super::Engine;

const CSV_HEADER: [&str; 5] = ["Date", "Category", "Amount", "Description", "Type"];

impl Engine {
    /// Current month overview as of `now` (local time).
    pub async fn dashboard(&self, user_id: &str, now: NaiveDateTime) -> ResultEngine<DashboardSummary> {
        let period = Period::of(now.date());
        let statuses = self.list_budgets(user_id, Some(period)).await?;
        let names = self.category_names(&self.database).await?;

        let month = self
            .expenses_between(&self.database, user_id, Some(period.start()), Some(period.end()))
            .await?;
        let today_date = now.date();
        let today: Vec<Expense> = month
            .iter()
            .filter(|e| e.expense_date.date() == today_date)
            .cloned()
            .collect();

        let budgeted: HashSet<i32> = statuses.iter().map(|s| s.budget.category_id).collect();
        let total_budget: MoneyCents = statuses.iter().map(|s| s.budget.amount).sum();
        let total_spent: MoneyCents = statuses.iter().map(|s| s.spent).sum();

        Ok(DashboardSummary {
            period,
            total_budget,
            total_spent,
            remaining: total_budget - total_spent,
            total_spent_today: today.iter().map(|e| e.amount).sum(),
            total_monthly_expenses: month.iter().map(|e| e.amount).sum(),
            today_by_category: reports::totals_by_label(&today, &names, &budgeted),
            today_expenses: today,
            budgets: statuses,
        })
    }

    /// Day-by-day view of one month. `month` may overflow into the
    /// neighbouring years (13 is January of `year + 1`, 0 is December of
    /// `year - 1`).
    pub async fn calendar(
        &self,
        user_id: &str,
        year: i32,
        month: i32,
        today: NaiveDate,
    ) -> ResultEngine<Calendar> {
        let period = Period::normalized(year, month)?;
        let budgeted: HashSet<i32> = self
            .budgets_in(&self.database, user_id, period, period)
            .await?
            .into_iter()
            .map(|b| b.category_id)
            .collect();
        let names = self.category_names(&self.database).await?;
        let rows = self
            .expenses_between(&self.database, user_id, Some(period.start()), Some(period.end()))
            .await?;

        let days = reports::calendar_days(&rows, &names, &budgeted);
        let total_spent: MoneyCents = rows.iter().map(|e| e.amount).sum();
        let (highest_day, highest_day_amount) = match reports::highest_day(&days) {
            Some((day, amount)) => (Some(day), amount),
            None => (None, MoneyCents::ZERO),
        };

        Ok(Calendar {
            period,
            days,
            total_spent,
            daily_average: total_spent.average_over(reports::days_counted(period, today)),
            highest_day,
            highest_day_amount,
        })
    }

    /// Budget against spend for the inclusive range `from..=to`.
    pub async fn period_summary(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<PeriodSummary> {
        if from > to {
            return Err(EngineError::InvalidPeriod(format!(
                "range start {from} is after its end {to}"
            )));
        }
        let budgets = self
            .budgets_in(&self.database, user_id, Period::of(from), Period::of(to))
            .await?;
        let rows = self
            .expenses_between(
                &self.database,
                user_id,
                Some(from.and_time(NaiveTime::MIN)),
                next_day_start(to),
            )
            .await?;

        let mut budget_by_category: HashMap<i32, MoneyCents> = HashMap::new();
        for budget in &budgets {
            *budget_by_category.entry(budget.category_id).or_default() +=
                MoneyCents::new(budget.amount_minor);
        }
        let mut spent_by_category: HashMap<i32, MoneyCents> = HashMap::new();
        for expense in &rows {
            *spent_by_category.entry(expense.category_id).or_default() += expense.amount;
        }

        let total_budget: MoneyCents = budget_by_category.values().sum();
        let total_expenses: MoneyCents = spent_by_category.values().sum();
        Ok(PeriodSummary {
            from,
            to,
            total_budget,
            total_expenses,
            remaining: total_budget - total_expenses,
            over_budget: reports::over_budget(&budget_by_category, &spent_by_category),
        })
    }

    /// Total and number of expenses per month, newest month first.
    pub async fn monthly_totals(&self, user_id: &str) -> ResultEngine<Vec<MonthlyTotal>> {
        let rows: Vec<(NaiveDateTime, i64)> = expenses::Entity::find()
            .select_only()
            .column(expenses::Column::ExpenseDate)
            .column(expenses::Column::AmountMinor)
            .filter(expenses::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.database)
            .await?;
        Ok(reports::monthly_totals(
            rows.into_iter()
                .map(|(date, amount)| (date.date(), MoneyCents::new(amount))),
        ))
    }

    /// Write the user's expenses as CSV, oldest first. Both bounds are
    /// inclusive and optional. Returns the number of data rows written.
    pub async fn export_csv<W: Write>(
        &self,
        user_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        writer: W,
    ) -> ResultEngine<usize> {
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(EngineError::InvalidPeriod(format!(
                "range start {from} is after its end {to}"
            )));
        }
        let start = from.map(|d| d.and_time(NaiveTime::MIN));
        let end = to.and_then(next_day_start);
        let rows = self
            .expenses_between(&self.database, user_id, start, end)
            .await?;
        let names = self.category_names(&self.database).await?;

        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(CSV_HEADER)?;
        for expense in &rows {
            let date = expense.expense_date.format("%b %d, %Y").to_string();
            let amount = expense.amount.to_string();
            let kind = if expense.is_over_budget { "Unplanned" } else { "" };
            csv.write_record([
                date.as_str(),
                reports::label_of(expense, &names).as_str(),
                amount.as_str(),
                expense.description.as_str(),
                kind,
            ])?;
        }
        csv.flush()?;
        tracing::debug!(user_id, rows = rows.len(), "expenses exported");
        Ok(rows.len())
    }

    /// Expenses with `start <= expense_date < end`, oldest first. A missing
    /// bound is open.
    async fn expenses_between<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> ResultEngine<Vec<Expense>> {
        let mut query = expenses::Entity::find().filter(expenses::Column::UserId.eq(user_id));
        if let Some(start) = start {
            query = query.filter(expenses::Column::ExpenseDate.gte(start));
        }
        if let Some(end) = end {
            query = query.filter(expenses::Column::ExpenseDate.lt(end));
        }
        let models = query
            .order_by_asc(expenses::Column::ExpenseDate)
            .order_by_asc(expenses::Column::DisplayId)
            .all(db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    /// Budgets whose period lies in `first..=last`.
    async fn budgets_in<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
        first: Period,
        last: Period,
    ) -> ResultEngine<Vec<budgets::Model>> {
        let after_first = Condition::any()
            .add(budgets::Column::Year.gt(first.year()))
            .add(
                Condition::all()
                    .add(budgets::Column::Year.eq(first.year()))
                    .add(budgets::Column::Month.gte(first.month() as i32)),
            );
        let before_last = Condition::any()
            .add(budgets::Column::Year.lt(last.year()))
            .add(
                Condition::all()
                    .add(budgets::Column::Year.eq(last.year()))
                    .add(budgets::Column::Month.lte(last.month() as i32)),
            );
        Ok(budgets::Entity::find()
            .filter(budgets::Column::UserId.eq(user_id))
            .filter(after_first)
            .filter(before_last)
            .all(db)
            .await?)
    }
}

/// Midnight after `date`; `None` once it leaves four-digit years, where the
/// stored text form no longer sorts.
fn next_day_start(date: NaiveDate) -> Option<NaiveDateTime> {
    date.succ_opt()
        .filter(|next| next.year() <= 9999)
        .map(|next| next.and_time(NaiveTime::MIN))
}
