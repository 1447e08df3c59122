//! Read-side views: dashboard, calendar, period summary and monthly totals.
//!
//! The types here are plain data; the engine fills them from the ledger in
//! `ops::reports`. Grouping and totals are pure functions over already
//! loaded rows.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{BudgetStatus, Expense, MoneyCents, Period};

/// Spend of one display label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub label: String,
    pub category_id: i32,
    pub total: MoneyCents,
    /// The category has a budget for the month.
    pub is_planned: bool,
}

/// Current month at a glance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub period: Period,
    pub budgets: Vec<BudgetStatus>,
    pub total_budget: MoneyCents,
    /// Spend over budgeted categories only.
    pub total_spent: MoneyCents,
    /// `total_budget - total_spent`; negative when over.
    pub remaining: MoneyCents,
    pub total_spent_today: MoneyCents,
    /// Every expense of the month, budgeted or not.
    pub total_monthly_expenses: MoneyCents,
    /// Today's spend by label, largest first.
    pub today_by_category: Vec<CategoryTotal>,
    pub today_expenses: Vec<Expense>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCategory {
    pub label: String,
    pub category_id: i32,
    pub total: MoneyCents,
    /// Descriptions of the grouped rows, joined with `", "`.
    pub description: String,
    pub is_planned: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub day: u32,
    pub categories: Vec<CalendarCategory>,
    pub total: MoneyCents,
}

/// One month of spend, day by day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub period: Period,
    /// Days with at least one expense, in order.
    pub days: Vec<CalendarDay>,
    pub total_spent: MoneyCents,
    pub daily_average: MoneyCents,
    pub highest_day: Option<u32>,
    pub highest_day_amount: MoneyCents,
}

/// Budget against spend over an arbitrary date range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Sum of every budget of every month the range touches.
    pub total_budget: MoneyCents,
    pub total_expenses: MoneyCents,
    pub remaining: MoneyCents,
    pub over_budget: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub period: Period,
    pub total: MoneyCents,
    pub transactions: u64,
}

/// Totals by display label, largest first. Labels keep the category and
/// planned flag of their first row.
pub(crate) fn totals_by_label(
    expenses: &[Expense],
    names: &HashMap<i32, String>,
    budgeted: &HashSet<i32>,
) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for expense in expenses {
        let label = label_of(expense, names);
        match index.get(&label) {
            Some(&slot) => totals[slot].total += expense.amount,
            None => {
                index.insert(label.clone(), totals.len());
                totals.push(CategoryTotal {
                    label,
                    category_id: expense.category_id,
                    total: expense.amount,
                    is_planned: budgeted.contains(&expense.category_id),
                });
            }
        }
    }
    totals.sort_by(|a, b| b.total.cmp(&a.total));
    totals
}

/// Group a month of expenses by day, then by display label.
pub(crate) fn calendar_days(
    expenses: &[Expense],
    names: &HashMap<i32, String>,
    budgeted: &HashSet<i32>,
) -> Vec<CalendarDay> {
    let mut by_day: BTreeMap<u32, Vec<&Expense>> = BTreeMap::new();
    for expense in expenses {
        by_day
            .entry(expense.expense_date.day())
            .or_default()
            .push(expense);
    }

    by_day
        .into_iter()
        .map(|(day, rows)| {
            let mut categories: Vec<CalendarCategory> = Vec::new();
            let mut descriptions: Vec<Vec<&str>> = Vec::new();
            for expense in &rows {
                let label = label_of(expense, names);
                match categories.iter().position(|c| c.label == label) {
                    Some(slot) => {
                        categories[slot].total += expense.amount;
                        descriptions[slot].push(&expense.description);
                    }
                    None => {
                        categories.push(CalendarCategory {
                            label,
                            category_id: expense.category_id,
                            total: expense.amount,
                            description: String::new(),
                            is_planned: budgeted.contains(&expense.category_id),
                        });
                        descriptions.push(vec![&expense.description]);
                    }
                }
            }
            for (category, parts) in categories.iter_mut().zip(descriptions) {
                category.description = parts.join(", ");
            }
            CalendarDay {
                day,
                total: rows.iter().map(|e| e.amount).sum(),
                categories,
            }
        })
        .collect()
}

/// The day with the largest total; the earliest one wins a tie.
pub(crate) fn highest_day(days: &[CalendarDay]) -> Option<(u32, MoneyCents)> {
    days.iter().fold(None, |best, day| match best {
        Some((_, amount)) if amount >= day.total => best,
        _ => Some((day.day, day.total)),
    })
}

/// Days counted for the daily average: days elapsed in the current month,
/// the whole month otherwise.
pub(crate) fn days_counted(period: Period, today: NaiveDate) -> u32 {
    if Period::of(today) == period {
        today.day()
    } else {
        period.days()
    }
}

/// Overage over a range: per budgeted category `max(0, spent - budget)`,
/// plus everything spent in categories with no budget in the range.
pub(crate) fn over_budget(
    budget_by_category: &HashMap<i32, MoneyCents>,
    spent_by_category: &HashMap<i32, MoneyCents>,
) -> MoneyCents {
    spent_by_category
        .iter()
        .map(|(category_id, spent)| match budget_by_category.get(category_id) {
            Some(budget) if spent > budget => *spent - *budget,
            Some(_) => MoneyCents::ZERO,
            None => *spent,
        })
        .sum()
}

/// Total and count per month, newest month first.
pub(crate) fn monthly_totals(rows: impl IntoIterator<Item = (NaiveDate, MoneyCents)>) -> Vec<MonthlyTotal> {
    let mut by_period: BTreeMap<Period, (MoneyCents, u64)> = BTreeMap::new();
    for (date, amount) in rows {
        let entry = by_period.entry(Period::of(date)).or_default();
        entry.0 += amount;
        entry.1 += 1;
    }
    by_period
        .into_iter()
        .rev()
        .map(|(period, (total, transactions))| MonthlyTotal {
            period,
            total,
            transactions,
        })
        .collect()
}

pub(crate) fn label_of(expense: &Expense, names: &HashMap<i32, String>) -> String {
    expense.display_label(names.get(&expense.category_id).map(String::as_str))
}
