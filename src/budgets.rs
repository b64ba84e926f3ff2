use std::collections::HashMap;

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;

use crate::db::get_decimal;
use crate::error::{KopilkaError, Result};
use crate::ledger::transactions_in_period;
use crate::models::{normalize_category, TransactionType};

/// Percent of the limit at which a budget starts warning.
pub const DEFAULT_ALERT_THRESHOLD: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    pub id: i64,
    pub category: String,
    pub monthly_limit: Decimal,
    /// Percent of `monthly_limit`, e.g. 80.
    pub alert_threshold: Decimal,
}

const BUDGET_COLUMNS: &str = "id, category, monthly_limit, alert_threshold";

fn budget_from_row(row: &Row) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: row.get(0)?,
        category: row.get(1)?,
        monthly_limit: get_decimal(row, 2)?,
        alert_threshold: get_decimal(row, 3)?,
    })
}

fn check_limit(limit: Decimal) -> Result<()> {
    if limit <= Decimal::ZERO {
        return Err(KopilkaError::Invalid("monthly limit must be positive".to_string()));
    }
    Ok(())
}

fn check_threshold(threshold: Decimal) -> Result<()> {
    if threshold <= Decimal::ZERO {
        return Err(KopilkaError::Invalid("alert threshold must be a positive percent".to_string()));
    }
    Ok(())
}

/// One budget per category.
pub fn create_budget(
    conn: &Connection,
    category: &str,
    monthly_limit: Decimal,
    alert_threshold: Option<Decimal>,
) -> Result<Budget> {
    let category = normalize_category(Some(category))
        .ok_or_else(|| KopilkaError::Invalid("category must not be empty".to_string()))?;
    check_limit(monthly_limit)?;
    let alert_threshold = alert_threshold.unwrap_or(DEFAULT_ALERT_THRESHOLD);
    check_threshold(alert_threshold)?;

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM budgets WHERE category = ?1)",
        [&category],
        |row| row.get(0),
    )?;
    if exists {
        return Err(KopilkaError::Invalid(format!("a budget for '{category}' already exists")));
    }

    conn.execute(
        "INSERT INTO budgets (category, monthly_limit, alert_threshold) VALUES (?1, ?2, ?3)",
        rusqlite::params![category, monthly_limit.to_string(), alert_threshold.to_string()],
    )?;
    get_budget(conn, conn.last_insert_rowid())
}

pub fn get_budget(conn: &Connection, budget_id: i64) -> Result<Budget> {
    conn.query_row(
        &format!("SELECT {BUDGET_COLUMNS} FROM budgets WHERE id = ?1"),
        [budget_id],
        budget_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => KopilkaError::UnknownBudget(budget_id),
        other => other.into(),
    })
}

pub fn list_budgets(conn: &Connection) -> Result<Vec<Budget>> {
    let mut stmt = conn.prepare(&format!("SELECT {BUDGET_COLUMNS} FROM budgets ORDER BY category"))?;
    let rows = stmt
        .query_map([], budget_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Change the limit and/or threshold; `None` keeps the stored value.
pub fn update_budget(
    conn: &Connection,
    budget_id: i64,
    monthly_limit: Option<Decimal>,
    alert_threshold: Option<Decimal>,
) -> Result<Budget> {
    let mut budget = get_budget(conn, budget_id)?;
    if let Some(limit) = monthly_limit {
        check_limit(limit)?;
        budget.monthly_limit = limit;
    }
    if let Some(threshold) = alert_threshold {
        check_threshold(threshold)?;
        budget.alert_threshold = threshold;
    }
    conn.execute(
        "UPDATE budgets SET monthly_limit = ?1, alert_threshold = ?2 WHERE id = ?3",
        rusqlite::params![budget.monthly_limit.to_string(), budget.alert_threshold.to_string(), budget_id],
    )?;
    Ok(budget)
}

pub fn delete_budget(conn: &Connection, budget_id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM budgets WHERE id = ?1", [budget_id])?;
    if deleted == 0 {
        return Err(KopilkaError::UnknownBudget(budget_id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetStatus {
    pub budget: Budget,
    pub spent: Decimal,
    /// Negative once the limit is exceeded.
    pub remaining: Decimal,
    /// Spent as a percent of the limit, one decimal place.
    pub percentage: Decimal,
    pub is_over_threshold: bool,
}

impl BudgetStatus {
    fn new(budget: Budget, spent: Decimal) -> Self {
        let exact = spent
            .checked_div(budget.monthly_limit)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::MAX);
        Self {
            remaining: budget.monthly_limit.saturating_sub(spent),
            percentage: exact.round_dp(1),
            is_over_threshold: exact >= budget.alert_threshold,
            spent,
            budget,
        }
    }

    pub fn is_over_limit(&self) -> bool {
        self.spent > self.budget.monthly_limit
    }
}

/// Every budget against the expenses booked to its category in the month.
pub fn budget_status(conn: &Connection, year: i32, month: u32) -> Result<Vec<BudgetStatus>> {
    if !(1..=12).contains(&month) {
        return Err(KopilkaError::Invalid(format!("bad month {month}")));
    }
    let mut spent: HashMap<String, Decimal> = HashMap::new();
    for txn in transactions_in_period(conn, year, Some(month))? {
        if txn.transaction_type != TransactionType::Expense {
            continue;
        }
        let Some(category) = txn.category else { continue };
        let entry = spent.entry(category).or_default();
        *entry = entry.checked_add(txn.amount).ok_or_else(|| {
            KopilkaError::Invalid(format!("expenses for {year}-{month:02} are out of range"))
        })?;
    }

    let statuses: Vec<BudgetStatus> = list_budgets(conn)?
        .into_iter()
        .map(|budget| {
            let spent = spent.get(&budget.category).copied().unwrap_or(Decimal::ZERO);
            BudgetStatus::new(budget, spent)
        })
        .collect();
    tracing::debug!(
        year,
        month,
        budgets = statuses.len(),
        alerts = statuses.iter().filter(|s| s.is_over_threshold).count(),
        "budget status"
    );
    Ok(statuses)
}
