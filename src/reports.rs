use std::collections::BTreeMap;

use chrono::Datelike;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::error::{KopilkaError, Result};
use crate::ledger::transactions_in_period;
use crate::models::TransactionType;
use crate::settings::Settings;

pub const UNCATEGORIZED: &str = "Без категории";

const MONTH_NAMES: [&str; 12] = [
    "Январь", "Февраль", "Март", "Апрель", "Май", "Июнь",
    "Июль", "Август", "Сентябрь", "Октябрь", "Ноябрь", "Декабрь",
];

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("")
}

// ---------------------------------------------------------------------------
// Monthly report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct FlowTotals {
    pub total: Decimal,
    pub count: usize,
    pub by_category: BTreeMap<String, Decimal>,
}

impl FlowTotals {
    fn add(&mut self, category: Option<&str>, amount: Decimal) {
        self.total = self.total.saturating_add(amount);
        self.count += 1;
        let entry = self
            .by_category
            .entry(category.unwrap_or(UNCATEGORIZED).to_string())
            .or_default();
        *entry = entry.saturating_add(amount);
    }
}

#[derive(Debug, Clone)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub expenses: FlowTotals,
    pub income: FlowTotals,
}

impl MonthlyReport {
    pub fn label(&self) -> String {
        format!("{} {}", month_name(self.month), self.year)
    }
}

/// Always twelve entries, January first; empty months are zeroed.
pub fn monthly_report(conn: &Connection, year: i32) -> Result<Vec<MonthlyReport>> {
    let mut months: Vec<MonthlyReport> = (1..=12)
        .map(|month| MonthlyReport {
            year,
            month,
            expenses: FlowTotals::default(),
            income: FlowTotals::default(),
        })
        .collect();

    for txn in transactions_in_period(conn, year, None)? {
        let slot = &mut months[txn.date.month0() as usize];
        let totals = match txn.transaction_type {
            TransactionType::Income => &mut slot.income,
            TransactionType::Expense => &mut slot.expenses,
        };
        totals.add(txn.category.as_deref(), txn.amount);
    }
    Ok(months)
}

// ---------------------------------------------------------------------------
// Monthly savings status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SavingsStatus {
    pub income: Decimal,
    pub expenses: Decimal,
    /// Income minus expenses, zero when no income is configured. May be negative.
    pub savings: Decimal,
    pub savings_goal: Decimal,
    pub is_on_track: bool,
}

impl SavingsStatus {
    /// Default pool for distributing into goals.
    pub fn distributable(&self) -> Decimal {
        self.savings.max(Decimal::ZERO)
    }
}

pub fn monthly_savings_status(
    conn: &Connection,
    year: i32,
    month: u32,
    settings: &Settings,
) -> Result<SavingsStatus> {
    if !(1..=12).contains(&month) {
        return Err(KopilkaError::Invalid(format!("bad month {month}")));
    }
    let expenses = transactions_in_period(conn, year, Some(month))?
        .iter()
        .filter(|t| t.transaction_type == TransactionType::Expense)
        .try_fold(Decimal::ZERO, |acc, t| acc.checked_add(t.amount))
        .ok_or_else(|| KopilkaError::Invalid(format!("expenses for {year}-{month:02} are out of range")))?;

    let income = settings.monthly_income.unwrap_or_default();
    let savings = if income > Decimal::ZERO {
        income - expenses
    } else {
        Decimal::ZERO
    };
    let savings_goal = settings.monthly_savings_goal.unwrap_or_default();
    let is_on_track = savings_goal <= Decimal::ZERO || savings >= savings_goal;

    Ok(SavingsStatus {
        income,
        expenses,
        savings,
        savings_goal,
        is_on_track,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::ledger::create_transaction;
    use crate::models::ParsedTransaction;
    use chrono::NaiveDate;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn record(conn: &Connection, on: &str, amount: &str, category: Option<&str>, kind: TransactionType) {
        let txn = ParsedTransaction {
            amount: d(amount),
            description: "x".to_string(),
            category: category.map(str::to_string),
            transaction_type: kind,
            date: NaiveDate::parse_from_str(on, "%Y-%m-%d").unwrap(),
            raw_text: String::new(),
        };
        create_transaction(conn, &txn, None).unwrap();
    }

    fn settings(income: Option<&str>, goal: Option<&str>) -> Settings {
        Settings {
            monthly_income: income.map(d),
            monthly_savings_goal: goal.map(d),
            ..Settings::default()
        }
    }

    #[test]
    fn test_monthly_report_buckets() {
        let (_dir, conn) = test_db();
        record(&conn, "2024-05-01", "540", Some("Еда"), TransactionType::Expense);
        record(&conn, "2024-05-20", "60", Some("Еда"), TransactionType::Expense);
        record(&conn, "2024-05-21", "300", None, TransactionType::Expense);
        record(&conn, "2024-05-05", "120000", Some("Зарплата"), TransactionType::Income);
        record(&conn, "2023-05-01", "999", Some("Еда"), TransactionType::Expense);

        let report = monthly_report(&conn, 2024).unwrap();
        assert_eq!(report.len(), 12);
        let may = &report[4];
        assert_eq!(may.label(), "Май 2024");
        assert_eq!(may.expenses.total, d("900"));
        assert_eq!(may.expenses.count, 3);
        assert_eq!(may.expenses.by_category["Еда"], d("600"));
        assert_eq!(may.expenses.by_category[UNCATEGORIZED], d("300"));
        assert_eq!(may.income.total, d("120000"));
        assert_eq!(report[0].expenses.count, 0);
    }

    #[test]
    fn test_savings_status_on_track() {
        let (_dir, conn) = test_db();
        record(&conn, "2024-05-01", "70000", None, TransactionType::Expense);
        record(&conn, "2024-05-02", "5000", None, TransactionType::Income);
        let status = monthly_savings_status(&conn, 2024, 5, &settings(Some("100000"), Some("20000"))).unwrap();
        assert_eq!(status.expenses, d("70000"));
        assert_eq!(status.savings, d("30000"));
        assert!(status.is_on_track);
        assert_eq!(status.distributable(), d("30000"));
    }

    #[test]
    fn test_savings_status_without_income() {
        let (_dir, conn) = test_db();
        record(&conn, "2024-05-01", "70000", None, TransactionType::Expense);
        let status = monthly_savings_status(&conn, 2024, 5, &settings(None, Some("20000"))).unwrap();
        assert_eq!(status.savings, Decimal::ZERO);
        assert!(!status.is_on_track);
        let status = monthly_savings_status(&conn, 2024, 5, &settings(None, None)).unwrap();
        assert!(status.is_on_track);
    }

    #[test]
    fn test_overspent_month_has_nothing_to_distribute() {
        let (_dir, conn) = test_db();
        record(&conn, "2024-05-01", "120000", None, TransactionType::Expense);
        let status = monthly_savings_status(&conn, 2024, 5, &settings(Some("100000"), None)).unwrap();
        assert_eq!(status.savings, d("-20000"));
        assert_eq!(status.distributable(), Decimal::ZERO);
    }

    #[test]
    fn test_rejects_bad_month() {
        let (_dir, conn) = test_db();
        assert!(monthly_savings_status(&conn, 2024, 13, &Settings::default()).is_err());
    }
}
