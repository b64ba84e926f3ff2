use chrono::Datelike;
use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use super::{month_or_current, open_db};
use crate::error::Result;
use crate::fmt::money;
use crate::reports::{self, month_name};
use crate::settings::load_settings;

pub fn monthly(year: Option<i32>) -> Result<()> {
    let year = year.unwrap_or_else(|| chrono::Local::now().year());
    let conn = open_db()?;
    let months = reports::monthly_report(&conn, year)?;

    let mut table = Table::new();
    table.set_header(vec!["Month", "Income", "#", "Expenses", "#", "Top category"]);
    let mut total_income = Decimal::ZERO;
    let mut total_expenses = Decimal::ZERO;
    for month in &months {
        total_income = total_income.saturating_add(month.income.total);
        total_expenses = total_expenses.saturating_add(month.expenses.total);
        let top = month
            .expenses
            .by_category
            .iter()
            .max_by_key(|(_, amount)| **amount)
            .map(|(name, amount)| format!("{name} ({})", money(*amount)))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(month_name(month.month)),
            Cell::new(money(month.income.total)),
            Cell::new(month.income.count),
            Cell::new(money(month.expenses.total)),
            Cell::new(month.expenses.count),
            Cell::new(top),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(money(total_income).green()),
        Cell::new(""),
        Cell::new(money(total_expenses).red()),
        Cell::new(""),
        Cell::new(""),
    ]);
    println!("Monthly report {year}\n{table}");
    Ok(())
}

pub fn savings(month: Option<String>) -> Result<()> {
    let (year, m) = month_or_current(&month)?;
    let conn = open_db()?;
    let status = reports::monthly_savings_status(&conn, year, m, &load_settings())?;

    let mut table = Table::new();
    table.set_header(vec!["", "Amount"]);
    table.add_row(vec![Cell::new("Income"), Cell::new(money(status.income))]);
    table.add_row(vec![Cell::new("Expenses"), Cell::new(money(status.expenses))]);
    let savings = if status.savings < Decimal::ZERO {
        money(status.savings).red().bold()
    } else {
        money(status.savings).green().bold()
    };
    table.add_row(vec![Cell::new("Savings".bold()), Cell::new(savings)]);
    table.add_row(vec![Cell::new("Savings goal"), Cell::new(money(status.savings_goal))]);

    let verdict = if status.is_on_track {
        "On track".green().bold()
    } else {
        "Behind goal".red().bold()
    };
    println!("Savings {} {year}\n{table}\n{verdict}", month_name(m));
    Ok(())
}
