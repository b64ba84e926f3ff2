use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use super::{month_or_current, open_db};
use crate::budgets::{self, BudgetStatus};
use crate::error::Result;
use crate::fmt::money;
use crate::reports::month_name;

pub fn add(category: &str, limit: Decimal, threshold: Option<Decimal>) -> Result<()> {
    let conn = open_db()?;
    let budget = budgets::create_budget(&conn, category, limit, threshold)?;
    println!(
        "Added budget #{}: {} {} a month, warn at {}%",
        budget.id,
        budget.category,
        money(budget.monthly_limit),
        budget.alert_threshold.normalize()
    );
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Category", "Monthly limit", "Alert at"]);
    for budget in budgets::list_budgets(&conn)? {
        table.add_row(vec![
            Cell::new(budget.id),
            Cell::new(budget.category),
            Cell::new(money(budget.monthly_limit)),
            Cell::new(format!("{}%", budget.alert_threshold.normalize())),
        ]);
    }
    println!("Budgets\n{table}");
    Ok(())
}

pub fn update(id: i64, limit: Option<Decimal>, threshold: Option<Decimal>) -> Result<()> {
    let conn = open_db()?;
    let budget = budgets::update_budget(&conn, id, limit, threshold)?;
    println!(
        "Updated budget #{}: {} {} a month, warn at {}%",
        budget.id,
        budget.category,
        money(budget.monthly_limit),
        budget.alert_threshold.normalize()
    );
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    budgets::delete_budget(&conn, id)?;
    println!("Deleted budget #{id}");
    Ok(())
}

fn usage(status: &BudgetStatus) -> String {
    let pct = format!("{}%", status.percentage.normalize());
    if status.is_over_limit() {
        pct.red().bold().to_string()
    } else if status.is_over_threshold {
        pct.yellow().bold().to_string()
    } else {
        pct
    }
}

pub fn status(month: Option<String>) -> Result<()> {
    let (year, m) = month_or_current(&month)?;
    let conn = open_db()?;
    let statuses = budgets::budget_status(&conn, year, m)?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Limit", "Spent", "Remaining", "Used"]);
    for status in &statuses {
        let remaining = if status.remaining < Decimal::ZERO {
            money(status.remaining).red().to_string()
        } else {
            money(status.remaining)
        };
        table.add_row(vec![
            Cell::new(&status.budget.category),
            Cell::new(money(status.budget.monthly_limit)),
            Cell::new(money(status.spent)),
            Cell::new(remaining),
            Cell::new(usage(status)),
        ]);
    }
    println!("Budgets {} {year}\n{table}", month_name(m));

    let alerts: Vec<&str> = statuses
        .iter()
        .filter(|s| s.is_over_threshold)
        .map(|s| s.budget.category.as_str())
        .collect();
    if !alerts.is_empty() {
        println!("{} {}", "Near or over limit:".yellow().bold(), alerts.join(", "));
    }
    Ok(())
}
