use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use super::open_db;
use crate::error::{KopilkaError, Result};
use crate::fmt::money;
use crate::goals;
use crate::models::{GoalId, SavingsGoal};
use crate::validation::{parse_amount, validate_date, validate_positive_number};

fn positive_amount(raw: &str, field: &str) -> Result<Decimal> {
    if let Some(message) = validate_positive_number(raw, field) {
        return Err(KopilkaError::Invalid(message));
    }
    parse_amount(raw).ok_or_else(|| KopilkaError::Invalid(format!("invalid {field} '{raw}'")))
}

fn progress(goal: &SavingsGoal) -> String {
    if goal.target_amount <= Decimal::ZERO {
        return String::new();
    }
    let pct = goal
        .current_amount
        .checked_div(goal.target_amount)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ONE_HUNDRED)
        .round_dp(0)
        .min(Decimal::ONE_HUNDRED);
    format!("{pct}%")
}

pub fn add(name: &str, target: &str, current: Option<&str>, date: Option<&str>) -> Result<()> {
    let target = positive_amount(target, "Target")?;
    let current = match current {
        Some(raw) => parse_amount(raw).ok_or_else(|| KopilkaError::Invalid(format!("invalid amount '{raw}'")))?,
        None => Decimal::ZERO,
    };
    let target_date = match date {
        Some(raw) => {
            if let Some(message) = validate_date(raw) {
                return Err(KopilkaError::Invalid(message));
            }
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
        }
        None => None,
    };

    let conn = open_db()?;
    let goal = goals::create_goal(&conn, name, target, current, target_date)?;
    println!("Added goal #{}: {} ({} of {})", goal.id, goal.name, money(goal.current_amount), money(goal.target_amount));
    Ok(())
}

pub fn list(include_completed: bool) -> Result<()> {
    let conn = open_db()?;
    let goals = goals::list_goals(&conn, include_completed)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Saved", "Target", "Room", "Progress", "Due"]);
    for goal in &goals {
        let name = if goal.is_completed {
            format!("{} ✓", goal.name).green().to_string()
        } else {
            goal.name.clone()
        };
        table.add_row(vec![
            Cell::new(goal.id),
            Cell::new(name),
            Cell::new(money(goal.current_amount)),
            Cell::new(money(goal.target_amount)),
            Cell::new(money(goal.room())),
            Cell::new(progress(goal)),
            Cell::new(goal.target_date.map(|d| d.to_string()).unwrap_or_default()),
        ]);
    }
    println!("Savings goals\n{table}");
    Ok(())
}

pub fn deposit(id: GoalId, amount: &str) -> Result<()> {
    let amount = positive_amount(amount, "Amount")?;
    let conn = open_db()?;
    let goal = goals::add_to_goal(&conn, id, amount)?;
    println!("{}: {} of {}", goal.name, money(goal.current_amount), money(goal.target_amount));
    if goal.is_completed {
        println!("{}", "Goal reached!".green().bold());
    }
    Ok(())
}

pub fn withdraw(id: GoalId, amount: &str) -> Result<()> {
    let amount = positive_amount(amount, "Amount")?;
    let conn = open_db()?;
    let goal = goals::subtract_from_goal(&conn, id, amount)?;
    println!("{}: {} of {}", goal.name, money(goal.current_amount), money(goal.target_amount));
    Ok(())
}

pub fn delete(id: GoalId) -> Result<()> {
    let conn = open_db()?;
    goals::delete_goal(&conn, id)?;
    println!("Deleted goal #{id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_caps_at_hundred() {
        let mut goal = SavingsGoal {
            id: 1,
            name: "Отпуск".to_string(),
            target_amount: Decimal::new(1000, 0),
            current_amount: Decimal::new(333, 0),
            target_date: None,
            is_completed: false,
        };
        assert_eq!(progress(&goal), "33%");
        goal.current_amount = Decimal::new(5000, 0);
        assert_eq!(progress(&goal), "100%");
    }

    #[test]
    fn test_positive_amount() {
        assert_eq!(positive_amount("1 500", "Amount").unwrap(), Decimal::new(1500, 0));
        assert!(positive_amount("0", "Amount").is_err());
        assert!(positive_amount("", "Amount").is_err());
    }
}
