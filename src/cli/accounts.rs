use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use super::open_db;
use crate::error::{KopilkaError, Result};
use crate::fmt::money;
use crate::ledger;
use crate::models::AccountType;
use crate::settings::load_settings;
use crate::validation::parse_amount;

pub fn add(name: &str, account_type: &str, currency: Option<&str>, balance: Option<&str>) -> Result<()> {
    let kind: AccountType = account_type.parse()?;
    let opening = match balance {
        Some(raw) => parse_amount(raw).ok_or_else(|| KopilkaError::Invalid(format!("invalid balance '{raw}'")))?,
        None => Decimal::ZERO,
    };
    let currency = currency.map(str::to_string).unwrap_or_else(|| load_settings().currency);

    let conn = open_db()?;
    let id = ledger::add_account(&conn, name, kind, &currency, opening)?;
    println!("Added account #{id}: {name} ({kind}, {})", money(opening));
    Ok(())
}

pub fn list(include_inactive: bool) -> Result<()> {
    let conn = open_db()?;
    let accounts = ledger::list_accounts(&conn, !include_inactive)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Currency", "Balance"]);
    for account in accounts {
        let balance = if account.balance < Decimal::ZERO {
            money(account.balance).red().to_string()
        } else {
            money(account.balance)
        };
        let name = if account.is_active {
            account.name
        } else {
            format!("{} (inactive)", account.name)
        };
        table.add_row(vec![
            Cell::new(account.id),
            Cell::new(name),
            Cell::new(account.account_type),
            Cell::new(account.currency),
            Cell::new(balance),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

pub fn balance() -> Result<()> {
    let conn = open_db()?;
    let summary = ledger::total_balance(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["Currency", "Balance"]);
    for (currency, total) in &summary.by_currency {
        table.add_row(vec![Cell::new(currency), Cell::new(money(*total))]);
    }
    table.add_row(vec![Cell::new("Total".bold()), Cell::new(money(summary.total).bold())]);
    println!("Balance\n{table}");
    Ok(())
}

pub fn adjust(name: &str, delta: &str) -> Result<()> {
    let delta = parse_amount(delta).ok_or_else(|| KopilkaError::Invalid(format!("invalid amount '{delta}'")))?;
    let conn = open_db()?;
    let account = ledger::find_account(&conn, name)?;
    let account = ledger::adjust_balance(&conn, account.id, delta)?;
    println!("{}: balance now {}", account.name, money(account.balance));
    Ok(())
}

pub fn update(
    name: &str,
    new_name: Option<&str>,
    account_type: Option<&str>,
    currency: Option<&str>,
    active: Option<bool>,
) -> Result<()> {
    let update = ledger::AccountUpdate {
        name: new_name.map(str::to_string),
        account_type: account_type.map(str::parse).transpose()?,
        currency: currency.map(str::to_string),
        is_active: active,
    };
    if update.is_empty() {
        return Err(KopilkaError::Invalid(
            "nothing to change; pass --rename, --type, --currency or --active".to_string(),
        ));
    }
    let conn = open_db()?;
    let account = ledger::find_account(&conn, name)?;
    let account = ledger::update_account(&conn, account.id, &update)?;
    let state = if account.is_active { "active" } else { "inactive" };
    println!(
        "Updated account #{}: {} ({}, {}, {state})",
        account.id, account.name, account.account_type, account.currency
    );
    Ok(())
}

pub fn remove(name: &str) -> Result<()> {
    let conn = open_db()?;
    let account = ledger::find_account(&conn, name)?;
    match ledger::remove_account(&conn, account.id)? {
        ledger::AccountRemoval::Deleted => println!("Deleted account {name}"),
        ledger::AccountRemoval::Deactivated => {
            println!("{} account {name}: transactions still use it", "Deactivated".yellow())
        }
    }
    Ok(())
}
