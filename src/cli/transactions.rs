use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};

use super::open_db;
use crate::error::{KopilkaError, Result};
use crate::fmt::money;
use crate::ledger::{create_transaction, find_account, list_transactions, TransactionFilter};
use crate::models::{normalize_category, ParsedTransaction, TransactionType};
use crate::validation::{parse_amount, validate_amount, validate_date, validate_required, ValidationErrors};

fn parse_date_arg(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|_| KopilkaError::Invalid(format!("{field}: expected YYYY-MM-DD, got '{raw}'")))
}

pub fn list(from_date: Option<&str>, to_date: Option<&str>, category: Option<&str>, limit: usize) -> Result<()> {
    let filter = TransactionFilter {
        date_from: parse_date_arg(from_date, "--from")?,
        date_to: parse_date_arg(to_date, "--to")?,
        category: normalize_category(category),
        limit: Some(limit),
    };
    let conn = open_db()?;
    let rows = list_transactions(&conn, &filter)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Description", "Category", "Amount"]);
    for txn in &rows {
        let amount = match txn.transaction_type {
            TransactionType::Income => format!("+{}", money(txn.amount)).green().to_string(),
            TransactionType::Expense => format!("-{}", money(txn.amount)),
        };
        table.add_row(vec![
            Cell::new(txn.id),
            Cell::new(txn.date),
            Cell::new(&txn.description),
            Cell::new(txn.category.as_deref().unwrap_or("")),
            Cell::new(amount),
        ]);
    }
    println!("Transactions ({})\n{table}", rows.len());
    Ok(())
}

pub struct NewTransaction<'a> {
    pub description: &'a str,
    pub amount: &'a str,
    pub date: Option<&'a str>,
    pub category: Option<&'a str>,
    pub transaction_type: &'a str,
    pub account: Option<&'a str>,
}

pub fn add(input: &NewTransaction) -> Result<()> {
    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    let date_raw = input.date.unwrap_or(&today);

    let mut errors = ValidationErrors::new();
    errors.check("description", validate_required(input.description, "Description"));
    errors.check("amount", validate_amount(input.amount));
    errors.check("date", validate_date(date_raw));
    if errors.has_errors() {
        let message = ["description", "amount", "date"]
            .iter()
            .filter_map(|field| errors.get(field))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(KopilkaError::Invalid(message));
    }

    let amount = parse_amount(input.amount)
        .ok_or_else(|| KopilkaError::Invalid(format!("invalid amount '{}'", input.amount)))?;
    let date = parse_date_arg(Some(date_raw), "date")?
        .ok_or_else(|| KopilkaError::Invalid("date is required".to_string()))?;
    let txn = ParsedTransaction {
        amount,
        description: input.description.to_string(),
        category: normalize_category(input.category),
        transaction_type: input.transaction_type.parse()?,
        date,
        raw_text: String::new(),
    };

    let conn = open_db()?;
    let account_id = match input.account {
        Some(name) => Some(find_account(&conn, name)?.id),
        None => None,
    };
    let saved = create_transaction(&conn, &txn, account_id)?;
    println!(
        "Added transaction #{}: {} {} on {}",
        saved.id,
        saved.description,
        money(saved.amount),
        saved.date
    );
    Ok(())
}
