use comfy_table::{Cell, Table};

use crate::error::{KopilkaError, Result};
use crate::fmt::money;
use crate::settings::{db_path, load_settings, save_settings, Settings};
use crate::validation::parse_amount;

pub fn show() -> Result<()> {
    let settings = load_settings();
    let optional = |v: Option<rust_decimal::Decimal>| v.map(money).unwrap_or_else(|| "-".to_string());

    let mut table = Table::new();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec![Cell::new("data_dir"), Cell::new(&settings.data_dir)]);
    table.add_row(vec![Cell::new("database"), Cell::new(db_path().display())]);
    table.add_row(vec![Cell::new("monthly_income"), Cell::new(optional(settings.monthly_income))]);
    table.add_row(vec![Cell::new("monthly_savings_goal"), Cell::new(optional(settings.monthly_savings_goal))]);
    table.add_row(vec![Cell::new("currency"), Cell::new(&settings.currency)]);
    println!("Settings\n{table}");
    Ok(())
}

/// Apply `key = value` to `settings`. An empty value clears optional amounts.
pub fn apply(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    let amount = |raw: &str| -> Result<Option<rust_decimal::Decimal>> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        match parse_amount(raw) {
            Some(v) if v >= rust_decimal::Decimal::ZERO => Ok(Some(v)),
            _ => Err(KopilkaError::Invalid(format!("{key}: invalid amount '{raw}'"))),
        }
    };
    match key {
        "monthly_income" => settings.monthly_income = amount(value)?,
        "monthly_savings_goal" => settings.monthly_savings_goal = amount(value)?,
        "currency" => {
            let code = value.trim().to_uppercase();
            if code.is_empty() {
                return Err(KopilkaError::Invalid("currency must not be empty".to_string()));
            }
            settings.currency = code;
        }
        other => return Err(KopilkaError::Settings(format!("unknown setting '{other}'"))),
    }
    Ok(())
}

pub fn set(key: &str, value: &str) -> Result<()> {
    let mut settings = load_settings();
    apply(&mut settings, key, value)?;
    save_settings(&settings)?;
    println!("{key} updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_apply_amounts_and_currency() {
        let mut settings = Settings::default();
        apply(&mut settings, "monthly_income", "120 000").unwrap();
        apply(&mut settings, "monthly_savings_goal", "30000,50").unwrap();
        apply(&mut settings, "currency", "usd").unwrap();
        assert_eq!(settings.monthly_income, Some(Decimal::new(120000, 0)));
        assert_eq!(settings.monthly_savings_goal, Some(Decimal::new(3000050, 2)));
        assert_eq!(settings.currency, "USD");
        apply(&mut settings, "monthly_income", "").unwrap();
        assert!(settings.monthly_income.is_none());
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut settings = Settings::default();
        assert!(apply(&mut settings, "monthly_income", "-5").is_err());
        assert!(apply(&mut settings, "theme", "dark").is_err());
    }
}
