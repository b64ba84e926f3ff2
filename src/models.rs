use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::KopilkaError;

pub type GoalId = i64;

/// Direction of a transaction. Amounts are always positive; the sign lives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    #[default]
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = KopilkaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" | "" => Ok(Self::Expense),
            other => Err(KopilkaError::Invalid(format!("unknown transaction type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Cash,
    Card,
    Savings,
    CreditCard,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Savings => "savings",
            Self::CreditCard => "credit_card",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = KopilkaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "savings" => Ok(Self::Savings),
            "credit_card" | "credit-card" | "credit" => Ok(Self::CreditCard),
            other => Err(KopilkaError::Invalid(format!("unknown account type: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: AccountType,
    pub currency: String,
    pub balance: Decimal,
    pub is_active: bool,
}

/// A stored transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub amount: Decimal,
    pub description: String,
    pub category: Option<String>,
    pub transaction_type: TransactionType,
    pub date: NaiveDate,
    pub account_id: Option<i64>,
    pub raw_text: Option<String>,
}

/// Output of the upload extractor, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub amount: Decimal,
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_category")]
    pub category: Option<String>,
    #[serde(default, alias = "type")]
    pub transaction_type: TransactionType,
    pub date: NaiveDate,
    #[serde(default)]
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub id: GoalId,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub target_date: Option<NaiveDate>,
    pub is_completed: bool,
}

impl SavingsGoal {
    /// Remaining capacity before the goal reaches its target, never negative.
    pub fn room(&self) -> Decimal {
        self.target_amount
            .saturating_sub(self.current_amount)
            .max(Decimal::ZERO)
    }
}

/// Empty or whitespace-only categories mean "no category".
pub fn normalize_category(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn deserialize_category<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(normalize_category(raw.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(target: &str, current: &str) -> SavingsGoal {
        SavingsGoal {
            id: 1,
            name: "Отпуск".to_string(),
            target_amount: target.parse().unwrap(),
            current_amount: current.parse().unwrap(),
            target_date: None,
            is_completed: false,
        }
    }

    #[test]
    fn test_room_is_never_negative() {
        assert_eq!(goal("1000", "400").room(), Decimal::new(600, 0));
        assert_eq!(goal("1000", "1200").room(), Decimal::ZERO);
    }

    #[test]
    fn test_transaction_type_parsing() {
        assert_eq!("Income".parse::<TransactionType>().unwrap(), TransactionType::Income);
        assert_eq!("".parse::<TransactionType>().unwrap(), TransactionType::Expense);
        assert!("refund".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_account_type_aliases() {
        assert_eq!("credit-card".parse::<AccountType>().unwrap(), AccountType::CreditCard);
        assert_eq!(AccountType::CreditCard.as_str(), "credit_card");
    }

    #[test]
    fn test_parsed_transaction_from_upload_json() {
        let json = r#"{
            "amount": 540.00,
            "description": "Магнит, продукты",
            "category": "  ",
            "date": "2024-05-01",
            "raw_text": "МАГНИТ 540,00"
        }"#;
        let parsed: ParsedTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.amount, Decimal::new(540, 0));
        assert_eq!(parsed.category, None);
        assert_eq!(parsed.transaction_type, TransactionType::Expense);
    }

    #[test]
    fn test_parsed_transaction_accepts_type_alias() {
        let json = r#"{"amount": "1500", "description": "Зарплата", "type": "income", "date": "2024-05-02"}"#;
        let parsed: ParsedTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.transaction_type, TransactionType::Income);
        assert!(parsed.raw_text.is_empty());
    }
}
