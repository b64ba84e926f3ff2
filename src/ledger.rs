use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;

use crate::db::get_decimal;
use crate::error::{KopilkaError, Result};
use crate::models::{normalize_category, Account, AccountType, ParsedTransaction, Transaction, TransactionType};

fn parse_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = KopilkaError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

const ACCOUNT_COLUMNS: &str = "id, name, account_type, currency, balance, is_active";

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        account_type: parse_column(row, 2)?,
        currency: row.get(3)?,
        balance: get_decimal(row, 4)?,
        is_active: row.get(5)?,
    })
}

pub fn add_account(
    conn: &Connection,
    name: &str,
    account_type: AccountType,
    currency: &str,
    opening_balance: Decimal,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO accounts (name, account_type, currency, balance) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![name, account_type.as_str(), currency, opening_balance.to_string()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_account(conn: &Connection, name: &str) -> Result<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE name = ?1"),
        [name],
        account_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => KopilkaError::UnknownAccount(name.to_string()),
        other => other.into(),
    })
}

pub fn get_account(conn: &Connection, id: i64) -> Result<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        [id],
        account_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => KopilkaError::UnknownAccount(id.to_string()),
        other => other.into(),
    })
}

pub fn list_accounts(conn: &Connection, active_only: bool) -> Result<Vec<Account>> {
    let filter = if active_only { "WHERE is_active = 1" } else { "" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts {filter} ORDER BY name"
    ))?;
    let rows = stmt
        .query_map([], account_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Default, Clone)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    pub currency: Option<String>,
    pub is_active: Option<bool>,
}

impl AccountUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.account_type.is_none() && self.currency.is_none() && self.is_active.is_none()
    }
}

/// Rename, retype or (de)activate an account. The balance only moves through
/// transactions and `adjust_balance`.
pub fn update_account(conn: &Connection, account_id: i64, update: &AccountUpdate) -> Result<Account> {
    let current = get_account(conn, account_id)?;
    let name = match update.name.as_deref().map(str::trim) {
        Some("") => return Err(KopilkaError::Invalid("account name must not be empty".to_string())),
        Some(name) => name.to_string(),
        None => current.name.clone(),
    };
    let account = Account {
        name,
        account_type: update.account_type.unwrap_or(current.account_type),
        currency: update.currency.clone().unwrap_or(current.currency),
        is_active: update.is_active.unwrap_or(current.is_active),
        ..current
    };
    conn.execute(
        "UPDATE accounts SET name = ?1, account_type = ?2, currency = ?3, is_active = ?4 WHERE id = ?5",
        rusqlite::params![
            account.name,
            account.account_type.as_str(),
            account.currency,
            account.is_active,
            account_id,
        ],
    )?;
    tracing::debug!(account_id, name = %account.name, active = account.is_active, "account updated");
    Ok(account)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRemoval {
    Deleted,
    /// Transactions still point at the account, so it was only deactivated.
    Deactivated,
}

pub fn remove_account(conn: &Connection, account_id: i64) -> Result<AccountRemoval> {
    get_account(conn, account_id)?;
    let linked: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE account_id = ?1",
        [account_id],
        |row| row.get(0),
    )?;
    if linked > 0 {
        conn.execute("UPDATE accounts SET is_active = 0 WHERE id = ?1", [account_id])?;
        return Ok(AccountRemoval::Deactivated);
    }
    conn.execute("DELETE FROM accounts WHERE id = ?1", [account_id])?;
    Ok(AccountRemoval::Deleted)
}

pub struct BalanceSummary {
    pub total: Decimal,
    pub by_currency: BTreeMap<String, Decimal>,
}

/// Sum of active balances, overall and per currency.
pub fn total_balance(conn: &Connection) -> Result<BalanceSummary> {
    let mut by_currency: BTreeMap<String, Decimal> = BTreeMap::new();
    for account in list_accounts(conn, true)? {
        let entry = by_currency.entry(account.currency).or_default();
        *entry = entry.checked_add(account.balance).ok_or_else(balance_overflow)?;
    }
    let total = by_currency
        .values()
        .try_fold(Decimal::ZERO, |acc, balance| acc.checked_add(*balance))
        .ok_or_else(balance_overflow)?;
    Ok(BalanceSummary { total, by_currency })
}

fn balance_overflow() -> KopilkaError {
    KopilkaError::Invalid("balance is out of range".to_string())
}

fn apply_delta(conn: &Connection, account_id: i64, delta: Decimal) -> Result<Account> {
    let account = get_account(conn, account_id)?;
    let balance = account.balance.checked_add(delta).ok_or_else(balance_overflow)?;
    conn.execute(
        "UPDATE accounts SET balance = ?1 WHERE id = ?2",
        rusqlite::params![balance.to_string(), account_id],
    )?;
    Ok(Account { balance, ..account })
}

/// Manual correction: positive adds, negative subtracts.
pub fn adjust_balance(conn: &Connection, account_id: i64, delta: Decimal) -> Result<Account> {
    let tx = conn.unchecked_transaction()?;
    let account = apply_delta(&tx, account_id, delta)?;
    tx.commit()?;
    Ok(account)
}

/// Signed effect of a transaction on its account. Credit-card balances follow
/// the same rule and simply go negative as debt grows.
pub fn balance_effect(amount: Decimal, kind: TransactionType) -> Decimal {
    match kind {
        TransactionType::Income => amount,
        TransactionType::Expense => -amount,
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

const TXN_COLUMNS: &str = "id, amount, description, category, transaction_type, date, account_id, raw_text";

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        amount: get_decimal(row, 1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        transaction_type: parse_column(row, 4)?,
        date: row.get(5)?,
        account_id: row.get(6)?,
        raw_text: row.get(7)?,
    })
}

/// Save one transaction. When linked to an account the balance moves in the
/// same SQLite transaction.
pub fn create_transaction(
    conn: &Connection,
    txn: &ParsedTransaction,
    account_id: Option<i64>,
) -> Result<Transaction> {
    if txn.amount <= Decimal::ZERO {
        return Err(KopilkaError::Invalid("amount must be positive".to_string()));
    }
    let category = normalize_category(txn.category.as_deref());
    let raw_text = Some(txn.raw_text.clone()).filter(|r| !r.is_empty());

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO transactions (amount, description, category, transaction_type, date, account_id, raw_text) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            txn.amount.to_string(),
            txn.description.trim(),
            category,
            txn.transaction_type.as_str(),
            txn.date,
            account_id,
            raw_text,
        ],
    )?;
    let id = tx.last_insert_rowid();
    if let Some(account_id) = account_id {
        apply_delta(&tx, account_id, balance_effect(txn.amount, txn.transaction_type))?;
    }
    tx.commit()?;
    tracing::debug!(id, amount = %txn.amount, ?account_id, "transaction saved");

    Ok(Transaction {
        id,
        amount: txn.amount,
        description: txn.description.trim().to_string(),
        category,
        transaction_type: txn.transaction_type,
        date: txn.date,
        account_id,
        raw_text,
    })
}

#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// Newest first.
pub fn list_transactions(conn: &Connection, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    if let Some(from) = filter.date_from {
        params.push(Box::new(from));
        clauses.push("date >= ?");
    }
    if let Some(to) = filter.date_to {
        params.push(Box::new(to));
        clauses.push("date <= ?");
    }
    if let Some(category) = &filter.category {
        params.push(Box::new(category.clone()));
        clauses.push("category = ?");
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let limit_clause = filter
        .limit
        .map(|n| format!("LIMIT {n}"))
        .unwrap_or_default();

    let mut stmt = conn.prepare(&format!(
        "SELECT {TXN_COLUMNS} FROM transactions {where_clause} ORDER BY date DESC, id DESC {limit_clause}"
    ))?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), transaction_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every stored transaction, for duplicate detection.
pub fn load_existing(conn: &Connection) -> Result<Vec<Transaction>> {
    list_transactions(conn, &TransactionFilter::default())
}

/// Transactions dated within `year` (and `month`, when given).
pub fn transactions_in_period(conn: &Connection, year: i32, month: Option<u32>) -> Result<Vec<Transaction>> {
    let (from, to) = match month {
        Some(m) => {
            let from = NaiveDate::from_ymd_opt(year, m, 1)
                .ok_or_else(|| KopilkaError::Invalid(format!("bad month {year}-{m}")))?;
            let next = if m == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, m + 1, 1)
            };
            let to = next
                .and_then(|d| d.pred_opt())
                .ok_or_else(|| KopilkaError::Invalid(format!("bad month {year}-{m}")))?;
            (from, to)
        }
        None => {
            let from = NaiveDate::from_ymd_opt(year, 1, 1)
                .ok_or_else(|| KopilkaError::Invalid(format!("bad year {year}")))?;
            let to = NaiveDate::from_ymd_opt(year, 12, 31)
                .ok_or_else(|| KopilkaError::Invalid(format!("bad year {year}")))?;
            (from, to)
        }
    };
    list_transactions(
        conn,
        &TransactionFilter {
            date_from: Some(from),
            date_to: Some(to),
            ..TransactionFilter::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn parsed(desc: &str, amount: &str, on: &str, kind: TransactionType) -> ParsedTransaction {
        ParsedTransaction {
            amount: d(amount),
            description: desc.to_string(),
            category: Some("Еда".to_string()),
            transaction_type: kind,
            date: NaiveDate::parse_from_str(on, "%Y-%m-%d").unwrap(),
            raw_text: String::new(),
        }
    }

    #[test]
    fn test_expense_reduces_account_balance() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Тинькофф", AccountType::Card, "RUB", d("1000")).unwrap();
        create_transaction(&conn, &parsed("Магнит", "540.00", "2024-05-01", TransactionType::Expense), Some(acct)).unwrap();
        create_transaction(&conn, &parsed("Зарплата", "100", "2024-05-02", TransactionType::Income), Some(acct)).unwrap();
        let account = find_account(&conn, "Тинькофф").unwrap();
        assert_eq!(account.balance, d("560.00"));
    }

    #[test]
    fn test_credit_card_goes_negative() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Кредитка", AccountType::CreditCard, "RUB", Decimal::ZERO).unwrap();
        create_transaction(&conn, &parsed("Ozon", "2500", "2024-05-01", TransactionType::Expense), Some(acct)).unwrap();
        assert_eq!(find_account(&conn, "Кредитка").unwrap().balance, d("-2500"));
    }

    #[test]
    fn test_unlinked_transaction_leaves_balances_alone() {
        let (_dir, conn) = test_db();
        add_account(&conn, "Наличные", AccountType::Cash, "RUB", d("300")).unwrap();
        let saved = create_transaction(&conn, &parsed("Кофе", "150", "2024-05-01", TransactionType::Expense), None).unwrap();
        assert_eq!(saved.account_id, None);
        assert_eq!(saved.raw_text, None);
        assert_eq!(find_account(&conn, "Наличные").unwrap().balance, d("300"));
    }

    #[test]
    fn test_create_rejects_non_positive_amount() {
        let (_dir, conn) = test_db();
        let res = create_transaction(&conn, &parsed("Возврат", "-10", "2024-05-01", TransactionType::Expense), None);
        assert!(matches!(res, Err(KopilkaError::Invalid(_))));
    }

    #[test]
    fn test_failed_balance_update_rolls_back_insert() {
        let (_dir, conn) = test_db();
        let res = create_transaction(&conn, &parsed("Кофе", "150", "2024-05-01", TransactionType::Expense), Some(99));
        assert!(res.is_err());
        assert!(load_existing(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_list_transactions_filters_and_orders() {
        let (_dir, conn) = test_db();
        for (desc, on) in [("A", "2024-04-30"), ("B", "2024-05-01"), ("C", "2024-05-20"), ("D", "2024-06-01")] {
            create_transaction(&conn, &parsed(desc, "10", on, TransactionType::Expense), None).unwrap();
        }
        let may = transactions_in_period(&conn, 2024, Some(5)).unwrap();
        let names: Vec<&str> = may.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(names, vec!["C", "B"]);

        let limited = list_transactions(&conn, &TransactionFilter { limit: Some(1), ..Default::default() }).unwrap();
        assert_eq!(limited[0].description, "D");
    }

    #[test]
    fn test_total_balance_groups_by_currency() {
        let (_dir, conn) = test_db();
        add_account(&conn, "Карта", AccountType::Card, "RUB", d("1000")).unwrap();
        add_account(&conn, "Копилка", AccountType::Savings, "RUB", d("500.50")).unwrap();
        add_account(&conn, "Доллары", AccountType::Cash, "USD", d("20")).unwrap();
        let summary = total_balance(&conn).unwrap();
        assert_eq!(summary.by_currency["RUB"], d("1500.50"));
        assert_eq!(summary.by_currency["USD"], d("20"));
    }

    #[test]
    fn test_adjust_balance_and_unknown_account() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, "Карта", AccountType::Card, "RUB", d("100")).unwrap();
        assert_eq!(adjust_balance(&conn, id, d("-30")).unwrap().balance, d("70"));
        assert!(matches!(find_account(&conn, "Нет"), Err(KopilkaError::UnknownAccount(_))));
    }

    #[test]
    fn test_balance_overflow_is_refused() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, "Карта", AccountType::Card, "RUB", Decimal::MAX).unwrap();
        let err = adjust_balance(&conn, id, d("1")).unwrap_err();
        assert!(matches!(err, KopilkaError::Invalid(_)));
        assert_eq!(get_account(&conn, id).unwrap().balance, Decimal::MAX);

        add_account(&conn, "Вторая", AccountType::Card, "RUB", Decimal::MAX).unwrap();
        assert!(matches!(total_balance(&conn), Err(KopilkaError::Invalid(_))));
    }

    #[test]
    fn test_update_account_keeps_unset_fields() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, "Карта", AccountType::Card, "RUB", d("100")).unwrap();
        let update = AccountUpdate {
            name: Some("Сбер".to_string()),
            is_active: Some(false),
            ..Default::default()
        };
        let account = update_account(&conn, id, &update).unwrap();
        assert_eq!(account.name, "Сбер");
        assert_eq!(account.account_type, AccountType::Card);
        assert_eq!(account.balance, d("100"));
        assert!(list_accounts(&conn, true).unwrap().is_empty());
        assert!(!find_account(&conn, "Сбер").unwrap().is_active);

        let blank = AccountUpdate { name: Some(" ".to_string()), ..Default::default() };
        assert!(matches!(update_account(&conn, id, &blank), Err(KopilkaError::Invalid(_))));
    }

    #[test]
    fn test_remove_account_deactivates_when_linked() {
        let (_dir, conn) = test_db();
        let used = add_account(&conn, "Карта", AccountType::Card, "RUB", d("1000")).unwrap();
        let unused = add_account(&conn, "Наличные", AccountType::Cash, "RUB", d("0")).unwrap();
        create_transaction(&conn, &parsed("Магнит", "10", "2024-05-01", TransactionType::Expense), Some(used)).unwrap();

        assert_eq!(remove_account(&conn, used).unwrap(), AccountRemoval::Deactivated);
        assert!(!get_account(&conn, used).unwrap().is_active);
        assert_eq!(remove_account(&conn, unused).unwrap(), AccountRemoval::Deleted);
        assert!(matches!(get_account(&conn, unused), Err(KopilkaError::UnknownAccount(_))));
    }
}
