use std::path::Path;
use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;

use crate::error::Result;

// Money columns are TEXT holding a decimal string; never REAL.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    account_type TEXT NOT NULL,
    currency TEXT NOT NULL DEFAULT 'RUB',
    balance TEXT NOT NULL DEFAULT '0',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    amount TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT,
    transaction_type TEXT NOT NULL DEFAULT 'expense',
    date TEXT NOT NULL,
    account_id INTEGER,
    raw_text TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

CREATE TABLE IF NOT EXISTS savings_goals (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    target_amount TEXT NOT NULL,
    current_amount TEXT NOT NULL DEFAULT '0',
    target_date TEXT,
    is_completed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS budgets (
    id INTEGER PRIMARY KEY,
    category TEXT NOT NULL UNIQUE,
    monthly_limit TEXT NOT NULL,
    alert_threshold TEXT NOT NULL DEFAULT '80',
    created_at TEXT DEFAULT (datetime('now'))
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Read a decimal stored as TEXT.
pub fn get_decimal(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["accounts", "transactions", "savings_goals"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_decimal_text_roundtrip() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO savings_goals (name, target_amount, current_amount) VALUES ('Отпуск', ?1, ?2)",
            rusqlite::params![Decimal::new(1000050, 2).to_string(), "0.10"],
        )
        .unwrap();
        let (target, current) = conn
            .query_row("SELECT target_amount, current_amount FROM savings_goals", [], |r| {
                Ok((get_decimal(r, 0)?, get_decimal(r, 1)?))
            })
            .unwrap();
        assert_eq!(target, Decimal::new(1000050, 2));
        assert_eq!(current, Decimal::new(10, 2));
    }

    #[test]
    fn test_get_decimal_rejects_garbage() {
        let (_dir, conn) = test_db();
        let res = conn.query_row("SELECT 'not money'", [], |r| get_decimal(r, 0));
        assert!(res.is_err());
    }
}
