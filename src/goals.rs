use chrono::NaiveDate;
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;

use crate::allocation::GoalAdjuster;
use crate::db::get_decimal;
use crate::error::{KopilkaError, Result};
use crate::models::{GoalId, SavingsGoal};

const GOAL_COLUMNS: &str = "id, name, target_amount, current_amount, target_date, is_completed";

fn goal_from_row(row: &Row) -> rusqlite::Result<SavingsGoal> {
    Ok(SavingsGoal {
        id: row.get(0)?,
        name: row.get(1)?,
        target_amount: get_decimal(row, 2)?,
        current_amount: get_decimal(row, 3)?,
        target_date: row.get(4)?,
        is_completed: row.get(5)?,
    })
}

pub fn create_goal(
    conn: &Connection,
    name: &str,
    target_amount: Decimal,
    current_amount: Decimal,
    target_date: Option<NaiveDate>,
) -> Result<SavingsGoal> {
    if target_amount <= Decimal::ZERO {
        return Err(KopilkaError::Invalid("target amount must be positive".to_string()));
    }
    if current_amount < Decimal::ZERO {
        return Err(KopilkaError::Invalid("current amount must not be negative".to_string()));
    }
    let is_completed = current_amount >= target_amount;
    conn.execute(
        "INSERT INTO savings_goals (name, target_amount, current_amount, target_date, is_completed) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            name,
            target_amount.to_string(),
            current_amount.to_string(),
            target_date,
            is_completed,
        ],
    )?;
    get_goal(conn, conn.last_insert_rowid())
}

pub fn get_goal(conn: &Connection, goal_id: GoalId) -> Result<SavingsGoal> {
    conn.query_row(
        &format!("SELECT {GOAL_COLUMNS} FROM savings_goals WHERE id = ?1"),
        [goal_id],
        goal_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => KopilkaError::UnknownGoal(goal_id),
        other => other.into(),
    })
}

/// Goals without a target date come first.
pub fn list_goals(conn: &Connection, include_completed: bool) -> Result<Vec<SavingsGoal>> {
    let filter = if include_completed { "" } else { "WHERE is_completed = 0" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {GOAL_COLUMNS} FROM savings_goals {filter} \
         ORDER BY target_date IS NOT NULL, target_date, id"
    ))?;
    let rows = stmt
        .query_map([], goal_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_goal(conn: &Connection, goal_id: GoalId) -> Result<()> {
    let deleted = conn.execute("DELETE FROM savings_goals WHERE id = ?1", [goal_id])?;
    if deleted == 0 {
        return Err(KopilkaError::UnknownGoal(goal_id));
    }
    Ok(())
}

fn store(conn: &Connection, goal: &SavingsGoal) -> Result<()> {
    conn.execute(
        "UPDATE savings_goals SET current_amount = ?1, is_completed = ?2 WHERE id = ?3",
        rusqlite::params![goal.current_amount.to_string(), goal.is_completed, goal.id],
    )?;
    Ok(())
}

/// Completes the goal once it reaches its target.
pub fn add_to_goal(conn: &Connection, goal_id: GoalId, amount: Decimal) -> Result<SavingsGoal> {
    if amount <= Decimal::ZERO {
        return Err(KopilkaError::Invalid("amount must be positive".to_string()));
    }
    let tx = conn.unchecked_transaction()?;
    let mut goal = get_goal(&tx, goal_id)?;
    goal.current_amount = goal
        .current_amount
        .checked_add(amount)
        .ok_or_else(|| KopilkaError::Invalid(format!("goal {goal_id}: amount is out of range")))?;
    if goal.current_amount >= goal.target_amount {
        goal.is_completed = true;
    }
    store(&tx, &goal)?;
    tx.commit()?;
    Ok(goal)
}

/// Refuses to go below zero; reopens a completed goal that drops under target.
pub fn subtract_from_goal(conn: &Connection, goal_id: GoalId, amount: Decimal) -> Result<SavingsGoal> {
    if amount <= Decimal::ZERO {
        return Err(KopilkaError::Invalid("amount must be positive".to_string()));
    }
    let tx = conn.unchecked_transaction()?;
    let mut goal = get_goal(&tx, goal_id)?;
    if goal.current_amount < amount {
        return Err(KopilkaError::InsufficientFunds {
            goal_id,
            available: goal.current_amount,
        });
    }
    goal.current_amount -= amount;
    if goal.is_completed && goal.current_amount < goal.target_amount {
        goal.is_completed = false;
    }
    store(&tx, &goal)?;
    tx.commit()?;
    Ok(goal)
}

/// Goal adjustments against the local database, one commit per call.
pub struct SqliteGoals<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteGoals<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl GoalAdjuster for SqliteGoals<'_> {
    fn add_to_goal(&mut self, goal_id: GoalId, amount: Decimal) -> Result<SavingsGoal> {
        add_to_goal(self.conn, goal_id, amount)
    }

    fn subtract_from_goal(&mut self, goal_id: GoalId, amount: Decimal) -> Result<SavingsGoal> {
        subtract_from_goal(self.conn, goal_id, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{apply_plan, AllocationMode, AllocationPlan};
    use crate::db::test_db;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_create_goal_autocompletes() {
        let (_dir, conn) = test_db();
        let open = create_goal(&conn, "Отпуск", d("100000"), d("0"), None).unwrap();
        let done = create_goal(&conn, "Телефон", d("50000"), d("50000"), None).unwrap();
        assert!(!open.is_completed);
        assert!(done.is_completed);
        assert_eq!(list_goals(&conn, false).unwrap().len(), 1);
        assert_eq!(list_goals(&conn, true).unwrap().len(), 2);
    }

    #[test]
    fn test_list_goals_undated_first() {
        let (_dir, conn) = test_db();
        let dated = NaiveDate::from_ymd_opt(2025, 6, 1);
        create_goal(&conn, "Машина", d("1000"), d("0"), dated).unwrap();
        create_goal(&conn, "Подушка", d("1000"), d("0"), None).unwrap();
        let names: Vec<String> = list_goals(&conn, false).unwrap().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["Подушка", "Машина"]);
    }

    #[test]
    fn test_add_reaches_target() {
        let (_dir, conn) = test_db();
        let goal = create_goal(&conn, "Отпуск", d("1000"), d("900"), None).unwrap();
        let goal = add_to_goal(&conn, goal.id, d("100")).unwrap();
        assert_eq!(goal.current_amount, d("1000"));
        assert!(goal.is_completed);
    }

    #[test]
    fn test_add_overflow_leaves_goal_unchanged() {
        let (_dir, conn) = test_db();
        let goal = create_goal(&conn, "Всё", Decimal::MAX, d("1"), None).unwrap();
        let err = add_to_goal(&conn, goal.id, Decimal::MAX).unwrap_err();
        assert!(matches!(err, KopilkaError::Invalid(_)));
        assert_eq!(get_goal(&conn, goal.id).unwrap().current_amount, d("1"));
    }

    #[test]
    fn test_subtract_reopens_and_guards_balance() {
        let (_dir, conn) = test_db();
        let goal = create_goal(&conn, "Отпуск", d("1000"), d("1000"), None).unwrap();
        let after = subtract_from_goal(&conn, goal.id, d("1")).unwrap();
        assert!(!after.is_completed);
        let err = subtract_from_goal(&conn, goal.id, d("5000")).unwrap_err();
        assert!(matches!(err, KopilkaError::InsufficientFunds { .. }));
        assert_eq!(get_goal(&conn, goal.id).unwrap().current_amount, d("999"));
    }

    #[test]
    fn test_rejects_non_positive_and_unknown() {
        let (_dir, conn) = test_db();
        let goal = create_goal(&conn, "Отпуск", d("1000"), d("0"), None).unwrap();
        assert!(add_to_goal(&conn, goal.id, Decimal::ZERO).is_err());
        assert!(matches!(add_to_goal(&conn, 404, d("1")), Err(KopilkaError::UnknownGoal(404))));
        assert!(matches!(delete_goal(&conn, 404), Err(KopilkaError::UnknownGoal(404))));
    }

    #[test]
    fn test_partial_apply_keeps_earlier_adjustments() {
        let (_dir, conn) = test_db();
        let a = create_goal(&conn, "A", d("1000"), d("300"), None).unwrap();
        let b = create_goal(&conn, "B", d("1000"), d("50"), None).unwrap();
        let plan: AllocationPlan = [(a.id, d("100")), (b.id, d("100"))].into_iter().collect();
        let mut goals = SqliteGoals::new(&conn);
        let failure = apply_plan(&plan, AllocationMode::Deduction, &mut goals).unwrap_err();
        assert_eq!(failure.failed_goal, b.id);
        assert_eq!(get_goal(&conn, a.id).unwrap().current_amount, d("200"));
        assert_eq!(get_goal(&conn, b.id).unwrap().current_amount, d("50"));
    }
}
