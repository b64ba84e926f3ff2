use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;
use rust_decimal::Decimal;

use super::{month_or_current, open_db, GoalAmount};
use crate::allocation::{validate_manual_plan, AllocationMode, AllocationPlan, PoolState, ValidationResult};
use crate::dialog::{AllocationDialog, DialogState};
use crate::error::{KopilkaError, Result};
use crate::fmt::money;
use crate::goals::{list_goals, SqliteGoals};
use crate::reports::monthly_savings_status;
use crate::settings::load_settings;

pub struct AllocateOptions<'a> {
    pub pool: Option<Decimal>,
    pub month: Option<String>,
    pub auto: bool,
    pub goals: &'a [GoalAmount],
    pub dry_run: bool,
}

pub fn distribute(opts: &AllocateOptions) -> Result<()> {
    run(AllocationMode::Distribution, opts)
}

pub fn deduct(opts: &AllocateOptions) -> Result<()> {
    run(AllocationMode::Deduction, opts)
}

/// This month's positive savings for distribution, or its expenses for deduction.
fn default_pool(conn: &Connection, mode: AllocationMode, month: &Option<String>) -> Result<Decimal> {
    let (year, month) = month_or_current(month)?;
    let status = monthly_savings_status(conn, year, month, &load_settings())?;
    Ok(match mode {
        AllocationMode::Distribution => status.distributable(),
        AllocationMode::Deduction => status.expenses,
    })
}

fn run(mode: AllocationMode, opts: &AllocateOptions) -> Result<()> {
    let conn = open_db()?;
    let pool = match opts.pool {
        Some(pool) => pool,
        None => default_pool(&conn, mode, &opts.month)?,
    };
    if pool <= Decimal::ZERO {
        println!("Nothing to allocate: pool is {}", money(pool));
        return Ok(());
    }

    let mut dialog = AllocationDialog::new(mode);
    dialog.open(pool, &list_goals(&conn, false)?)?;
    if dialog.goals().is_empty() {
        println!("No goals eligible for {mode}.");
        dialog.skip()?;
        return Ok(());
    }
    if opts.auto {
        dialog.auto_distribute()?;
    }
    for entry in opts.goals {
        dialog.set_amount(entry.goal_id, entry.amount)?;
    }

    let planned = dialog.plan().map_or(0, AllocationPlan::len);
    if opts.dry_run {
        if let Some(plan) = dialog.plan() {
            let check = validate_manual_plan(plan, pool, dialog.goals(), mode);
            print_plan(&dialog, &check);
        }
        dialog.skip()?;
        println!("Dry run: nothing applied ({planned} goals planned).");
        return Ok(());
    }
    if dialog.plan().map_or(true, AllocationPlan::is_empty) {
        return Err(KopilkaError::Invalid(
            "nothing allocated; use --auto or --goal ID=AMOUNT".to_string(),
        ));
    }

    let check = dialog.submit()?;
    print_plan(&dialog, &check);
    if !check.can_submit() {
        let over: Vec<String> = check.invalid_goals().map(|g| format!("#{}", g.goal_id)).collect();
        let reason = if !over.is_empty() {
            format!("goal {} over capacity", over.join(", "))
        } else if check.pool_state == PoolState::Over {
            format!("plan exceeds the pool by {}", money(-check.remaining()))
        } else {
            "nothing allocated; use --auto or --goal ID=AMOUNT".to_string()
        };
        return Err(KopilkaError::Invalid(reason));
    }

    let mut adjuster = SqliteGoals::new(&conn);
    dialog.apply(&mut adjuster)?;
    let state = dialog.state();
    tracing::debug!(state = state.name(), terminal = state.is_terminal(), "allocation finished");
    match state {
        DialogState::Applied(report) => {
            println!("{} {} across {} goals", "Applied".green().bold(), money(report.total()), report.applied.len());
            Ok(())
        }
        DialogState::Failed(failure) => {
            for adjustment in &failure.applied {
                println!("  applied {} to {}", money(adjustment.amount), adjustment.goal.name);
            }
            if !failure.not_attempted.is_empty() {
                let ids: Vec<String> = failure.not_attempted.iter().map(|id| format!("#{id}")).collect();
                println!("  not attempted: {}", ids.join(", "));
            }
            Err(KopilkaError::Other(failure.to_string()))
        }
        other => Err(KopilkaError::Other(format!("allocation ended in state {}", other.name()))),
    }
}

fn print_plan(dialog: &AllocationDialog, check: &ValidationResult) {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Goal", "Saved", "Target", "Capacity", "Amount"]);
    let plan = dialog.plan();
    for goal in dialog.goals() {
        let valid = check.goals.iter().find(|c| c.goal_id == goal.id).map_or(true, |c| c.is_valid());
        let amount = match plan.and_then(|p| p.get(goal.id)) {
            Some(amount) if !valid => money(amount).red().bold().to_string(),
            Some(amount) => money(amount),
            None => String::new(),
        };
        table.add_row(vec![
            Cell::new(goal.id),
            Cell::new(&goal.name),
            Cell::new(money(goal.current_amount)),
            Cell::new(money(goal.target_amount)),
            Cell::new(money(dialog.mode().capacity(goal))),
            Cell::new(amount),
        ]);
    }

    let remaining = match check.pool_state {
        PoolState::Over => money(dialog.remaining()).red().bold().to_string(),
        PoolState::Exact => money(dialog.remaining()).green().to_string(),
        PoolState::Under => money(dialog.remaining()),
    };
    println!("{} plan\n{table}", dialog.mode());
    println!(
        "Pool: {}  Allocated: {}  Remaining: {remaining}",
        money(dialog.pool()),
        money(dialog.total_allocated())
    );
}
