pub mod accounts;
pub mod allocate;
pub mod budgets;
pub mod goals;
pub mod import;
pub mod init;
pub mod report;
pub mod settings;
pub mod transactions;

use chrono::Datelike;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::db::get_connection;
use crate::error::{KopilkaError, Result};
use crate::models::GoalId;
use crate::settings::db_path;
use crate::validation::parse_amount;

pub(crate) fn parse_month_opt(month: &Option<String>) -> (Option<i32>, Option<u32>) {
    if let Some(m) = month {
        let parts: Vec<&str> = m.split('-').collect();
        if parts.len() == 2 {
            let year = parts[0].parse().ok();
            let month = parts[1].parse().ok();
            return (year, month);
        }
    }
    (None, None)
}

/// `--month YYYY-MM`, or the current month when absent.
pub(crate) fn month_or_current(month: &Option<String>) -> Result<(i32, u32)> {
    match (month, parse_month_opt(month)) {
        (None, _) => {
            let today = chrono::Local::now().date_naive();
            Ok((today.year(), today.month()))
        }
        (Some(_), (Some(y), Some(m))) if (1..=12).contains(&m) => Ok((y, m)),
        (Some(raw), _) => Err(KopilkaError::Invalid(format!("--month: expected YYYY-MM, got '{raw}'"))),
    }
}

/// Open the configured database, refusing to create one outside `init`.
pub(crate) fn open_db() -> Result<Connection> {
    let path = db_path();
    if !path.exists() {
        return Err(KopilkaError::Settings(format!(
            "No database found at {}\nRun `kopilka init` to create one.",
            path.display()
        )));
    }
    get_connection(&path)
}

/// Money argument: accepts `1500`, `1 500,50`, `99 ₽`.
pub(crate) fn parse_money(raw: &str) -> std::result::Result<Decimal, String> {
    parse_amount(raw).ok_or_else(|| format!("invalid amount '{raw}'"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalAmount {
    pub goal_id: GoalId,
    pub amount: Decimal,
}

/// `ID=AMOUNT`, e.g. `3=1500` or `3=1 500,50`.
pub(crate) fn parse_goal_amount(raw: &str) -> std::result::Result<GoalAmount, String> {
    let (id, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=AMOUNT, got '{raw}'"))?;
    let goal_id = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid goal id '{}'", id.trim()))?;
    Ok(GoalAmount {
        goal_id,
        amount: parse_money(amount)?,
    })
}

#[derive(Parser)]
#[command(name = "kopilka", version, about = "Personal finance ledger with savings goals.")]
pub struct Cli {
    /// Log debug output to stderr (overrides KOPILKA_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for kopilka data (default: ~/Documents/kopilka)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Import a parsed upload batch (JSON or CSV), flagging likely duplicates.
    Import {
        /// Path to the batch file
        file: String,
        /// Account name to book the transactions against
        #[arg(long)]
        account: Option<String>,
        /// Batch format: json, csv (default: from the file extension)
        #[arg(long)]
        format: Option<String>,
        /// Drop candidate N (as numbered in the preview); repeatable
        #[arg(long = "exclude")]
        exclude: Vec<usize>,
        /// Drop every flagged candidate
        #[arg(long = "exclude-flagged")]
        exclude_flagged: bool,
        /// Show the preview without saving anything
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// List or add transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Manage savings goals.
    Goals {
        #[command(subcommand)]
        command: GoalsCommands,
    },
    /// Monthly spending limits per category.
    Budgets {
        #[command(subcommand)]
        command: BudgetsCommands,
    },
    /// Distribute savings across goals.
    Distribute {
        /// Amount to distribute (default: this month's positive savings)
        #[arg(long, value_parser = parse_money)]
        pool: Option<Decimal>,
        /// Month the default pool is computed for: YYYY-MM
        #[arg(long)]
        month: Option<String>,
        /// Start from an even split capped by each goal's room
        #[arg(long)]
        auto: bool,
        /// Set a goal's share: ID=AMOUNT; repeatable
        #[arg(long = "goal", value_parser = parse_goal_amount)]
        goals: Vec<GoalAmount>,
        /// Validate and show the plan without applying it
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Cover expenses by withdrawing from goals.
    Deduct {
        /// Amount to deduct (default: this month's expenses)
        #[arg(long, value_parser = parse_money)]
        pool: Option<Decimal>,
        /// Month the default pool is computed for: YYYY-MM
        #[arg(long)]
        month: Option<String>,
        /// Take AMOUNT from goal ID; repeatable
        #[arg(long = "goal", value_parser = parse_goal_amount)]
        goals: Vec<GoalAmount>,
        /// Validate and show the plan without applying it
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Show or change settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account name, e.g. 'Тинькофф'
        name: String,
        /// Account type: cash, card, savings, credit_card
        #[arg(long = "type", default_value = "card")]
        account_type: String,
        /// Currency code
        #[arg(long)]
        currency: Option<String>,
        /// Opening balance
        #[arg(long, allow_hyphen_values = true)]
        balance: Option<String>,
    },
    /// List accounts.
    List {
        /// Include inactive accounts
        #[arg(long)]
        all: bool,
    },
    /// Total balance across active accounts.
    Balance,
    /// Correct an account balance by a signed amount.
    Adjust {
        /// Account name
        name: String,
        /// Signed amount, e.g. 500 or -120,50
        #[arg(allow_hyphen_values = true)]
        delta: String,
    },
    /// Rename, retype or (de)activate an account.
    Update {
        /// Current account name
        name: String,
        /// New name
        #[arg(long = "rename")]
        new_name: Option<String>,
        /// Account type: cash, card, savings, credit_card
        #[arg(long = "type")]
        account_type: Option<String>,
        #[arg(long)]
        currency: Option<String>,
        /// Mark the account active (true) or inactive (false)
        #[arg(long)]
        active: Option<bool>,
    },
    /// Delete an account, or deactivate it if transactions use it.
    Remove {
        /// Account name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum BudgetsCommands {
    /// Set a monthly limit for a category.
    Add {
        category: String,
        #[arg(long, value_parser = parse_money)]
        limit: Decimal,
        /// Warn at this percent of the limit (default: 80)
        #[arg(long, value_parser = parse_money)]
        threshold: Option<Decimal>,
    },
    /// List budgets.
    List,
    /// Change a budget's limit or threshold.
    Update {
        id: i64,
        #[arg(long, value_parser = parse_money)]
        limit: Option<Decimal>,
        #[arg(long, value_parser = parse_money)]
        threshold: Option<Decimal>,
    },
    /// Delete a budget.
    Delete { id: i64 },
    /// Spending against each budget for a month.
    Status {
        /// Month: YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// List transactions, newest first.
    List {
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Record a transaction by hand.
    Add {
        description: String,
        #[arg(long)]
        amount: String,
        /// Date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// income or expense
        #[arg(long = "type", default_value = "expense")]
        transaction_type: String,
        /// Account name
        #[arg(long)]
        account: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum GoalsCommands {
    /// Create a savings goal.
    Add {
        name: String,
        #[arg(long)]
        target: String,
        /// Amount already saved
        #[arg(long)]
        current: Option<String>,
        /// Target date: YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// List goals.
    List {
        /// Include completed goals
        #[arg(long)]
        all: bool,
    },
    /// Put money into a goal.
    Deposit { id: GoalId, amount: String },
    /// Take money out of a goal.
    Withdraw { id: GoalId, amount: String },
    /// Delete a goal.
    Delete { id: GoalId },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Income and expenses for each month of a year.
    Monthly {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Savings against the monthly goal.
    Savings {
        /// Month: YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print current settings.
    Show,
    /// Set one of: monthly_income, monthly_savings_goal, currency.
    Set { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_goal_amount() {
        let parsed = parse_goal_amount("3=1 500,50").unwrap();
        assert_eq!(parsed.goal_id, 3);
        assert_eq!(parsed.amount, Decimal::new(150050, 2));
        assert!(parse_goal_amount("3").is_err());
        assert!(parse_goal_amount("x=10").is_err());
        assert!(parse_goal_amount("3=abc").is_err());
    }

    #[test]
    fn test_parse_month_opt() {
        assert_eq!(parse_month_opt(&Some("2024-05".to_string())), (Some(2024), Some(5)));
        assert_eq!(parse_month_opt(&Some("May".to_string())), (None, None));
        assert_eq!(parse_month_opt(&None), (None, None));
    }

    #[test]
    fn test_month_or_current() {
        assert_eq!(month_or_current(&Some("2024-05".to_string())).unwrap(), (2024, 5));
        assert!(month_or_current(&Some("2024-13".to_string())).is_err());
        assert!(month_or_current(&Some("May".to_string())).is_err());
        let (_, month) = month_or_current(&None).unwrap();
        assert!((1..=12).contains(&month));
    }

    #[test]
    fn test_cli_parses_account_update() {
        let cli = Cli::try_parse_from(["kopilka", "accounts", "update", "Карта", "--rename", "Сбер", "--active", "false"])
            .unwrap();
        let Commands::Accounts {
            command: AccountsCommands::Update { name, new_name, active, account_type, .. },
        } = cli.command
        else {
            panic!("expected accounts update");
        };
        assert_eq!(name, "Карта");
        assert_eq!(new_name.as_deref(), Some("Сбер"));
        assert_eq!(active, Some(false));
        assert_eq!(account_type, None);
    }

    #[test]
    fn test_cli_parses_distribute() {
        let cli = Cli::try_parse_from([
            "kopilka", "distribute", "--pool", "3000", "--goal", "1=1000", "--goal", "2=1500", "--dry-run",
        ])
        .unwrap();
        let Commands::Distribute { pool, goals, dry_run, auto, .. } = cli.command else {
            panic!("expected distribute");
        };
        assert_eq!(pool, Some(Decimal::new(3000, 0)));
        assert_eq!(goals.len(), 2);
        assert!(dry_run);
        assert!(!auto);
    }
}
