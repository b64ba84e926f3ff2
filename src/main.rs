mod allocation;
mod budgets;
mod categorizer;
mod cli;
mod db;
mod dialog;
mod duplicates;
mod error;
mod fmt;
mod goals;
mod importer;
mod ledger;
mod models;
mod reports;
mod settings;
mod validation;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::allocate::AllocateOptions;
use cli::import::ImportOptions;
use cli::transactions::NewTransaction;
use cli::{
    AccountsCommands, BudgetsCommands, Cli, Commands, GoalsCommands, ReportCommands, SettingsCommands, TransactionsCommands,
};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("kopilka=debug")
    } else {
        EnvFilter::try_from_env("KOPILKA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                account_type,
                currency,
                balance,
            } => cli::accounts::add(&name, &account_type, currency.as_deref(), balance.as_deref()),
            AccountsCommands::List { all } => cli::accounts::list(all),
            AccountsCommands::Balance => cli::accounts::balance(),
            AccountsCommands::Adjust { name, delta } => cli::accounts::adjust(&name, &delta),
            AccountsCommands::Update {
                name,
                new_name,
                account_type,
                currency,
                active,
            } => cli::accounts::update(
                &name,
                new_name.as_deref(),
                account_type.as_deref(),
                currency.as_deref(),
                active,
            ),
            AccountsCommands::Remove { name } => cli::accounts::remove(&name),
        },
        Commands::Import {
            file,
            account,
            format,
            exclude,
            exclude_flagged,
            dry_run,
        } => cli::import::run(
            &file,
            &ImportOptions {
                account: account.as_deref(),
                format: format.as_deref(),
                exclude: &exclude,
                exclude_flagged,
                dry_run,
            },
        ),
        Commands::Transactions { command } => match command {
            TransactionsCommands::List {
                from_date,
                to_date,
                category,
                limit,
            } => cli::transactions::list(from_date.as_deref(), to_date.as_deref(), category.as_deref(), limit),
            TransactionsCommands::Add {
                description,
                amount,
                date,
                category,
                transaction_type,
                account,
            } => cli::transactions::add(&NewTransaction {
                description: &description,
                amount: &amount,
                date: date.as_deref(),
                category: category.as_deref(),
                transaction_type: &transaction_type,
                account: account.as_deref(),
            }),
        },
        Commands::Goals { command } => match command {
            GoalsCommands::Add {
                name,
                target,
                current,
                date,
            } => cli::goals::add(&name, &target, current.as_deref(), date.as_deref()),
            GoalsCommands::List { all } => cli::goals::list(all),
            GoalsCommands::Deposit { id, amount } => cli::goals::deposit(id, &amount),
            GoalsCommands::Withdraw { id, amount } => cli::goals::withdraw(id, &amount),
            GoalsCommands::Delete { id } => cli::goals::delete(id),
        },
        Commands::Budgets { command } => match command {
            BudgetsCommands::Add {
                category,
                limit,
                threshold,
            } => cli::budgets::add(&category, limit, threshold),
            BudgetsCommands::List => cli::budgets::list(),
            BudgetsCommands::Update { id, limit, threshold } => cli::budgets::update(id, limit, threshold),
            BudgetsCommands::Delete { id } => cli::budgets::delete(id),
            BudgetsCommands::Status { month } => cli::budgets::status(month),
        },
        Commands::Distribute {
            pool,
            month,
            auto,
            goals,
            dry_run,
        } => cli::allocate::distribute(&AllocateOptions {
            pool,
            month,
            auto,
            goals: &goals,
            dry_run,
        }),
        Commands::Deduct {
            pool,
            month,
            goals,
            dry_run,
        } => cli::allocate::deduct(&AllocateOptions {
            pool,
            month,
            auto: false,
            goals: &goals,
            dry_run,
        }),
        Commands::Report { command } => match command {
            ReportCommands::Monthly { year } => cli::report::monthly(year),
            ReportCommands::Savings { month } => cli::report::savings(month),
        },
        Commands::Settings { command } => match command {
            SettingsCommands::Show => cli::settings::show(),
            SettingsCommands::Set { key, value } => cli::settings::set(&key, &value),
        },
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
