use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use super::open_db;
use crate::duplicates::{check_batch, exclude_all_flagged, exclude_candidate, DuplicateCheck, MatchPolicy};
use crate::error::{KopilkaError, Result};
use crate::fmt::money;
use crate::importer::read_batch;
use crate::ledger::{create_transaction, find_account, load_existing};
use crate::models::ParsedTransaction;

pub struct ImportOptions<'a> {
    pub account: Option<&'a str>,
    pub format: Option<&'a str>,
    /// 1-based candidate numbers as shown in the preview.
    pub exclude: &'a [usize],
    pub exclude_flagged: bool,
    pub dry_run: bool,
}

pub fn run(file: &str, opts: &ImportOptions) -> Result<()> {
    let file_path = PathBuf::from(file);
    let batch = read_batch(&file_path, opts.format)?;

    for rejected in &batch.rejected {
        println!("{} row {}: {}", "Skipped".yellow(), rejected.position, rejected.reason);
    }
    if batch.candidates.is_empty() {
        println!("Nothing to import.");
        return Ok(());
    }

    let conn = open_db()?;
    let account_id = match opts.account {
        Some(name) => Some(find_account(&conn, name)?.id),
        None => None,
    };

    let check = check_batch(&batch.candidates, load_existing(&conn), &MatchPolicy::default());
    print_preview(&batch.candidates, &check);

    let mut kept: Vec<(usize, ParsedTransaction)> = batch.candidates.iter().cloned().enumerate().collect();
    if opts.exclude_flagged {
        kept = exclude_all_flagged(&kept, check.flags());
    }
    for &number in opts.exclude {
        if number == 0 || number > batch.candidates.len() {
            return Err(KopilkaError::Invalid(format!(
                "--exclude {number}: batch has {} candidates",
                batch.candidates.len()
            )));
        }
        if let Some(pos) = kept.iter().position(|(index, _)| *index == number - 1) {
            kept = exclude_candidate(&kept, pos);
        }
    }
    let excluded = batch.candidates.len() - kept.len();

    if opts.dry_run {
        println!("Dry run: {} would be saved, {excluded} excluded", kept.len());
        return Ok(());
    }

    let mut saved = 0usize;
    let mut failed = 0usize;
    for (index, candidate) in &kept {
        match create_transaction(&conn, candidate, account_id) {
            Ok(_) => saved += 1,
            Err(e) => {
                failed += 1;
                tracing::error!(candidate = index + 1, error = %e, "could not save transaction");
                eprintln!("{} #{}: {e}", "Not saved".red(), index + 1);
            }
        }
    }

    println!("{saved} saved, {excluded} excluded, {failed} failed");
    Ok(())
}

fn print_preview(candidates: &[ParsedTransaction], check: &DuplicateCheck) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Description", "Category", "Type", "Amount", "Duplicates"]);
    for (index, txn) in candidates.iter().enumerate() {
        let flag = check.flags().iter().find(|f| f.index == index);
        let marker = match (check, flag) {
            (DuplicateCheck::Unknown, _) => "?".dimmed().to_string(),
            (_, Some(flag)) => format!("{} similar", flag.similar_count).yellow().bold().to_string(),
            (_, None) => String::new(),
        };
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(txn.date),
            Cell::new(&txn.description),
            Cell::new(txn.category.as_deref().unwrap_or("")),
            Cell::new(txn.transaction_type),
            Cell::new(money(txn.amount)),
            Cell::new(marker),
        ]);
    }
    println!("Batch\n{table}");

    if matches!(check, DuplicateCheck::Unknown) {
        println!("{}", "Could not check for duplicates; saving is still allowed.".yellow());
        return;
    }

    for flag in check.flags() {
        let mut similar = Table::new();
        similar.set_header(vec!["ID", "Date", "Description", "Category", "Amount"]);
        for existing in &flag.similar_transactions {
            similar.add_row(vec![
                Cell::new(existing.id),
                Cell::new(existing.date),
                Cell::new(&existing.description),
                Cell::new(existing.category.as_deref().unwrap_or("")),
                Cell::new(money(existing.amount)),
            ]);
        }
        let more = flag.similar_count.saturating_sub(flag.similar_transactions.len());
        let suffix = if more > 0 { format!(" (+{more} more)") } else { String::new() };
        println!("#{} looks like{suffix}\n{similar}", flag.index + 1);
    }
}
