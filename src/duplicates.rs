use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt::Display;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{ParsedTransaction, Transaction, TransactionType};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Tolerances used when comparing a candidate against stored transactions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// Amounts closer than this are the same amount.
    pub amount_tolerance: Decimal,
    /// Inclusive window, in days, for bank posting-date drift.
    pub date_window_days: i64,
    /// How many matches a flag carries for display.
    pub display_limit: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            amount_tolerance: Decimal::new(1, 2),
            date_window_days: 1,
            display_limit: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Comparable records
// ---------------------------------------------------------------------------

/// Anything shaped like a transaction for similarity purposes.
pub trait TransactionLike {
    fn amount(&self) -> Decimal;
    fn description(&self) -> &str;
    fn transaction_type(&self) -> TransactionType;
    fn date(&self) -> NaiveDate;
}

impl TransactionLike for ParsedTransaction {
    fn amount(&self) -> Decimal {
        self.amount
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl TransactionLike for Transaction {
    fn amount(&self) -> Decimal {
        self.amount
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }
    fn date(&self) -> NaiveDate {
        self.date
    }
}

fn normalize_description(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Case-insensitive equality, or one description contained in the other.
/// An empty description only matches another empty one.
fn descriptions_match(a: &str, b: &str) -> bool {
    let a = normalize_description(a);
    let b = normalize_description(b);
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

pub fn is_similar<A, B>(a: &A, b: &B, policy: &MatchPolicy) -> bool
where
    A: TransactionLike + ?Sized,
    B: TransactionLike + ?Sized,
{
    a.transaction_type() == b.transaction_type()
        && (a.amount() - b.amount()).abs() < policy.amount_tolerance
        && (a.date() - b.date()).num_days().abs() <= policy.date_window_days
        && descriptions_match(a.description(), b.description())
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// Display summary of a stored transaction that resembles a candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarTransaction {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub category: Option<String>,
}

impl From<&Transaction> for SimilarTransaction {
    fn from(t: &Transaction) -> Self {
        Self {
            id: t.id,
            date: t.date,
            amount: t.amount,
            description: t.description.clone(),
            category: t.category.clone(),
        }
    }
}

/// A candidate at `index` that looks like a re-import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateFlag {
    pub index: usize,
    /// Total number of matches, even when more than are listed.
    pub similar_count: usize,
    /// Closest date first, then most recent.
    pub similar_transactions: Vec<SimilarTransaction>,
}

/// Flag every candidate that resembles at least one stored transaction.
/// Candidates without matches get no flag at all.
pub fn detect_duplicates<C: TransactionLike>(
    candidates: &[C],
    existing: &[Transaction],
    policy: &MatchPolicy,
) -> Vec<DuplicateFlag> {
    let mut flags = Vec::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let mut matches: Vec<&Transaction> = existing
            .iter()
            .filter(|e| is_similar(candidate, *e, policy))
            .collect();
        if matches.is_empty() {
            continue;
        }
        let similar_count = matches.len();
        matches.sort_by_key(|e| {
            (
                (e.date - candidate.date()).num_days().abs(),
                Reverse(e.date),
                Reverse(e.id),
            )
        });
        tracing::debug!(index, similar_count, "candidate resembles stored transactions");
        flags.push(DuplicateFlag {
            index,
            similar_count,
            similar_transactions: matches
                .into_iter()
                .take(policy.display_limit)
                .map(SimilarTransaction::from)
                .collect(),
        });
    }
    flags
}

// ---------------------------------------------------------------------------
// Advisory check
// ---------------------------------------------------------------------------

/// Outcome of checking a batch. Duplicate detection is advisory: when stored
/// transactions cannot be loaded the batch is simply `Unknown`.
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateCheck {
    Checked(Vec<DuplicateFlag>),
    Unknown,
}

impl DuplicateCheck {
    /// Flags to show; `Unknown` shows none.
    pub fn flags(&self) -> &[DuplicateFlag] {
        match self {
            Self::Checked(flags) => flags,
            Self::Unknown => &[],
        }
    }
}

pub fn check_batch<C, E>(
    candidates: &[C],
    existing: Result<Vec<Transaction>, E>,
    policy: &MatchPolicy,
) -> DuplicateCheck
where
    C: TransactionLike,
    E: Display,
{
    match existing {
        Ok(existing) => DuplicateCheck::Checked(detect_duplicates(candidates, &existing, policy)),
        Err(e) => {
            tracing::warn!(error = %e, "could not load stored transactions, duplicate status unknown");
            DuplicateCheck::Unknown
        }
    }
}

// ---------------------------------------------------------------------------
// Batch filters
// ---------------------------------------------------------------------------

/// Drop the entry at `index`; out-of-range indices leave the batch unchanged.
pub fn exclude_candidate<T: Clone>(batch: &[T], index: usize) -> Vec<T> {
    batch
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, item)| item.clone())
        .collect()
}

/// Drop every flagged entry, keeping the rest in order.
pub fn exclude_all_flagged<T: Clone>(batch: &[T], flags: &[DuplicateFlag]) -> Vec<T> {
    let flagged: HashSet<usize> = flags.iter().map(|f| f.index).collect();
    batch
        .iter()
        .enumerate()
        .filter(|(i, _)| !flagged.contains(i))
        .map(|(_, item)| item.clone())
        .collect()
}
