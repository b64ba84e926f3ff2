use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{KopilkaError, Result};
use crate::fmt::money;
use crate::models::{GoalId, SavingsGoal};

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Which way money moves between the pool and the goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode {
    /// Monthly surplus goes into goals.
    Distribution,
    /// Expenses are covered out of goals.
    Deduction,
}

impl AllocationMode {
    /// The most a single goal can take in this mode.
    pub fn capacity(&self, goal: &SavingsGoal) -> Decimal {
        match self {
            Self::Distribution => goal.room(),
            Self::Deduction => goal.current_amount.max(Decimal::ZERO),
        }
    }

    /// Goals offered in the dialog for this mode.
    pub fn is_eligible(&self, goal: &SavingsGoal) -> bool {
        match self {
            Self::Distribution => !goal.is_completed,
            Self::Deduction => !goal.is_completed && goal.current_amount > Decimal::ZERO,
        }
    }
}

impl fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Distribution => f.write_str("distribution"),
            Self::Deduction => f.write_str("deduction"),
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Proposed amount per goal, iterated in goal-id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationPlan {
    amounts: BTreeMap<GoalId, Decimal>,
}

impl AllocationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, goal_id: GoalId, amount: Decimal) {
        self.amounts.insert(goal_id, amount);
    }

    pub fn get(&self, goal_id: GoalId) -> Option<Decimal> {
        self.amounts.get(&goal_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GoalId, Decimal)> + '_ {
        self.amounts.iter().map(|(id, amount)| (*id, *amount))
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    /// Sum of all amounts, or `None` if it does not fit in a `Decimal`.
    pub fn checked_total(&self) -> Option<Decimal> {
        self.amounts
            .values()
            .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(*amount))
    }

    /// Sum of all amounts, saturating at the `Decimal` bounds.
    pub fn total(&self) -> Decimal {
        self.amounts
            .values()
            .fold(Decimal::ZERO, |acc, amount| acc.saturating_add(*amount))
    }

    /// What is left of `pool` after this plan; negative when over-allocated.
    pub fn remaining(&self, pool: Decimal) -> Decimal {
        pool.saturating_sub(self.total())
    }
}

impl FromIterator<(GoalId, Decimal)> for AllocationPlan {
    fn from_iter<I: IntoIterator<Item = (GoalId, Decimal)>>(iter: I) -> Self {
        Self {
            amounts: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Automatic split
// ---------------------------------------------------------------------------

/// Split `pool` evenly over open goals, each capped at its room.
///
/// Single pass: whatever a capped goal could not take is left in the pool and
/// is not handed to the others. Proposals are cut to kopecks (toward zero) and
/// goals whose proposal is zero are left out of the plan.
pub fn auto_distribute(pool: Decimal, goals: &[SavingsGoal]) -> AllocationPlan {
    let eligible: Vec<&SavingsGoal> = goals.iter().filter(|g| !g.is_completed).collect();
    if eligible.is_empty() || pool <= Decimal::ZERO {
        return AllocationPlan::new();
    }
    let share = pool / Decimal::from(eligible.len());

    let mut plan = AllocationPlan::new();
    for goal in eligible {
        let amount = share
            .min(goal.room())
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);
        tracing::debug!(goal_id = goal.id, %share, room = %goal.room(), %amount, "auto share");
        if amount > Decimal::ZERO {
            plan.set(goal.id, amount);
        }
    }
    plan
}

// ---------------------------------------------------------------------------
// Manual plan validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GoalCheck {
    pub goal_id: GoalId,
    pub amount: Decimal,
    /// Zero for goals that are not in the snapshot.
    pub capacity: Decimal,
    pub is_negative: bool,
    pub exceeds_capacity: bool,
}

impl GoalCheck {
    pub fn is_valid(&self) -> bool {
        !self.is_negative && !self.exceeds_capacity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Under,
    Exact,
    Over,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub goals: Vec<GoalCheck>,
    pub total: Decimal,
    pub pool: Decimal,
    pub pool_state: PoolState,
}

impl ValidationResult {
    /// Every goal within its capacity and the total within the pool.
    pub fn is_valid(&self) -> bool {
        self.pool_state != PoolState::Over && self.goals.iter().all(GoalCheck::is_valid)
    }

    /// Valid and actually moves money.
    pub fn can_submit(&self) -> bool {
        self.is_valid() && self.total > Decimal::ZERO
    }

    pub fn remaining(&self) -> Decimal {
        self.pool.saturating_sub(self.total)
    }

    pub fn invalid_goals(&self) -> impl Iterator<Item = &GoalCheck> {
        self.goals.iter().filter(|g| !g.is_valid())
    }
}

/// Check a hand-edited plan against the goal snapshot it was built from.
/// Never fails; the result says what is wrong.
pub fn validate_manual_plan(
    plan: &AllocationPlan,
    pool: Decimal,
    goals: &[SavingsGoal],
    mode: AllocationMode,
) -> ValidationResult {
    let checks: Vec<GoalCheck> = plan
        .iter()
        .map(|(goal_id, amount)| {
            let capacity = goals
                .iter()
                .find(|g| g.id == goal_id)
                .map(|g| mode.capacity(g))
                .unwrap_or(Decimal::ZERO);
            GoalCheck {
                goal_id,
                amount,
                capacity,
                is_negative: amount < Decimal::ZERO,
                exceeds_capacity: amount > capacity,
            }
        })
        .collect();

    // A total that overflows is over any pool.
    let (total, pool_state) = match plan.checked_total() {
        Some(total) => {
            let state = match total.cmp(&pool) {
                std::cmp::Ordering::Less => PoolState::Under,
                std::cmp::Ordering::Equal => PoolState::Exact,
                std::cmp::Ordering::Greater => PoolState::Over,
            };
            (total, state)
        }
        None => (plan.total(), PoolState::Over),
    };

    ValidationResult {
        goals: checks,
        total,
        pool,
        pool_state,
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// The goal-mutation operations owned by whatever persists goals.
/// Each call takes effect on its own; there is no enclosing transaction.
pub trait GoalAdjuster {
    fn add_to_goal(&mut self, goal_id: GoalId, amount: Decimal) -> Result<SavingsGoal>;
    fn subtract_from_goal(&mut self, goal_id: GoalId, amount: Decimal) -> Result<SavingsGoal>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAdjustment {
    pub goal_id: GoalId,
    pub amount: Decimal,
    /// Goal state returned by the adjuster.
    pub goal: SavingsGoal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    pub mode: AllocationMode,
    pub applied: Vec<AppliedAdjustment>,
}

fn sum_applied(applied: &[AppliedAdjustment]) -> Decimal {
    applied
        .iter()
        .fold(Decimal::ZERO, |acc, a| acc.saturating_add(a.amount))
}

impl ApplyReport {
    pub fn total(&self) -> Decimal {
        sum_applied(&self.applied)
    }
}

/// A plan that stopped part way. Earlier adjustments stay applied.
#[derive(Debug)]
pub struct ApplyFailure {
    pub mode: AllocationMode,
    pub applied: Vec<AppliedAdjustment>,
    pub failed_goal: GoalId,
    pub attempted_amount: Decimal,
    /// Goals that were never attempted.
    pub not_attempted: Vec<GoalId>,
    pub source: KopilkaError,
}

impl ApplyFailure {
    pub fn applied_total(&self) -> Decimal {
        sum_applied(&self.applied)
    }
}

impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stopped at goal {} after applying {}: {}",
            self.mode,
            self.failed_goal,
            money(self.applied_total()),
            self.source
        )
    }
}

impl std::error::Error for ApplyFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Push each positive amount through `adjuster`, one call at a time, in goal
/// order. The first failure stops the run.
pub fn apply_plan<A: GoalAdjuster + ?Sized>(
    plan: &AllocationPlan,
    mode: AllocationMode,
    adjuster: &mut A,
) -> std::result::Result<ApplyReport, ApplyFailure> {
    let steps: Vec<(GoalId, Decimal)> = plan.iter().filter(|(_, amount)| *amount > Decimal::ZERO).collect();
    let mut applied = Vec::with_capacity(steps.len());

    for (i, &(goal_id, amount)) in steps.iter().enumerate() {
        let outcome = match mode {
            AllocationMode::Distribution => adjuster.add_to_goal(goal_id, amount),
            AllocationMode::Deduction => adjuster.subtract_from_goal(goal_id, amount),
        };
        match outcome {
            Ok(goal) => {
                tracing::info!(goal_id, %amount, %mode, "goal adjusted");
                applied.push(AppliedAdjustment { goal_id, amount, goal });
            }
            Err(source) => {
                let failure = ApplyFailure {
                    mode,
                    applied,
                    failed_goal: goal_id,
                    attempted_amount: amount,
                    not_attempted: steps[i + 1..].iter().map(|(id, _)| *id).collect(),
                    source,
                };
                tracing::error!(
                    goal_id,
                    applied_total = %failure.applied_total(),
                    error = %failure.source,
                    "plan partially applied"
                );
                return Err(failure);
            }
        }
    }

    Ok(ApplyReport { mode, applied })
}
