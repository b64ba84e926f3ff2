//! One allocation dialog: open it over a pool and a goal snapshot, edit a
//! plan, submit, apply. `Applied`, `Failed` and `Skipped` end the dialog.

use rust_decimal::Decimal;

use crate::allocation::{
    apply_plan, auto_distribute, validate_manual_plan, AllocationMode, AllocationPlan,
    ApplyFailure, ApplyReport, GoalAdjuster, ValidationResult,
};
use crate::error::{KopilkaError, Result};
use crate::models::{GoalId, SavingsGoal};

#[derive(Debug)]
pub enum DialogState {
    Idle,
    Editing {
        plan: AllocationPlan,
        /// Result of the last rejected submit, if any.
        last_check: Option<ValidationResult>,
    },
    Submitting {
        plan: AllocationPlan,
    },
    Applied(ApplyReport),
    Failed(ApplyFailure),
    Skipped,
}

impl DialogState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Editing { .. } => "editing",
            Self::Submitting { .. } => "submitting",
            Self::Applied(_) => "applied",
            Self::Failed(_) => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Applied(_) | Self::Failed(_) | Self::Skipped)
    }
}

pub struct AllocationDialog {
    mode: AllocationMode,
    pool: Decimal,
    goals: Vec<SavingsGoal>,
    state: DialogState,
}

impl AllocationDialog {
    pub fn new(mode: AllocationMode) -> Self {
        Self {
            mode,
            pool: Decimal::ZERO,
            goals: Vec::new(),
            state: DialogState::Idle,
        }
    }

    pub fn mode(&self) -> AllocationMode {
        self.mode
    }

    pub fn pool(&self) -> Decimal {
        self.pool
    }

    /// Goals offered by this dialog (eligible for its mode at open time).
    pub fn goals(&self) -> &[SavingsGoal] {
        &self.goals
    }

    pub fn state(&self) -> &DialogState {
        &self.state
    }

    pub fn plan(&self) -> Option<&AllocationPlan> {
        match &self.state {
            DialogState::Editing { plan, .. } | DialogState::Submitting { plan } => Some(plan),
            _ => None,
        }
    }

    pub fn total_allocated(&self) -> Decimal {
        self.plan().map(AllocationPlan::total).unwrap_or(Decimal::ZERO)
    }

    pub fn remaining(&self) -> Decimal {
        self.plan()
            .map(|plan| plan.remaining(self.pool))
            .unwrap_or(self.pool)
    }

    fn rejected(&self, event: &str) -> KopilkaError {
        KopilkaError::Invalid(format!("cannot {event} while {}", self.state.name()))
    }

    /// Start editing over a fresh snapshot. Earlier edits are dropped.
    pub fn open(&mut self, pool: Decimal, goals: &[SavingsGoal]) -> Result<()> {
        if matches!(self.state, DialogState::Submitting { .. }) {
            return Err(self.rejected("open"));
        }
        if pool < Decimal::ZERO {
            return Err(KopilkaError::Invalid("pool must not be negative".to_string()));
        }
        self.pool = pool;
        self.goals = goals
            .iter()
            .filter(|g| self.mode.is_eligible(g))
            .cloned()
            .collect();
        self.state = DialogState::Editing {
            plan: AllocationPlan::new(),
            last_check: None,
        };
        tracing::debug!(mode = %self.mode, %pool, goals = self.goals.len(), "dialog opened");
        Ok(())
    }

    pub fn set_amount(&mut self, goal_id: GoalId, amount: Decimal) -> Result<()> {
        if !self.goals.iter().any(|g| g.id == goal_id) {
            return Err(KopilkaError::UnknownGoal(goal_id));
        }
        match &mut self.state {
            DialogState::Editing { plan, last_check } => {
                plan.set(goal_id, amount);
                *last_check = None;
                Ok(())
            }
            _ => Err(self.rejected("edit")),
        }
    }

    /// Replace the plan with the even split. Distribution only.
    pub fn auto_distribute(&mut self) -> Result<()> {
        if self.mode != AllocationMode::Distribution {
            return Err(KopilkaError::Invalid(
                "automatic split is only offered for distribution".to_string(),
            ));
        }
        let proposal = auto_distribute(self.pool, &self.goals);
        match &mut self.state {
            DialogState::Editing { plan, last_check } => {
                *plan = proposal;
                *last_check = None;
                Ok(())
            }
            _ => Err(self.rejected("auto-distribute")),
        }
    }

    /// Validate the plan. A submittable plan moves to `Submitting`; anything
    /// else stays in `Editing` with the result attached.
    pub fn submit(&mut self) -> Result<ValidationResult> {
        let DialogState::Editing { plan, .. } = &self.state else {
            return Err(self.rejected("submit"));
        };
        let result = validate_manual_plan(plan, self.pool, &self.goals, self.mode);
        let plan = plan.clone();
        self.state = if result.can_submit() {
            DialogState::Submitting { plan }
        } else {
            DialogState::Editing {
                plan,
                last_check: Some(result.clone()),
            }
        };
        Ok(result)
    }

    /// Run the submitted plan. Ends in `Applied` or `Failed`; there is no way
    /// back once this starts.
    pub fn apply<A: GoalAdjuster + ?Sized>(&mut self, adjuster: &mut A) -> Result<()> {
        let DialogState::Submitting { plan } = &self.state else {
            return Err(self.rejected("apply"));
        };
        self.state = match apply_plan(plan, self.mode, adjuster) {
            Ok(report) => DialogState::Applied(report),
            Err(failure) => DialogState::Failed(failure),
        };
        Ok(())
    }

    pub fn skip(&mut self) -> Result<()> {
        match self.state {
            DialogState::Idle | DialogState::Editing { .. } => {
                self.state = DialogState::Skipped;
                Ok(())
            }
            _ => Err(self.rejected("skip")),
        }
    }
}
