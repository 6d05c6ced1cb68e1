//! Player actions within a sprint.
//!
//! Each action is validated against the current state before anything is
//! written. A rejected action returns `Err(Rejection)` and leaves health,
//! capacity, score and entity collections exactly as they were; the only
//! trace is a warning in the event log, appended by the session.

use serde::{Deserialize, Serialize};

use crate::economy::{
    AUTOMATION_COST, OBLIGATION_SCORE_MULTIPLIER, REMEDIATION_SCORE_MULTIPLIER, TRAINING_COST,
};
use crate::error::{ActionResult, Rejection};
use crate::events::LogLevel;
use crate::resolver::SprintReport;
use crate::state::SessionState;

/// Everything a player can do to a running session.
///
/// Externally tagged so replays can store it with bincode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Apply the fix for a threat.
    Remediate {
        /// Threat id.
        threat_id: String,
    },
    /// Complete a work item.
    CompleteObligation {
        /// Work item id.
        obligation_id: String,
    },
    /// File or revoke an exception for a threat.
    ToggleDefer {
        /// Threat id.
        threat_id: String,
    },
    /// Buy one automation level, effective next sprint.
    InvestAutomation,
    /// Buy one training level, effective immediately.
    InvestTraining,
    /// Put all remaining capacity into feature work.
    InvestOutput,
    /// End the sprint and resolve it.
    ResolvePeriod,
    /// Give up.
    Resign,
}

impl Action {
    /// Short name used in logs and protocol acknowledgements.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Remediate { .. } => "remediate",
            Self::CompleteObligation { .. } => "complete_obligation",
            Self::ToggleDefer { .. } => "toggle_defer",
            Self::InvestAutomation => "invest_automation",
            Self::InvestTraining => "invest_training",
            Self::InvestOutput => "invest_output",
            Self::ResolvePeriod => "resolve_period",
            Self::Resign => "resign",
        }
    }
}

/// What an accepted action did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Threat removed.
    Remediated {
        /// Threat id.
        threat_id: String,
        /// Capacity spent.
        cost: u32,
        /// Score gained.
        score: u64,
    },
    /// Work item marked complete.
    Completed {
        /// Work item id.
        obligation_id: String,
        /// Capacity spent.
        cost: u32,
        /// Score gained.
        score: u64,
    },
    /// Exception filed or revoked.
    DeferToggled {
        /// Threat id.
        threat_id: String,
        /// New deferral flag.
        deferred: bool,
    },
    /// Automation purchased.
    AutomationQueued {
        /// Levels waiting to apply.
        pending: u32,
    },
    /// Training purchased.
    TrainingRaised {
        /// New training level.
        level: u32,
    },
    /// Capacity poured into output.
    OutputInvested {
        /// Capacity invested.
        amount: u32,
    },
    /// Sprint resolved.
    Resolved(Box<SprintReport>),
    /// Session ended by the player.
    Resigned,
}

fn require_running(state: &SessionState) -> ActionResult<()> {
    if state.is_running() {
        Ok(())
    } else {
        Err(Rejection::NotRunning)
    }
}

fn require_capacity(state: &SessionState, cost: u32) -> ActionResult<u32> {
    if state.capacity >= cost {
        Ok(cost)
    } else {
        Err(Rejection::InsufficientCapacity {
            required: cost,
            available: state.capacity,
        })
    }
}

/// Validate an action without applying it.
///
/// Returns the capacity the action would consume. Lets a caller render
/// affordability up front instead of probing with real actions.
pub fn quote(state: &SessionState, action: &Action) -> ActionResult<u32> {
    require_running(state)?;
    match action {
        Action::Remediate { threat_id } => {
            let threat = state
                .threat(threat_id)
                .ok_or_else(|| Rejection::UnknownThreat(threat_id.clone()))?;
            if !threat.fix_available {
                return Err(Rejection::FixUnavailable {
                    id: threat.id.clone(),
                    eta: threat.periods_until_fix,
                });
            }
            require_capacity(state, threat.remediation_cost(state.automation_level))
        }
        Action::CompleteObligation { obligation_id } => {
            let item = state
                .obligation(obligation_id)
                .ok_or_else(|| Rejection::UnknownObligation(obligation_id.clone()))?;
            if item.completed {
                return Err(Rejection::AlreadyCompleted(item.id.clone()));
            }
            require_capacity(state, item.cost)
        }
        Action::ToggleDefer { threat_id } => state
            .threat(threat_id)
            .map(|_| 0)
            .ok_or_else(|| Rejection::UnknownThreat(threat_id.clone())),
        Action::InvestAutomation => require_capacity(state, AUTOMATION_COST),
        Action::InvestTraining => require_capacity(state, TRAINING_COST),
        Action::InvestOutput => {
            if state.capacity == 0 {
                Err(Rejection::NothingToInvest)
            } else {
                Ok(state.capacity)
            }
        }
        Action::ResolvePeriod | Action::Resign => Ok(0),
    }
}

/// Remediate a threat: pay its cost, remove it, score `floor(severity * 10)`.
pub fn remediate(state: &mut SessionState, threat_id: &str) -> ActionResult<ActionOutcome> {
    let cost = quote(
        state,
        &Action::Remediate {
            threat_id: threat_id.to_string(),
        },
    )?;
    let Some(index) = state.threats.iter().position(|t| t.id == threat_id) else {
        return Err(Rejection::UnknownThreat(threat_id.to_string()));
    };

    let threat = state.threats.remove(index);
    let gained = (threat.severity * REMEDIATION_SCORE_MULTIPLIER).floor() as u64;
    state.capacity -= cost;
    state.score += gained;
    state.stats.threats_remediated += 1;
    state.log.push(
        state.sprint,
        LogLevel::Success,
        format!("Patched {} (Cost: {cost}). Integrity secure.", threat.id),
    );

    Ok(ActionOutcome::Remediated {
        threat_id: threat.id,
        cost,
        score: gained,
    })
}

/// Complete a work item: pay its cost, mark it done, score `cost * 5`.
///
/// The item stays visible until the sprint ends.
pub fn complete_obligation(
    state: &mut SessionState,
    obligation_id: &str,
) -> ActionResult<ActionOutcome> {
    let cost = quote(
        state,
        &Action::CompleteObligation {
            obligation_id: obligation_id.to_string(),
        },
    )?;
    let Some(item) = state.obligations.iter_mut().find(|o| o.id == obligation_id) else {
        return Err(Rejection::UnknownObligation(obligation_id.to_string()));
    };

    item.completed = true;
    let name = item.name.clone();
    let gained = u64::from(cost) * OBLIGATION_SCORE_MULTIPLIER;
    state.capacity -= cost;
    state.score += gained;
    state.stats.obligations_completed += 1;
    state.log.push(
        state.sprint,
        LogLevel::Success,
        format!("Completed objective: {name}."),
    );

    Ok(ActionOutcome::Completed {
        obligation_id: obligation_id.to_string(),
        cost,
        score: gained,
    })
}

/// Flip a threat's deferral flag. Costs nothing now; each deferred threat
/// reserves capacity when the sprint resolves.
pub fn toggle_defer(state: &mut SessionState, threat_id: &str) -> ActionResult<ActionOutcome> {
    quote(
        state,
        &Action::ToggleDefer {
            threat_id: threat_id.to_string(),
        },
    )?;
    let sprint = state.sprint;
    let Some(threat) = state.threats.iter_mut().find(|t| t.id == threat_id) else {
        return Err(Rejection::UnknownThreat(threat_id.to_string()));
    };

    threat.deferred = !threat.deferred;
    let deferred = threat.deferred;
    let (level, message) = if deferred {
        (
            LogLevel::Warning,
            format!("Exception filed for {threat_id}. Risk accepted temporarily."),
        )
    } else {
        (
            LogLevel::Info,
            format!("Exception revoked for {threat_id}. Remediation required."),
        )
    };
    state.log.push(sprint, level, message);

    Ok(ActionOutcome::DeferToggled {
        threat_id: threat_id.to_string(),
        deferred,
    })
}

/// Buy automation. The level applies when the sprint resolves.
pub fn invest_automation(state: &mut SessionState) -> ActionResult<ActionOutcome> {
    let cost = quote(state, &Action::InvestAutomation)?;
    state.capacity -= cost;
    state.pending_automation += 1;
    state.log.push(
        state.sprint,
        LogLevel::Success,
        "Investment confirmed. Automation level will upgrade next sprint.",
    );
    Ok(ActionOutcome::AutomationQueued {
        pending: state.pending_automation,
    })
}

/// Buy training. Applies to the next generation cycle.
pub fn invest_training(state: &mut SessionState) -> ActionResult<ActionOutcome> {
    let cost = quote(state, &Action::InvestTraining)?;
    state.capacity -= cost;
    state.training_level += 1;
    state.log.push(
        state.sprint,
        LogLevel::Success,
        format!(
            "Team training completed (level {}). Code quality improved.",
            state.training_level
        ),
    );
    Ok(ActionOutcome::TrainingRaised {
        level: state.training_level,
    })
}

/// Invest every remaining unit of capacity in output.
pub fn invest_output(state: &mut SessionState) -> ActionResult<ActionOutcome> {
    let amount = quote(state, &Action::InvestOutput)?;
    state.pending_output_investment = amount;
    state.capacity = 0;
    state.log.push(
        state.sprint,
        LogLevel::Success,
        format!("Allocated {amount} capacity to feature build. Results next sprint."),
    );
    Ok(ActionOutcome::OutputInvested { amount })
}
