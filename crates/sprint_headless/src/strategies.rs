//! Scripted player strategies for headless playtesting.
//!
//! A strategy is a fixed priority list evaluated against the live state:
//! work items first, then remediation, then exceptions for threats about to
//! breach, then investments, then whatever capacity is left goes to output.
//! Each decision spends capacity or files an exception, so a sprint always
//! ends after finitely many actions.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sprint_core::actions::Action;
use sprint_core::components::Threat;
use sprint_core::economy::{AUTOMATION_COST, TRAINING_COST};
use sprint_core::session::Session;
use sprint_core::state::SessionState;
use thiserror::Error;

/// Hard stop on decisions within one sprint.
pub const MAX_ACTIONS_PER_SPRINT: usize = 64;

/// Error type for strategy operations.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// File not found.
    #[error("Strategy file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read strategy file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse strategy: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// No preset with this name.
    #[error("Unknown strategy preset: {0}")]
    UnknownPreset(String),
}

/// Which fixable threat to remediate next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemediationOrder {
    /// Highest severity first.
    HighestSeverity,
    /// Fewest days to the deadline first.
    MostUrgent,
    /// Lowest cost first.
    Cheapest,
    /// Never remediate.
    Never,
}

/// When to file an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferPolicy {
    /// Never.
    Never,
    /// Threats that breach next sprint and cannot be fixed now.
    Breaching,
    /// Any threat without a fix, plus breaching ones.
    Unfixable,
}

/// A complete scripted player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Strategy name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Complete work items before anything else.
    pub complete_obligations: bool,
    /// Remediation order.
    pub remediation: RemediationOrder,
    /// Exception policy.
    pub defer: DeferPolicy,
    /// Automation level to buy up to.
    pub automation_target: u32,
    /// Training level to buy up to.
    pub training_target: u32,
    /// Put leftover capacity into output once at least this much is left.
    pub invest_output_at: Option<u32>,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::balanced()
    }
}

impl Strategy {
    /// Load a strategy from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StrategyError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StrategyError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let strategy: Strategy = ron::from_str(&contents)?;
        Ok(strategy)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, StrategyError> {
        let strategy: Strategy = ron::from_str(ron)?;
        Ok(strategy)
    }

    /// Preset names accepted by [`Strategy::preset`].
    pub const PRESETS: [&'static str; 5] = ["balanced", "patcher", "deferrer", "investor", "idle"];

    /// Look up a preset by name (case-insensitive).
    pub fn preset(name: &str) -> Result<Self, StrategyError> {
        match name.to_ascii_lowercase().as_str() {
            "balanced" => Ok(Self::balanced()),
            "patcher" => Ok(Self::patcher()),
            "deferrer" => Ok(Self::deferrer()),
            "investor" => Ok(Self::investor()),
            "idle" => Ok(Self::idle()),
            _ => Err(StrategyError::UnknownPreset(name.to_string())),
        }
    }

    /// Work items, worst threats, exceptions for what cannot be fixed, a
    /// little automation.
    #[must_use]
    pub fn balanced() -> Self {
        Self {
            name: "Balanced".to_string(),
            description: "Meet obligations, patch by severity, defer what would breach".to_string(),
            complete_obligations: true,
            remediation: RemediationOrder::HighestSeverity,
            defer: DeferPolicy::Breaching,
            automation_target: 2,
            training_target: 1,
            invest_output_at: Some(3),
        }
    }

    /// Patch everything it can, nothing else.
    #[must_use]
    pub fn patcher() -> Self {
        Self {
            name: "Patcher".to_string(),
            description: "Spend every point on work items and fixes".to_string(),
            complete_obligations: true,
            remediation: RemediationOrder::HighestSeverity,
            defer: DeferPolicy::Never,
            automation_target: 0,
            training_target: 0,
            invest_output_at: None,
        }
    }

    /// Hides risk behind exceptions and ships features.
    #[must_use]
    pub fn deferrer() -> Self {
        Self {
            name: "Deferrer".to_string(),
            description: "File exceptions instead of patching, invest in output".to_string(),
            complete_obligations: true,
            remediation: RemediationOrder::Never,
            defer: DeferPolicy::Unfixable,
            automation_target: 0,
            training_target: 0,
            invest_output_at: Some(1),
        }
    }

    /// Buys automation and training early, patches the cheap stuff.
    #[must_use]
    pub fn investor() -> Self {
        Self {
            name: "Investor".to_string(),
            description: "Front-load automation and training, patch cheapest first".to_string(),
            complete_obligations: true,
            remediation: RemediationOrder::Cheapest,
            defer: DeferPolicy::Breaching,
            automation_target: 4,
            training_target: 3,
            invest_output_at: Some(2),
        }
    }

    /// Ends every sprint without acting. Baseline for balance runs.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            name: "Idle".to_string(),
            description: "Do nothing".to_string(),
            complete_obligations: false,
            remediation: RemediationOrder::Never,
            defer: DeferPolicy::Never,
            automation_target: 0,
            training_target: 0,
            invest_output_at: None,
        }
    }

    /// Next action this sprint, or `None` when it is time to resolve.
    #[must_use]
    pub fn decide(&self, state: &SessionState) -> Option<Action> {
        if !state.is_running() {
            return None;
        }
        let capacity = state.capacity;

        if self.complete_obligations {
            if let Some(work) = state
                .obligations
                .iter()
                .find(|o| !o.completed && o.cost <= capacity)
            {
                return Some(Action::CompleteObligation {
                    obligation_id: work.id.clone(),
                });
            }
        }

        if let Some(threat) = self.pick_remediation(state) {
            return Some(Action::Remediate {
                threat_id: threat.id.clone(),
            });
        }

        if let Some(threat) = state
            .threats
            .iter()
            .find(|t| !t.deferred && self.should_defer(t, state))
        {
            return Some(Action::ToggleDefer {
                threat_id: threat.id.clone(),
            });
        }

        if state.automation_level + state.pending_automation < self.automation_target
            && capacity >= AUTOMATION_COST
        {
            return Some(Action::InvestAutomation);
        }

        if state.training_level < self.training_target && capacity >= TRAINING_COST {
            return Some(Action::InvestTraining);
        }

        match self.invest_output_at {
            Some(at) if capacity >= at.max(1) => Some(Action::InvestOutput),
            _ => None,
        }
    }

    fn pick_remediation<'a>(&self, state: &'a SessionState) -> Option<&'a Threat> {
        let automation = state.automation_level;
        let fixable = state
            .threats
            .iter()
            .filter(|t| t.fix_available && t.remediation_cost(automation) <= state.capacity);
        match self.remediation {
            RemediationOrder::Never => None,
            RemediationOrder::HighestSeverity => {
                fixable.min_by(|a, b| b.severity.total_cmp(&a.severity))
            }
            RemediationOrder::MostUrgent => fixable.min_by_key(|t| t.days_remaining()),
            RemediationOrder::Cheapest => fixable.min_by_key(|t| t.remediation_cost(automation)),
        }
    }

    fn should_defer(&self, threat: &Threat, state: &SessionState) -> bool {
        let fixable_now = self.remediation != RemediationOrder::Never
            && threat.fix_available
            && threat.remediation_cost(state.automation_level) <= state.capacity;
        match self.defer {
            DeferPolicy::Never => false,
            DeferPolicy::Breaching => threat.breaches_next_period() && !fixable_now,
            DeferPolicy::Unfixable => {
                !threat.fix_available || (threat.breaches_next_period() && !fixable_now)
            }
        }
    }

    /// Play one sprint: act until nothing is left to decide, then resolve.
    ///
    /// Returns every accepted action in order, ending with
    /// [`Action::ResolvePeriod`] when the session was running.
    pub fn play_sprint<R: Rng>(&self, session: &mut Session<R>) -> Vec<Action> {
        let mut played = Vec::new();
        if !session.state().is_running() {
            return played;
        }

        while played.len() < MAX_ACTIONS_PER_SPRINT {
            let Some(action) = self.decide(session.state()) else {
                break;
            };
            if let Err(reason) = session.apply(&action) {
                tracing::warn!(strategy = %self.name, %reason, "Strategy chose a rejected action");
                break;
            }
            played.push(action);
        }

        if session.apply(&Action::ResolvePeriod).is_ok() {
            played.push(Action::ResolvePeriod);
        }
        tracing::trace!(strategy = %self.name, actions = played.len(), "Sprint played");
        played
    }
}
