//! JSON protocol for headless session control.
//!
//! The runner speaks JSON lines (one JSON object per line):
//!
//! **Input (stdin):** commands from a controller
//! **Output (stdout):** responses and state snapshots
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","seed":...}`
//! 2. Controller sends `start`, then actions
//! 3. Runner acknowledges or rejects each action; `end_sprint` returns a
//!    sprint report
//! 4. When the session ends, runner outputs `game_over`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","seed":42}
//! -> {"cmd":"start","mode":"fixed_horizon"}
//! <- {"type":"ack","cmd":"start"}
//! -> {"cmd":"query"}
//! <- {"type":"state","sprint":1,"health":100,"capacity":12,...}
//! -> {"cmd":"remediate","threat_id":"CVE-2025-0002"}
//! <- {"type":"ack","cmd":"remediate","outcome":{"outcome":"remediated",...}}
//! -> {"cmd":"invest_automation"}
//! <- {"type":"rejected","cmd":"invest_automation","reason":"Insufficient capacity: need 6, have 3"}
//! -> {"cmd":"end_sprint"}
//! <- {"type":"sprint_report","report":{...}}
//! ```

use serde::{Deserialize, Serialize};
use sprint_core::actions::{Action, ActionOutcome};
use sprint_core::components::{Obligation, SeverityBand, Threat, ThreatContext};
use sprint_core::events::LogEntry;
use sprint_core::resolver::SprintReport;
use sprint_core::state::{GameMode, Phase, SessionState};

/// Protocol version reported in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands accepted by the headless runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Start a new session.
    Start {
        /// Session mode (default: fixed horizon).
        #[serde(default = "default_mode")]
        mode: GameMode,
    },

    /// Remediate a threat.
    Remediate { threat_id: String },

    /// Complete a work item.
    Complete { obligation_id: String },

    /// Toggle the exception on a threat.
    Defer { threat_id: String },

    /// Buy one automation level.
    InvestAutomation,

    /// Buy one training level.
    InvestTraining,

    /// Put remaining capacity into output.
    InvestOutput,

    /// Resolve the current sprint.
    EndSprint,

    /// Abandon the session.
    Resign,

    /// Start again with the previous mode.
    Restart,

    /// Current state snapshot.
    Query,

    /// Current state hash (for determinism verification).
    Hash,

    /// Save the session state as JSON.
    Save { path: String },

    /// Load a session state saved with `save`.
    Load { path: String },

    /// Shut down.
    Quit,
}

const fn default_mode() -> GameMode {
    GameMode::FixedHorizon
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses written by the headless runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready { version: String, seed: u64 },

    /// Command accepted.
    Ack {
        cmd: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outcome: Option<ActionOutcome>,
    },

    /// Action refused; the session is unchanged.
    Rejected { cmd: String, reason: String },

    /// Command could not be processed.
    Error {
        message: String,
        cmd: Option<String>,
    },

    /// State snapshot.
    State(Box<StateSnapshot>),

    /// Result of `end_sprint`.
    SprintReport { report: Box<SprintReport> },

    /// Session has ended.
    GameOver {
        result: GameResult,
        sprint: u32,
        score: u64,
    },

    /// State hash for determinism verification.
    StateHash { sprint: u32, hash: u64 },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Full view of a session for a controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub sprint: u32,
    pub day: u32,
    pub phase: Phase,
    pub mode: Option<GameMode>,
    pub health: u32,
    pub capacity: u32,
    pub score: u64,
    pub automation_level: u32,
    pub pending_automation: u32,
    pub training_level: u32,
    pub pending_output_investment: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprints_remaining: Option<u32>,
    pub threats: Vec<ThreatView>,
    pub obligations: Vec<Obligation>,
    /// Log entries added since the previous snapshot.
    pub log: Vec<LogEntry>,
    pub hash: u64,
}

impl StateSnapshot {
    /// Build a snapshot, including log entries from `log_offset` on.
    #[must_use]
    pub fn capture(state: &SessionState, log_offset: usize) -> Self {
        Self {
            sprint: state.sprint,
            day: state.day(),
            phase: state.phase,
            mode: state.mode,
            health: state.health,
            capacity: state.capacity,
            score: state.score,
            automation_level: state.automation_level,
            pending_automation: state.pending_automation,
            training_level: state.training_level,
            pending_output_investment: state.pending_output_investment,
            sprints_remaining: state.sprints_remaining(),
            threats: state
                .threats
                .iter()
                .map(|t| ThreatView::of(t, state.automation_level))
                .collect(),
            obligations: state.obligations.clone(),
            log: state.log.since(log_offset).to_vec(),
            hash: state.state_hash(),
        }
    }
}

/// A threat with its derived values filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatView {
    pub id: String,
    pub category: String,
    pub target: String,
    pub context: ThreatContext,
    pub severity: f64,
    pub band: SeverityBand,
    pub age: u32,
    pub days_remaining: u32,
    pub breaches_next_sprint: bool,
    pub deferred: bool,
    pub periods_deferred: u32,
    pub fix_available: bool,
    pub periods_until_fix: u32,
    /// Remediation cost at the current automation level.
    pub cost: u32,
}

impl ThreatView {
    /// Derive a view at the given automation level.
    #[must_use]
    pub fn of(threat: &Threat, automation_level: u32) -> Self {
        Self {
            id: threat.id.clone(),
            category: threat.category.clone(),
            target: threat.target.clone(),
            context: threat.context,
            severity: threat.severity,
            band: threat.band(),
            age: threat.age,
            days_remaining: threat.days_remaining(),
            breaches_next_sprint: threat.breaches_next_period(),
            deferred: threat.deferred,
            periods_deferred: threat.periods_deferred,
            fix_available: threat.fix_available,
            periods_until_fix: threat.periods_until_fix,
            cost: threat.remediation_cost(automation_level),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Victory,
    Defeat,
}

impl GameResult {
    /// Result for a terminal phase.
    #[must_use]
    pub const fn from_phase(phase: Phase) -> Option<Self> {
        match phase {
            Phase::Won => Some(Self::Victory),
            Phase::Lost => Some(Self::Defeat),
            Phase::NotStarted | Phase::Running => None,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(seed: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            seed,
        }
    }

    /// Create a plain acknowledgment.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
            outcome: None,
        }
    }

    /// Create an acknowledgment carrying an action outcome.
    #[must_use]
    pub fn ack_with(cmd: &str, outcome: ActionOutcome) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
            outcome: Some(outcome),
        }
    }

    /// Create a rejection.
    #[must_use]
    pub fn rejected(cmd: &str, reason: impl ToString) -> Self {
        Self::Rejected {
            cmd: cmd.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to a JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Command name for acknowledgments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Remediate { .. } => "remediate",
            Self::Complete { .. } => "complete",
            Self::Defer { .. } => "defer",
            Self::InvestAutomation => "invest_automation",
            Self::InvestTraining => "invest_training",
            Self::InvestOutput => "invest_output",
            Self::EndSprint => "end_sprint",
            Self::Resign => "resign",
            Self::Restart => "restart",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Save { .. } => "save",
            Self::Load { .. } => "load",
            Self::Quit => "quit",
        }
    }

    /// The engine action this command maps to, if any.
    #[must_use]
    pub fn to_action(&self) -> Option<Action> {
        match self {
            Self::Remediate { threat_id } => Some(Action::Remediate {
                threat_id: threat_id.clone(),
            }),
            Self::Complete { obligation_id } => Some(Action::CompleteObligation {
                obligation_id: obligation_id.clone(),
            }),
            Self::Defer { threat_id } => Some(Action::ToggleDefer {
                threat_id: threat_id.clone(),
            }),
            Self::InvestAutomation => Some(Action::InvestAutomation),
            Self::InvestTraining => Some(Action::InvestTraining),
            Self::InvestOutput => Some(Action::InvestOutput),
            Self::EndSprint => Some(Action::ResolvePeriod),
            Self::Resign => Some(Action::Resign),
            Self::Start { .. }
            | Self::Restart
            | Self::Query
            | Self::Hash
            | Self::Save { .. }
            | Self::Load { .. }
            | Self::Quit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_command() {
        let cmd = Command::from_json(r#"{"cmd":"start","mode":"indefinite"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Start {
                mode: GameMode::Indefinite
            }
        );
    }

    #[test]
    fn test_start_defaults_to_fixed_horizon() {
        let cmd = Command::from_json(r#"{"cmd":"start"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Start {
                mode: GameMode::FixedHorizon
            }
        );
    }

    #[test]
    fn test_parse_remediate_command() {
        let cmd = Command::from_json(r#"{"cmd":"remediate","threat_id":"CVE-2025-0001"}"#).unwrap();
        assert_eq!(cmd.name(), "remediate");
        assert_eq!(
            cmd.to_action(),
            Some(Action::Remediate {
                threat_id: "CVE-2025-0001".into()
            })
        );
    }

    #[test]
    fn test_unknown_command_fails() {
        assert!(Command::from_json(r#"{"cmd":"tick","count":60}"#).is_err());
        assert!(Command::from_json("not json").is_err());
    }

    #[test]
    fn test_serialize_responses() {
        let json = Response::rejected("invest_output", "No capacity left to invest").to_json_line();
        assert!(json.contains(r#""type":"rejected""#));
        assert!(json.contains(r#""cmd":"invest_output""#));
        assert!(json.ends_with('\n'));

        let json = Response::ack("start").to_json_line();
        assert!(!json.contains("outcome"));

        let json = Response::GameOver {
            result: GameResult::Victory,
            sprint: 26,
            score: 1200,
        }
        .to_json_line();
        assert!(json.contains(r#""result":"victory""#));
    }

    #[test]
    fn test_state_snapshot_serializes() {
        let state = SessionState::default();
        let json = Response::State(Box::new(StateSnapshot::capture(&state, 0))).to_json_line();
        assert!(json.contains(r#""type":"state""#));
        assert!(json.contains(r#""capacity":12"#));
        assert!(!json.contains("sprints_remaining"));
    }
}
