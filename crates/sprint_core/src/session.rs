//! Session state machine.
//!
//! A [`Session`] owns the [`SessionState`] and the random source and is the
//! only writer of either. Phases:
//!
//! ```text
//! NotStarted --start--> Running --resolve (health 0) | resign--> Lost
//!                       Running --resolve (horizon reached)----> Won
//! any phase  --start / restart--> Running
//! ```
//!
//! Every action is validated first. Rejections return `Err` and leave the
//! session unchanged apart from a warning in the event log.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::actions::{self, Action, ActionOutcome};
use crate::error::{ActionResult, GameError, Rejection, Result};
use crate::events::LogLevel;
use crate::generator::{generate_obligations, opening_threats};
use crate::resolver::{self, SprintReport};
use crate::state::{GameMode, Phase, SessionConfig, SessionState};

/// A single game session.
#[derive(Debug, Clone)]
pub struct Session<R = ChaCha8Rng> {
    state: SessionState,
    rng: R,
}

impl Session<ChaCha8Rng> {
    /// Create a session seeded from OS entropy.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_rng(config, ChaCha8Rng::from_entropy())
    }

    /// Create a reproducible session.
    #[must_use]
    pub fn seeded(config: SessionConfig, seed: u64) -> Self {
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl Default for Session<ChaCha8Rng> {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<R: Rng> Session<R> {
    /// Create a session with a caller-supplied random source.
    #[must_use]
    pub fn with_rng(config: SessionConfig, rng: R) -> Self {
        Self {
            state: SessionState::new(config),
            rng,
        }
    }

    /// Resume from a saved state with a new random source.
    #[must_use]
    pub const fn from_state(state: SessionState, rng: R) -> Self {
        Self { state, rng }
    }

    /// Read-only view of the state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Hash of the full state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        self.state.state_hash()
    }

    /// Begin a new session in `mode`, discarding any previous one.
    pub fn start(&mut self, mode: GameMode) {
        let config = self.state.config;
        let mut state = SessionState::new(config);
        state.phase = Phase::Running;
        state.mode = Some(mode);

        state.threats = opening_threats(config.opening_threats, &mut state.ids, &mut self.rng);
        state
            .threats
            .sort_by(|a, b| b.severity.total_cmp(&a.severity));
        state.obligations = generate_obligations(&mut state.ids, &mut self.rng);
        state.stats.peak_threats = u32::try_from(state.threats.len()).unwrap_or(u32::MAX);

        state.log.push(
            state.sprint,
            LogLevel::Info,
            format!(
                "System initialized in {} mode. Survival protocols active.",
                mode.label()
            ),
        );
        tracing::info!(?mode, horizon = config.horizon, "Session started");

        self.state = state;
    }

    /// Start again with the previous mode. Allowed in any phase.
    pub fn restart(&mut self) -> ActionResult<()> {
        let mode = self.state.mode.ok_or(Rejection::NotRunning)?;
        self.start(mode);
        Ok(())
    }

    /// Remediate a threat.
    pub fn remediate(&mut self, threat_id: &str) -> ActionResult<ActionOutcome> {
        let result = actions::remediate(&mut self.state, threat_id);
        self.note("remediate", result)
    }

    /// Complete a work item.
    pub fn complete_obligation(&mut self, obligation_id: &str) -> ActionResult<ActionOutcome> {
        let result = actions::complete_obligation(&mut self.state, obligation_id);
        self.note("complete_obligation", result)
    }

    /// File or revoke an exception.
    pub fn toggle_defer(&mut self, threat_id: &str) -> ActionResult<ActionOutcome> {
        let result = actions::toggle_defer(&mut self.state, threat_id);
        self.note("toggle_defer", result)
    }

    /// Buy one automation level.
    pub fn invest_automation(&mut self) -> ActionResult<ActionOutcome> {
        let result = actions::invest_automation(&mut self.state);
        self.note("invest_automation", result)
    }

    /// Buy one training level.
    pub fn invest_training(&mut self) -> ActionResult<ActionOutcome> {
        let result = actions::invest_training(&mut self.state);
        self.note("invest_training", result)
    }

    /// Put all remaining capacity into output.
    pub fn invest_output(&mut self) -> ActionResult<ActionOutcome> {
        let result = actions::invest_output(&mut self.state);
        self.note("invest_output", result)
    }

    /// End the sprint.
    pub fn resolve_period(&mut self) -> ActionResult<SprintReport> {
        let result = resolver::resolve_period(&mut self.state, &mut self.rng);
        self.note("resolve_period", result)
    }

    /// Abandon the session. Counts as a loss.
    pub fn resign(&mut self) -> ActionResult<()> {
        if !self.state.is_running() {
            return self.note("resign", Err(Rejection::NotRunning));
        }
        self.state.phase = Phase::Lost;
        self.state.log.push(
            self.state.sprint,
            LogLevel::Error,
            "Session abandoned. Business integrity forfeited.",
        );
        tracing::info!(sprint = self.state.sprint, "Session resigned");
        Ok(())
    }

    /// Dispatch any action.
    pub fn apply(&mut self, action: &Action) -> ActionResult<ActionOutcome> {
        match action {
            Action::Remediate { threat_id } => self.remediate(threat_id),
            Action::CompleteObligation { obligation_id } => self.complete_obligation(obligation_id),
            Action::ToggleDefer { threat_id } => self.toggle_defer(threat_id),
            Action::InvestAutomation => self.invest_automation(),
            Action::InvestTraining => self.invest_training(),
            Action::InvestOutput => self.invest_output(),
            Action::ResolvePeriod => self
                .resolve_period()
                .map(|report| ActionOutcome::Resolved(Box::new(report))),
            Action::Resign => self.resign().map(|()| ActionOutcome::Resigned),
        }
    }

    /// Capacity an action would consume, without applying it.
    pub fn quote(&self, action: &Action) -> ActionResult<u32> {
        actions::quote(&self.state, action)
    }

    /// Encode the state with bincode. The random source is not included.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.state)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize session: {e}")))
    }

    /// Decode a state produced by [`Session::serialize`] and attach `rng`.
    pub fn deserialize(data: &[u8], rng: R) -> Result<Self> {
        let state: SessionState = bincode::deserialize(data).map_err(|e| {
            GameError::Serialization(format!("Failed to deserialize session: {e}"))
        })?;
        state.validate()?;
        Ok(Self::from_state(state, rng))
    }

    /// Split into state and random source.
    pub fn into_parts(self) -> (SessionState, R) {
        (self.state, self.rng)
    }

    fn note<T>(&mut self, action: &str, result: ActionResult<T>) -> ActionResult<T> {
        if let Err(reason) = &result {
            tracing::warn!(action, %reason, "Action rejected");
            if self.state.is_running() {
                self.state.log.push(
                    self.state.sprint,
                    LogLevel::Warning,
                    format!("Cannot {}: {reason}.", action.replace('_', " ")),
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::{BASE_CAPACITY, MAX_HEALTH};

    fn started(seed: u64, mode: GameMode) -> Session {
        let mut session = Session::seeded(SessionConfig::default(), seed);
        session.start(mode);
        session
    }

    #[test]
    fn test_start_initializes_session() {
        let session = started(1, GameMode::FixedHorizon);
        let state = session.state();

        assert_eq!(state.phase, Phase::Running);
        assert_eq!(state.sprint, 1);
        assert_eq!(state.health, MAX_HEALTH);
        assert_eq!(state.capacity, BASE_CAPACITY);
        assert_eq!(state.threats.len(), 2);
        assert!(state.threats.iter().all(|t| t.fix_available));
        assert!(!state.obligations.is_empty());
        assert!(state
            .log
            .last()
            .is_some_and(|e| e.message.contains("STANDARD")));
    }

    #[test]
    fn test_actions_rejected_before_start() {
        let mut session = Session::seeded(SessionConfig::default(), 1);
        assert_eq!(session.invest_training(), Err(Rejection::NotRunning));
        assert_eq!(session.resolve_period(), Err(Rejection::NotRunning));
        assert_eq!(session.restart(), Err(Rejection::NotRunning));
        assert!(session.state().log.is_empty());
    }

    #[test]
    fn test_rejection_logs_warning_only() {
        let mut session = started(3, GameMode::Indefinite);
        let before = session.state().clone();

        assert!(session.remediate("CVE-9999-0000").is_err());

        let after = session.state();
        assert_eq!(after.log.len(), before.log.len() + 1);
        assert_eq!(after.log.last().map(|e| e.level), Some(LogLevel::Warning));
        assert_eq!(after.threats, before.threats);
        assert_eq!(after.capacity, before.capacity);
        assert_eq!(after.health, before.health);
        assert_eq!(after.score, before.score);
    }

    #[test]
    fn test_resign_is_terminal() {
        let mut session = started(4, GameMode::Indefinite);
        session.resign().unwrap();
        assert_eq!(session.phase(), Phase::Lost);
        assert_eq!(session.resign(), Err(Rejection::NotRunning));
        assert_eq!(session.invest_output(), Err(Rejection::NotRunning));
    }

    #[test]
    fn test_restart_keeps_mode() {
        let mut session = started(5, GameMode::Indefinite);
        session.resolve_period().unwrap();
        let _ = session.resign();

        session.restart().unwrap();
        assert_eq!(session.phase(), Phase::Running);
        assert_eq!(session.state().mode, Some(GameMode::Indefinite));
        assert_eq!(session.state().sprint, 1);
    }

    #[test]
    fn test_apply_dispatches() {
        let mut session = started(6, GameMode::Indefinite);
        let outcome = session.apply(&Action::InvestTraining).unwrap();
        assert_eq!(outcome, ActionOutcome::TrainingRaised { level: 1 });

        let outcome = session.apply(&Action::ResolvePeriod).unwrap();
        let ActionOutcome::Resolved(report) = outcome else {
            panic!("expected a sprint report");
        };
        assert_eq!(report.sprint, 1);
    }

    #[test]
    fn test_same_seed_same_session() {
        let mut a = started(77, GameMode::FixedHorizon);
        let mut b = started(77, GameMode::FixedHorizon);
        for _ in 0..5 {
            let _ = a.resolve_period();
            let _ = b.resolve_period();
        }
        assert_eq!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_bincode_roundtrip() {
        let mut session = started(8, GameMode::Indefinite);
        session.resolve_period().unwrap();

        let bytes = session.serialize().unwrap();
        let restored = Session::deserialize(&bytes, ChaCha8Rng::seed_from_u64(0)).unwrap();
        assert_eq!(restored.state(), session.state());
        assert_eq!(restored.state_hash(), session.state_hash());

        assert!(Session::deserialize(&[1, 2, 3], ChaCha8Rng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_deserialize_rejects_invalid_state() {
        let session = started(8, GameMode::FixedHorizon);
        let mut state = session.state().clone();
        state.capacity = BASE_CAPACITY + 1;
        let bytes = Session::from_state(state, ChaCha8Rng::seed_from_u64(0))
            .serialize()
            .unwrap();

        assert!(matches!(
            Session::deserialize(&bytes, ChaCha8Rng::seed_from_u64(0)),
            Err(GameError::InvalidState(_))
        ));
    }
}
