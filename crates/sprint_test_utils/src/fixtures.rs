//! Test fixtures and helpers.
//!
//! Hand-built threats, work items and sessions for tests that need exact
//! control over state instead of generator output.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sprint_core::actions::Action;
use sprint_core::clock::IdGenerator;
use sprint_core::components::{Obligation, Threat, ThreatContext};
use sprint_core::session::Session;
use sprint_core::state::{GameMode, Phase, SessionConfig, SessionState};

/// Builder for a [`Threat`] with sensible defaults.
#[derive(Debug, Clone)]
pub struct ThreatBuilder {
    threat: Threat,
}

impl ThreatBuilder {
    /// Internal, fix available, age 0.
    #[must_use]
    pub fn new(id: &str, severity: f64) -> Self {
        Self {
            threat: Threat {
                id: id.to_string(),
                category: "SQL Injection".to_string(),
                target: "DB Server".to_string(),
                context: ThreatContext::Internal,
                severity,
                age: 0,
                deferred: false,
                periods_deferred: 0,
                fix_available: true,
                periods_until_fix: 0,
            },
        }
    }

    /// Internet-facing.
    #[must_use]
    pub const fn external(mut self) -> Self {
        self.threat.context = ThreatContext::External;
        self
    }

    /// Sprints survived.
    #[must_use]
    pub const fn age(mut self, age: u32) -> Self {
        self.threat.age = age;
        self
    }

    /// Deferred for `periods` sprints so far.
    #[must_use]
    pub const fn deferred(mut self, periods: u32) -> Self {
        self.threat.deferred = true;
        self.threat.periods_deferred = periods;
        self
    }

    /// Fix ships in `sprints`.
    #[must_use]
    pub const fn fix_in(mut self, sprints: u32) -> Self {
        self.threat.fix_available = sprints == 0;
        self.threat.periods_until_fix = sprints;
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> Threat {
        self.threat
    }
}

/// Shorthand for `ThreatBuilder::new(id, severity)`.
#[must_use]
pub fn threat(id: &str, severity: f64) -> ThreatBuilder {
    ThreatBuilder::new(id, severity)
}

/// An incomplete work item.
#[must_use]
pub fn obligation(id: &str, cost: u32) -> Obligation {
    Obligation {
        id: id.to_string(),
        name: "Quarterly Compliance Audit".to_string(),
        cost,
        completed: false,
    }
}

/// First id the generator issues in hand-built states. Fixture ids below
/// this never collide with generated ones.
pub const GENERATED_ID_START: u64 = 1000;

/// A running sprint-1 state with no threats and no work items.
#[must_use]
pub fn running_state(mode: GameMode) -> SessionState {
    let mut state = SessionState::new(SessionConfig::default());
    state.phase = Phase::Running;
    state.mode = Some(mode);
    state.ids = IdGenerator::starting_at(GENERATED_ID_START);
    state
}

/// A seeded random source.
#[must_use]
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// A seeded session wrapped around a hand-built state.
#[must_use]
pub fn session_with_state(state: SessionState, seed: u64) -> Session {
    Session::from_state(state, seeded_rng(seed))
}

/// A seeded session already started in `mode`.
#[must_use]
pub fn started_session(seed: u64, mode: GameMode) -> Session {
    let mut session = Session::seeded(SessionConfig::default(), seed);
    session.start(mode);
    session
}

/// One sprint of a simple competent player: complete work items, remediate
/// what the budget allows (highest severity first), then end the sprint.
///
/// Returns the actions it tried, in order.
pub fn play_sensible_sprint(session: &mut Session) -> Vec<Action> {
    let mut tried = Vec::new();

    let work: Vec<String> = session
        .state()
        .obligations
        .iter()
        .filter(|o| !o.completed)
        .map(|o| o.id.clone())
        .collect();
    for obligation_id in work {
        let action = Action::CompleteObligation { obligation_id };
        let _ = session.apply(&action);
        tried.push(action);
    }

    let fixable: Vec<String> = session
        .state()
        .threats
        .iter()
        .filter(|t| t.fix_available)
        .map(|t| t.id.clone())
        .collect();
    for threat_id in fixable {
        let action = Action::Remediate { threat_id };
        if session.quote(&action).is_ok() {
            let _ = session.apply(&action);
            tried.push(action);
        }
    }

    let _ = session.apply(&Action::ResolvePeriod);
    tried.push(Action::ResolvePeriod);
    tracing::trace!(sprint = session.state().sprint, "Sensible sprint played");
    tried
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threat_builder() {
        let t = threat("CVE-1", 9.0).external().age(2).deferred(1).fix_in(2).build();
        assert_eq!(t.context, ThreatContext::External);
        assert_eq!(t.age, 2);
        assert!(t.deferred);
        assert!(!t.fix_available);
        assert_eq!(t.periods_until_fix, 2);
    }

    #[test]
    fn test_sensible_sprint_ends_with_resolution() {
        let mut session = started_session(3, GameMode::FixedHorizon);
        let tried = play_sensible_sprint(&mut session);
        assert_eq!(tried.last(), Some(&Action::ResolvePeriod));
        assert!(session.state().sprint == 2 || session.phase() == Phase::Lost);
    }
}
