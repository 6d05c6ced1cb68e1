//! Determinism testing utilities.
//!
//! A session is a pure function of its seed, config, mode and action
//! stream. These helpers check that claim from several angles.
//!
//! # Sources of non-determinism
//!
//! - **Ambient randomness**: every draw must go through the session's
//!   injected random source, never `thread_rng`.
//! - **Wall-clock ids**: ids come from a counter stored in the state.
//! - **Unstable sorts**: threats are ordered with a stable sort so equal
//!   severities keep their insertion order.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual stages with hand-built state
//! 2. **Property tests**: random action scripts must still reproduce
//! 3. **Integration tests**: full sessions are reproducible
//! 4. **Parallel tests**: running N sessions on threads all match

use std::thread;

use sprint_core::actions::Action;
use sprint_core::session::Session;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps taken per run.
    pub steps: u64,
}

impl DeterminismResult {
    /// Unique hashes; exactly one for a deterministic run.
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Session is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a setup/step loop several times and compare final hashes.
///
/// # Example
///
/// ```
/// use sprint_core::state::GameMode;
/// use sprint_test_utils::determinism::verify_determinism;
/// use sprint_test_utils::fixtures::{play_sensible_sprint, started_session};
///
/// let result = verify_determinism(
///     3,
///     10,
///     || started_session(42, GameMode::FixedHorizon),
///     |session| {
///         play_sensible_sprint(session);
///     },
///     |session| session.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..steps {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// Apply a script to a fresh session from `setup` and return its hash.
pub fn run_script<F>(setup: F, script: &[Action]) -> u64
where
    F: Fn() -> Session,
{
    let mut session = setup();
    for action in script {
        let _ = session.apply(action);
    }
    session.state_hash()
}

/// Run the same script on `num_sessions` threads and collect final hashes.
pub fn run_parallel_sessions<F>(setup: F, script: &[Action], num_sessions: usize) -> Vec<u64>
where
    F: Fn() -> Session + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_sessions)
            .map(|_| s.spawn(|| run_script(&setup, script)))
            .collect();

        // A panicked worker maps to 0, which can only match if all panicked.
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(0))
            .collect()
    })
}

/// Apply a script to two fresh sessions side by side.
///
/// Returns the index of the first action after which their hashes differ,
/// or `None` if they never do.
pub fn find_first_divergence<F>(setup: F, script: &[Action]) -> Option<usize>
where
    F: Fn() -> Session,
{
    let mut a = setup();
    let mut b = setup();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for (index, action) in script.iter().enumerate() {
        let _ = a.apply(action);
        let _ = b.apply(action);
        if a.state_hash() != b.state_hash() {
            return Some(index + 1);
        }
    }

    None
}

/// Check that a bincode round trip preserves the state hash.
pub fn verify_serialization_determinism(session: &Session) -> bool {
    let Ok(bytes) = session.serialize() else {
        return false;
    };
    let Ok(restored) = Session::deserialize(&bytes, crate::fixtures::seeded_rng(0)) else {
        return false;
    };
    restored.state_hash() == session.state_hash()
}

/// Proptest strategies for sessions.
pub mod strategies {
    use proptest::prelude::*;
    use sprint_core::actions::Action;
    use sprint_core::components::{Threat, ThreatContext};
    use sprint_core::state::GameMode;

    /// Severity with one decimal in `[0.0, 10.0]`.
    pub fn arb_severity() -> impl Strategy<Value = f64> {
        (0u32..=100).prop_map(|tenths| f64::from(tenths) / 10.0)
    }

    /// Threat exposure.
    pub fn arb_context() -> impl Strategy<Value = ThreatContext> {
        prop_oneof![Just(ThreatContext::Internal), Just(ThreatContext::External)]
    }

    /// Session mode.
    pub fn arb_mode() -> impl Strategy<Value = GameMode> {
        prop_oneof![Just(GameMode::FixedHorizon), Just(GameMode::Indefinite)]
    }

    /// A standalone threat.
    pub fn arb_threat() -> impl Strategy<Value = Threat> {
        (
            0u32..10_000,
            arb_severity(),
            arb_context(),
            0u32..12,
            any::<bool>(),
            0u32..4,
        )
            .prop_map(|(n, severity, context, age, deferred, wait)| Threat {
                id: format!("CVE-2025-{n:04}"),
                category: "RCE".to_string(),
                target: "Legacy API".to_string(),
                context,
                severity,
                age,
                deferred,
                periods_deferred: if deferred { age } else { 0 },
                fix_available: wait == 0,
                periods_until_fix: wait,
            })
    }

    /// An action. Ids point into the first few generated ids so some
    /// target live entities and some miss.
    pub fn arb_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            2 => (1u32..40).prop_map(|n| Action::Remediate {
                threat_id: format!("CVE-2025-{n:04}")
            }),
            2 => (1u32..40).prop_map(|n| Action::CompleteObligation {
                obligation_id: format!("WORK-{n:04}")
            }),
            1 => (1u32..40).prop_map(|n| Action::ToggleDefer {
                threat_id: format!("CVE-2025-{n:04}")
            }),
            1 => Just(Action::InvestAutomation),
            1 => Just(Action::InvestTraining),
            1 => Just(Action::InvestOutput),
            3 => Just(Action::ResolvePeriod),
        ]
    }

    /// A script of up to `max_len` actions.
    pub fn arb_script(max_len: usize) -> impl Strategy<Value = Vec<Action>> {
        prop::collection::vec(arb_action(), 0..max_len)
    }
}
