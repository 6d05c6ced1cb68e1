//! Property tests over random states and action scripts.

use proptest::prelude::*;
use sprint_core::economy::{remediation_cost, BASE_CAPACITY, MAX_HEALTH};
use sprint_core::prelude::*;
use sprint_core::resolver::{advance_threats, Resolution};
use sprint_test_utils::determinism::strategies::{arb_mode, arb_script, arb_threat};
use sprint_test_utils::determinism::{find_first_divergence, run_script};
use sprint_test_utils::fixtures::{running_state, session_with_state, started_session};

proptest! {
    #[test]
    fn remediation_cost_formula(tenths in 0u32..=100, automation in 0u32..20) {
        let severity = f64::from(tenths) / 10.0;
        let expected = ((severity / 2.5).floor() as i64 - i64::from(automation)).max(1);
        prop_assert_eq!(i64::from(remediation_cost(severity, automation)), expected);
    }

    #[test]
    fn deferred_threats_never_breach(threats in prop::collection::vec(arb_threat(), 0..12)) {
        let mut state = running_state(GameMode::Indefinite);
        state.threats = threats
            .into_iter()
            .map(|mut t| {
                t.deferred = true;
                t
            })
            .collect();
        let mut res = Resolution::begin(&state);

        advance_threats(&mut state, &mut res);

        prop_assert!(res.report.breaches.is_empty());
        prop_assert!(res.damage.abs() < f64::EPSILON);
    }

    #[test]
    fn capacity_resets_net_of_deferrals(
        threats in prop::collection::vec(arb_threat(), 0..16),
        seed in any::<u64>(),
    ) {
        let mut state = running_state(GameMode::Indefinite);
        state.threats = threats;
        let deferred = u32::try_from(state.deferred_count()).unwrap();
        let mut session = session_with_state(state, seed);

        let report = session.resolve_period().unwrap();

        if report.outcome == ResolutionOutcome::Continue {
            prop_assert_eq!(session.state().capacity, BASE_CAPACITY.saturating_sub(deferred));
        }
    }

    #[test]
    fn rejected_actions_are_idempotent(seed in any::<u64>(), script in arb_script(40)) {
        let mut session = started_session(seed, GameMode::Indefinite);

        for action in &script {
            let before = session.state().clone();
            if session.apply(action).is_err() {
                let after = session.state();
                prop_assert_eq!(after.health, before.health);
                prop_assert_eq!(after.capacity, before.capacity);
                prop_assert_eq!(after.score, before.score);
                prop_assert_eq!(&after.threats, &before.threats);
                prop_assert_eq!(&after.obligations, &before.obligations);
                prop_assert_eq!(after.phase, before.phase);
            }
        }
    }

    #[test]
    fn state_stays_in_bounds(seed in any::<u64>(), mode in arb_mode(), script in arb_script(60)) {
        let mut session = Session::seeded(SessionConfig::default(), seed);
        session.start(mode);

        for action in &script {
            let _ = session.apply(action);
            let state = session.state();
            prop_assert!(state.health <= MAX_HEALTH);
            prop_assert!(state.capacity <= BASE_CAPACITY);
            prop_assert!(state.sprint >= 1);
            prop_assert!(state.threats.iter().all(|t| (0.0..=10.0).contains(&t.severity)));
            if state.phase == Phase::Running && matches!(action, Action::ResolvePeriod) {
                prop_assert!(state.threats.windows(2).all(|w| w[0].severity >= w[1].severity));
            }
            if state.health == 0 {
                prop_assert_eq!(state.phase, Phase::Lost);
            }
        }
    }

    #[test]
    fn same_seed_same_script_same_hash(seed in any::<u64>(), script in arb_script(30)) {
        let setup = || started_session(seed, GameMode::FixedHorizon);
        prop_assert_eq!(run_script(setup, &script), run_script(setup, &script));
        prop_assert_eq!(find_first_divergence(setup, &script), None);
    }
}
