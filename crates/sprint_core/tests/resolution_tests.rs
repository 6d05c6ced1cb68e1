//! End-to-end sprint resolution scenarios.
//!
//! Each test builds an exact state by hand, wraps it in a seeded session
//! and resolves one sprint through the public API.

use sprint_core::economy::{exploit_probability, BASE_CAPACITY, MAX_HEALTH};
use sprint_core::prelude::*;
use sprint_core::resolver::{advance_threats, Resolution};
use sprint_test_utils::fixtures::{obligation, running_state, session_with_state, threat};

#[test]
fn deferred_critical_reserves_capacity_without_damage() {
    let mut state = running_state(GameMode::Indefinite);
    state
        .threats
        .push(threat("CVE-2025-0001", 10.0).external().age(5).deferred(5).build());
    let mut session = session_with_state(state, 1);

    let report = session.resolve_period().unwrap();

    assert!(report.breaches.is_empty());
    assert_eq!(report.reserved_capacity, 1);
    assert!((report.exploit_probability - 0.15).abs() < 1e-12);
    assert_eq!(session.state().capacity, BASE_CAPACITY - 1);
    // Only an exploit can hurt here.
    let expected = if report.emergency_threat.is_some() { 55 } else { MAX_HEALTH };
    assert_eq!(session.state().health, expected);
}

#[test]
fn breached_external_threat_costs_forty() {
    let mut state = running_state(GameMode::Indefinite);
    state
        .threats
        .push(threat("CVE-2025-0001", 9.0).external().age(2).build());
    let mut res = Resolution::begin(&state);

    advance_threats(&mut state, &mut res);

    assert!((res.damage - 40.5).abs() < 1e-9);
    assert_eq!(res.damage.floor() as u32, 40);
}

#[test]
fn breach_is_charged_every_sprint_while_overdue() {
    let mut state = running_state(GameMode::Indefinite);
    state
        .threats
        .push(threat("CVE-2025-0001", 5.0).age(4).build());

    let mut first = Resolution::begin(&state);
    advance_threats(&mut state, &mut first);
    let mut second = Resolution::begin(&state);
    advance_threats(&mut state, &mut second);

    assert_eq!(first.report.breaches.len(), 1);
    assert_eq!(second.report.breaches.len(), 1);
    assert!((first.damage - 15.0).abs() < 1e-9);
}

#[test]
fn empty_sprint_heals_five() {
    let mut state = running_state(GameMode::Indefinite);
    state.health = 70;
    let mut session = session_with_state(state, 2);

    let report = session.resolve_period().unwrap();

    assert!(report.perfect());
    assert_eq!(session.state().health, 75);
    assert_eq!(session.state().stats.perfect_sprints, 1);
}

#[test]
fn completed_work_still_earns_bonus() {
    let mut state = running_state(GameMode::Indefinite);
    state.health = 50;
    state.obligations.push(obligation("WORK-0001", 3));
    let mut session = session_with_state(state, 2);

    session.complete_obligation("WORK-0001").unwrap();
    let report = session.resolve_period().unwrap();

    assert_eq!(report.missed_obligations, 0);
    assert_eq!(report.healing, 5);
    assert_eq!(session.state().health, 55);
}

#[test]
fn bonus_judged_on_threats_live_at_sprint_end() {
    let mut state = running_state(GameMode::Indefinite);
    state.health = 50;
    state.threats.push(threat("CVE-2025-0001", 2.0).build());
    let mut session = session_with_state(state, 2);

    session.remediate("CVE-2025-0001").unwrap();
    let report = session.resolve_period().unwrap();

    assert_eq!(report.healing, 5);

    let mut state = running_state(GameMode::Indefinite);
    state.health = 50;
    state.threats.push(threat("CVE-2025-0002", 2.0).fix_in(3).build());
    let mut session = session_with_state(state, 2);
    let report = session.resolve_period().unwrap();
    assert_eq!(report.healing, 0);
}

#[test]
fn missed_work_item_at_five_health_loses() {
    let mut state = running_state(GameMode::FixedHorizon);
    state.health = 5;
    state.obligations.push(obligation("WORK-0001", 4));
    let mut session = session_with_state(state, 3);

    let report = session.resolve_period().unwrap();

    assert_eq!(report.outcome, ResolutionOutcome::Lost);
    assert_eq!(report.healing, 0);
    assert_eq!(session.state().health, 0);
    assert_eq!(session.phase(), Phase::Lost);
    assert_eq!(session.invest_training(), Err(Rejection::NotRunning));
}

#[test]
fn surviving_sprint_twenty_six_wins() {
    let mut state = running_state(GameMode::FixedHorizon);
    state.sprint = 26;
    state.score = 900;
    let mut session = session_with_state(state, 4);

    let report = session.resolve_period().unwrap();

    assert_eq!(report.outcome, ResolutionOutcome::Won);
    assert_eq!(session.phase(), Phase::Won);
    assert_eq!(session.state().score, 900);
    assert_eq!(session.resolve_period(), Err(Rejection::NotRunning));
}

#[test]
fn sprint_twenty_five_does_not_win() {
    let mut state = running_state(GameMode::FixedHorizon);
    state.sprint = 25;
    let mut session = session_with_state(state, 4);

    let report = session.resolve_period().unwrap();

    assert_eq!(report.outcome, ResolutionOutcome::Continue);
    assert_eq!(session.state().sprint, 26);
}

#[test]
fn loss_takes_priority_over_horizon() {
    let mut state = running_state(GameMode::FixedHorizon);
    state.sprint = 26;
    state.health = 10;
    state.obligations.push(obligation("WORK-0001", 2));
    let mut session = session_with_state(state, 4);

    let report = session.resolve_period().unwrap();
    assert_eq!(report.outcome, ResolutionOutcome::Lost);
}

#[test]
fn rejected_remediation_with_no_capacity_changes_nothing() {
    let mut state = running_state(GameMode::Indefinite);
    state.capacity = 0;
    state.threats.push(threat("CVE-2025-0001", 9.9).build());
    let mut session = session_with_state(state, 5);
    let before = session.state().clone();

    let result = session.remediate("CVE-2025-0001");

    assert_eq!(
        result,
        Err(Rejection::InsufficientCapacity {
            required: 3,
            available: 0
        })
    );
    let after = session.state();
    assert_eq!(after.health, before.health);
    assert_eq!(after.capacity, before.capacity);
    assert_eq!(after.score, before.score);
    assert_eq!(after.threats.len(), before.threats.len());
    assert_eq!(after.obligations.len(), before.obligations.len());
}

#[test]
fn exploit_odds_combine_standard_and_deferred() {
    let mut state = running_state(GameMode::Indefinite);
    state.threats.push(threat("CVE-2025-0001", 3.0).build());
    state.threats.push(threat("CVE-2025-0002", 3.0).build());
    state
        .threats
        .push(threat("CVE-2025-0003", 3.0).deferred(0).build());
    let mut session = session_with_state(state, 6);

    let report = session.resolve_period().unwrap();

    assert!((report.exploit_probability - exploit_probability(2, 1)).abs() < 1e-12);
}

#[test]
fn automation_discount_applies_next_sprint() {
    let mut state = running_state(GameMode::Indefinite);
    state.threats.push(threat("CVE-2025-0001", 9.0).build());
    let mut session = session_with_state(state, 10);

    let action = Action::Remediate {
        threat_id: "CVE-2025-0001".into(),
    };
    assert_eq!(session.quote(&action), Ok(3));

    session.invest_automation().unwrap();
    assert_eq!(session.quote(&action), Ok(3));

    session.resolve_period().unwrap();
    assert_eq!(session.state().automation_level, 1);
    assert_eq!(session.state().pending_automation, 0);
    assert_eq!(session.quote(&action), Ok(2));
}

#[test]
fn emergency_threat_becomes_fixable_next_sprint() {
    // Twenty deferred threats: exploit odds above 96%.
    let mut state = running_state(GameMode::Indefinite);
    for n in 0..20 {
        state
            .threats
            .push(threat(&format!("CVE-2025-{n:04}"), 1.0).deferred(0).build());
    }
    let mut session = session_with_state(state, 11);

    let report = session.resolve_period().unwrap();
    let Some(id) = report.emergency_threat else {
        return;
    };

    let emergency = session.state().threat(&id).cloned().unwrap();
    assert!(!emergency.fix_available);
    assert!((session.state().threats[0].severity - 10.0).abs() < f64::EPSILON);

    session.resolve_period().unwrap();
    if session.phase() == Phase::Running {
        let emergency = session.state().threat(&id).unwrap();
        assert!(emergency.fix_available);
        assert_eq!(emergency.age, 1);
    }
}

#[test]
fn log_records_each_stage() {
    let mut state = running_state(GameMode::Indefinite);
    state.pending_output_investment = 4;
    state.pending_automation = 1;
    state.obligations.push(obligation("WORK-0001", 3));
    state
        .threats
        .push(threat("CVE-2025-0001", 6.0).deferred(1).build());
    let mut session = session_with_state(state, 12);
    let offset = session.state().log.len();

    session.resolve_period().unwrap();

    let messages: Vec<&str> = session
        .state()
        .log
        .since(offset)
        .iter()
        .map(|e| e.message.as_str())
        .collect();
    assert!(messages[0].starts_with("Feature deployment successful"));
    assert!(messages[1].starts_with("Work item missed"));
    assert!(messages.iter().any(|m| m.starts_with("Automation upgrades online")));
    assert!(messages.iter().any(|m| m.contains("capacity reserved")));
    assert!(messages.iter().any(|m| m.starts_with("Rapid feature development")));
}

fn messages_since(session: &Session, offset: usize) -> Vec<String> {
    session
        .state()
        .log
        .since(offset)
        .iter()
        .map(|e| e.message.clone())
        .collect()
}

#[test]
fn damage_summary_only_for_breach_only_sprints() {
    let mut state = running_state(GameMode::Indefinite);
    state
        .threats
        .push(threat("CVE-2025-0001", 9.0).external().age(2).build());
    let mut session = session_with_state(state, 4);

    let report = session.resolve_period().unwrap();

    let summaries = messages_since(&session, 0)
        .iter()
        .filter(|m| m.starts_with("Compliance penalties applied"))
        .count();
    let expected = usize::from(report.emergency_threat.is_none());
    assert_eq!(summaries, expected);
}

#[test]
fn damage_summary_skipped_when_work_item_missed() {
    let mut state = running_state(GameMode::Indefinite);
    state.obligations.push(obligation("WORK-0001", 3));
    state
        .threats
        .push(threat("CVE-2025-0001", 9.0).external().age(2).build());
    let mut session = session_with_state(state, 4);

    session.resolve_period().unwrap();

    assert!(!messages_since(&session, 0)
        .iter()
        .any(|m| m.starts_with("Compliance penalties applied")));
}

#[test]
fn restored_ancient_threat_resolves_without_overflow() {
    let mut state = running_state(GameMode::Indefinite);
    state
        .threats
        .push(threat("CVE-2025-0001", 5.0).age(u32::MAX).deferred(u32::MAX).build());
    state
        .threats
        .push(threat("CVE-2025-0002", 5.0).age(u32::MAX).build());
    let restored = SessionState::from_json(&state.to_json().unwrap()).unwrap();
    let mut session = session_with_state(restored, 2);

    let report = session.resolve_period().unwrap();

    assert_eq!(report.breaches.len(), 1);
    let old = session.state().threat("CVE-2025-0002").unwrap();
    assert_eq!(old.age, u32::MAX);
    assert_eq!(old.elapsed_days(), u32::MAX);
    let deferred = session.state().threat("CVE-2025-0001").unwrap();
    assert_eq!(deferred.periods_deferred, u32::MAX);
}
