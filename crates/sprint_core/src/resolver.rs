//! Sprint resolution: the end-of-sprint state transition.
//!
//! Resolution is a fixed pipeline of named stages. Each stage takes the
//! session and a [`Resolution`] accumulator and either continues or halts
//! the pipeline. Order matters and never changes:
//!
//! 1. [`apply_output_investment`] - pay out last sprint's feature work
//! 2. [`penalize_obligations`] - charge missed work items
//! 3. [`advance_threats`] - fix countdowns, deferral reservations, breach damage, aging
//! 4. [`roll_exploit`] - one draw against the combined exploit odds
//! 5. [`perfect_period_bonus`] - healing for a clean sprint
//! 6. [`apply_net_effect`] - damage and healing hit health; may lose
//! 7. [`check_horizon`] - fixed-horizon victory
//! 8. [`advance_period`] - regenerate capacity, spawn the next sprint
//!
//! Resolution never fails on a running session. Stages 6 and 7 can end the
//! session; when they do, later stages do not run.

use std::ops::ControlFlow;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::economy::{
    breach_damage, capacity_after_reservation, exploit_probability, is_breached,
    DEFERRAL_RESERVATION, MAX_HEALTH, OBLIGATION_PENALTY, OUTPUT_SCORE_MULTIPLIER,
    PERFECT_PERIOD_HEALING,
};
use crate::error::{ActionResult, Rejection};
use crate::events::LogLevel;
use crate::generator::{
    emergency_threat, feature_risk, generate_obligations, generate_threats, spawn_count,
};
use crate::state::{GameMode, Phase, SessionState};

/// How a resolution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// The next sprint is ready.
    Continue,
    /// Health ran out.
    Lost,
    /// Fixed horizon survived.
    Won,
}

/// Breach damage charged to one threat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreachCharge {
    /// Threat id.
    pub threat_id: String,
    /// Unfloored damage.
    pub damage: f64,
}

/// Summary of one resolution, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintReport {
    /// Sprint that was resolved.
    pub sprint: u32,
    /// Score paid out for last sprint's output investment.
    pub output_bonus: u64,
    /// Work items left incomplete.
    pub missed_obligations: u32,
    /// Damage from missed work items.
    pub obligation_damage: u32,
    /// Breach charges, in threat order.
    pub breaches: Vec<BreachCharge>,
    /// Threats whose fix shipped this sprint.
    pub fixes_released: Vec<String>,
    /// Capacity reserved for deferred threats next sprint.
    pub reserved_capacity: u32,
    /// Combined exploit odds for this sprint.
    pub exploit_probability: f64,
    /// Emergency threat created by an exploit, if any.
    pub emergency_threat: Option<String>,
    /// Damage from the exploit.
    pub exploit_damage: f64,
    /// Healing granted.
    pub healing: u32,
    /// Unfloored damage from all sources.
    pub total_damage: f64,
    /// Damage actually subtracted from health.
    pub damage_taken: u32,
    /// Health before resolution.
    pub health_before: u32,
    /// Health after resolution.
    pub health_after: u32,
    /// Threats generated for the next sprint.
    pub spawned_threats: usize,
    /// How resolution ended.
    pub outcome: ResolutionOutcome,
}

impl SprintReport {
    /// Total breach damage, unfloored.
    #[must_use]
    pub fn breach_damage(&self) -> f64 {
        self.breaches.iter().map(|b| b.damage).sum()
    }

    /// Whether the sprint earned the perfect-sprint bonus.
    #[must_use]
    pub const fn perfect(&self) -> bool {
        self.healing > 0
    }
}

/// Accumulators threaded through the resolution stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Damage accumulated so far, unfloored.
    pub damage: f64,
    /// Healing accumulated so far.
    pub healing: u32,
    /// Capacity to reserve next sprint.
    pub reserved_capacity: u32,
    /// Live threats when resolution began.
    pub entering_threats: usize,
    /// Incomplete work items when resolution began.
    pub incomplete_obligations: usize,
    /// Non-deferred threats seen by the threat pass.
    pub standard_active: usize,
    /// Deferred threats seen by the threat pass.
    pub deferred_active: usize,
    /// Report being filled in.
    pub report: SprintReport,
}

impl Resolution {
    /// Capture the pre-resolution counts.
    #[must_use]
    pub fn begin(state: &SessionState) -> Self {
        Self {
            damage: 0.0,
            healing: 0,
            reserved_capacity: 0,
            entering_threats: state.threats.len(),
            incomplete_obligations: state.incomplete_obligations(),
            standard_active: 0,
            deferred_active: 0,
            report: SprintReport {
                sprint: state.sprint,
                output_bonus: 0,
                missed_obligations: 0,
                obligation_damage: 0,
                breaches: Vec::new(),
                fixes_released: Vec::new(),
                reserved_capacity: 0,
                exploit_probability: 0.0,
                emergency_threat: None,
                exploit_damage: 0.0,
                healing: 0,
                total_damage: 0.0,
                damage_taken: 0,
                health_before: state.health,
                health_after: state.health,
                spawned_threats: 0,
                outcome: ResolutionOutcome::Continue,
            },
        }
    }

    /// Exploit odds given the threats seen by the threat pass.
    #[must_use]
    pub fn exploit_probability(&self) -> f64 {
        exploit_probability(self.standard_active, self.deferred_active)
    }

    fn finish(mut self, outcome: ResolutionOutcome) -> SprintReport {
        self.report.reserved_capacity = self.reserved_capacity;
        self.report.healing = self.healing;
        self.report.total_damage = self.damage;
        self.report.outcome = outcome;
        self.report
    }
}

/// Resolve the current sprint.
///
/// Rejected only when the session is not running.
pub fn resolve_period(state: &mut SessionState, rng: &mut impl Rng) -> ActionResult<SprintReport> {
    if !state.is_running() {
        return Err(Rejection::NotRunning);
    }

    let mut res = Resolution::begin(state);
    tracing::debug!(
        sprint = state.sprint,
        threats = res.entering_threats,
        incomplete = res.incomplete_obligations,
        "Resolving sprint"
    );

    apply_output_investment(state, &mut res);
    penalize_obligations(state, &mut res);
    advance_threats(state, &mut res);
    roll_exploit(state, &mut res, rng);
    perfect_period_bonus(state, &mut res);

    let flow = match apply_net_effect(state, &mut res) {
        ControlFlow::Continue(()) => check_horizon(state),
        halted => halted,
    };
    let outcome = match flow {
        ControlFlow::Break(outcome) => outcome,
        ControlFlow::Continue(()) => {
            advance_period(state, &mut res, rng);
            ResolutionOutcome::Continue
        }
    };

    #[cfg(feature = "debug-validation")]
    validate(state);

    Ok(res.finish(outcome))
}

/// Stage 1: pay out last sprint's output investment.
pub fn apply_output_investment(state: &mut SessionState, res: &mut Resolution) {
    let invested = state.pending_output_investment;
    if invested == 0 {
        return;
    }
    let bonus = u64::from(invested) * OUTPUT_SCORE_MULTIPLIER;
    state.score += bonus;
    res.report.output_bonus = bonus;
    state.log.push(
        state.sprint,
        LogLevel::Success,
        format!("Feature deployment successful! Business output +{bonus}."),
    );
}

/// Stage 2: one fixed penalty per incomplete work item.
pub fn penalize_obligations(state: &mut SessionState, res: &mut Resolution) {
    let missed = u32::try_from(res.incomplete_obligations).unwrap_or(u32::MAX);
    if missed == 0 {
        state.log.push(
            state.sprint,
            LogLevel::Success,
            "All business objectives met.",
        );
        return;
    }

    let penalty = missed.saturating_mul(OBLIGATION_PENALTY);
    res.damage += f64::from(penalty);
    res.report.missed_obligations = missed;
    res.report.obligation_damage = penalty;
    state.stats.obligations_missed += missed;
    state.log.push(
        state.sprint,
        LogLevel::Error,
        format!("Work item missed! -{penalty} integrity."),
    );
}

/// Stage 3: update every live threat.
///
/// Fix countdowns tick down. Deferred threats reserve capacity and take no
/// breach damage at any age. Non-deferred threats past their deadline are
/// charged. Every threat ages by one.
pub fn advance_threats(state: &mut SessionState, res: &mut Resolution) {
    let sprint = state.sprint;

    for threat in &mut state.threats {
        if !threat.fix_available {
            threat.periods_until_fix = threat.periods_until_fix.saturating_sub(1);
            if threat.periods_until_fix == 0 {
                threat.fix_available = true;
                res.report.fixes_released.push(threat.id.clone());
                state.log.push(
                    sprint,
                    LogLevel::Success,
                    format!("Patch released for {}! Vendor update available.", threat.id),
                );
            }
        }

        let breached = is_breached(threat.severity, threat.age);

        if threat.deferred {
            res.reserved_capacity += DEFERRAL_RESERVATION;
            res.deferred_active += 1;
            threat.periods_deferred = threat.periods_deferred.saturating_add(1);
        } else {
            res.standard_active += 1;
            if breached {
                let damage = breach_damage(threat.severity, threat.context);
                res.damage += damage;
                state.stats.breaches += 1;
                res.report.breaches.push(BreachCharge {
                    threat_id: threat.id.clone(),
                    damage,
                });
                state.log.push(
                    sprint,
                    LogLevel::Error,
                    format!(
                        "SLA BREACH on {}! Compliance penalty active (-{}).",
                        threat.id,
                        damage.floor()
                    ),
                );
            }
        }

        threat.age = threat.age.saturating_add(1);
    }

    tracing::debug!(
        sprint,
        standard = res.standard_active,
        deferred = res.deferred_active,
        reserved = res.reserved_capacity,
        damage = res.damage,
        "Threat pass complete"
    );
}

/// Stage 4: draw once against the combined exploit odds.
///
/// Skipped without a draw when no threats are live.
pub fn roll_exploit(state: &mut SessionState, res: &mut Resolution, rng: &mut impl Rng) {
    res.report.exploit_probability = res.exploit_probability();
    if res.standard_active + res.deferred_active == 0 {
        return;
    }
    let roll: f64 = rng.gen();
    apply_exploit_roll(state, res, roll);
}

/// Stage 4 with an explicit draw in `[0, 1)`.
///
/// An exploit happens when `roll` is below the combined odds. The emergency
/// threat joins the next sprint's set and skips this sprint's threat pass.
pub fn apply_exploit_roll(state: &mut SessionState, res: &mut Resolution, roll: f64) {
    let probability = res.exploit_probability();
    res.report.exploit_probability = probability;
    if roll >= probability {
        return;
    }

    let threat = emergency_threat(&mut state.ids);
    let damage = breach_damage(threat.severity, threat.context);
    res.damage += damage;
    res.report.exploit_damage = damage;
    res.report.emergency_threat = Some(threat.id.clone());
    state.stats.exploits += 1;
    state.log.push(
        state.sprint,
        LogLevel::Error,
        format!(
            "MALICIOUS ZERO-DAY ATTACK! (-{} integrity). Patch pending next sprint.",
            damage.floor()
        ),
    );
    tracing::info!(sprint = state.sprint, probability, roll, "Exploit event");
    state.threats.push(threat);
}

/// Stage 5: healing when the sprint started with no threats and every work
/// item was completed.
pub fn perfect_period_bonus(state: &mut SessionState, res: &mut Resolution) {
    if res.entering_threats != 0 || res.incomplete_obligations != 0 {
        return;
    }
    res.healing += PERFECT_PERIOD_HEALING;
    state.stats.perfect_sprints += 1;
    state.log.push(
        state.sprint,
        LogLevel::Success,
        format!("PERFECT SPRINT! Operations optimal. Integrity restored (+{PERFECT_PERIOD_HEALING})."),
    );
}

/// Stage 6: apply floored damage and healing to health.
///
/// Halts with [`ResolutionOutcome::Lost`] when health reaches zero.
pub fn apply_net_effect(
    state: &mut SessionState,
    res: &mut Resolution,
) -> ControlFlow<ResolutionOutcome> {
    let taken = res.damage.floor().max(0.0) as u32;
    let health = i64::from(state.health) - i64::from(taken) + i64::from(res.healing);
    state.health = health.clamp(0, i64::from(MAX_HEALTH)) as u32;

    state.stats.damage_taken += u64::from(taken);
    state.stats.healing_received += u64::from(res.healing);
    res.report.damage_taken = taken;
    res.report.health_after = state.health;

    // Summary only when breaches are the sole source of damage.
    if taken > 0 && res.report.missed_obligations == 0 && res.report.emergency_threat.is_none() {
        state.log.push(
            state.sprint,
            LogLevel::Error,
            format!("Compliance penalties applied: -{taken} integrity."),
        );
    }

    if state.health == 0 {
        state.phase = Phase::Lost;
        state.log.push(
            state.sprint,
            LogLevel::Error,
            "Business integrity collapsed. Game over.",
        );
        tracing::info!(sprint = state.sprint, score = state.score, "Session lost");
        return ControlFlow::Break(ResolutionOutcome::Lost);
    }

    ControlFlow::Continue(())
}

/// Stage 7: fixed-horizon victory.
pub fn check_horizon(state: &mut SessionState) -> ControlFlow<ResolutionOutcome> {
    if state.mode == Some(GameMode::FixedHorizon) && state.sprint >= state.config.horizon {
        state.phase = Phase::Won;
        state.log.push(
            state.sprint,
            LogLevel::Success,
            format!(
                "Survived {} days. Business secured with {} output.",
                state.day(),
                state.score
            ),
        );
        tracing::info!(sprint = state.sprint, score = state.score, "Session won");
        return ControlFlow::Break(ResolutionOutcome::Won);
    }
    ControlFlow::Continue(())
}

/// Stage 8: open the next sprint.
///
/// Applies pending automation, regenerates capacity net of reservations,
/// generates the next work items and threats (the generator reads the
/// pending output investment before it is cleared), and sorts threats by
/// severity, highest first. The sort is stable, so equal severities keep
/// their order: carried threats, then any emergency threat, then new ones.
pub fn advance_period(state: &mut SessionState, res: &mut Resolution, rng: &mut impl Rng) {
    let resolved = state.sprint;
    state.sprint = state.sprint.saturating_add(1);
    let sprint = state.sprint;

    if state.pending_automation > 0 {
        state.automation_level += state.pending_automation;
        state.pending_automation = 0;
        state.log.push(
            sprint,
            LogLevel::Success,
            format!("Automation upgrades online. Patch costs reduced for sprint {sprint}."),
        );
    }

    state.capacity = capacity_after_reservation(res.reserved_capacity);
    if res.reserved_capacity > 0 {
        state.log.push(
            sprint,
            LogLevel::Warning,
            format!(
                "{} capacity reserved for active exceptions.",
                res.reserved_capacity
            ),
        );
    }

    let invested = state.pending_output_investment;
    let risk = feature_risk(invested);
    if risk > 0.0 {
        state.log.push(
            sprint,
            LogLevel::Warning,
            format!(
                "Rapid feature development increased vulnerability risk by {:.0}% chance.",
                risk * 100.0
            ),
        );
    }

    let count = spawn_count(resolved, state.training_level, invested, rng);
    state.pending_output_investment = 0;

    let spawned = generate_threats(count, sprint, &mut state.ids, rng);
    state.threats.extend(spawned);
    state
        .threats
        .sort_by(|a, b| b.severity.total_cmp(&a.severity));

    state.obligations = generate_obligations(&mut state.ids, rng);

    let live = u32::try_from(state.threats.len()).unwrap_or(u32::MAX);
    state.stats.peak_threats = state.stats.peak_threats.max(live);
    res.report.spawned_threats = count;

    tracing::debug!(
        sprint,
        spawned = count,
        live,
        capacity = state.capacity,
        "Sprint opened"
    );
}

#[cfg(feature = "debug-validation")]
fn validate(state: &SessionState) {
    use crate::economy::BASE_CAPACITY;

    assert!(state.health <= MAX_HEALTH, "health out of range");
    assert!(state.capacity <= BASE_CAPACITY, "capacity out of range");
    assert!(
        state
            .threats
            .iter()
            .all(|t| (0.0..=10.0).contains(&t.severity)),
        "severity out of range"
    );
    if state.phase == Phase::Running {
        assert!(
            state
                .threats
                .windows(2)
                .all(|w| w[0].severity >= w[1].severity),
            "threats not sorted"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Obligation, Threat, ThreatContext};
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn threat(id: &str, severity: f64, context: ThreatContext, age: u32) -> Threat {
        Threat {
            id: id.into(),
            category: "RCE".into(),
            target: "Web App".into(),
            context,
            severity,
            age,
            deferred: false,
            periods_deferred: 0,
            fix_available: true,
            periods_until_fix: 0,
        }
    }

    fn running(mode: GameMode) -> SessionState {
        let mut state = SessionState::default();
        state.phase = Phase::Running;
        state.mode = Some(mode);
        state
    }

    #[test]
    fn test_rejects_when_not_running() {
        let mut state = SessionState::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(
            resolve_period(&mut state, &mut rng),
            Err(Rejection::NotRunning)
        );
    }

    #[test]
    fn test_external_breach_damage_is_floored() {
        let mut state = running(GameMode::Indefinite);
        state
            .threats
            .push(threat("CVE-1", 9.0, ThreatContext::External, 2));
        let mut res = Resolution::begin(&state);

        advance_threats(&mut state, &mut res);
        assert!((res.damage - 40.5).abs() < 1e-9);
        assert_eq!(res.report.breaches.len(), 1);

        assert_eq!(
            apply_net_effect(&mut state, &mut res),
            ControlFlow::Continue(())
        );
        assert_eq!(state.health, 60);
        assert_eq!(res.report.damage_taken, 40);
    }

    #[test]
    fn test_unbreached_threat_causes_no_damage() {
        let mut state = running(GameMode::Indefinite);
        state
            .threats
            .push(threat("CVE-1", 5.0, ThreatContext::External, 2));
        let mut res = Resolution::begin(&state);

        advance_threats(&mut state, &mut res);
        assert!(res.damage.abs() < f64::EPSILON);
        assert_eq!(state.threats[0].age, 3);
    }

    #[test]
    fn test_deferred_threat_reserves_and_takes_no_damage() {
        let mut state = running(GameMode::Indefinite);
        let mut t = threat("CVE-1", 10.0, ThreatContext::External, 5);
        t.deferred = true;
        t.periods_deferred = 5;
        state.threats.push(t);
        let mut res = Resolution::begin(&state);

        advance_threats(&mut state, &mut res);

        assert!(res.damage.abs() < f64::EPSILON);
        assert_eq!(res.reserved_capacity, 1);
        assert_eq!(state.threats[0].periods_deferred, 6);
        assert_eq!(state.threats[0].age, 6);
        assert!((state.threats[0].severity - 10.0).abs() < f64::EPSILON);
        assert!((res.exploit_probability() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_fix_countdown_releases_patch() {
        let mut state = running(GameMode::Indefinite);
        let mut t = threat("CVE-1", 5.0, ThreatContext::Internal, 0);
        t.fix_available = false;
        t.periods_until_fix = 2;
        state.threats.push(t);

        let mut res = Resolution::begin(&state);
        advance_threats(&mut state, &mut res);
        assert!(!state.threats[0].fix_available);
        assert_eq!(state.threats[0].periods_until_fix, 1);

        let mut res = Resolution::begin(&state);
        advance_threats(&mut state, &mut res);
        assert!(state.threats[0].fix_available);
        assert_eq!(res.report.fixes_released, vec!["CVE-1".to_string()]);
    }

    #[test]
    fn test_exploit_roll_injects_emergency_threat() {
        let mut state = running(GameMode::Indefinite);
        state
            .threats
            .push(threat("CVE-1", 2.0, ThreatContext::Internal, 0));
        let mut res = Resolution::begin(&state);
        advance_threats(&mut state, &mut res);

        apply_exploit_roll(&mut state, &mut res, 0.01);

        assert!((res.damage - 45.0).abs() < 1e-9);
        assert_eq!(state.threats.len(), 2);
        let emergency = &state.threats[1];
        assert!(emergency.id.starts_with("0DAY-"));
        assert_eq!(emergency.age, 0);
        assert!(!emergency.fix_available);
        assert_eq!(state.stats.exploits, 1);
    }

    #[test]
    fn test_exploit_roll_above_odds_does_nothing() {
        let mut state = running(GameMode::Indefinite);
        state
            .threats
            .push(threat("CVE-1", 2.0, ThreatContext::Internal, 0));
        let mut res = Resolution::begin(&state);
        advance_threats(&mut state, &mut res);

        apply_exploit_roll(&mut state, &mut res, 0.5);
        assert!(res.damage.abs() < f64::EPSILON);
        assert_eq!(state.threats.len(), 1);
    }

    #[test]
    fn test_perfect_sprint_heals_by_five() {
        let mut state = running(GameMode::Indefinite);
        state.health = 90;
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let report = resolve_period(&mut state, &mut rng).unwrap();

        assert_eq!(report.healing, 5);
        assert_eq!(state.health, 95);
        assert_eq!(report.outcome, ResolutionOutcome::Continue);
    }

    #[test]
    fn test_perfect_sprint_heal_is_capped() {
        let mut state = running(GameMode::Indefinite);
        state.health = 98;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        resolve_period(&mut state, &mut rng).unwrap();
        assert_eq!(state.health, MAX_HEALTH);
    }

    #[test]
    fn test_no_bonus_with_entering_threats() {
        let mut state = running(GameMode::Indefinite);
        state.health = 50;
        state
            .threats
            .push(threat("CVE-1", 2.0, ThreatContext::Internal, 0));
        let mut res = Resolution::begin(&state);
        perfect_period_bonus(&mut state, &mut res);
        assert_eq!(res.healing, 0);
    }

    #[test]
    fn test_missed_obligation_kills_low_health_session() {
        let mut state = running(GameMode::Indefinite);
        state.health = 5;
        state.obligations.push(Obligation {
            id: "WORK-1".into(),
            name: "Legacy Migration".into(),
            cost: 3,
            completed: false,
        });
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let report = resolve_period(&mut state, &mut rng).unwrap();

        assert_eq!(report.outcome, ResolutionOutcome::Lost);
        assert_eq!(report.healing, 0);
        assert_eq!(report.obligation_damage, 20);
        assert_eq!(state.health, 0);
        assert_eq!(state.phase, Phase::Lost);
        // Halted before advancing.
        assert_eq!(state.sprint, 1);
    }

    #[test]
    fn test_horizon_win_leaves_score_unchanged() {
        let mut state = running(GameMode::FixedHorizon);
        state.sprint = 26;
        state.score = 1234;
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let report = resolve_period(&mut state, &mut rng).unwrap();

        assert_eq!(report.outcome, ResolutionOutcome::Won);
        assert_eq!(state.phase, Phase::Won);
        assert_eq!(state.score, 1234);
        assert_eq!(state.sprint, 26);
    }

    #[test]
    fn test_indefinite_mode_never_wins() {
        let mut state = running(GameMode::Indefinite);
        state.sprint = 40;
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let report = resolve_period(&mut state, &mut rng).unwrap();
        assert_eq!(report.outcome, ResolutionOutcome::Continue);
        assert_eq!(state.sprint, 41);
    }

    #[test]
    fn test_capacity_resets_net_of_reservations() {
        let mut state = running(GameMode::Indefinite);
        for i in 0..3 {
            let mut t = threat(&format!("CVE-{i}"), 2.0, ThreatContext::Internal, 0);
            t.deferred = true;
            state.threats.push(t);
        }
        state.capacity = 1;
        let mut rng = ChaCha8Rng::seed_from_u64(17);

        let report = resolve_period(&mut state, &mut rng).unwrap();

        assert_eq!(report.reserved_capacity, 3);
        assert_eq!(state.capacity, 9);
    }

    #[test]
    fn test_output_investment_pays_and_raises_risk() {
        let mut state = running(GameMode::Indefinite);
        state.pending_output_investment = 10;
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let report = resolve_period(&mut state, &mut rng).unwrap();

        assert_eq!(report.output_bonus, 250);
        assert_eq!(state.score, 250);
        assert_eq!(state.pending_output_investment, 0);
        // 2 + 0.2 + jitter + 2.0 feature risk
        assert!(report.spawned_threats >= 4);
    }

    #[test]
    fn test_pending_automation_applies_on_advance() {
        let mut state = running(GameMode::Indefinite);
        state.pending_automation = 2;
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        resolve_period(&mut state, &mut rng).unwrap();
        assert_eq!(state.automation_level, 2);
        assert_eq!(state.pending_automation, 0);
    }

    #[test]
    fn test_next_sprint_is_sorted_and_aged() {
        let mut state = running(GameMode::Indefinite);
        state
            .threats
            .push(threat("CVE-A", 3.0, ThreatContext::Internal, 0));
        state
            .threats
            .push(threat("CVE-B", 6.0, ThreatContext::Internal, 1));
        let mut rng = ChaCha8Rng::seed_from_u64(21);

        resolve_period(&mut state, &mut rng).unwrap();

        assert!(state
            .threats
            .windows(2)
            .all(|w| w[0].severity >= w[1].severity));
        assert_eq!(state.threat("CVE-A").map(|t| t.age), Some(1));
        assert_eq!(state.threat("CVE-B").map(|t| t.age), Some(2));
        assert!(!state.obligations.is_empty());
    }

    #[test]
    fn test_equal_severities_keep_insertion_order() {
        let mut state = running(GameMode::Indefinite);
        for id in ["CVE-X", "CVE-Y", "CVE-Z"] {
            state
                .threats
                .push(threat(id, 0.5, ThreatContext::Internal, 0));
        }
        // New threats never roll below 1.0.
        let mut rng = StepRng::new(0, 0);

        resolve_period(&mut state, &mut rng).unwrap();

        let tail: Vec<&str> = state.threats[state.threats.len() - 3..]
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(tail, vec!["CVE-X", "CVE-Y", "CVE-Z"]);
    }
}
