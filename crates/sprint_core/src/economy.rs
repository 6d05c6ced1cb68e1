//! Economy rules: costs, deadlines, damage and exploit odds.
//!
//! Everything here is a pure function of its arguments. The resolver and
//! the action executor call into this module; nothing here touches session
//! state.

use crate::clock::SPRINT_DAYS;
use crate::components::ThreatContext;

/// Capacity restored at the start of every sprint before reservations.
pub const BASE_CAPACITY: u32 = 12;

/// Maximum (and starting) business health.
pub const MAX_HEALTH: u32 = 100;

/// Capacity cost of one automation investment.
pub const AUTOMATION_COST: u32 = BASE_CAPACITY / 2;

/// Capacity cost of one training investment.
pub const TRAINING_COST: u32 = 3;

/// Capacity reserved next sprint for each deferred threat.
pub const DEFERRAL_RESERVATION: u32 = 1;

/// Base damage multiplier applied to a threat's severity.
pub const DAMAGE_MULTIPLIER: f64 = 1.5;

/// Extra multiplier for internet-facing threats.
pub const EXTERNAL_MULTIPLIER: f64 = 1.5;

/// Multiplier applied when a threat is past its deadline.
pub const BREACH_MULTIPLIER: f64 = 2.0;

/// Damage charged for each work item left incomplete at sprint end.
pub const OBLIGATION_PENALTY: u32 = 20;

/// Share of base capacity that a sprint's work items may cost in total.
pub const MAX_OBLIGATION_RATIO: f64 = 0.8;

/// Per-sprint exploit chance of each standard (non-deferred) threat.
pub const BASE_EXPLOIT_CHANCE: f64 = 0.05;

/// Per-sprint exploit chance of each deferred threat.
pub const DEFERRED_EXPLOIT_CHANCE: f64 = 0.15;

/// Healing granted for a sprint with no threats and no missed work.
pub const PERFECT_PERIOD_HEALING: u32 = 5;

/// Score per capacity unit invested in output, paid out next sprint.
pub const OUTPUT_SCORE_MULTIPLIER: u64 = 25;

/// Extra threat spawns per capacity unit invested in output.
pub const OUTPUT_RISK_FACTOR: f64 = 0.2;

/// Fewer threat spawns per training level.
pub const TRAINING_REDUCTION: f64 = 0.5;

/// Score per capacity unit spent on a work item.
pub const OBLIGATION_SCORE_MULTIPLIER: u64 = 5;

/// Score per severity point remediated.
pub const REMEDIATION_SCORE_MULTIPLIER: f64 = 10.0;

/// Severity of an emergency threat created by an exploit event.
pub const MAX_SEVERITY: f64 = 10.0;

/// Sprints in a fixed-horizon session (about one year).
pub const STANDARD_HORIZON: u32 = 26;

/// Severity divisor used by the remediation cost curve.
const COST_DIVISOR: f64 = 2.5;

/// Undiscounted remediation cost: `floor(severity / 2.5)`.
#[must_use]
pub fn base_remediation_cost(severity: f64) -> u32 {
    (severity / COST_DIVISOR).floor().max(0.0) as u32
}

/// Capacity needed to remediate a threat of `severity`.
///
/// Automation lowers the cost one-for-one but never below 1.
///
/// ```
/// use sprint_core::economy::remediation_cost;
///
/// assert_eq!(remediation_cost(9.8, 0), 3);
/// assert_eq!(remediation_cost(9.8, 2), 1);
/// assert_eq!(remediation_cost(1.2, 0), 1);
/// ```
#[must_use]
pub fn remediation_cost(severity: f64, automation_level: u32) -> u32 {
    base_remediation_cost(severity)
        .saturating_sub(automation_level)
        .max(1)
}

/// Remediation deadline in days for a severity tier.
///
/// Tiers are inclusive at the lower bound.
#[must_use]
pub fn deadline_window(severity: f64) -> u32 {
    if severity >= 10.0 {
        7
    } else if severity >= 7.0 {
        30
    } else if severity >= 4.0 {
        60
    } else {
        90
    }
}

/// Whether a threat of `age` sprints will be past its deadline once the
/// sprint being resolved ends.
///
/// The check uses `age + 1`: a threat is charged when it crosses the
/// deadline, never retroactively for a sprint already charged.
#[must_use]
pub fn is_breached(severity: f64, age: u32) -> bool {
    age.saturating_add(1).saturating_mul(SPRINT_DAYS) > deadline_window(severity)
}

/// Damage multiplier for a threat's exposure.
#[must_use]
pub const fn context_multiplier(context: ThreatContext) -> f64 {
    match context {
        ThreatContext::External => EXTERNAL_MULTIPLIER,
        ThreatContext::Internal => 1.0,
    }
}

/// Damage charged for one sprint of an overdue, non-deferred threat.
#[must_use]
pub fn breach_damage(severity: f64, context: ThreatContext) -> f64 {
    severity * DAMAGE_MULTIPLIER * context_multiplier(context) * BREACH_MULTIPLIER
}

/// Probability that at least one live threat gets exploited this sprint.
///
/// `1 - (1 - 0.05)^standard * (1 - 0.15)^deferred`
#[must_use]
pub fn exploit_probability(standard: usize, deferred: usize) -> f64 {
    let safe_standard = (1.0 - BASE_EXPLOIT_CHANCE).powi(saturating_i32(standard));
    let safe_deferred = (1.0 - DEFERRED_EXPLOIT_CHANCE).powi(saturating_i32(deferred));
    1.0 - safe_standard * safe_deferred
}

/// Total capacity the sprint's work items may cost.
#[must_use]
pub fn obligation_budget() -> u32 {
    (f64::from(BASE_CAPACITY) * MAX_OBLIGATION_RATIO).floor() as u32
}

/// Capacity available at the start of a sprint after deferral reservations.
#[must_use]
pub const fn capacity_after_reservation(reserved: u32) -> u32 {
    BASE_CAPACITY.saturating_sub(reserved)
}

fn saturating_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
