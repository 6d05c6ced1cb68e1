//! Threat and work-item generation.
//!
//! Every random draw goes through the caller's [`Rng`], so a seeded
//! generator reproduces a whole session exactly.
//!
//! # Escalation
//!
//! The lower bound of new threat severity rises by 0.3 per sprint (capped
//! at 8.0), and the number of threats per sprint grows by 0.2 per sprint.
//! A fixed 20% of threats are low-severity outliers so late sprints still
//! mix cheap and expensive fixes.

use rand::Rng;

use crate::clock::{IdGenerator, EMERGENCY_PREFIX, OBLIGATION_PREFIX, THREAT_PREFIX};
use crate::components::{Obligation, Threat, ThreatContext};
use crate::economy::{obligation_budget, MAX_SEVERITY, OUTPUT_RISK_FACTOR, TRAINING_REDUCTION};

/// Vulnerability classes.
pub const THREAT_CATEGORIES: [&str; 8] = [
    "SQL Injection",
    "XSS",
    "Buffer Overflow",
    "RCE",
    "Auth Bypass",
    "Privilege Escalation",
    "Deserialization",
    "Memory Leak",
];

/// Assets a threat can affect.
pub const THREAT_TARGETS: [&str; 6] = [
    "Web App",
    "DB Server",
    "Auth Service",
    "Payment Gateway",
    "Legacy API",
    "Admin Panel",
];

/// Business work item labels.
pub const WORK_ITEMS: [&str; 9] = [
    "Quarterly Compliance Audit",
    "Client Feature Release",
    "Legacy Migration",
    "Server Upgrade",
    "API Documentation",
    "Security Training",
    "Stakeholder Demo",
    "Data Backup Verify",
    "Performance Tuning",
];

/// Chance that a new threat ships with a fix already available.
const FIX_AVAILABLE_CHANCE: f64 = 0.7;

/// Chance that a new threat is a low-severity outlier.
const OUTLIER_CHANCE: f64 = 0.2;

/// Ceiling of the rising severity lower bound.
const SEVERITY_FLOOR_CAP: f64 = 8.0;

/// Baseline threats per sprint before escalation.
const BASE_SPAWN: f64 = 2.0;

/// Added threats per sprint elapsed.
const SPAWN_GROWTH: f64 = 0.2;

/// Width of the uniform jitter added to the spawn baseline.
const SPAWN_JITTER: f64 = 1.5;

/// Generate this sprint's work items.
///
/// One or two items; the total cost never exceeds 80% of base capacity.
pub fn generate_obligations(ids: &mut IdGenerator, rng: &mut impl Rng) -> Vec<Obligation> {
    let max_cost = obligation_budget();
    let count = rng.gen_range(1..=2);
    let mut spent = 0;
    let mut items = Vec::with_capacity(count);

    for _ in 0..count {
        let budget = max_cost - spent;
        if budget <= 1 {
            break;
        }
        let cost = budget.min(rng.gen_range(2..=5));
        spent += cost;

        let name = WORK_ITEMS[rng.gen_range(0..WORK_ITEMS.len())];
        items.push(Obligation {
            id: ids.issue(OBLIGATION_PREFIX),
            name: name.to_string(),
            cost,
            completed: false,
        });
    }

    items
}

/// Lower bound of new threat severity in `sprint`.
#[must_use]
pub fn severity_floor(sprint: u32) -> f64 {
    SEVERITY_FLOOR_CAP.min(1.0 + f64::from(sprint) * 0.3)
}

/// Draw a severity for a threat discovered in `sprint`.
///
/// Rounded to one decimal and capped at 10.0.
pub fn roll_severity(sprint: u32, rng: &mut impl Rng) -> f64 {
    let mut severity = rng.gen_range(severity_floor(sprint)..MAX_SEVERITY);
    if rng.gen_bool(OUTLIER_CHANCE) {
        severity = rng.gen_range(1.0..5.0);
    }
    ((severity * 10.0).round() / 10.0).min(MAX_SEVERITY)
}

/// Draw how many sprints until a fix ships. 0 means available now.
pub fn roll_fix_wait(severity: f64, rng: &mut impl Rng) -> u32 {
    if rng.gen_bool(FIX_AVAILABLE_CHANCE) {
        return 0;
    }
    if severity >= 9.0 {
        1
    } else if severity >= 7.0 {
        rng.gen_range(1..=2)
    } else {
        rng.gen_range(2..=3)
    }
}

/// Generate one threat discovered in `sprint`.
pub fn generate_threat(sprint: u32, ids: &mut IdGenerator, rng: &mut impl Rng) -> Threat {
    let context = if rng.gen_bool(0.5) {
        ThreatContext::External
    } else {
        ThreatContext::Internal
    };
    let severity = roll_severity(sprint, rng);
    let category = THREAT_CATEGORIES[rng.gen_range(0..THREAT_CATEGORIES.len())];
    let target = THREAT_TARGETS[rng.gen_range(0..THREAT_TARGETS.len())];
    let wait = roll_fix_wait(severity, rng);

    Threat {
        id: ids.issue(THREAT_PREFIX),
        category: category.to_string(),
        target: target.to_string(),
        context,
        severity,
        age: 0,
        deferred: false,
        periods_deferred: 0,
        fix_available: wait == 0,
        periods_until_fix: wait,
    }
}

/// Generate `count` threats for `sprint`.
pub fn generate_threats(
    count: usize,
    sprint: u32,
    ids: &mut IdGenerator,
    rng: &mut impl Rng,
) -> Vec<Threat> {
    (0..count)
        .map(|_| generate_threat(sprint, ids, rng))
        .collect()
}

/// Generate the opening threats of a session.
///
/// Every opening threat has a fix available so the first sprint is winnable.
pub fn opening_threats(count: usize, ids: &mut IdGenerator, rng: &mut impl Rng) -> Vec<Threat> {
    let mut threats = generate_threats(count, 1, ids, rng);
    for threat in &mut threats {
        threat.fix_available = true;
        threat.periods_until_fix = 0;
    }
    threats
}

/// Extra spawns caused by last sprint's output investment.
#[must_use]
pub fn feature_risk(output_investment: u32) -> f64 {
    f64::from(output_investment) * OUTPUT_RISK_FACTOR
}

/// Spawn count for a given baseline jitter in `[0, 1)`.
///
/// `max(1, floor(2 + 0.2 * sprint + 1.5 * jitter - 0.5 * training + 0.2 * output))`
#[must_use]
pub fn spawn_count_with_jitter(
    resolved_sprint: u32,
    training_level: u32,
    output_investment: u32,
    jitter: f64,
) -> usize {
    let baseline = BASE_SPAWN + f64::from(resolved_sprint) * SPAWN_GROWTH + jitter * SPAWN_JITTER;
    let raw = baseline - f64::from(training_level) * TRAINING_REDUCTION
        + feature_risk(output_investment);
    raw.floor().max(1.0) as usize
}

/// Draw the number of new threats after resolving `resolved_sprint`.
pub fn spawn_count(
    resolved_sprint: u32,
    training_level: u32,
    output_investment: u32,
    rng: &mut impl Rng,
) -> usize {
    let jitter: f64 = rng.gen();
    spawn_count_with_jitter(resolved_sprint, training_level, output_investment, jitter)
}

/// Build the maximum-severity threat injected by an exploit event.
///
/// Internet-facing, no fix yet, vendor ships one next sprint.
pub fn emergency_threat(ids: &mut IdGenerator) -> Threat {
    Threat {
        id: ids.issue(EMERGENCY_PREFIX),
        category: "Zero-Day RCE".to_string(),
        target: "Infrastructure".to_string(),
        context: ThreatContext::External,
        severity: MAX_SEVERITY,
        age: 0,
        deferred: false,
        periods_deferred: 0,
        fix_available: false,
        periods_until_fix: 1,
    }
}
