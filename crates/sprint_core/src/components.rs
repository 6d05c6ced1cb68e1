//! Entity definitions: threats and work items.
//!
//! Both are plain data owned by the session. Derived values (deadline,
//! elapsed days) are computed on demand and never stored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::SPRINT_DAYS;
use crate::economy::{deadline_window, is_breached, remediation_cost};

/// Where a threat is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatContext {
    /// Reachable only from inside the organization.
    Internal,
    /// Internet-facing; takes the external damage multiplier.
    External,
}

impl fmt::Display for ThreatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => f.write_str("Internal"),
            Self::External => f.write_str("External"),
        }
    }
}

/// Coarse severity band used for display and strategy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityBand {
    /// Below 4.0.
    Low,
    /// 4.0 up to 7.0.
    Medium,
    /// 7.0 up to 9.0.
    High,
    /// 9.0 and above.
    Critical,
}

impl SeverityBand {
    /// Band for a severity score.
    #[must_use]
    pub fn of(severity: f64) -> Self {
        if severity >= 9.0 {
            Self::Critical
        } else if severity >= 7.0 {
            Self::High
        } else if severity >= 4.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A discovered vulnerability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    /// Unique identifier.
    pub id: String,
    /// Vulnerability class, e.g. "SQL Injection".
    pub category: String,
    /// Affected asset, e.g. "Payment Gateway".
    pub target: String,
    /// Exposure.
    pub context: ThreatContext,
    /// Severity score in `[0.0, 10.0]`.
    pub severity: f64,
    /// Sprints survived so far.
    pub age: u32,
    /// Whether an exception is filed for this threat.
    pub deferred: bool,
    /// Consecutive sprints resolved while deferred.
    pub periods_deferred: u32,
    /// Whether a fix can be applied now.
    pub fix_available: bool,
    /// Sprints until the fix ships; 0 once available.
    pub periods_until_fix: u32,
}

impl Threat {
    /// Deadline window for this threat's severity, in days.
    #[must_use]
    pub fn deadline_days(&self) -> u32 {
        deadline_window(self.severity)
    }

    /// Simulated days since discovery.
    #[must_use]
    pub const fn elapsed_days(&self) -> u32 {
        self.age.saturating_mul(SPRINT_DAYS)
    }

    /// Days left before the deadline, floored at 0.
    #[must_use]
    pub fn days_remaining(&self) -> u32 {
        self.deadline_days().saturating_sub(self.elapsed_days())
    }

    /// Elapsed time as a fraction of the deadline. Above 1.0 means overdue.
    #[must_use]
    pub fn deadline_ratio(&self) -> f64 {
        f64::from(self.elapsed_days()) / f64::from(self.deadline_days())
    }

    /// Whether ending the current sprint pushes this threat past its deadline.
    #[must_use]
    pub fn breaches_next_period(&self) -> bool {
        is_breached(self.severity, self.age)
    }

    /// Capacity needed to remediate at the given automation level.
    #[must_use]
    pub fn remediation_cost(&self, automation_level: u32) -> u32 {
        remediation_cost(self.severity, automation_level)
    }

    /// Severity band.
    #[must_use]
    pub fn band(&self) -> SeverityBand {
        SeverityBand::of(self.severity)
    }

    /// One-line description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        if self.deferred {
            format!(
                "Deferred {} sprints. Exploit risk critical.",
                self.periods_deferred
            )
        } else {
            format!(
                "{} vulnerability detected in {} {}.",
                self.category, self.context, self.target
            )
        }
    }
}

/// A mandatory work item for the current sprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Obligation {
    /// Unique identifier.
    pub id: String,
    /// Display label.
    pub name: String,
    /// Capacity cost.
    pub cost: u32,
    /// Whether it was completed this sprint.
    pub completed: bool,
}
