//! Sprint clock and entity identifiers.

use serde::{Deserialize, Serialize};

/// Simulated days in one sprint.
pub const SPRINT_DAYS: u32 = 14;

/// Id prefix for generated threats.
pub const THREAT_PREFIX: &str = "CVE-2025";

/// Id prefix for emergency threats injected by an exploit event.
pub const EMERGENCY_PREFIX: &str = "0DAY";

/// Id prefix for work items.
pub const OBLIGATION_PREFIX: &str = "WORK";

/// First simulated day covered by `sprint`.
#[must_use]
pub const fn day_of(sprint: u32) -> u32 {
    sprint.saturating_mul(SPRINT_DAYS)
}

/// Issues unique ids for threats and work items.
///
/// A single counter is shared across prefixes, so ids never collide
/// even when two prefixes coincide. The counter is part of the saved
/// session, which keeps replays byte-for-byte reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    /// Create a generator starting at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Create a generator whose first id uses `next`.
    #[must_use]
    pub const fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// Issue the next id with the given prefix.
    pub fn issue(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}-{:04}", self.next);
        self.next += 1;
        id
    }

    /// Number of ids issued so far.
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.next - 1
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_across_prefixes() {
        let mut ids = IdGenerator::new();
        let a = ids.issue(THREAT_PREFIX);
        let b = ids.issue(OBLIGATION_PREFIX);
        let c = ids.issue(THREAT_PREFIX);

        assert_eq!(a, "CVE-2025-0001");
        assert_eq!(b, "WORK-0002");
        assert_eq!(c, "CVE-2025-0003");
        assert_eq!(ids.issued(), 3);
    }

    #[test]
    fn test_starting_offset() {
        let mut ids = IdGenerator::starting_at(1000);
        assert_eq!(ids.issue(EMERGENCY_PREFIX), "0DAY-1000");
        assert_eq!(ids.issued(), 1000);
    }

    #[test]
    fn test_day_of() {
        assert_eq!(day_of(1), 14);
        assert_eq!(day_of(26), 364);
    }
}
