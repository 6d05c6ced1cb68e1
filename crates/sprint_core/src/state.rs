//! Session state: the single aggregate the engine mutates.
//!
//! The presentation layer only ever reads a [`SessionState`]; every write
//! goes through the action executor or the sprint resolver.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clock::{day_of, IdGenerator};
use crate::components::{Obligation, Threat};
use crate::economy::{BASE_CAPACITY, MAX_HEALTH, MAX_SEVERITY, STANDARD_HORIZON};
use crate::error::{GameError, Result};
use crate::events::EventLog;

/// Top-level phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for `start`.
    #[default]
    NotStarted,
    /// Accepting actions.
    Running,
    /// Health reached zero or the player resigned. Absorbing.
    Lost,
    /// Survived the horizon. Absorbing.
    Won,
}

impl Phase {
    /// Whether the session has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Lost | Self::Won)
    }
}

/// Session length rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Win by surviving the configured horizon.
    FixedHorizon,
    /// Play until health runs out.
    Indefinite,
}

impl GameMode {
    /// Upper-case label used in the opening log line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FixedHorizon => "STANDARD",
            Self::Indefinite => "ENDLESS",
        }
    }
}

/// Tunables read once when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sprints to survive in fixed-horizon mode.
    pub horizon: u32,
    /// Threats seeded at session start (all with fixes available).
    pub opening_threats: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            horizon: STANDARD_HORIZON,
            opening_threats: 2,
        }
    }
}

impl SessionConfig {
    /// Parse a config from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron).map_err(|e| GameError::ConfigParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = ron::from_str(&contents).map_err(|e| GameError::ConfigParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a session meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(GameError::InvalidConfig(
                "horizon must be at least 1 sprint".to_string(),
            ));
        }
        Ok(())
    }
}

/// Running totals kept for reporting and balance analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionStats {
    /// Threats removed by remediation.
    pub threats_remediated: u32,
    /// Work items completed.
    pub obligations_completed: u32,
    /// Work items left incomplete at sprint end.
    pub obligations_missed: u32,
    /// Breach charges applied.
    pub breaches: u32,
    /// Exploit events.
    pub exploits: u32,
    /// Perfect sprints.
    pub perfect_sprints: u32,
    /// Damage applied to health, after flooring.
    pub damage_taken: u64,
    /// Healing applied to health, before clamping.
    pub healing_received: u64,
    /// Largest live threat count at any sprint start.
    pub peak_threats: u32,
}

/// Full state of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Current sprint, starting at 1.
    pub sprint: u32,
    /// Business health in `[0, MAX_HEALTH]`.
    pub health: u32,
    /// Capacity left this sprint in `[0, BASE_CAPACITY]`.
    pub capacity: u32,
    /// Automation level in effect.
    pub automation_level: u32,
    /// Automation purchased this sprint; applies after resolution.
    pub pending_automation: u32,
    /// Training level; applies to the next generation cycle.
    pub training_level: u32,
    /// Capacity invested in output this sprint; pays out after resolution.
    pub pending_output_investment: u32,
    /// Cumulative business output.
    pub score: u64,
    /// Event log.
    pub log: EventLog,
    /// Phase.
    pub phase: Phase,
    /// Mode, set by `start`.
    pub mode: Option<GameMode>,
    /// Live threats, highest severity first after each resolution.
    pub threats: Vec<Threat>,
    /// This sprint's work items.
    pub obligations: Vec<Obligation>,
    /// Id issuer.
    pub ids: IdGenerator,
    /// Running totals.
    pub stats: SessionStats,
    /// Config captured at start.
    pub config: SessionConfig,
}

impl SessionState {
    /// A fresh, not-yet-started session.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sprint: 1,
            health: MAX_HEALTH,
            capacity: BASE_CAPACITY,
            automation_level: 0,
            pending_automation: 0,
            training_level: 0,
            pending_output_investment: 0,
            score: 0,
            log: EventLog::new(),
            phase: Phase::NotStarted,
            mode: None,
            threats: Vec::new(),
            obligations: Vec::new(),
            ids: IdGenerator::new(),
            stats: SessionStats::default(),
            config,
        }
    }

    /// Whether actions are accepted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// First simulated day of the current sprint.
    #[must_use]
    pub const fn day(&self) -> u32 {
        day_of(self.sprint)
    }

    /// Look up a live threat.
    #[must_use]
    pub fn threat(&self, id: &str) -> Option<&Threat> {
        self.threats.iter().find(|t| t.id == id)
    }

    /// Look up a work item.
    #[must_use]
    pub fn obligation(&self, id: &str) -> Option<&Obligation> {
        self.obligations.iter().find(|o| o.id == id)
    }

    /// Number of deferred threats.
    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.threats.iter().filter(|t| t.deferred).count()
    }

    /// Work items not yet completed.
    #[must_use]
    pub fn incomplete_obligations(&self) -> usize {
        self.obligations.iter().filter(|o| !o.completed).count()
    }

    /// Sprints left before a fixed-horizon win, if applicable.
    #[must_use]
    pub fn sprints_remaining(&self) -> Option<u32> {
        match self.mode {
            Some(GameMode::FixedHorizon) => Some(self.config.horizon.saturating_sub(self.sprint)),
            _ => None,
        }
    }

    /// Compute a hash of the full state for determinism checks.
    ///
    /// Floats are hashed by bit pattern.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.sprint.hash(&mut hasher);
        self.health.hash(&mut hasher);
        self.capacity.hash(&mut hasher);
        self.automation_level.hash(&mut hasher);
        self.pending_automation.hash(&mut hasher);
        self.training_level.hash(&mut hasher);
        self.pending_output_investment.hash(&mut hasher);
        self.score.hash(&mut hasher);
        self.phase.hash(&mut hasher);
        self.mode.hash(&mut hasher);
        self.ids.hash(&mut hasher);
        self.stats.hash(&mut hasher);

        for threat in &self.threats {
            threat.id.hash(&mut hasher);
            threat.category.hash(&mut hasher);
            threat.target.hash(&mut hasher);
            threat.context.hash(&mut hasher);
            threat.severity.to_bits().hash(&mut hasher);
            threat.age.hash(&mut hasher);
            threat.deferred.hash(&mut hasher);
            threat.periods_deferred.hash(&mut hasher);
            threat.fix_available.hash(&mut hasher);
            threat.periods_until_fix.hash(&mut hasher);
        }

        self.obligations.hash(&mut hasher);
        self.log.hash(&mut hasher);

        hasher.finish()
    }

    /// Encode as pretty JSON for save files.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GameError::Serialization(format!("Failed to encode session: {e}")))
    }

    /// Decode from JSON. The decoded state must pass [`SessionState::validate`].
    pub fn from_json(json: &str) -> Result<Self> {
        let state: Self = serde_json::from_str(json)
            .map_err(|e| GameError::Serialization(format!("Failed to decode session: {e}")))?;
        state.validate()?;
        Ok(state)
    }

    /// Check the bounds every engine-produced state satisfies.
    ///
    /// Used on restored states, which may come from an edited save file.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;

        if self.sprint == 0 {
            return Err(invalid("sprint must start at 1".to_string()));
        }
        if self.health > MAX_HEALTH {
            return Err(invalid(format!(
                "health {} exceeds {MAX_HEALTH}",
                self.health
            )));
        }
        if self.capacity > BASE_CAPACITY {
            return Err(invalid(format!(
                "capacity {} exceeds {BASE_CAPACITY}",
                self.capacity
            )));
        }
        if self.phase != Phase::NotStarted && self.mode.is_none() {
            return Err(invalid(format!("{:?} session has no mode", self.phase)));
        }

        for threat in &self.threats {
            if !(0.0..=MAX_SEVERITY).contains(&threat.severity) {
                return Err(invalid(format!(
                    "threat {} has severity {}",
                    threat.id, threat.severity
                )));
            }
            if threat.fix_available != (threat.periods_until_fix == 0) {
                return Err(invalid(format!(
                    "threat {} fix countdown disagrees with availability",
                    threat.id
                )));
            }
            if self.threats.iter().filter(|t| t.id == threat.id).count() > 1 {
                return Err(invalid(format!("duplicate threat id {}", threat.id)));
            }
        }

        Ok(())
    }

    /// Write a JSON save file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Read a JSON save file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}

fn invalid(message: String) -> GameError {
    GameError::InvalidState(message)
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
