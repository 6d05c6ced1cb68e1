//! Session metrics for balance analysis.
//!
//! [`MetricsCollector`] follows one session sprint by sprint and produces a
//! [`GameMetrics`]; [`BatchSummary`] aggregates many of them.

use serde::{Deserialize, Serialize};
use sprint_core::state::{GameMode, Phase, SessionState, SessionStats};

/// How a measured session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    Won,
    Lost,
    /// Stopped at the sprint cap while still running.
    Unfinished,
}

impl GameOutcome {
    /// Outcome implied by a session phase.
    #[must_use]
    pub const fn from_phase(phase: Phase) -> Self {
        match phase {
            Phase::Won => Self::Won,
            Phase::Lost => Self::Lost,
            Phase::NotStarted | Phase::Running => Self::Unfinished,
        }
    }
}

/// Complete metrics for a single session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique game identifier.
    pub game_id: String,
    /// Strategy name.
    pub strategy: String,
    /// Random seed used.
    pub seed: u64,
    /// Session mode.
    pub mode: GameMode,
    /// How the session ended.
    pub outcome: GameOutcome,
    /// Sprint the session ended in.
    pub final_sprint: u32,
    /// Sprints resolved without losing.
    pub sprints_survived: u32,
    /// Final score.
    pub final_score: u64,
    /// Final health.
    pub final_health: u32,
    /// Lowest health seen after any resolution.
    pub min_health: u32,
    /// Health after each resolution.
    pub health_by_sprint: Vec<u32>,
    /// Automation level at the end.
    pub automation_level: u32,
    /// Training level at the end.
    pub training_level: u32,
    /// Engine counters.
    pub stats: SessionStats,
    /// Final state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Empty metrics for a session about to start.
    #[must_use]
    pub fn new(game_id: impl Into<String>, strategy: impl Into<String>, seed: u64, mode: GameMode) -> Self {
        Self {
            game_id: game_id.into(),
            strategy: strategy.into(),
            seed,
            mode,
            outcome: GameOutcome::Unfinished,
            final_sprint: 0,
            sprints_survived: 0,
            final_score: 0,
            final_health: 0,
            min_health: 0,
            health_by_sprint: Vec::new(),
            automation_level: 0,
            training_level: 0,
            stats: SessionStats::default(),
            final_state_hash: 0,
        }
    }
}

/// Tracks one session as it is played.
#[derive(Debug)]
pub struct MetricsCollector {
    metrics: GameMetrics,
}

impl MetricsCollector {
    /// Start collecting.
    #[must_use]
    pub fn new(game_id: &str, strategy: &str, seed: u64, mode: GameMode) -> Self {
        Self {
            metrics: GameMetrics::new(game_id, strategy, seed, mode),
        }
    }

    /// Record the state right after a resolution.
    pub fn on_sprint_resolved(&mut self, state: &SessionState) {
        self.metrics.health_by_sprint.push(state.health);
    }

    /// Stamp the end state and return the metrics.
    #[must_use]
    pub fn finalize(mut self, state: &SessionState) -> GameMetrics {
        let m = &mut self.metrics;
        m.outcome = GameOutcome::from_phase(state.phase);
        m.final_sprint = state.sprint;
        // A win is declared without advancing the sprint; a loss or a cap
        // leaves the current sprint unsurvived.
        m.sprints_survived = match m.outcome {
            GameOutcome::Won => state.sprint,
            GameOutcome::Lost | GameOutcome::Unfinished => state.sprint.saturating_sub(1),
        };
        m.final_score = state.score;
        m.final_health = state.health;
        m.min_health = m.health_by_sprint.iter().copied().min().unwrap_or(state.health);
        m.automation_level = state.automation_level;
        m.training_level = state.training_level;
        m.stats = state.stats;
        m.final_state_hash = state.state_hash();
        self.metrics
    }

    /// Metrics so far.
    #[must_use]
    pub const fn current(&self) -> &GameMetrics {
        &self.metrics
    }
}

/// Summary statistics across multiple sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total sessions played.
    pub total_games: u32,
    pub wins: u32,
    pub losses: u32,
    pub unfinished: u32,
    /// Wins over total.
    pub win_rate: f64,
    pub avg_score: f64,
    pub avg_sprints_survived: f64,
    pub min_sprints_survived: u32,
    pub max_sprints_survived: u32,
    pub avg_final_health: f64,
    /// Exploit events across all sessions.
    pub total_exploits: u32,
    pub avg_breaches: f64,
    pub avg_remediated: f64,
    pub avg_perfect_sprints: f64,
}

impl BatchSummary {
    /// Calculate summary from a list of game metrics.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }

        let count = games.len() as f64;

        let mut summary = Self {
            total_games: games.len() as u32,
            min_sprints_survived: u32::MAX,
            ..Self::default()
        };

        for game in games {
            match game.outcome {
                GameOutcome::Won => summary.wins += 1,
                GameOutcome::Lost => summary.losses += 1,
                GameOutcome::Unfinished => summary.unfinished += 1,
            }
            summary.min_sprints_survived = summary.min_sprints_survived.min(game.sprints_survived);
            summary.max_sprints_survived = summary.max_sprints_survived.max(game.sprints_survived);
            summary.total_exploits += game.stats.exploits;
        }

        summary.win_rate = f64::from(summary.wins) / count;
        summary.avg_score = mean(games, |g| g.final_score as f64);
        summary.avg_sprints_survived = mean(games, |g| f64::from(g.sprints_survived));
        summary.avg_final_health = mean(games, |g| f64::from(g.final_health));
        summary.avg_breaches = mean(games, |g| f64::from(g.stats.breaches));
        summary.avg_remediated = mean(games, |g| f64::from(g.stats.threats_remediated));
        summary.avg_perfect_sprints = mean(games, |g| f64::from(g.stats.perfect_sprints));
        summary
    }

    /// Whether the win rate is within `tolerance` of `target`.
    #[must_use]
    pub fn is_balanced(&self, target: f64, tolerance: f64) -> bool {
        (self.win_rate - target).abs() <= tolerance
    }
}

fn mean(games: &[GameMetrics], f: impl Fn(&GameMetrics) -> f64) -> f64 {
    games.iter().map(f).sum::<f64>() / games.len() as f64
}
