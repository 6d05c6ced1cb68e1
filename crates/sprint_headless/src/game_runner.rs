//! Plays one complete session with a scripted strategy.

use sprint_core::replay::Replay;
use sprint_core::session::Session;
use sprint_core::state::{GameMode, SessionConfig, SessionState};

use crate::metrics::{GameMetrics, MetricsCollector};
use crate::strategies::Strategy;

/// Sprint cap used when none is given. Only matters in indefinite mode.
pub const DEFAULT_MAX_SPRINTS: u32 = 100;

/// Configuration for a single game run.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Random seed for determinism.
    pub seed: u64,
    /// Session mode.
    pub mode: GameMode,
    /// Scripted player.
    pub strategy: Strategy,
    /// Stop after this many sprints (0 = unlimited).
    pub max_sprints: u32,
    /// Session tunables.
    pub session: SessionConfig,
    /// Game ID for tracking.
    pub game_id: String,
    /// Record every accepted action into a [`Replay`].
    pub record_replay: bool,
}

impl GameConfig {
    /// Fixed-horizon game with defaults.
    #[must_use]
    pub fn new(seed: u64, strategy: Strategy) -> Self {
        Self {
            seed,
            mode: GameMode::FixedHorizon,
            strategy,
            max_sprints: DEFAULT_MAX_SPRINTS,
            session: SessionConfig::default(),
            game_id: format!("game_{seed}"),
            record_replay: false,
        }
    }

    /// Set the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: GameMode) -> Self {
        self.mode = mode;
        self
    }

    /// Record a replay.
    #[must_use]
    pub fn with_replay(mut self) -> Self {
        self.record_replay = true;
        self
    }
}

/// Result of running a game.
#[derive(Debug)]
pub struct GameResult {
    pub metrics: GameMetrics,
    pub final_state_hash: u64,
    /// Present when the config asked for one.
    pub replay: Option<Replay>,
    /// End state, including the full event log.
    pub state: SessionState,
}

/// Play a session to its end or the sprint cap.
#[must_use]
pub fn run_game(config: &GameConfig) -> GameResult {
    let mut session = Session::seeded(config.session, config.seed);
    session.start(config.mode);

    let mut replay = config
        .record_replay
        .then(|| Replay::new(config.seed, config.mode, config.session));
    let mut collector = MetricsCollector::new(
        &config.game_id,
        &config.strategy.name,
        config.seed,
        config.mode,
    );

    while session.state().is_running() {
        let sprint = session.state().sprint;
        if config.max_sprints > 0 && sprint > config.max_sprints {
            tracing::debug!(game = %config.game_id, sprint, "Sprint cap reached");
            break;
        }

        let played = config.strategy.play_sprint(&mut session);
        if let Some(replay) = replay.as_mut() {
            for action in &played {
                replay.record(sprint, action.clone());
            }
        }
        collector.on_sprint_resolved(session.state());
    }

    let final_state_hash = session.state_hash();
    let (state, _rng) = session.into_parts();
    if let Some(replay) = replay.as_mut() {
        replay.finalize(state.sprint, final_state_hash);
    }

    let metrics = collector.finalize(&state);
    tracing::debug!(
        game = %config.game_id,
        outcome = ?metrics.outcome,
        sprints = metrics.sprints_survived,
        score = metrics.final_score,
        "Game finished"
    );

    GameResult {
        metrics,
        final_state_hash,
        replay,
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::GameOutcome;
    use sprint_core::replay::ReplayPlayer;

    #[test]
    fn test_fixed_horizon_game_ends() {
        let result = run_game(&GameConfig::new(7, Strategy::balanced()));
        assert_ne!(result.metrics.outcome, GameOutcome::Unfinished);
        assert!(result.metrics.final_sprint <= 26);
        assert_eq!(result.final_state_hash, result.state.state_hash());
    }

    #[test]
    fn test_sprint_cap_stops_indefinite_game() {
        let mut config = GameConfig::new(7, Strategy::patcher()).with_mode(GameMode::Indefinite);
        config.max_sprints = 2;

        let result = run_game(&config);

        assert!(result.metrics.final_sprint <= 3);
        assert!(result.metrics.health_by_sprint.len() <= 2);
    }

    #[test]
    fn test_same_seed_same_result() {
        let config = GameConfig::new(11, Strategy::investor());
        let a = run_game(&config);
        let b = run_game(&config);
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn test_recorded_replay_verifies() {
        let config = GameConfig::new(13, Strategy::balanced()).with_replay();
        let result = run_game(&config);
        let replay = result.replay.unwrap();

        assert!(replay.action_count() > 0);
        assert_eq!(replay.final_hash, result.final_state_hash);
        assert!(ReplayPlayer::new(replay).verify().is_ok());
    }
}
