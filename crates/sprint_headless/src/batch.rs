//! Batch session runner for balance testing.
//!
//! Runs many seeded sessions in parallel using rayon. Sessions never share
//! state; each owns its own seeded random source.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sprint_core::state::{GameMode, SessionConfig};
use tracing::{debug, info, warn};

use crate::game_runner::{run_game, GameConfig, DEFAULT_MAX_SPRINTS};
use crate::metrics::{BatchSummary, GameMetrics, GameOutcome};
use crate::strategies::Strategy;

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Strategy played in every session
    pub strategy: Strategy,
    /// Session mode
    pub mode: GameMode,
    /// Number of sessions to run
    pub game_count: u32,
    /// Maximum parallel sessions (0 = use rayon default)
    pub parallel_games: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Starting seed; session `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Sprint cap per session (0 = unlimited)
    pub max_sprints: u32,
    /// Session tunables
    pub session: SessionConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            mode: GameMode::FixedHorizon,
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_sprints: DEFAULT_MAX_SPRINTS,
            session: SessionConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Create config for a strategy
    pub fn new(strategy: Strategy, game_count: u32) -> Self {
        Self {
            strategy,
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set mode
    pub fn with_mode(mut self, mode: GameMode) -> Self {
        self.mode = mode;
        self
    }

    fn game_config(&self, index: u32) -> GameConfig {
        let seed = self.seed_start.wrapping_add(u64::from(index));
        GameConfig {
            seed,
            mode: self.mode,
            strategy: self.strategy.clone(),
            max_sprints: self.max_sprints,
            session: self.session,
            game_id: format!("game_{seed}"),
            record_replay: false,
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual session metrics, in seed order
    pub games: Vec<GameMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total sessions
    pub total: u32,
    completed: AtomicU32,
    wins: AtomicU32,
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            wins: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed session
    pub fn record_completion(&self, outcome: GameOutcome) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if outcome == GameOutcome::Won {
            self.wins.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current completion count
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        self.current() as f64 / self.total.max(1) as f64 * 100.0
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }

        let elapsed = self.start_time.elapsed();
        let per_game = elapsed.as_secs_f64() / completed as f64;
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_game * remaining as f64)
    }

    /// Win rate over completed sessions
    pub fn current_win_rate(&self) -> f64 {
        let completed = self.current();
        if completed == 0 {
            return 0.0;
        }
        self.wins.load(Ordering::Relaxed) as f64 / completed as f64
    }

    /// Log progress
    pub fn display(&self) {
        let eta = self.eta();
        info!(
            "Batch progress: {}/{} ({:.1}%), win rate so far {:.1}%, ETA {}m {}s",
            self.current(),
            self.total,
            self.percentage(),
            self.current_win_rate() * 100.0,
            eta.as_secs() / 60,
            eta.as_secs() % 60
        );
    }
}

/// Run one session. A panic becomes a [`BatchError`].
fn run_single_game(config: &BatchConfig, index: u32) -> Result<GameMetrics, BatchError> {
    let game = config.game_config(index);
    std::panic::catch_unwind(|| run_game(&game).metrics).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "session panicked".to_string());
        BatchError {
            game_index: index,
            seed: game.seed,
            message,
        }
    })
}

/// Run a batch of sessions
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let progress = BatchProgress::new(config.game_count);

    info!(
        "Starting batch run: {} {:?} sessions with strategy '{}'",
        config.game_count, config.mode, config.strategy.name
    );

    // Configure thread pool if specified
    if config.parallel_games > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<GameMetrics, BatchError>> = (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let result = run_single_game(&config, i);
            match &result {
                Ok(metrics) => {
                    progress.record_completion(metrics.outcome);
                    let completed = progress.current();
                    if completed % 10 == 0 {
                        debug!("Progress: {}/{}", completed, config.game_count);
                    }
                    if completed % 100 == 0 {
                        progress.display();
                    }
                }
                Err(e) => warn!("Game {} (seed {}) failed: {}", e.game_index, e.seed, e.message),
            }
            result
        })
        .collect();

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<GameMetrics> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} sessions in {:.1}s, win rate {:.1}%",
        games.len(),
        duration_seconds,
        summary.win_rate * 100.0
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    }
}

/// Run the same seed `runs` times and check every run ends identically.
pub fn verify_determinism(strategy: &Strategy, mode: GameMode, seed: u64, runs: u32) -> bool {
    let config = GameConfig::new(seed, strategy.clone()).with_mode(mode);
    let hashes: Vec<u64> = (0..runs.max(1))
        .into_par_iter()
        .map(|_| run_game(&config).final_state_hash)
        .collect();
    hashes.windows(2).all(|w| w[0] == w[1])
}
