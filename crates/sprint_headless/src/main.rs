//! Headless sprint session runner.
//!
//! Runs the sprint engine without a user interface, controlled via JSON on
//! stdin/stdout or by scripted strategies.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p sprint_headless
//!
//! # Play one scripted session and print its log
//! cargo run -p sprint_headless -- play --strategy investor --seed 7 --show-log
//!
//! # Run batch balance test
//! cargo run -p sprint_headless -- batch --strategy balanced --count 1000 --output results/
//!
//! # Replay a recorded session and check its hash
//! cargo run -p sprint_headless -- replay --file session.replay --verify
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information
//!
//! See the protocol module for command/response format.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use sprint_core::economy::STANDARD_HORIZON;
use sprint_core::replay::{Replay, ReplayPlayer};
use sprint_core::state::{GameMode, SessionConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sprint_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    game_runner::{run_game, GameConfig, DEFAULT_MAX_SPRINTS},
    runner::{HeadlessConfig, HeadlessRunner},
    strategies::{Strategy, StrategyError},
};

#[derive(Parser)]
#[command(name = "sprint_headless")]
#[command(about = "Headless sprint session runner for scripted play and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Session length rule.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Survive the horizon to win
    Standard,
    /// Play until health runs out
    Endless,
}

impl From<ModeArg> for GameMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Standard => Self::FixedHorizon,
            ModeArg::Endless => Self::Indefinite,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive session over JSON lines
    Run {
        /// Random seed (default: from entropy)
        #[arg(long)]
        seed: Option<u64>,

        /// Output state after every accepted command
        #[arg(long)]
        auto_state: bool,

        /// Sprints to survive in standard mode
        #[arg(long, default_value_t = STANDARD_HORIZON, value_parser = clap::value_parser!(u32).range(1..))]
        horizon: u32,
    },

    /// Play one scripted session
    Play {
        /// Strategy preset (balanced, patcher, deferrer, investor, idle)
        #[arg(short, long, default_value = "balanced")]
        strategy: String,

        /// Strategy RON file (overrides --strategy)
        #[arg(long)]
        strategy_file: Option<PathBuf>,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Session mode
        #[arg(short, long, value_enum, default_value = "standard")]
        mode: ModeArg,

        /// Sprint cap (0 = unlimited)
        #[arg(long, default_value_t = DEFAULT_MAX_SPRINTS)]
        max_sprints: u32,

        /// Session config RON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write a replay file
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Print the event log
        #[arg(long)]
        show_log: bool,
    },

    /// Run batch of sessions for balance testing
    Batch {
        /// Strategy preset
        #[arg(short, long, default_value = "balanced")]
        strategy: String,

        /// Strategy RON file (overrides --strategy)
        #[arg(long)]
        strategy_file: Option<PathBuf>,

        /// Number of sessions to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel sessions (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Session mode
        #[arg(short, long, value_enum, default_value = "standard")]
        mode: ModeArg,

        /// Sprint cap per session (0 = unlimited)
        #[arg(long, default_value_t = DEFAULT_MAX_SPRINTS)]
        max_sprints: u32,

        /// Session config RON file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Strategy preset
        #[arg(short, long, default_value = "balanced")]
        strategy: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Session mode
        #[arg(short, long, value_enum, default_value = "standard")]
        mode: ModeArg,
    },

    /// Replay a recorded session
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Verify replay produces identical hash
        #[arg(long)]
        verify: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for protocol
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            seed,
            auto_state,
            horizon,
        }) => cmd_run(HeadlessConfig {
            seed,
            auto_state,
            horizon,
        }),
        Some(Commands::Play {
            strategy,
            strategy_file,
            seed,
            mode,
            max_sprints,
            config,
            replay,
            show_log,
        }) => {
            let strategy = or_exit(resolve_strategy(&strategy, strategy_file.as_deref()));
            let mut game = GameConfig::new(seed, strategy).with_mode(mode.into());
            game.max_sprints = max_sprints;
            game.session = or_exit(load_session_config(config.as_deref()));
            game.record_replay = replay.is_some();
            cmd_play(&game, replay.as_deref(), show_log);
        }
        Some(Commands::Batch {
            strategy,
            strategy_file,
            count,
            parallel,
            output,
            seed,
            mode,
            max_sprints,
            config,
        }) => {
            let strategy = or_exit(resolve_strategy(&strategy, strategy_file.as_deref()));
            let mut batch = BatchConfig::new(strategy, count)
                .with_output(output)
                .with_seed(seed)
                .with_mode(mode.into());
            batch.parallel_games = parallel;
            batch.max_sprints = max_sprints;
            batch.session = or_exit(load_session_config(config.as_deref()));
            cmd_batch(batch);
        }
        Some(Commands::Verify {
            strategy,
            seed,
            runs,
            mode,
        }) => {
            let strategy = or_exit(Strategy::preset(&strategy));
            cmd_verify(&strategy, mode.into(), seed, runs);
        }
        Some(Commands::Replay { file, verify }) => cmd_replay(&file, verify),
        None => cmd_run(HeadlessConfig::default()),
    }
}

/// Print an error and exit with status 1.
fn or_exit<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "Fatal");
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    }
}

fn resolve_strategy(name: &str, file: Option<&Path>) -> Result<Strategy, StrategyError> {
    match file {
        Some(path) => Strategy::load(path),
        None => Strategy::preset(name),
    }
}

fn load_session_config(path: Option<&Path>) -> sprint_core::error::Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::load(path),
        None => Ok(SessionConfig::default()),
    }
}

/// Run an interactive session
fn cmd_run(config: HeadlessConfig) {
    let runner = or_exit(HeadlessRunner::with_config(config));
    tracing::info!(seed = runner.seed(), "Starting interactive session");
    if let Err(e) = runner.run_stdio() {
        tracing::error!(error = %e, "Protocol IO failed");
        std::process::exit(1);
    }
}

/// Play one scripted session and print a summary
fn cmd_play(config: &GameConfig, replay_path: Option<&Path>, show_log: bool) {
    tracing::info!(
        seed = config.seed,
        strategy = %config.strategy.name,
        mode = ?config.mode,
        "Playing session"
    );

    let result = run_game(config);

    if show_log {
        for entry in result.state.log.entries() {
            println!("[sprint {:>3}] {:?}: {}", entry.sprint, entry.level, entry.message);
        }
    }

    let m = &result.metrics;
    println!("Strategy:         {}", m.strategy);
    println!("Outcome:          {:?}", m.outcome);
    println!("Sprints survived: {}", m.sprints_survived);
    println!("Final score:      {}", m.final_score);
    println!("Final health:     {}", m.final_health);
    println!(
        "Remediated {} | Breaches {} | Exploits {} | Perfect sprints {}",
        m.stats.threats_remediated, m.stats.breaches, m.stats.exploits, m.stats.perfect_sprints
    );
    println!("State hash:       {:016x}", m.final_state_hash);

    if let (Some(path), Some(replay)) = (replay_path, result.replay.as_ref()) {
        or_exit(replay.save(path));
        tracing::info!(path = %path.display(), actions = replay.action_count(), "Replay saved");
    }
}

/// Run batch of sessions for balance testing
fn cmd_batch(config: BatchConfig) {
    let output = config.output_dir.clone();
    if let Err(e) = std::fs::create_dir_all(&output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to create output directory");
        eprintln!(
            "FATAL: Cannot create output directory '{}': {}",
            output.display(),
            e
        );
        std::process::exit(1);
    }

    let results = run_batch(config);
    let path = output.join("batch.json");
    or_exit(results.save(&path));

    let s = &results.summary;
    println!("Sessions:         {}", s.total_games);
    println!(
        "Won/Lost/Open:    {}/{}/{}",
        s.wins, s.losses, s.unfinished
    );
    println!("Win rate:         {:.1}%", s.win_rate * 100.0);
    println!("Mean score:       {:.1}", s.avg_score);
    println!(
        "Sprints survived: {:.1} (min {}, max {})",
        s.avg_sprints_survived, s.min_sprints_survived, s.max_sprints_survived
    );
    println!("Exploits:         {}", s.total_exploits);
    println!("Results:          {}", path.display());

    if !results.errors.is_empty() {
        tracing::warn!(errors = results.errors.len(), "Some sessions failed");
    }
}

/// Verify determinism by running same seed multiple times
fn cmd_verify(strategy: &Strategy, mode: GameMode, seed: u64, runs: u32) {
    tracing::info!(seed, runs, strategy = %strategy.name, "Verifying determinism");
    if verify_determinism(strategy, mode, seed, runs) {
        println!("PASS: {runs} runs of seed {seed} ended with the same state hash");
    } else {
        println!("FAIL: runs of seed {seed} diverged");
        std::process::exit(1);
    }
}

/// Replay a recorded session
fn cmd_replay(file: &Path, verify: bool) {
    let replay = or_exit(Replay::load(file));
    tracing::info!(
        seed = replay.seed,
        mode = ?replay.mode,
        actions = replay.action_count(),
        "Replay loaded"
    );

    let mut player = ReplayPlayer::new(replay);
    if verify {
        or_exit(player.verify());
        println!("PASS: replay reproduces hash {:016x}", player.replay().final_hash);
    } else {
        player.run_to_end();
        let state = player.session().state();
        println!(
            "Replayed to sprint {} ({:?}), score {}, health {}",
            state.sprint, state.phase, state.score, state.health
        );
    }
}
