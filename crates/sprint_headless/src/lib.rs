//! Headless session driver for scripted play and CI verification.
//!
//! This crate drives the sprint engine without a user interface. It can be
//! controlled via JSON commands on stdin, with responses on stdout, or run
//! scripted strategies over many seeds. This enables:
//!
//! - **AI testing**: An agent can play a session over the JSON protocol
//! - **Balance runs**: Hundreds of seeded sessions per strategy, in parallel
//! - **Replay verification**: Check that a recorded session replays to the same hash
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (start, remediate, end_sprint, etc.)
//! - **stdout**: Responses and state snapshots (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See the [`protocol`] module for the full command and response format.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"start"}' | cargo run -p sprint_headless -- run --seed 42
//!
//! # Play one scripted session and save a replay
//! cargo run -p sprint_headless -- play --strategy balanced --replay session.replay
//!
//! # Verify the replay
//! cargo run -p sprint_headless -- replay --file session.replay --verify
//! ```

pub mod batch;
pub mod game_runner;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod strategies;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use game_runner::{run_game, GameConfig, GameResult};
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use strategies::Strategy;
