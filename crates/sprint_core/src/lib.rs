//! # Sprint Core
//!
//! Deterministic engine for a vulnerability-triage economy game.
//!
//! Each sprint the player spends a fixed capacity budget on remediating
//! threats, completing business work items, deferring risk and investing
//! in automation, training or feature output. Ending the sprint runs the
//! resolver, which charges damage, rolls exploits, heals clean sprints and
//! spawns the next wave.
//!
//! This crate holds only game logic:
//! - No rendering
//! - No IO beyond explicit save/load helpers
//! - No ambient randomness: every draw comes from an injected [`rand::Rng`]
//!
//! ## Crate Structure
//!
//! - [`economy`] - Cost, deadline, damage and exploit rules
//! - [`generator`] - Threat and work-item generation
//! - [`actions`] - Player actions and validation
//! - [`resolver`] - End-of-sprint pipeline
//! - [`session`] - Session state machine
//! - [`replay`] - Recording and playback

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod actions;
pub mod clock;
pub mod components;
pub mod economy;
pub mod error;
pub mod events;
pub mod generator;
pub mod replay;
pub mod resolver;
pub mod session;
pub mod state;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::actions::{Action, ActionOutcome};
    pub use crate::components::{Obligation, SeverityBand, Threat, ThreatContext};
    pub use crate::error::{ActionResult, GameError, Rejection, Result};
    pub use crate::events::{EventLog, LogEntry, LogLevel};
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::resolver::{ResolutionOutcome, SprintReport};
    pub use crate::session::Session;
    pub use crate::state::{GameMode, Phase, SessionConfig, SessionState, SessionStats};
}
