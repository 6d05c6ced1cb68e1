//! Error types for the sprint engine.
//!
//! Two families live here:
//! - [`Rejection`]: why a player action was refused. Rejections are normal
//!   outcomes: the session is left untouched and the caller renders the reason.
//! - [`GameError`]: failures at the IO edge (save files, replays, config).

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Result of a player action that may be refused.
pub type ActionResult<T> = std::result::Result<T, Rejection>;

/// Top-level error type for IO-facing engine operations.
#[derive(Debug, Error)]
pub enum GameError {
    /// Failed to parse a configuration file.
    #[error("Failed to parse config '{path}': {message}")]
    ConfigParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid configuration value.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Failed to read or write a file.
    #[error("IO error on '{path}': {source}")]
    Io {
        /// Path involved in the failed operation.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to encode or decode session data.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Replay file is from an incompatible format version.
    #[error("Replay version mismatch: expected {expected}, got {found}")]
    ReplayVersion {
        /// Version this build understands.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Replayed session diverged from the recording.
    #[error("Desync detected at sprint {sprint}: recorded hash {recorded}, replayed hash {replayed}")]
    DesyncDetected {
        /// Sprint where the divergence was found.
        sprint: u32,
        /// Hash stored in the replay.
        recorded: u64,
        /// Hash produced by re-execution.
        replayed: u64,
    },
}

/// Reason a player action was refused.
///
/// A rejected action never changes health, capacity, score or entity counts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The session is not running (not started, lost or won).
    #[error("Session is not running")]
    NotRunning,

    /// No live threat has this id.
    #[error("Unknown threat: {0}")]
    UnknownThreat(String),

    /// No obligation this sprint has this id.
    #[error("Unknown work item: {0}")]
    UnknownObligation(String),

    /// The vendor has not shipped a fix yet.
    #[error("No fix available for {id} (ETA {eta} sprints)")]
    FixUnavailable {
        /// Threat id.
        id: String,
        /// Sprints until the fix ships.
        eta: u32,
    },

    /// The work item was already completed this sprint.
    #[error("Work item already completed: {0}")]
    AlreadyCompleted(String),

    /// Not enough capacity left this sprint.
    #[error("Insufficient capacity: need {required}, have {available}")]
    InsufficientCapacity {
        /// Capacity the action costs.
        required: u32,
        /// Capacity remaining.
        available: u32,
    },

    /// Output investment needs at least one unit of capacity.
    #[error("No capacity left to invest")]
    NothingToInvest,
}
