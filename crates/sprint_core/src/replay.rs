//! Replays: record a session as seed plus action stream, play it back.
//!
//! A session is fully determined by its seed, mode, config and the ordered
//! actions applied to it, so a replay stores only those plus the final hash
//! for verification.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::actions::Action;
use crate::error::{GameError, Result};
use crate::session::Session;
use crate::state::{GameMode, SessionConfig};

/// Replay file format version.
pub const REPLAY_VERSION: u32 = 1;

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayAction {
    /// Sprint in which the action was issued.
    pub sprint: u32,
    /// The action.
    pub action: Action,
}

/// A recorded session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Format version.
    pub version: u32,
    /// Seed of the session's random source.
    pub seed: u64,
    /// Mode passed to `start`.
    pub mode: GameMode,
    /// Config the session was created with.
    pub config: SessionConfig,
    /// Actions in the order they were applied.
    pub actions: Vec<ReplayAction>,
    /// Sprint when recording stopped.
    pub final_sprint: u32,
    /// State hash when recording stopped.
    pub final_hash: u64,
}

impl Replay {
    /// Start recording a session.
    #[must_use]
    pub const fn new(seed: u64, mode: GameMode, config: SessionConfig) -> Self {
        Self {
            version: REPLAY_VERSION,
            seed,
            mode,
            config,
            actions: Vec::new(),
            final_sprint: 0,
            final_hash: 0,
        }
    }

    /// Record an action. Rejected actions may be recorded too; they replay
    /// as rejections and leave the state where it was.
    pub fn record(&mut self, sprint: u32, action: Action) {
        self.actions.push(ReplayAction { sprint, action });
    }

    /// Stamp the end state.
    pub fn finalize(&mut self, final_sprint: u32, final_hash: u64) {
        self.final_sprint = final_sprint;
        self.final_hash = final_hash;
    }

    /// Actions issued in `sprint`.
    #[must_use]
    pub fn actions_in_sprint(&self, sprint: u32) -> Vec<&ReplayAction> {
        self.actions.iter().filter(|a| a.sprint == sprint).collect()
    }

    /// Number of recorded actions.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// A fresh session in the recorded starting state.
    #[must_use]
    pub fn initial_session(&self) -> Session {
        let mut session = Session::seeded(self.config, self.seed);
        session.start(self.mode);
        session
    }

    /// Write the replay with bincode.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path, bytes).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Read a replay written by [`Replay::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::Serialization(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::ReplayVersion {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }

        Ok(replay)
    }
}

/// Re-executes a replay one action at a time.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    session: Session,
    cursor: usize,
}

impl ReplayPlayer {
    /// Prepare playback from the start.
    #[must_use]
    pub fn new(replay: Replay) -> Self {
        let session = replay.initial_session();
        Self {
            replay,
            session,
            cursor: 0,
        }
    }

    /// Apply the next action. Returns whether more remain.
    pub fn step(&mut self) -> bool {
        if let Some(recorded) = self.replay.actions.get(self.cursor) {
            // Rejections are part of the recording.
            let _ = self.session.apply(&recorded.action);
            self.cursor += 1;
        }
        !self.is_finished()
    }

    /// Rewind and apply the first `index` actions.
    pub fn seek(&mut self, index: usize) {
        self.session = self.replay.initial_session();
        self.cursor = 0;
        while self.cursor < index.min(self.replay.actions.len()) {
            self.step();
        }
    }

    /// Apply every remaining action.
    pub fn run_to_end(&mut self) {
        while self.step() {}
    }

    /// Index of the next action.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Session being replayed.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The replay.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Whether every action has been applied.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.replay.actions.len()
    }

    /// Replay from the start and compare the final hash.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.replay.actions.len());
        let replayed = self.session.state_hash();
        if replayed == self.replay.final_hash {
            Ok(())
        } else {
            Err(GameError::DesyncDetected {
                sprint: self.session.state().sprint,
                recorded: self.replay.final_hash,
                replayed,
            })
        }
    }

    /// Progress in percent.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.replay.actions.is_empty() {
            100.0
        } else {
            (self.cursor as f64 / self.replay.actions.len() as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded_game(seed: u64) -> Replay {
        let config = SessionConfig::default();
        let mut replay = Replay::new(seed, GameMode::FixedHorizon, config);
        let mut session = replay.initial_session();

        for _ in 0..6 {
            let script = [Action::InvestTraining, Action::InvestOutput, Action::ResolvePeriod];
            for action in script {
                replay.record(session.state().sprint, action.clone());
                let _ = session.apply(&action);
            }
        }

        replay.finalize(session.state().sprint, session.state_hash());
        replay
    }

    #[test]
    fn test_record_and_query() {
        let replay = recorded_game(12345);
        assert_eq!(replay.version, REPLAY_VERSION);
        assert_eq!(replay.action_count(), 18);
        assert_eq!(replay.actions_in_sprint(1).len(), 3);
        assert_eq!(replay.actions_in_sprint(999).len(), 0);
    }

    #[test]
    fn test_playback_matches_recording() {
        let replay = recorded_game(4242);
        let mut player = ReplayPlayer::new(replay);
        assert!(player.verify().is_ok());
        assert!(player.is_finished());
        assert!((player.progress_percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tampered_hash_is_desync() {
        let mut replay = recorded_game(7);
        replay.final_hash ^= 1;
        let mut player = ReplayPlayer::new(replay);
        assert!(matches!(
            player.verify(),
            Err(GameError::DesyncDetected { .. })
        ));
    }

    #[test]
    fn test_seek_rewinds() {
        let replay = recorded_game(9);
        let mut player = ReplayPlayer::new(replay);
        player.run_to_end();
        let end = player.session().state_hash();

        player.seek(0);
        assert_eq!(player.cursor(), 0);
        assert_eq!(player.session().state().sprint, 1);

        player.run_to_end();
        assert_eq!(player.session().state_hash(), end);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let replay = recorded_game(31);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.replay");

        replay.save(&path).unwrap();
        let loaded = Replay::load(&path).unwrap();
        assert_eq!(loaded, replay);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut replay = recorded_game(1);
        replay.version = REPLAY_VERSION + 1;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.replay");
        replay.save(&path).unwrap();

        assert!(matches!(
            Replay::load(&path),
            Err(GameError::ReplayVersion { .. })
        ));
    }
}
