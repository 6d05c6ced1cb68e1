//! Headless session runner.
//!
//! Reads [`Command`]s as JSON lines, drives one [`Session`] and writes
//! [`Response`]s back. Input and output are generic so tests can use
//! in-memory buffers instead of stdin/stdout.

use std::io::{self, BufRead, Write};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sprint_core::actions::ActionOutcome;
use sprint_core::economy::STANDARD_HORIZON;
use sprint_core::error::Result;
use sprint_core::session::Session;
use sprint_core::state::{SessionConfig, SessionState};

use crate::protocol::{Command, GameResult, Response, StateSnapshot};

/// Headless runner configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessConfig {
    /// Seed for the session's random source. Drawn from entropy when unset.
    pub seed: Option<u64>,
    /// Output a state snapshot after every accepted command.
    pub auto_state: bool,
    /// Sprints to survive in fixed-horizon mode.
    pub horizon: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            seed: None,
            auto_state: false,
            horizon: STANDARD_HORIZON,
        }
    }
}

impl HeadlessConfig {
    /// Session tunables implied by this config, validated.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let config = SessionConfig {
            horizon: self.horizon,
            ..SessionConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

/// Headless runner for scripted or AI-controlled play.
pub struct HeadlessRunner {
    config: HeadlessConfig,
    seed: u64,
    session: Session,
    /// Log entries before this index were already sent in a snapshot.
    log_offset: usize,
}

impl HeadlessRunner {
    /// Create a runner with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::build(HeadlessConfig::default(), SessionConfig::default())
    }

    /// Create a runner with custom configuration.
    ///
    /// Fails when the horizon is zero.
    pub fn with_config(config: HeadlessConfig) -> Result<Self> {
        let session_config = config.session_config()?;
        Ok(Self::build(config, session_config))
    }

    fn build(config: HeadlessConfig, session_config: SessionConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            config,
            seed,
            session: Session::seeded(session_config, seed),
            log_offset: 0,
        }
    }

    /// Seed in use, reported in `ready`.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// The driven session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Run until `quit` or end of input.
    pub fn run<I: BufRead, O: Write>(mut self, input: I, mut output: O) -> io::Result<()> {
        write_response(&mut output, &Response::ready(self.seed))?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let command = match Command::from_json(line) {
                Ok(command) => command,
                Err(e) => {
                    tracing::warn!(error = %e, "Unparseable command");
                    write_response(&mut output, &Response::error(format!("Invalid command: {e}"), None))?;
                    output.flush()?;
                    continue;
                }
            };

            let quit = command == Command::Quit;
            for response in self.handle(command) {
                write_response(&mut output, &response)?;
            }
            output.flush()?;

            if quit {
                tracing::info!("Quit received");
                return Ok(());
            }
        }

        tracing::info!("Input closed");
        Ok(())
    }

    /// Run on stdin/stdout.
    pub fn run_stdio(self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run(stdin.lock(), stdout.lock())
    }

    /// Process one command.
    pub fn handle(&mut self, command: Command) -> Vec<Response> {
        tracing::debug!(cmd = command.name(), "Command");
        let mut responses = Vec::new();

        let changed = match &command {
            Command::Start { mode } => {
                self.session.start(*mode);
                self.log_offset = 0;
                responses.push(Response::ack("start"));
                true
            }
            Command::Restart => match self.session.restart() {
                Ok(()) => {
                    self.log_offset = 0;
                    responses.push(Response::ack("restart"));
                    true
                }
                Err(reason) => {
                    responses.push(Response::rejected("restart", reason));
                    false
                }
            },
            Command::Query => {
                responses.push(self.snapshot());
                false
            }
            Command::Hash => {
                responses.push(Response::StateHash {
                    sprint: self.session.state().sprint,
                    hash: self.session.state_hash(),
                });
                false
            }
            Command::Save { path } => {
                match self.session.state().save(path) {
                    Ok(()) => responses.push(Response::ack("save")),
                    Err(e) => responses.push(Response::error(e.to_string(), Some("save"))),
                }
                false
            }
            Command::Load { path } => match SessionState::load(path) {
                Ok(state) => {
                    self.restore(state);
                    responses.push(Response::ack("load"));
                    true
                }
                Err(e) => {
                    responses.push(Response::error(e.to_string(), Some("load")));
                    false
                }
            },
            Command::Quit => {
                responses.push(Response::Bye);
                false
            }
            Command::Remediate { .. }
            | Command::Complete { .. }
            | Command::Defer { .. }
            | Command::InvestAutomation
            | Command::InvestTraining
            | Command::InvestOutput
            | Command::EndSprint
            | Command::Resign => self.act(&command, &mut responses),
        };

        if changed && self.config.auto_state {
            responses.push(self.snapshot());
        }
        responses
    }

    /// Apply an action command. Returns whether the session changed.
    fn act(&mut self, command: &Command, responses: &mut Vec<Response>) -> bool {
        let name = command.name();
        let Some(action) = command.to_action() else {
            responses.push(Response::error("Not an action", Some(name)));
            return false;
        };

        match self.session.apply(&action) {
            Ok(ActionOutcome::Resolved(report)) => {
                responses.push(Response::SprintReport { report });
            }
            Ok(ActionOutcome::Resigned) => responses.push(Response::ack(name)),
            Ok(outcome) => responses.push(Response::ack_with(name, outcome)),
            Err(reason) => {
                responses.push(Response::rejected(name, reason));
                return false;
            }
        }

        if let Some(result) = GameResult::from_phase(self.session.phase()) {
            let state = self.session.state();
            tracing::info!(?result, sprint = state.sprint, score = state.score, "Game over");
            responses.push(Response::GameOver {
                result,
                sprint: state.sprint,
                score: state.score,
            });
        }
        true
    }

    /// Swap in a loaded state. The random source is reseeded from the run
    /// seed and the state hash, so loading the same file twice replays the
    /// same future.
    fn restore(&mut self, state: SessionState) {
        let rng = ChaCha8Rng::seed_from_u64(self.seed ^ state.state_hash());
        self.log_offset = state.log.len();
        tracing::info!(sprint = state.sprint, "Session loaded");
        self.session = Session::from_state(state, rng);
    }

    fn snapshot(&mut self) -> Response {
        let state = self.session.state();
        let snapshot = StateSnapshot::capture(state, self.log_offset);
        self.log_offset = state.log.len();
        Response::State(Box::new(snapshot))
    }
}

impl Default for HeadlessRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn write_response<O: Write>(output: &mut O, response: &Response) -> io::Result<()> {
    output.write_all(response.to_json_line().as_bytes())
}
