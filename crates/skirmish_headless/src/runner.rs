//! Headless match runner implementation.

use std::io::{self, BufRead, Write};

use skirmish_core::components::{PlayerId, UnitCommand};
use skirmish_core::error::Result;
use skirmish_core::events::MatchEvent;
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::replay::{Replay, ReplayInput};
use skirmish_core::simulation::Simulation;

use crate::protocol::{Command, Response};
use crate::scenario::Scenario;

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Output state after every `tick` command (vs only on query).
    pub auto_state_output: bool,
    /// Record every input into a replay.
    pub record: bool,
}

/// Headless runner for AI-controlled matches.
///
/// The controller plays every seat. Each line is answered before the next
/// is read, so a controller can run in lockstep with the runner.
pub struct HeadlessRunner {
    config: HeadlessConfig,
    simulation: Simulation,
    replay: Option<Replay>,
    game_over_sent: bool,
}

impl HeadlessRunner {
    /// Create a runner for a scenario with default config.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario's rules are invalid.
    pub fn new(scenario: &Scenario) -> Result<Self> {
        Self::with_config(scenario, HeadlessConfig::default())
    }

    /// Create a runner with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario's rules are invalid.
    pub fn with_config(scenario: &Scenario, config: HeadlessConfig) -> Result<Self> {
        let simulation = Simulation::new(scenario.rules.clone())?;
        let replay = config
            .record
            .then(|| Replay::new(scenario.name.clone(), scenario.rules.clone()));
        Ok(Self {
            config,
            simulation,
            replay,
            game_over_sent: false,
        })
    }

    /// The match being driven.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Read commands from `input` until `quit` or end of input, writing
    /// one JSON line per response to `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        write_response(&mut output, &Response::ready(self.simulation.get_tick()))?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let command = match Command::from_json(line) {
                Ok(command) => command,
                Err(e) => {
                    tracing::debug!(error = %e, line, "Unparseable command");
                    write_response(&mut output, &Response::error(format!("Parse error: {e}"), None))?;
                    continue;
                }
            };

            let quit = matches!(command, Command::Quit);
            for response in self.handle(command) {
                write_response(&mut output, &response)?;
            }
            if quit {
                break;
            }
        }

        tracing::info!(
            tick = self.simulation.get_tick(),
            hash = self.simulation.state_hash(),
            "Session ended"
        );
        Ok(())
    }

    /// Process one command and return the responses, in order.
    pub fn handle(&mut self, command: Command) -> Vec<Response> {
        let cmd_name = command.name();
        let tick = self.simulation.get_tick();
        let mut responses = Vec::new();

        match command {
            Command::Connect { player } => {
                self.record(ReplayInput::Connect(player));
                match self.simulation.connect_player(player) {
                    Ok(events) => push_events(&mut responses, tick, events, cmd_name),
                    Err(e) => responses.push(Response::error(e.to_string(), Some(cmd_name))),
                }
            }

            Command::Disconnect { player } => {
                self.record(ReplayInput::Disconnect(player));
                let events = self.simulation.disconnect_player(player);
                push_events(&mut responses, tick, events, cmd_name);
            }

            Command::Tick { count } => {
                let mut events = Vec::new();
                for _ in 0..count {
                    if self.simulation.is_over() {
                        break;
                    }
                    events.extend(self.simulation.tick().events);
                }
                push_events(&mut responses, self.simulation.get_tick(), events, cmd_name);
                if self.config.auto_state_output {
                    responses.push(self.state());
                }
            }

            Command::Move { player, unit, x, y } => match ground_point(x, y) {
                Some(destination) => {
                    self.apply(player, UnitCommand::Move { unit, destination }, &mut responses);
                }
                None => responses.push(Response::error(
                    format!("Destination ({x}, {y}) is out of range"),
                    Some(cmd_name),
                )),
            },

            Command::Attack {
                player,
                unit,
                target,
            } => self.apply(player, UnitCommand::Attack { unit, target }, &mut responses),

            Command::EndTurn { player } => self.apply(player, UnitCommand::EndTurn, &mut responses),

            Command::Query => responses.push(self.state()),

            Command::Hash => responses.push(Response::StateHash {
                tick,
                hash: self.simulation.state_hash(),
            }),

            Command::Quit => responses.push(Response::Bye),
        }

        if self.simulation.is_over() && !self.game_over_sent {
            self.game_over_sent = true;
            responses.push(Response::GameOver {
                winner: self.simulation.winner().flatten(),
                tick: self.simulation.get_tick(),
                turn_number: self.simulation.turn_status().turn_number,
            });
        }

        responses
    }

    /// Stop recording and return the replay, if recording.
    pub fn finish(&mut self) -> Option<Replay> {
        let mut replay = self.replay.take()?;
        replay.finalize(&self.simulation);
        Some(replay)
    }

    fn apply(&mut self, player: PlayerId, command: UnitCommand, responses: &mut Vec<Response>) {
        let tick = self.simulation.get_tick();
        let name = command.name();
        self.record(ReplayInput::Command(player, command.clone()));

        let outcome = self.simulation.apply_command(player, command);
        match outcome.rejection {
            None => responses.push(Response::ack(name)),
            Some(reason) => responses.push(Response::Rejected {
                cmd: name.to_string(),
                reason,
            }),
        }
        if !outcome.events.is_empty() {
            responses.push(Response::Events {
                tick,
                events: outcome.events,
            });
        }
    }

    fn record(&mut self, input: ReplayInput) {
        if let Some(replay) = self.replay.as_mut() {
            replay.record(self.simulation.get_tick(), input);
        }
    }

    fn state(&self) -> Response {
        Response::State {
            snapshot: self.simulation.snapshot(),
            hash: self.simulation.state_hash(),
        }
    }
}

/// Events if there are any, otherwise a plain acknowledgement.
fn push_events(responses: &mut Vec<Response>, tick: u64, events: Vec<MatchEvent>, cmd: &str) {
    if events.is_empty() {
        responses.push(Response::ack(cmd));
    } else {
        responses.push(Response::Events { tick, events });
    }
}

fn ground_point(x: f64, y: f64) -> Option<Vec2Fixed> {
    Some(Vec2Fixed::new(
        Fixed::checked_from_num(x)?,
        Fixed::checked_from_num(y)?,
    ))
}

fn write_response<W: Write>(output: &mut W, response: &Response) -> io::Result<()> {
    output.write_all(response.to_json_line().as_bytes())?;
    output.flush()
}
