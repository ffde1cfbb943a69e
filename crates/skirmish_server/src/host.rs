//! The authority task.
//!
//! One [`Host`] owns the [`Simulation`]. Connections never touch it
//! directly: they push [`HostInput`]s through a [`HostHandle`] and read
//! [`Envelope`]s from a broadcast channel. Inputs and ticks are handled
//! one at a time on the same task, so the match sees a single ordered
//! stream of commands.

use std::future::Future;
use std::time::Duration;

use skirmish_core::components::PlayerId;
use skirmish_core::events::MatchEvent;
use skirmish_core::simulation::Simulation;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::protocol::{ClientMessage, ServerMessage};

/// Pending inputs before connections start waiting on the host.
pub const INBOX_CAPACITY: usize = 256;

/// Outbound messages buffered per subscriber before it starts lagging.
pub const OUTBOX_CAPACITY: usize = 1024;

/// Who an outbound message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected client.
    All,
    /// A single player.
    Player(PlayerId),
}

/// An outbound message with its audience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Audience.
    pub recipient: Recipient,
    /// Message to deliver.
    pub message: ServerMessage,
}

impl Envelope {
    /// Whether `player` should receive this message.
    #[must_use]
    pub fn is_for(&self, player: PlayerId) -> bool {
        match self.recipient {
            Recipient::All => true,
            Recipient::Player(p) => p == player,
        }
    }
}

/// Answer to a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinReply {
    /// The connection now plays as `player`.
    Accepted {
        /// Assigned player id.
        player: PlayerId,
        /// Tick at the time of joining.
        tick: u64,
    },
    /// Every slot is held by a connected player.
    RoomFull,
}

/// Work sent to the authority task.
#[derive(Debug)]
pub enum HostInput {
    /// A new connection wants a seat.
    Join {
        /// Where to send the answer.
        reply: oneshot::Sender<JoinReply>,
    },
    /// A line from a seated player.
    Message {
        /// Sender, as known from the connection.
        player: PlayerId,
        /// Parsed line.
        message: ClientMessage,
    },
    /// A seated player's connection closed.
    Leave {
        /// Departing player.
        player: PlayerId,
    },
}

/// Cloneable access to a running [`Host`].
#[derive(Debug, Clone)]
pub struct HostHandle {
    inbox: mpsc::Sender<HostInput>,
    outbox: broadcast::Sender<Envelope>,
}

impl HostHandle {
    /// Subscribe to outbound messages.
    ///
    /// Subscribe before [`join`](Self::join) to see the join's own events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.outbox.subscribe()
    }

    /// Ask for a seat.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::HostClosed`] if the host has stopped.
    pub async fn join(&self) -> Result<JoinReply> {
        let (reply, answer) = oneshot::channel();
        self.submit(HostInput::Join { reply }).await?;
        answer.await.map_err(|_| ServerError::HostClosed)
    }

    /// Forward a line from `player`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::HostClosed`] if the host has stopped.
    pub async fn send(&self, player: PlayerId, message: ClientMessage) -> Result<()> {
        self.submit(HostInput::Message { player, message }).await
    }

    /// Report that `player` disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::HostClosed`] if the host has stopped.
    pub async fn leave(&self, player: PlayerId) -> Result<()> {
        self.submit(HostInput::Leave { player }).await
    }

    async fn submit(&self, input: HostInput) -> Result<()> {
        self.inbox
            .send(input)
            .await
            .map_err(|_| ServerError::HostClosed)
    }
}

/// Owner of the authoritative match.
pub struct Host {
    simulation: Simulation,
    inbox: mpsc::Receiver<HostInput>,
    outbox: broadcast::Sender<Envelope>,
    next_player: PlayerId,
    tick_interval: Duration,
}

impl Host {
    /// Create a host for the configured match.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ServerConfig) -> Result<(Self, HostHandle)> {
        config.validate()?;
        let simulation = Simulation::new(config.match_config.clone())?;
        let (inbox_tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let (outbox, _) = broadcast::channel(OUTBOX_CAPACITY);
        let handle = HostHandle {
            inbox: inbox_tx,
            outbox: outbox.clone(),
        };
        let host = Self {
            simulation,
            inbox,
            outbox,
            next_player: 1,
            tick_interval: config.tick_interval(),
        };
        Ok((host, handle))
    }

    /// The match being hosted.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Tick the match and serve inputs until `shutdown` resolves or every
    /// handle is dropped.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            tick_interval_ms = self.tick_interval.as_millis(),
            "Match host running"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => self.handle_tick(),
                input = self.inbox.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
            }
        }

        tracing::info!(
            tick = self.simulation.get_tick(),
            state_hash = self.simulation.state_hash(),
            "Match host stopped"
        );
    }

    /// Apply one input.
    pub fn handle_input(&mut self, input: HostInput) {
        match input {
            HostInput::Join { reply } => {
                let answer = self.handle_join();
                if reply.send(answer).is_err() {
                    // The connection went away while waiting.
                    if let JoinReply::Accepted { player, .. } = answer {
                        self.handle_leave(player);
                    }
                }
            }
            HostInput::Message { player, message } => self.handle_message(player, &message),
            HostInput::Leave { player } => self.handle_leave(player),
        }
    }

    /// Seat a new connection.
    ///
    /// A connection takes over the first slot whose owner is disconnected,
    /// otherwise it gets a fresh id and a new slot if one is free.
    pub fn handle_join(&mut self) -> JoinReply {
        let vacant = self.vacant_seat();
        let player = vacant.unwrap_or(self.next_player);

        match self.simulation.connect_player(player) {
            Ok(events) => {
                if vacant.is_none() {
                    self.next_player += 1;
                }
                tracing::info!(player, reclaimed = vacant.is_some(), "Seat granted");
                self.broadcast(events);
                JoinReply::Accepted {
                    player,
                    tick: self.simulation.get_tick(),
                }
            }
            Err(err) => {
                tracing::info!(error = %err, "Seat refused");
                JoinReply::RoomFull
            }
        }
    }

    /// Handle a parsed line from `player`.
    pub fn handle_message(&mut self, player: PlayerId, message: &ClientMessage) {
        let command = match message.to_command() {
            Ok(Some(command)) => command,
            Ok(None) => {
                let snapshot = self.simulation.snapshot();
                self.send_to(player, ServerMessage::State { snapshot });
                return;
            }
            Err(reason) => {
                self.send_to(player, ServerMessage::error(reason));
                return;
            }
        };

        let outcome = self.simulation.apply_command(player, command);
        self.broadcast(outcome.events);
        if let Some(reason) = outcome.rejection {
            self.send_to(
                player,
                ServerMessage::Rejected {
                    cmd: message.name().to_string(),
                    reason,
                },
            );
        }
    }

    /// Release `player`'s connection. Their slot and units remain.
    pub fn handle_leave(&mut self, player: PlayerId) {
        let events = self.simulation.disconnect_player(player);
        self.broadcast(events);
    }

    /// Advance the match one tick and broadcast what happened.
    pub fn handle_tick(&mut self) {
        if self.simulation.is_over() {
            return;
        }
        let tick_events = self.simulation.tick();
        if let Some(winner) = tick_events.match_ended() {
            tracing::info!(tick = tick_events.tick, ?winner, "Match decided");
        }
        self.broadcast(tick_events.events);
    }

    fn vacant_seat(&self) -> Option<PlayerId> {
        let connected = self.simulation.turns().connected_players();
        self.simulation
            .players()
            .iter()
            .copied()
            .find(|player| !connected.contains(player))
    }

    fn broadcast(&self, events: Vec<MatchEvent>) {
        for event in events {
            self.publish(Envelope {
                recipient: Recipient::All,
                message: ServerMessage::Event { event },
            });
        }
    }

    fn send_to(&self, player: PlayerId, message: ServerMessage) {
        self.publish(Envelope {
            recipient: Recipient::Player(player),
            message,
        });
    }

    fn publish(&self, envelope: Envelope) {
        // Fails only when nobody is subscribed.
        if self.outbox.send(envelope).is_err() {
            tracing::trace!("No subscribers for outbound message");
        }
    }
}
