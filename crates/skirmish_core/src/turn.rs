//! Turn state machine.
//!
//! Turns rotate round-robin over the connected players, ordered by player
//! id. Each turn carries a time budget and an action budget; the turn ends
//! when either runs out or when the current player hands it over.
//!
//! ```text
//! WaitingForPlayers ──(room full)──▶ TurnActive(p)
//!        ▲                               │ time / actions / request / leave
//!        │                               ▼
//!        └────(too few players)──── TurnEnding(p) ──▶ TurnActive(next)
//!                                        │
//!                               (turn cap, decided)
//!                                        ▼
//!                                   MatchEnded
//! ```
//!
//! `TurnEnding` is transient: it is only observable while the owner of the
//! manager resolves a [`TurnFlow::CapReached`].

use serde::{Deserialize, Serialize};

use crate::components::PlayerId;
use crate::config::MatchConfig;
use crate::error::CommandError;
use crate::events::{MatchEvent, TurnEndReason};

/// Phase of the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnPhase {
    /// Not enough players connected; no one holds the turn.
    WaitingForPlayers,
    /// A player holds the turn.
    TurnActive {
        /// Current player.
        player: PlayerId,
    },
    /// A turn just ended and the next one has not started.
    TurnEnding {
        /// Player whose turn ended.
        player: PlayerId,
    },
    /// The match is decided. Terminal.
    MatchEnded {
        /// Winner, `None` when nobody survived.
        winner: Option<PlayerId>,
    },
}

/// What the owner of the manager must do after a turn operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum TurnFlow {
    /// Nothing further; the cycle already moved on.
    Continue,
    /// The ending turn reached the turn cap. The manager is parked in
    /// [`TurnPhase::TurnEnding`] until [`TurnManager::end_match`] or
    /// [`TurnManager::lift_turn_cap`] is called.
    CapReached,
}

/// Serializable view of the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnStatus {
    /// Current phase.
    pub phase: TurnPhase,
    /// 1-based turn counter, 0 before the first turn.
    pub turn_number: u32,
    /// Ticks left in the current turn.
    pub time_remaining_ticks: u32,
    /// Actions left in the current turn.
    pub actions_remaining: u32,
    /// Action budget granted at the start of every turn.
    pub max_actions_per_turn: u32,
    /// Time budget granted at the start of every turn.
    pub turn_duration_ticks: u32,
    /// Turn at which the match is decided.
    pub turn_cap: u32,
}

/// Turn manager: owns the turn cycle and the turn budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnManager {
    max_actions_per_turn: u32,
    turn_duration_ticks: u32,
    turn_cap: u32,
    max_players: u8,
    /// Connected players, sorted ascending, no duplicates.
    connected: Vec<PlayerId>,
    /// Index into `connected` of the last player to start a turn.
    current_index: Option<usize>,
    phase: TurnPhase,
    turn_number: u32,
    time_remaining_ticks: u32,
    actions_remaining: u32,
    /// Cleared once a stalemate unlocks speed; the cap is checked only once.
    cap_enforced: bool,
}

impl TurnManager {
    /// Create a manager waiting for players.
    #[must_use]
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            max_actions_per_turn: config.max_actions_per_turn,
            turn_duration_ticks: config.turn_duration_ticks(),
            turn_cap: config.turn_cap,
            max_players: config.max_players,
            connected: Vec::new(),
            current_index: None,
            phase: TurnPhase::WaitingForPlayers,
            turn_number: 0,
            time_remaining_ticks: 0,
            actions_remaining: 0,
            cap_enforced: true,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Player holding the turn, if any.
    #[must_use]
    pub const fn current_player(&self) -> Option<PlayerId> {
        match self.phase {
            TurnPhase::TurnActive { player } => Some(player),
            _ => None,
        }
    }

    /// 1-based turn counter.
    #[must_use]
    pub const fn turn_number(&self) -> u32 {
        self.turn_number
    }

    /// Ticks left in the current turn.
    #[must_use]
    pub const fn time_remaining_ticks(&self) -> u32 {
        self.time_remaining_ticks
    }

    /// Actions left in the current turn.
    #[must_use]
    pub const fn actions_remaining(&self) -> u32 {
        self.actions_remaining
    }

    /// Connected players in turn order.
    #[must_use]
    pub fn connected_players(&self) -> &[PlayerId] {
        &self.connected
    }

    /// Whether the match has been decided.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        matches!(self.phase, TurnPhase::MatchEnded { .. })
    }

    /// Whether the turn cap will still be checked.
    #[must_use]
    pub const fn cap_enforced(&self) -> bool {
        self.cap_enforced
    }

    /// Snapshot of the turn cycle.
    #[must_use]
    pub const fn status(&self) -> TurnStatus {
        TurnStatus {
            phase: self.phase,
            turn_number: self.turn_number,
            time_remaining_ticks: self.time_remaining_ticks,
            actions_remaining: self.actions_remaining,
            max_actions_per_turn: self.max_actions_per_turn,
            turn_duration_ticks: self.turn_duration_ticks,
            turn_cap: self.turn_cap,
        }
    }

    /// Register a connection. Starts the first turn once the room is full.
    pub fn player_connected(&mut self, player: PlayerId, events: &mut Vec<MatchEvent>) {
        if let Err(pos) = self.connected.binary_search(&player) {
            self.connected.insert(pos, player);
        }
        tracing::debug!(
            player,
            connected = self.connected.len(),
            required = self.max_players,
            "Player connected to turn cycle"
        );

        if self.phase == TurnPhase::WaitingForPlayers && self.has_enough_players() {
            tracing::info!("All players connected, starting turn cycle");
            self.start_next_turn(events);
        }
    }

    /// Drop a connection. Ends the turn if the current player left or the
    /// room is no longer full.
    pub fn player_disconnected(
        &mut self,
        player: PlayerId,
        events: &mut Vec<MatchEvent>,
    ) -> TurnFlow {
        let Ok(pos) = self.connected.binary_search(&player) else {
            return TurnFlow::Continue;
        };
        self.connected.remove(pos);

        let was_current = self.current_player() == Some(player);
        if matches!(self.phase, TurnPhase::TurnActive { .. })
            && (was_current || !self.has_enough_players())
        {
            tracing::info!(player, was_current, "Player left during an active turn");
            return self.end_turn_internal(TurnEndReason::PlayerLeft, events);
        }
        TurnFlow::Continue
    }

    /// Spend turn time. Ends the turn when the budget reaches zero.
    pub fn advance(&mut self, ticks: u32, events: &mut Vec<MatchEvent>) -> TurnFlow {
        if !matches!(self.phase, TurnPhase::TurnActive { .. }) {
            return TurnFlow::Continue;
        }
        self.time_remaining_ticks = self.time_remaining_ticks.saturating_sub(ticks);
        if self.time_remaining_ticks == 0 {
            tracing::info!(
                player = self.current_player(),
                turn = self.turn_number,
                "Turn time expired"
            );
            return self.end_turn_internal(TurnEndReason::TimeExpired, events);
        }
        TurnFlow::Continue
    }

    /// Explicit end of turn by `requester`.
    ///
    /// # Errors
    ///
    /// [`CommandError::NotYourTurn`] unless `requester` holds the turn,
    /// [`CommandError::MatchOver`] once the match is decided.
    pub fn end_turn(
        &mut self,
        requester: PlayerId,
        events: &mut Vec<MatchEvent>,
    ) -> Result<TurnFlow, CommandError> {
        self.ensure_current(requester)?;
        tracing::info!(player = requester, "Turn end requested");
        Ok(self.end_turn_internal(TurnEndReason::Requested, events))
    }

    /// Check that `requester` may spend `cost` actions, without spending them.
    ///
    /// # Errors
    ///
    /// [`CommandError::NotYourTurn`] or [`CommandError::NoActionsRemaining`].
    pub fn check_action(&self, requester: PlayerId, cost: u32) -> Result<(), CommandError> {
        self.ensure_current(requester)?;
        if self.actions_remaining < cost {
            return Err(CommandError::NoActionsRemaining);
        }
        Ok(())
    }

    /// Spend `cost` actions for `requester`. Ends the turn at zero.
    ///
    /// # Errors
    ///
    /// Same as [`check_action`](Self::check_action).
    pub fn use_action(
        &mut self,
        requester: PlayerId,
        cost: u32,
        events: &mut Vec<MatchEvent>,
    ) -> Result<TurnFlow, CommandError> {
        self.check_action(requester, cost)?;
        self.actions_remaining -= cost;
        events.push(MatchEvent::ActionUsed {
            player: requester,
            remaining: self.actions_remaining,
        });
        tracing::debug!(
            player = requester,
            cost,
            remaining = self.actions_remaining,
            "Action used"
        );

        if self.actions_remaining == 0 {
            tracing::info!(player = requester, "No actions left, ending turn");
            return Ok(self.end_turn_internal(TurnEndReason::ActionsExhausted, events));
        }
        Ok(TurnFlow::Continue)
    }

    /// Resolve a parked cap check by continuing play with the cap lifted.
    pub fn lift_turn_cap(&mut self, events: &mut Vec<MatchEvent>) {
        self.cap_enforced = false;
        if matches!(self.phase, TurnPhase::TurnEnding { .. }) {
            self.start_next_turn(events);
        }
    }

    /// Decide the match. Terminal.
    pub fn end_match(&mut self, winner: Option<PlayerId>, events: &mut Vec<MatchEvent>) {
        if self.is_over() {
            return;
        }
        self.phase = TurnPhase::MatchEnded { winner };
        self.time_remaining_ticks = 0;
        self.actions_remaining = 0;
        events.push(MatchEvent::MatchEnded {
            winner,
            turn_number: self.turn_number,
        });
        tracing::info!(?winner, turn = self.turn_number, "Match ended");
    }

    fn ensure_current(&self, requester: PlayerId) -> Result<(), CommandError> {
        if self.is_over() {
            return Err(CommandError::MatchOver);
        }
        let current = self.current_player();
        if current != Some(requester) {
            return Err(CommandError::NotYourTurn { current });
        }
        Ok(())
    }

    fn has_enough_players(&self) -> bool {
        self.connected.len() >= usize::from(self.max_players)
    }

    fn end_turn_internal(&mut self, reason: TurnEndReason, events: &mut Vec<MatchEvent>) -> TurnFlow {
        let Some(player) = self.current_player() else {
            return TurnFlow::Continue;
        };
        self.phase = TurnPhase::TurnEnding { player };
        events.push(MatchEvent::TurnEnded {
            player,
            turn_number: self.turn_number,
            reason,
        });
        tracing::debug!(player, turn = self.turn_number, ?reason, "Turn ending");

        if self.cap_enforced && self.turn_number >= self.turn_cap && self.has_enough_players() {
            return TurnFlow::CapReached;
        }
        self.start_next_turn(events);
        TurnFlow::Continue
    }

    fn start_next_turn(&mut self, events: &mut Vec<MatchEvent>) {
        if !self.has_enough_players() {
            tracing::warn!(
                connected = self.connected.len(),
                required = self.max_players,
                "Not enough players to start next turn"
            );
            self.phase = TurnPhase::WaitingForPlayers;
            self.time_remaining_ticks = 0;
            self.actions_remaining = 0;
            events.push(MatchEvent::WaitingForPlayers {
                connected: self.connected.len(),
                required: self.max_players,
            });
            return;
        }

        let index = self
            .current_index
            .map_or(0, |i| (i + 1) % self.connected.len());
        let player = self.connected[index];
        self.current_index = Some(index);
        self.phase = TurnPhase::TurnActive { player };
        self.time_remaining_ticks = self.turn_duration_ticks;
        self.actions_remaining = self.max_actions_per_turn;
        self.turn_number += 1;

        events.push(MatchEvent::TurnStarted {
            player,
            turn_number: self.turn_number,
            actions: self.actions_remaining,
            time_ticks: self.time_remaining_ticks,
        });
        tracing::info!(
            player,
            turn = self.turn_number,
            actions = self.actions_remaining,
            ticks = self.time_remaining_ticks,
            "Starting turn"
        );
    }
}
