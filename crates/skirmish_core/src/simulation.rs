//! Match authority.
//!
//! The [`Simulation`] owns every unit, the turn cycle and the player slots.
//! Commands are validated and applied here, and the world advances one
//! fixed tick at a time. Clients only ever see the events and snapshots it
//! produces.
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`](crate::math::Fixed))
//! - No randomness
//! - Units are processed in sorted id order
//! - Same inputs at the same ticks always produce the same state hash
//!
//! # Example
//!
//! ```
//! use skirmish_core::components::UnitCommand;
//! use skirmish_core::config::MatchConfig;
//! use skirmish_core::math::Vec2Fixed;
//! use skirmish_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(MatchConfig::default())?;
//! sim.connect_player(1)?;
//! sim.connect_player(2)?;
//! assert_eq!(sim.current_player(), Some(1));
//!
//! let outcome = sim.apply_command(
//!     1,
//!     UnitCommand::Move {
//!         unit: 1,
//!         destination: Vec2Fixed::from_ints(-30, -20),
//!     },
//! );
//! assert!(outcome.is_accepted());
//!
//! sim.tick();
//! assert_eq!(sim.get_tick(), 1);
//! # Ok::<(), skirmish_core::error::GameError>(())
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::components::{
    AttackTarget, CombatStats, Health, Movement, Owner, PlayerId, Position, UnitCommand, UnitId,
};
use crate::config::MatchConfig;
use crate::data::UnitStats;
use crate::error::{CommandError, GameError, Result};
use crate::events::MatchEvent;
use crate::math::Vec2Fixed;
use crate::roster::{Outcome, Roster};
use crate::systems::{clamp_move_order, engagement, health_system, movement_system, Engagement};
use crate::turn::{TurnFlow, TurnManager, TurnPhase, TurnStatus};

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// A unit on the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier, assigned on insertion.
    pub id: UnitId,
    /// Unit type identifier from [`UnitStats::id`].
    pub kind: String,
    /// Controlling player.
    pub owner: Owner,
    /// World position.
    pub position: Position,
    /// Speed and current destination.
    pub movement: Movement,
    /// Hit points.
    pub health: Health,
    /// Weapon.
    pub combat: CombatStats,
    /// Current attack target.
    pub attack_target: AttackTarget,
}

impl Unit {
    /// Build an idle unit from its type definition. The id is assigned by
    /// [`UnitStorage::insert`].
    #[must_use]
    pub fn from_stats(stats: &UnitStats, owner: Owner, position: Vec2Fixed) -> Self {
        Self {
            id: 0,
            kind: stats.id.clone(),
            owner,
            position: Position::new(position),
            movement: Movement::new(stats.move_speed),
            health: Health::new(stats.health),
            combat: CombatStats::new(stats.damage, stats.attack_range, stats.cooldown_ticks()),
            attack_target: AttackTarget::default(),
        }
    }

    /// Spawned and above zero health.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.health.is_dead()
    }
}

/// Storage for all units in the match.
///
/// Uses a `HashMap` for O(1) lookup by id, with deterministic iteration
/// via sorted keys when systems run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStorage {
    units: HashMap<UnitId, Unit>,
    next_id: UnitId,
}

impl Default for UnitStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitStorage {
    /// Create empty storage. The first unit gets id 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a unit and return its new id. Ids are never reused.
    pub fn insert(&mut self, mut unit: Unit) -> UnitId {
        let id = self.next_id;
        self.next_id += 1;
        unit.id = id;
        self.units.insert(id, unit);
        id
    }

    /// Remove a unit by id.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Get a unit by id.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a mutable reference to a unit by id.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sorted unit ids for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all units (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, &Unit)> {
        self.units.iter()
    }

    /// Iterate mutably over all units (not in deterministic order).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&UnitId, &mut Unit)> {
        self.units.iter_mut()
    }
}

/// Events generated during one simulation tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Tick that produced these events.
    pub tick: u64,
    /// Events in the order they happened.
    pub events: Vec<MatchEvent>,
}

impl TickEvents {
    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Units removed this tick.
    #[must_use]
    pub fn deaths(&self) -> Vec<UnitId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                MatchEvent::UnitDestroyed { unit, .. } => Some(*unit),
                _ => None,
            })
            .collect()
    }

    /// `Some(winner)` if the match ended this tick.
    #[must_use]
    pub fn match_ended(&self) -> Option<Option<PlayerId>> {
        self.events.iter().find_map(|event| match event {
            MatchEvent::MatchEnded { winner, .. } => Some(*winner),
            _ => None,
        })
    }
}

/// Result of [`Simulation::apply_command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Events produced, ending with `CommandRejected` on refusal.
    pub events: Vec<MatchEvent>,
    /// Why the command was refused, if it was.
    pub rejection: Option<CommandError>,
}

impl CommandOutcome {
    /// Whether the command took effect.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Public view of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Unit id.
    pub id: UnitId,
    /// Unit type.
    pub kind: String,
    /// Controlling player.
    pub owner: PlayerId,
    /// World position.
    pub position: Vec2Fixed,
    /// Where it is heading.
    pub destination: Option<Vec2Fixed>,
    /// Current hit points.
    pub health: u32,
    /// Maximum hit points.
    pub max_health: u32,
    /// Current attack target.
    pub target: Option<UnitId>,
}

/// Public view of the whole match, suitable for broadcasting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Current tick.
    pub tick: u64,
    /// Turn cycle.
    pub turn: TurnStatus,
    /// Whether the stalemate breaker is active.
    pub speed_unlocked: bool,
    /// Slot owners in slot order.
    pub players: Vec<PlayerId>,
    /// Units in id order.
    pub units: Vec<UnitSnapshot>,
}

/// The match authority.
///
/// # System Execution Order
///
/// Each tick runs, in order:
/// 1. **Turn clock** - spend turn time, rotate turns, check the turn cap
/// 2. **Combat** - clear stale targets, fire in range, chase out of range
/// 3. **Movement** - step toward destinations
/// 4. **Health** - remove units at zero health
/// 5. **Elimination** - end the match when one side is wiped out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    tick: u64,
    config: MatchConfig,
    units: UnitStorage,
    turns: TurnManager,
    /// Player owning each slot, in claim order.
    slots: Vec<PlayerId>,
    speed_unlocked: bool,
}

impl Simulation {
    /// Create a match waiting for players.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfig`] if the configuration fails
    /// [`MatchConfig::validate`].
    pub fn new(config: MatchConfig) -> Result<Self> {
        config.validate()?;
        let turns = TurnManager::new(&config);
        tracing::info!(
            max_players = config.max_players,
            turn_ticks = config.turn_duration_ticks(),
            actions = config.max_actions_per_turn,
            turn_cap = config.turn_cap,
            "Match created"
        );
        Ok(Self {
            tick: 0,
            config,
            units: UnitStorage::new(),
            turns,
            slots: Vec::new(),
            speed_unlocked: false,
        })
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Match rules.
    #[must_use]
    pub const fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Unit storage.
    #[must_use]
    pub const fn units(&self) -> &UnitStorage {
        &self.units
    }

    /// Get a unit by id.
    #[must_use]
    pub fn get_unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Ownership and range queries over the current units.
    #[must_use]
    pub const fn roster(&self) -> Roster<'_> {
        Roster::new(&self.units)
    }

    /// Turn cycle state.
    #[must_use]
    pub const fn turns(&self) -> &TurnManager {
        &self.turns
    }

    /// Serializable turn status.
    #[must_use]
    pub const fn turn_status(&self) -> TurnStatus {
        self.turns.status()
    }

    /// Player holding the turn.
    #[must_use]
    pub const fn current_player(&self) -> Option<PlayerId> {
        self.turns.current_player()
    }

    /// Slot owners in slot order.
    #[must_use]
    pub fn players(&self) -> &[PlayerId] {
        &self.slots
    }

    /// Whether the stalemate breaker is active.
    #[must_use]
    pub const fn is_speed_unlocked(&self) -> bool {
        self.speed_unlocked
    }

    /// Whether the match is decided.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.turns.is_over()
    }

    /// `Some(winner)` once the match is decided.
    #[must_use]
    pub const fn winner(&self) -> Option<Option<PlayerId>> {
        match self.turns.phase() {
            TurnPhase::MatchEnded { winner } => Some(winner),
            _ => None,
        }
    }

    /// Register a player connection.
    ///
    /// The first `max_players` distinct players claim a slot each and
    /// receive the squad at that slot's spawn points. A player who already
    /// owns a slot reclaims it without a new squad.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::RoomFull`] for an unknown player once every
    /// slot is claimed.
    pub fn connect_player(&mut self, player: PlayerId) -> Result<Vec<MatchEvent>> {
        let mut events = Vec::new();
        if self.turns.connected_players().contains(&player) {
            tracing::debug!(player, "Player already connected");
            return Ok(events);
        }

        let (slot, first_claim) = match self.slots.iter().position(|&owner| owner == player) {
            Some(slot) => (slot, false),
            None => {
                if self.slots.len() >= usize::from(self.config.max_players) {
                    tracing::warn!(player, "Connection refused, room is full");
                    return Err(GameError::RoomFull {
                        player,
                        max_players: self.config.max_players,
                    });
                }
                self.slots.push(player);
                (self.slots.len() - 1, true)
            }
        };

        tracing::info!(player, slot, first_claim, "Player joined");
        events.push(MatchEvent::PlayerJoined { player, slot });
        if first_claim {
            self.spawn_squad(slot, player, &mut events);
        }
        self.turns.player_connected(player, &mut events);
        Ok(events)
    }

    /// Drop a player connection. Their units stay on the field.
    pub fn disconnect_player(&mut self, player: PlayerId) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        if !self.turns.connected_players().contains(&player) {
            return events;
        }

        tracing::info!(player, "Player left");
        events.push(MatchEvent::PlayerLeft { player });
        let flow = self.turns.player_disconnected(player, &mut events);
        self.resolve_turn_flow(flow, &mut events);
        events
    }

    /// Validate and apply a command from `sender`.
    ///
    /// A refused command leaves the match untouched (except that attacking
    /// a dead target drops the attacker's current target) and ends with a
    /// [`MatchEvent::CommandRejected`].
    pub fn apply_command(&mut self, sender: PlayerId, command: UnitCommand) -> CommandOutcome {
        let mut events = Vec::new();
        match self.try_apply_command(sender, &command, &mut events) {
            Ok(()) => CommandOutcome {
                events,
                rejection: None,
            },
            Err(reason) => {
                tracing::debug!(
                    player = sender,
                    command = command.name(),
                    %reason,
                    "Command rejected"
                );
                events.push(MatchEvent::CommandRejected {
                    player: sender,
                    command: command.name().to_string(),
                    reason,
                });
                CommandOutcome {
                    events,
                    rejection: Some(reason),
                }
            }
        }
    }

    fn try_apply_command(
        &mut self,
        sender: PlayerId,
        command: &UnitCommand,
        events: &mut Vec<MatchEvent>,
    ) -> std::result::Result<(), CommandError> {
        if self.turns.is_over() {
            return Err(CommandError::MatchOver);
        }

        match *command {
            UnitCommand::EndTurn => {
                let flow = self.turns.end_turn(sender, events)?;
                self.resolve_turn_flow(flow, events);
            }
            UnitCommand::Move { unit, destination } => {
                self.check_ownership(sender, unit)?;
                self.consume_action(sender, events)?;
                // The action may have closed the last turn at the cap.
                if !self.turns.is_over() {
                    self.order_move(unit, destination, events);
                }
            }
            UnitCommand::Attack { unit, target } => {
                self.check_ownership(sender, unit)?;
                self.check_attack_target(sender, unit, target, events)?;
                self.consume_action(sender, events)?;
                if !self.turns.is_over() {
                    self.order_attack(unit, target, events);
                }
            }
        }
        Ok(())
    }

    fn check_ownership(
        &self,
        sender: PlayerId,
        unit: UnitId,
    ) -> std::result::Result<(), CommandError> {
        let ordered = self
            .units
            .get(unit)
            .filter(|u| u.is_alive())
            .ok_or(CommandError::UnitNotFound { unit })?;
        if !ordered.owner.is(sender) {
            return Err(CommandError::NotOwner {
                unit,
                player: sender,
            });
        }
        Ok(())
    }

    fn check_attack_target(
        &mut self,
        sender: PlayerId,
        unit: UnitId,
        target: UnitId,
        events: &mut Vec<MatchEvent>,
    ) -> std::result::Result<(), CommandError> {
        let victim = self
            .units
            .get(target)
            .ok_or(CommandError::UnitNotFound { unit: target })?;
        if victim.owner.is(sender) {
            return Err(CommandError::FriendlyTarget { target });
        }
        if !victim.is_alive() {
            if let Some(previous) = self
                .units
                .get_mut(unit)
                .and_then(|attacker| attacker.attack_target.clear())
            {
                events.push(MatchEvent::TargetCleared {
                    unit,
                    target: previous,
                });
            }
            return Err(CommandError::TargetDead { target });
        }
        Ok(())
    }

    fn consume_action(
        &mut self,
        sender: PlayerId,
        events: &mut Vec<MatchEvent>,
    ) -> std::result::Result<(), CommandError> {
        let flow = self.turns.use_action(sender, 1, events)?;
        self.resolve_turn_flow(flow, events);
        Ok(())
    }

    fn order_move(&mut self, unit: UnitId, destination: Vec2Fixed, events: &mut Vec<MatchEvent>) {
        let Some(ordered) = self.units.get_mut(unit) else {
            return;
        };

        let destination = clamp_move_order(
            ordered.position.value,
            destination,
            ordered.movement.speed,
            self.config.turn_duration_secs,
            self.speed_unlocked,
        );
        if let Some(previous) = ordered.attack_target.clear() {
            events.push(MatchEvent::TargetCleared {
                unit,
                target: previous,
            });
        }
        ordered.movement.destination = Some(destination);
        events.push(MatchEvent::MoveOrdered { unit, destination });
        tracing::debug!(unit, ?destination, "Move ordered");
    }

    fn order_attack(&mut self, unit: UnitId, target: UnitId, events: &mut Vec<MatchEvent>) {
        let Some(ordered) = self.units.get_mut(unit) else {
            return;
        };
        ordered.attack_target = AttackTarget::with_target(target);
        ordered.movement.stop();
        events.push(MatchEvent::TargetAcquired { unit, target });
        tracing::debug!(unit, target, "Attack ordered");
    }

    /// Act on a turn that ended at the cap.
    fn resolve_turn_flow(&mut self, flow: TurnFlow, events: &mut Vec<MatchEvent>) {
        if flow != TurnFlow::CapReached {
            return;
        }

        let turn_number = self.turns.turn_number();
        let outcome = self.roster().evaluate_outcome(&self.slots);
        match outcome {
            Outcome::Winner(player) => {
                tracing::info!(player, turn_number, "Turn cap reached, deciding by unit count");
                self.turns.end_match(Some(player), events);
            }
            Outcome::Stalemate => {
                tracing::info!(turn_number, "Turn cap reached with even forces, unlocking speed");
                self.speed_unlocked = true;
                events.push(MatchEvent::SpeedUnlocked { turn_number });
                self.turns.lift_turn_cap(events);
            }
        }
    }

    fn spawn_squad(&mut self, slot: usize, player: PlayerId, events: &mut Vec<MatchEvent>) {
        let points = self.config.spawn_points_for(slot);
        for (stats, point) in self.config.squad.iter().zip(points) {
            let position = point.position();
            let unit = self
                .units
                .insert(Unit::from_stats(stats, Owner::new(player), position));
            events.push(MatchEvent::UnitSpawned {
                unit,
                owner: player,
                kind: stats.id.clone(),
                position,
            });
        }
        tracing::debug!(player, slot, squad = self.config.squad.len(), "Squad spawned");
    }

    /// Advance the match by one tick.
    ///
    /// Once the match is decided only the tick counter advances.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = Vec::new();

        // 1. Turn clock
        if !self.turns.is_over() {
            let flow = self.turns.advance(1, &mut events);
            self.resolve_turn_flow(flow, &mut events);
        }

        if !self.turns.is_over() {
            let unit_ids = self.units.sorted_ids();

            // 2. Combat and chase
            self.run_combat_system(&unit_ids, &mut events);

            // 3. Movement
            self.run_movement_system();

            // 4. Health
            self.run_health_system(&unit_ids, &mut events);

            // 5. Elimination
            self.check_elimination(&mut events);
        }

        let tick = self.tick;
        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::trace!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        #[cfg(feature = "debug-validation")]
        {
            if let Err(err) = self.check_invariants() {
                tracing::error!(tick, %err, "Invariant violated");
            }
        }

        TickEvents { tick, events }
    }

    fn run_combat_system(&mut self, unit_ids: &[UnitId], events: &mut Vec<MatchEvent>) {
        for &id in unit_ids {
            let Some(attacker) = self.units.get(id).filter(|u| u.is_alive()) else {
                continue;
            };
            let Some(target_id) = attacker.attack_target.target else {
                continue;
            };
            let from = attacker.position.value;
            let combat = attacker.combat;
            let instigator = attacker.owner.player;

            let target_position = self
                .units
                .get(target_id)
                .filter(|target| target.is_alive())
                .map(|target| target.position.value);

            let Some(target_position) = target_position else {
                if let Some(attacker) = self.units.get_mut(id) {
                    attacker.attack_target.clear();
                    attacker.movement.stop();
                }
                events.push(MatchEvent::TargetCleared {
                    unit: id,
                    target: target_id,
                });
                continue;
            };

            match engagement(from, &combat, target_position, self.tick) {
                Engagement::Fire => {
                    if let Some(attacker) = self.units.get_mut(id) {
                        attacker.movement.stop();
                        attacker.combat.record_shot(self.tick);
                    }
                    if let Some(target) = self.units.get_mut(target_id) {
                        let amount = target.health.apply_damage(combat.damage);
                        events.push(MatchEvent::Damage {
                            attacker: id,
                            target: target_id,
                            amount,
                            instigator,
                            remaining_hp: target.health.current,
                        });
                    }
                }
                Engagement::Reloading => {
                    if let Some(attacker) = self.units.get_mut(id) {
                        attacker.movement.stop();
                    }
                }
                Engagement::Chase(destination) => {
                    if let Some(attacker) = self.units.get_mut(id) {
                        attacker.movement.destination = Some(destination);
                    }
                }
            }
        }
    }

    fn run_movement_system(&mut self) {
        let speed_unlocked = self.speed_unlocked;
        let mut movers: Vec<(UnitId, &mut Position, &mut Movement)> = self
            .units
            .iter_mut()
            .filter(|(_, unit)| unit.is_alive())
            .map(|(&id, unit)| (id, &mut unit.position, &mut unit.movement))
            .collect();
        movers.sort_unstable_by_key(|(id, _, _)| *id);
        movement_system(&mut movers, speed_unlocked);
    }

    fn run_health_system(&mut self, unit_ids: &[UnitId], events: &mut Vec<MatchEvent>) {
        let health: Vec<(UnitId, &Health)> = unit_ids
            .iter()
            .filter_map(|&id| self.units.get(id).map(|unit| (id, &unit.health)))
            .collect();
        let dead = health_system(&health);

        for id in dead {
            if let Some(unit) = self.units.remove(id) {
                tracing::info!(unit = id, owner = unit.owner.player, "Unit destroyed");
                events.push(MatchEvent::UnitDestroyed {
                    unit: id,
                    owner: unit.owner.player,
                });
            }
        }
    }

    fn check_elimination(&mut self, events: &mut Vec<MatchEvent>) {
        if self.turns.turn_number() == 0 || self.turns.is_over() {
            return;
        }
        let survivors = self.roster().players_with_live_units();
        match survivors.as_slice() {
            [] => self.turns.end_match(None, events),
            [survivor] => self.turns.end_match(Some(*survivor), events),
            _ => {}
        }
    }

    /// Serializable view of the match.
    #[must_use]
    pub fn snapshot(&self) -> MatchSnapshot {
        let units = self
            .units
            .sorted_ids()
            .into_iter()
            .filter_map(|id| self.units.get(id))
            .map(|unit| UnitSnapshot {
                id: unit.id,
                kind: unit.kind.clone(),
                owner: unit.owner.player,
                position: unit.position.value,
                destination: unit.movement.destination,
                health: unit.health.current,
                max_health: unit.health.max,
                target: unit.attack_target.target,
            })
            .collect();

        MatchSnapshot {
            tick: self.tick,
            turn: self.turns.status(),
            speed_unlocked: self.speed_unlocked,
            players: self.slots.clone(),
            units,
        }
    }

    /// Check the match-wide invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] describing the first violation.
    pub fn check_invariants(&self) -> Result<()> {
        let status = self.turns.status();
        if status.actions_remaining > status.max_actions_per_turn {
            return Err(GameError::InvalidState(format!(
                "{} actions remaining, budget is {}",
                status.actions_remaining, status.max_actions_per_turn
            )));
        }
        if status.time_remaining_ticks > status.turn_duration_ticks {
            return Err(GameError::InvalidState(format!(
                "{} ticks remaining, turn is {}",
                status.time_remaining_ticks, status.turn_duration_ticks
            )));
        }
        if let TurnPhase::TurnActive { player } = status.phase {
            if !self.turns.connected_players().contains(&player) {
                return Err(GameError::InvalidState(format!(
                    "player {player} holds the turn but is not connected"
                )));
            }
        }
        if self.slots.len() > usize::from(self.config.max_players) {
            return Err(GameError::InvalidState(format!(
                "{} slots claimed, room holds {}",
                self.slots.len(),
                self.config.max_players
            )));
        }
        for (&id, unit) in self.units.iter() {
            if !self.slots.contains(&unit.owner.player) {
                return Err(GameError::InvalidState(format!(
                    "unit {id} owned by unknown player {}",
                    unit.owner.player
                )));
            }
            if unit.health.current > unit.health.max {
                return Err(GameError::InvalidState(format!(
                    "unit {id} has {} of {} hit points",
                    unit.health.current, unit.health.max
                )));
            }
        }
        Ok(())
    }

    /// Hash of the current match state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.turns.status().hash(&mut hasher);
        self.turns.connected_players().hash(&mut hasher);
        self.slots.hash(&mut hasher);
        self.speed_unlocked.hash(&mut hasher);

        let ids = self.units.sorted_ids();
        ids.len().hash(&mut hasher);

        for id in ids {
            if let Some(unit) = self.units.get(id) {
                id.hash(&mut hasher);
                unit.owner.hash(&mut hasher);
                unit.position.value.hash(&mut hasher);
                unit.movement.destination.hash(&mut hasher);
                unit.health.current.hash(&mut hasher);
                unit.combat.last_attack_tick.hash(&mut hasher);
                unit.attack_target.target.hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// Serialize the match state.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {e}")))
    }

    /// Deserialize match state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize simulation: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpawnPoint;
    use crate::error::CommandError;
    use crate::events::TurnEndReason;
    use crate::math::Fixed;

    fn rifleman() -> UnitStats {
        UnitStats {
            id: "rifleman".to_string(),
            move_speed: Fixed::from_num(4),
            attack_range: Fixed::from_num(8),
            damage: 25,
            fire_rate: Fixed::from_num(1),
            health: 100,
        }
    }

    /// One rifleman each, `gap` apart on the x axis, one-second turns.
    fn duel_config(gap: i32, turn_cap: u32) -> MatchConfig {
        MatchConfig {
            turn_duration_secs: Fixed::from_num(1),
            max_actions_per_turn: 2,
            turn_cap,
            max_players: 2,
            squad: vec![rifleman()],
            spawn_points: vec![vec![SpawnPoint::new(0, 0)], vec![SpawnPoint::new(gap, 0)]],
        }
    }

    fn started(config: MatchConfig) -> Simulation {
        let mut sim = Simulation::new(config).unwrap();
        sim.connect_player(1).unwrap();
        sim.connect_player(2).unwrap();
        sim
    }

    fn run_until_over(sim: &mut Simulation, limit: u32) {
        for _ in 0..limit {
            if sim.is_over() {
                return;
            }
            sim.tick();
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = MatchConfig {
            max_actions_per_turn: 0,
            ..MatchConfig::default()
        };
        assert!(matches!(
            Simulation::new(config),
            Err(GameError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_connect_spawns_squads_and_starts_turns() {
        let mut sim = Simulation::new(MatchConfig::default()).unwrap();
        let events = sim.connect_player(10).unwrap();
        assert!(matches!(events[0], MatchEvent::PlayerJoined { player: 10, slot: 0 }));
        assert_eq!(sim.units().len(), 5);
        assert_eq!(sim.current_player(), None);

        let events = sim.connect_player(4).unwrap();
        assert_eq!(sim.units().len(), 10);
        assert_eq!(sim.roster().live_units_for(4), vec![6, 7, 8, 9, 10]);
        assert!(events
            .iter()
            .any(|e| matches!(e, MatchEvent::TurnStarted { player: 4, turn_number: 1, .. })));
        assert_eq!(sim.current_player(), Some(4));
    }

    #[test]
    fn test_room_full() {
        let mut sim = started(duel_config(20, 10));
        let err = sim.connect_player(3).unwrap_err();
        assert!(matches!(err, GameError::RoomFull { player: 3, max_players: 2 }));
    }

    #[test]
    fn test_reconnect_reclaims_slot_without_respawn() {
        let mut sim = started(duel_config(20, 10));
        sim.disconnect_player(2);
        assert_eq!(sim.turn_status().phase, TurnPhase::WaitingForPlayers);
        assert_eq!(sim.units().len(), 2);

        let events = sim.connect_player(2).unwrap();
        assert!(matches!(events[0], MatchEvent::PlayerJoined { player: 2, slot: 1 }));
        assert!(!events.iter().any(|e| matches!(e, MatchEvent::UnitSpawned { .. })));
        assert_eq!(sim.units().len(), 2);
        assert_eq!(sim.current_player(), Some(2));
    }

    #[test]
    fn test_command_gating() {
        let mut sim = started(duel_config(20, 10));
        let before = sim.state_hash();

        let outcome = sim.apply_command(2, UnitCommand::Move {
            unit: 2,
            destination: Vec2Fixed::ZERO,
        });
        assert_eq!(
            outcome.rejection,
            Some(CommandError::NotYourTurn { current: Some(1) })
        );
        assert!(matches!(
            outcome.events.last(),
            Some(MatchEvent::CommandRejected { player: 2, .. })
        ));

        let outcome = sim.apply_command(1, UnitCommand::Attack { unit: 2, target: 1 });
        assert_eq!(
            outcome.rejection,
            Some(CommandError::NotOwner { unit: 2, player: 1 })
        );

        let outcome = sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 1 });
        assert_eq!(outcome.rejection, Some(CommandError::FriendlyTarget { target: 1 }));

        let outcome = sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 77 });
        assert_eq!(outcome.rejection, Some(CommandError::UnitNotFound { unit: 77 }));

        assert_eq!(sim.state_hash(), before);
        assert_eq!(sim.turns().actions_remaining(), 2);
    }

    #[test]
    fn test_actions_run_out_and_turn_passes() {
        let mut sim = started(duel_config(20, 10));
        let step = Vec2Fixed::from_ints(0, 1);

        assert!(sim
            .apply_command(1, UnitCommand::Move { unit: 1, destination: step })
            .is_accepted());
        assert_eq!(sim.turns().actions_remaining(), 1);

        let outcome = sim.apply_command(1, UnitCommand::Move { unit: 1, destination: step });
        assert!(outcome.is_accepted());
        assert!(outcome.events.iter().any(|e| matches!(
            e,
            MatchEvent::TurnEnded {
                player: 1,
                reason: TurnEndReason::ActionsExhausted,
                ..
            }
        )));
        assert_eq!(sim.current_player(), Some(2));

        let outcome = sim.apply_command(1, UnitCommand::Move { unit: 1, destination: step });
        assert_eq!(
            outcome.rejection,
            Some(CommandError::NotYourTurn { current: Some(2) })
        );
    }

    #[test]
    fn test_move_is_clamped_to_one_turn() {
        let mut sim = started(duel_config(20, 10));
        sim.apply_command(1, UnitCommand::Move {
            unit: 1,
            destination: Vec2Fixed::from_ints(0, -100),
        });
        let destination = sim.get_unit(1).unwrap().movement.destination.unwrap();
        // 4 units/s over a 1 s turn.
        let epsilon = Fixed::from_num(1) / Fixed::from_num(1000);
        assert!((destination.y + Fixed::from_num(4)).abs() < epsilon);
    }

    #[test]
    fn test_far_move_order_is_clamped() {
        let mut sim = started(MatchConfig::default());
        let origin = sim.get_unit(1).unwrap().position.value;
        let epsilon = Fixed::from_num(1) / Fixed::from_num(1000);

        for destination in [
            Vec2Fixed::from_ints(100_000, 0),
            Vec2Fixed::new(Fixed::MAX, Fixed::MIN),
        ] {
            let outcome = sim.apply_command(1, UnitCommand::Move { unit: 1, destination });
            assert!(outcome.is_accepted(), "{outcome:?}");
            let clamped = sim.get_unit(1).unwrap().movement.destination.unwrap();
            // 4 units/s over a 60 s turn.
            assert!((origin.distance(clamped) - Fixed::from_num(240)).abs() < epsilon);
        }

        sim.tick();
        let moved = sim.get_unit(1).unwrap().position.value;
        assert!((origin.distance(moved) - Fixed::from_num(0.2)).abs() < epsilon);
    }

    #[test]
    fn test_time_expiry_passes_turn() {
        let mut sim = started(duel_config(50, 10));
        for _ in 0..19 {
            sim.tick();
        }
        assert_eq!(sim.current_player(), Some(1));
        let events = sim.tick();
        assert!(events.events.iter().any(|e| matches!(
            e,
            MatchEvent::TurnEnded {
                reason: TurnEndReason::TimeExpired,
                ..
            }
        )));
        assert_eq!(sim.current_player(), Some(2));
        assert_eq!(sim.turn_status().turn_number, 2);
    }

    #[test]
    fn test_attack_fires_immediately_then_waits_for_cooldown() {
        let mut sim = started(duel_config(6, 100));
        assert!(sim
            .apply_command(1, UnitCommand::Attack { unit: 1, target: 2 })
            .is_accepted());

        let first = sim.tick();
        assert!(first.events.contains(&MatchEvent::Damage {
            attacker: 1,
            target: 2,
            amount: 25,
            instigator: 1,
            remaining_hp: 75,
        }));

        for _ in 0..19 {
            let events = sim.tick();
            assert!(!events
                .events
                .iter()
                .any(|e| matches!(e, MatchEvent::Damage { .. })));
        }
        let second = sim.tick();
        assert!(second
            .events
            .iter()
            .any(|e| matches!(e, MatchEvent::Damage { remaining_hp: 50, .. })));
    }

    #[test]
    fn test_attacker_chases_out_of_range_target() {
        let mut sim = started(duel_config(20, 100));
        sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 2 });
        sim.tick();

        let attacker = sim.get_unit(1).unwrap();
        assert_eq!(attacker.movement.destination, Some(Vec2Fixed::from_ints(20, 0)));
        assert!(attacker.position.value.x > Fixed::ZERO);
    }

    #[test]
    fn test_wiping_out_a_side_ends_match() {
        let mut sim = started(duel_config(6, 100));
        sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 2 });

        let mut destroyed_at = None;
        for _ in 0..100 {
            let events = sim.tick();
            if events.deaths() == vec![2] {
                destroyed_at = Some(events.tick);
                assert_eq!(events.match_ended(), Some(Some(1)));
                break;
            }
        }
        assert_eq!(destroyed_at, Some(60));
        assert!(sim.get_unit(2).is_none());
        assert_eq!(sim.winner(), Some(Some(1)));

        let hash = sim.state_hash();
        let events = sim.tick();
        assert!(events.is_empty());
        assert_ne!(sim.state_hash(), hash);
        assert_eq!(
            sim.apply_command(1, UnitCommand::EndTurn).rejection,
            Some(CommandError::MatchOver)
        );
    }

    #[test]
    fn test_move_order_drops_target() {
        let mut sim = started(duel_config(20, 10));
        sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 2 });
        assert_eq!(sim.get_unit(1).unwrap().attack_target.target, Some(2));

        let outcome = sim.apply_command(1, UnitCommand::Move {
            unit: 1,
            destination: Vec2Fixed::from_ints(0, 2),
        });
        assert!(outcome.is_accepted());
        assert!(outcome
            .events
            .contains(&MatchEvent::TargetCleared { unit: 1, target: 2 }));
        let unit = sim.get_unit(1).unwrap();
        assert_eq!(unit.attack_target.target, None);
        assert_eq!(unit.movement.destination, Some(Vec2Fixed::from_ints(0, 2)));
    }

    #[test]
    fn test_attacking_dead_target_is_rejected_and_clears_target() {
        let mut sim = started(duel_config(20, 10));
        sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 2 });
        sim.units.get_mut(2).unwrap().health.current = 0;

        let outcome = sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 2 });
        assert_eq!(outcome.rejection, Some(CommandError::TargetDead { target: 2 }));
        assert!(outcome
            .events
            .contains(&MatchEvent::TargetCleared { unit: 1, target: 2 }));
        assert_eq!(sim.get_unit(1).unwrap().attack_target.target, None);
        assert_eq!(sim.turn_status().actions_remaining, 1);

        let outcome = sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 9 });
        assert_eq!(outcome.rejection, Some(CommandError::UnitNotFound { unit: 9 }));
    }

    #[test]
    fn test_second_attacker_drops_destroyed_target() {
        let mut config = duel_config(6, 100);
        config.squad = vec![rifleman(), rifleman()];
        config.spawn_points = vec![
            vec![SpawnPoint::new(0, 0), SpawnPoint::new(0, 2)],
            vec![SpawnPoint::new(6, 0), SpawnPoint::new(60, 0)],
        ];
        let mut sim = started(config);
        for unit in [1, 2] {
            assert!(sim
                .apply_command(1, UnitCommand::Attack { unit, target: 3 })
                .is_accepted());
        }

        for _ in 0..20 {
            sim.tick();
        }
        let kill = sim.tick();
        assert_eq!(kill.tick, 20);
        assert_eq!(kill.deaths(), vec![3]);
        assert!(kill
            .events
            .contains(&MatchEvent::Damage {
                attacker: 2,
                target: 3,
                amount: 25,
                instigator: 1,
                remaining_hp: 0,
            }));

        let after = sim.tick();
        assert!(after
            .events
            .contains(&MatchEvent::TargetCleared { unit: 1, target: 3 }));
        assert!(after
            .events
            .contains(&MatchEvent::TargetCleared { unit: 2, target: 3 }));
        assert_eq!(sim.get_unit(2).unwrap().attack_target.target, None);
        assert!(!sim.is_over());
    }

    #[test]
    fn test_unit_killed_earlier_in_tick_does_not_fire() {
        let mut config = duel_config(6, 100);
        config.squad[0].health = 1;
        let mut sim = started(config);
        assert!(sim
            .apply_command(1, UnitCommand::Attack { unit: 1, target: 2 })
            .is_accepted());
        sim.apply_command(1, UnitCommand::EndTurn);
        assert!(sim
            .apply_command(2, UnitCommand::Attack { unit: 2, target: 1 })
            .is_accepted());

        let events = sim.tick();
        assert_eq!(events.deaths(), vec![2]);
        assert!(!events
            .events
            .iter()
            .any(|e| matches!(e, MatchEvent::Damage { attacker: 2, .. })));
        assert_eq!(sim.get_unit(1).unwrap().health.current, 1);
        assert_eq!(sim.winner(), Some(Some(1)));
    }

    #[test]
    fn test_order_closing_decided_match_has_no_effect() {
        let mut config = duel_config(6, 3);
        config.turn_duration_secs = Fixed::from_num(5);
        config.squad = vec![rifleman(), rifleman()];
        config.spawn_points = vec![
            vec![SpawnPoint::new(0, 0), SpawnPoint::new(0, 2)],
            vec![SpawnPoint::new(6, 0), SpawnPoint::new(60, 0)],
        ];
        let mut sim = started(config);
        sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 3 });
        sim.apply_command(1, UnitCommand::EndTurn);
        sim.apply_command(2, UnitCommand::EndTurn);
        assert_eq!(sim.turn_status().turn_number, 3);

        while sim.get_unit(3).is_some() {
            sim.tick();
        }
        assert_eq!(sim.current_player(), Some(1));
        assert!(!sim.is_over());
        assert!(sim
            .apply_command(1, UnitCommand::Move {
                unit: 1,
                destination: Vec2Fixed::from_ints(0, -10),
            })
            .is_accepted());
        assert!(sim.get_unit(1).unwrap().movement.destination.is_some());

        // Spending the last action of the capped turn decides the match.
        let outcome = sim.apply_command(1, UnitCommand::Move {
            unit: 2,
            destination: Vec2Fixed::from_ints(0, 10),
        });
        assert!(outcome.is_accepted());
        assert_eq!(sim.winner(), Some(Some(1)));
        assert!(!outcome
            .events
            .iter()
            .any(|e| matches!(e, MatchEvent::MoveOrdered { .. })));
        assert_eq!(sim.get_unit(2).unwrap().movement.destination, None);
    }

    #[test]
    fn test_turn_cap_stalemate_unlocks_speed() {
        let mut sim = started(duel_config(50, 2));
        assert!(sim.apply_command(1, UnitCommand::EndTurn).is_accepted());
        let outcome = sim.apply_command(2, UnitCommand::EndTurn);
        assert!(outcome
            .events
            .contains(&MatchEvent::SpeedUnlocked { turn_number: 2 }));
        assert!(sim.is_speed_unlocked());
        assert!(!sim.is_over());
        assert_eq!(sim.current_player(), Some(1));

        sim.apply_command(1, UnitCommand::Move {
            unit: 1,
            destination: Vec2Fixed::from_ints(0, 300),
        });
        sim.tick();
        assert_eq!(
            sim.get_unit(1).unwrap().position.value,
            Vec2Fixed::from_ints(0, 300)
        );

        // The cap is only checked once.
        sim.apply_command(1, UnitCommand::EndTurn);
        let outcome = sim.apply_command(2, UnitCommand::EndTurn);
        assert!(!outcome
            .events
            .iter()
            .any(|e| matches!(e, MatchEvent::SpeedUnlocked { .. })));
    }

    #[test]
    fn test_turn_cap_decides_by_unit_count() {
        let mut config = duel_config(6, 4);
        config.squad = vec![rifleman(), rifleman()];
        config.spawn_points = vec![
            vec![SpawnPoint::new(0, 0), SpawnPoint::new(0, 2)],
            vec![SpawnPoint::new(6, 0), SpawnPoint::new(60, 0)],
        ];
        let mut sim = started(config);
        assert!(sim
            .apply_command(1, UnitCommand::Attack { unit: 1, target: 3 })
            .is_accepted());

        run_until_over(&mut sim, 200);
        assert_eq!(sim.winner(), Some(Some(1)));
        assert_eq!(sim.turn_status().turn_number, 4);
        assert_eq!(sim.get_tick(), 80);
    }

    #[test]
    fn test_deterministic_hash() {
        let script = |sim: &mut Simulation| {
            sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 2 });
            for _ in 0..30 {
                sim.tick();
            }
            sim.state_hash()
        };
        let mut a = started(duel_config(20, 10));
        let mut b = started(duel_config(20, 10));
        assert_eq!(script(&mut a), script(&mut b));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut sim = started(duel_config(20, 10));
        sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 2 });
        for _ in 0..5 {
            sim.tick();
        }

        let bytes = sim.serialize().unwrap();
        let mut restored = Simulation::deserialize(&bytes).unwrap();
        assert_eq!(restored.state_hash(), sim.state_hash());

        sim.tick();
        restored.tick();
        assert_eq!(restored.state_hash(), sim.state_hash());
    }

    #[test]
    fn test_snapshot_lists_units_in_order() {
        let sim = started(duel_config(20, 10));
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.players, vec![1, 2]);
        assert_eq!(snapshot.units.len(), 2);
        assert_eq!(snapshot.units[1].owner, 2);
        assert_eq!(snapshot.units[1].position, Vec2Fixed::from_ints(20, 0));
        assert!(sim.check_invariants().is_ok());
    }
}
