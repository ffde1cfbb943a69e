//! Unit classification by connection.
//!
//! A [`Roster`] is a read-only view over the units of a match. It answers
//! who owns what, who is still standing, and who is in reach of whom. A
//! unit is live when it is on the field with health above zero.

use serde::{Deserialize, Serialize};

use crate::components::{PlayerId, UnitId};
use crate::simulation::{Unit, UnitStorage};

/// Result of comparing live unit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// One player has strictly more live units than every other player.
    Winner(PlayerId),
    /// Two or more players share the highest count.
    Stalemate,
}

/// Read-only classification of units by owner.
#[derive(Debug, Clone, Copy)]
pub struct Roster<'a> {
    units: &'a UnitStorage,
}

impl<'a> Roster<'a> {
    /// Wrap unit storage.
    #[must_use]
    pub const fn new(units: &'a UnitStorage) -> Self {
        Self { units }
    }

    fn live(&self) -> impl Iterator<Item = &'a Unit> + 'a {
        let units = self.units;
        units.sorted_ids().into_iter().filter_map(move |id| {
            units.get(id).filter(|unit| unit.is_alive())
        })
    }

    /// Live units owned by `player`, in id order.
    #[must_use]
    pub fn live_units_for(&self, player: PlayerId) -> Vec<UnitId> {
        self.live()
            .filter(|unit| unit.owner.is(player))
            .map(|unit| unit.id)
            .collect()
    }

    /// Live units owned by anyone other than `player`, in id order.
    #[must_use]
    pub fn live_enemy_units_for(&self, player: PlayerId) -> Vec<UnitId> {
        self.live()
            .filter(|unit| !unit.owner.is(player))
            .map(|unit| unit.id)
            .collect()
    }

    /// Number of live units owned by `player`.
    #[must_use]
    pub fn live_unit_count_for(&self, player: PlayerId) -> usize {
        self.live().filter(|unit| unit.owner.is(player)).count()
    }

    /// Number of live units not owned by `player`.
    #[must_use]
    pub fn live_enemy_count_for(&self, player: PlayerId) -> usize {
        self.live().filter(|unit| !unit.owner.is(player)).count()
    }

    /// Whether `unit` exists and belongs to `player`.
    #[must_use]
    pub fn is_friendly(&self, unit: UnitId, player: PlayerId) -> bool {
        self.units
            .get(unit)
            .is_some_and(|unit| unit.owner.is(player))
    }

    /// Live enemies within `unit`'s attack range, in id order.
    ///
    /// Empty if the unit does not exist.
    #[must_use]
    pub fn enemies_in_range(&self, unit: UnitId) -> Vec<UnitId> {
        let Some(source) = self.units.get(unit) else {
            return Vec::new();
        };
        self.live()
            .filter(|other| other.owner != source.owner)
            .filter(|other| {
                source
                    .position
                    .value
                    .within(other.position.value, source.combat.range)
            })
            .map(|other| other.id)
            .collect()
    }

    /// Owners that still have at least one live unit, sorted.
    #[must_use]
    pub fn players_with_live_units(&self) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self.live().map(|unit| unit.owner.player).collect();
        players.sort_unstable();
        players.dedup();
        players
    }

    /// Compare live unit counts across `players`.
    #[must_use]
    pub fn evaluate_outcome(&self, players: &[PlayerId]) -> Outcome {
        let counts: Vec<(PlayerId, usize)> = players
            .iter()
            .map(|&player| (player, self.live_unit_count_for(player)))
            .collect();

        let Some(best) = counts.iter().map(|&(_, count)| count).max() else {
            return Outcome::Stalemate;
        };
        let mut leaders = counts.iter().filter(|&&(_, count)| count == best);

        match (leaders.next(), leaders.next()) {
            (Some(&(player, _)), None) => Outcome::Winner(player),
            _ => Outcome::Stalemate,
        }
    }
}
