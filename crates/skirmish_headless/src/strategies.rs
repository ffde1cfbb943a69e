//! Scripted AI strategies for headless playtesting.
//!
//! A strategy looks at the match from one player's side and produces the
//! commands that player sends when their turn comes up. Strategies only
//! read the simulation; the caller applies the orders.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use skirmish_core::components::{PlayerId, UnitCommand};
use skirmish_core::simulation::{Simulation, Unit};

/// A scripted player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Never orders anything, ends every turn immediately.
    Passive,
    /// Sends idle units at the nearest enemy and lets them chase.
    Aggressive,
    /// Walks idle units toward the nearest enemy, attacking once in range.
    Advance,
    /// Concentrates every unit on the weakest enemy.
    Focus,
}

impl Strategy {
    /// Every strategy, for sweeps.
    pub const ALL: [Self; 4] = [Self::Passive, Self::Aggressive, Self::Advance, Self::Focus];

    /// Strategy name as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Passive => "passive",
            Self::Aggressive => "aggressive",
            Self::Advance => "advance",
            Self::Focus => "focus",
        }
    }

    /// Commands `player` sends this turn.
    ///
    /// Never exceeds the remaining action budget. Ends with
    /// [`UnitCommand::EndTurn`] unless the budget runs out first, which
    /// ends the turn anyway.
    #[must_use]
    pub fn plan(self, sim: &Simulation, player: PlayerId) -> Vec<UnitCommand> {
        let budget = sim.turn_status().actions_remaining as usize;
        let mut orders = match self {
            Self::Passive => Vec::new(),
            Self::Aggressive => aggressive_orders(sim, player),
            Self::Advance => advance_orders(sim, player),
            Self::Focus => focus_orders(sim, player),
        };
        orders.truncate(budget);
        if orders.len() < budget {
            orders.push(UnitCommand::EndTurn);
        }
        orders
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|s| s.name()).collect();
                format!("unknown strategy '{s}', expected one of: {}", names.join(", "))
            })
    }
}

fn own_units(sim: &Simulation, player: PlayerId) -> impl Iterator<Item = &Unit> {
    sim.roster()
        .live_units_for(player)
        .into_iter()
        .filter_map(move |id| sim.get_unit(id))
}

fn enemy_units(sim: &Simulation, player: PlayerId) -> Vec<&Unit> {
    sim.roster()
        .live_enemy_units_for(player)
        .into_iter()
        .filter_map(|id| sim.get_unit(id))
        .collect()
}

/// A unit with no live target.
fn is_idle(sim: &Simulation, unit: &Unit) -> bool {
    unit.attack_target
        .target
        .and_then(|target| sim.get_unit(target))
        .map_or(true, |target| !target.is_alive())
}

fn nearest<'a>(unit: &Unit, enemies: &[&'a Unit]) -> Option<&'a Unit> {
    let from = unit.position.value;
    enemies
        .iter()
        .copied()
        .min_by_key(|enemy| (from.distance_squared(enemy.position.value), enemy.id))
}

fn aggressive_orders(sim: &Simulation, player: PlayerId) -> Vec<UnitCommand> {
    let enemies = enemy_units(sim, player);
    own_units(sim, player)
        .filter(|unit| is_idle(sim, unit))
        .filter_map(|unit| {
            nearest(unit, &enemies).map(|enemy| UnitCommand::Attack {
                unit: unit.id,
                target: enemy.id,
            })
        })
        .collect()
}

fn advance_orders(sim: &Simulation, player: PlayerId) -> Vec<UnitCommand> {
    let enemies = enemy_units(sim, player);
    own_units(sim, player)
        .filter(|unit| is_idle(sim, unit))
        .filter_map(|unit| {
            let enemy = nearest(unit, &enemies)?;
            let target = enemy.position.value;
            if unit.position.value.within(target, unit.combat.range) {
                Some(UnitCommand::Attack {
                    unit: unit.id,
                    target: enemy.id,
                })
            } else if unit.movement.destination == Some(target) {
                None
            } else {
                Some(UnitCommand::Move {
                    unit: unit.id,
                    destination: target,
                })
            }
        })
        .collect()
}

fn focus_orders(sim: &Simulation, player: PlayerId) -> Vec<UnitCommand> {
    let Some(weakest) = enemy_units(sim, player)
        .into_iter()
        .min_by_key(|enemy| (enemy.health.current, enemy.id))
    else {
        return Vec::new();
    };
    own_units(sim, player)
        .filter(|unit| unit.attack_target.target != Some(weakest.id))
        .map(|unit| UnitCommand::Attack {
            unit: unit.id,
            target: weakest.id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::math::Vec2Fixed;
    use skirmish_test_utils::fixtures::{duel_config, skirmish_config, started_match, PLAYER_ONE};

    #[test]
    fn test_parse_names() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.name().parse::<Strategy>(), Ok(strategy));
        }
        assert!("turtle".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_passive_just_ends_turn() {
        let sim = started_match(skirmish_config());
        assert_eq!(
            Strategy::Passive.plan(&sim, PLAYER_ONE),
            vec![UnitCommand::EndTurn]
        );
    }

    #[test]
    fn test_aggressive_picks_nearest_enemies() {
        let sim = started_match(skirmish_config());
        assert_eq!(
            Strategy::Aggressive.plan(&sim, PLAYER_ONE),
            vec![
                UnitCommand::Attack { unit: 1, target: 3 },
                UnitCommand::Attack { unit: 2, target: 4 },
            ]
        );
    }

    #[test]
    fn test_aggressive_skips_engaged_units() {
        let mut sim = started_match(skirmish_config());
        sim.apply_command(PLAYER_ONE, UnitCommand::Attack { unit: 1, target: 3 });
        assert_eq!(
            aggressive_orders(&sim, PLAYER_ONE),
            vec![UnitCommand::Attack { unit: 2, target: 4 }]
        );
    }

    #[test]
    fn test_focus_targets_weakest() {
        let sim = started_match(skirmish_config());
        assert_eq!(
            Strategy::Focus.plan(&sim, PLAYER_ONE),
            vec![
                UnitCommand::Attack { unit: 1, target: 3 },
                UnitCommand::Attack { unit: 2, target: 3 },
            ]
        );
    }

    #[test]
    fn test_advance_walks_when_out_of_range() {
        let sim = started_match(duel_config(40, 10));
        assert_eq!(
            Strategy::Advance.plan(&sim, PLAYER_ONE),
            vec![
                UnitCommand::Move {
                    unit: 1,
                    destination: Vec2Fixed::from_ints(40, 0),
                },
                UnitCommand::EndTurn,
            ]
        );
    }

    #[test]
    fn test_advance_attacks_in_range() {
        let sim = started_match(duel_config(6, 10));
        assert_eq!(
            Strategy::Advance.plan(&sim, PLAYER_ONE),
            vec![
                UnitCommand::Attack { unit: 1, target: 2 },
                UnitCommand::EndTurn,
            ]
        );
    }
}
