//! Simulation systems.
//!
//! Systems contain the rules that process components. They are pure
//! functions over component data; the [`Simulation`](crate::simulation::Simulation)
//! decides which units they run on and in what order.

use crate::components::{CombatStats, Health, Movement, Position, UnitId};
use crate::math::{Fixed, Vec2Fixed};

/// What an attacker does about its target this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    /// In range and the weapon is ready.
    Fire,
    /// In range, weapon still cooling down. Hold position.
    Reloading,
    /// Out of range. Head for the target.
    Chase(Vec2Fixed),
}

/// Decide how an attacker at `attacker` engages a target at `target`.
///
/// Range is inclusive: a target exactly `range` away can be hit.
#[must_use]
pub fn engagement(attacker: Vec2Fixed, combat: &CombatStats, target: Vec2Fixed, tick: u64) -> Engagement {
    if !attacker.within(target, combat.range) {
        return Engagement::Chase(target);
    }
    if combat.can_fire(tick) {
        Engagement::Fire
    } else {
        Engagement::Reloading
    }
}

/// Advances units toward their destinations.
///
/// Each unit covers at most its per-tick step and snaps onto the
/// destination on arrival, clearing it. With `speed_unlocked` every unit
/// arrives in a single tick.
///
/// Returns the units that arrived this tick.
pub fn movement_system(
    units: &mut [(UnitId, &mut Position, &mut Movement)],
    speed_unlocked: bool,
) -> Vec<UnitId> {
    let mut arrived = Vec::new();

    for (unit_id, position, movement) in units.iter_mut() {
        let Some(destination) = movement.destination else {
            continue;
        };

        position.value = if speed_unlocked {
            destination
        } else {
            position
                .value
                .step_towards(destination, movement.step_per_tick())
        };

        if position.value == destination {
            movement.stop();
            arrived.push(*unit_id);
        }
    }

    arrived
}

/// Identifies units at zero health.
#[must_use]
pub fn health_system(units: &[(UnitId, &Health)]) -> Vec<UnitId> {
    units
        .iter()
        .filter(|(_, health)| health.is_dead())
        .map(|(id, _)| *id)
        .collect()
}

/// Limit a move order to what the unit can cover in one turn.
///
/// `turn_secs` is the turn duration; no clamp is applied once speed is
/// unlocked.
#[must_use]
pub fn clamp_move_order(
    from: Vec2Fixed,
    requested: Vec2Fixed,
    speed: Fixed,
    turn_secs: Fixed,
    speed_unlocked: bool,
) -> Vec2Fixed {
    if speed_unlocked {
        return requested;
    }
    from.clamp_towards(requested, speed.saturating_mul(turn_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rifle() -> CombatStats {
        CombatStats::new(25, Fixed::from_num(8), 20)
    }

    #[test]
    fn test_engagement_fires_in_range() {
        let at = Vec2Fixed::ZERO;
        let target = Vec2Fixed::from_ints(8, 0);
        assert_eq!(engagement(at, &rifle(), target, 0), Engagement::Fire);
    }

    #[test]
    fn test_engagement_reloads_after_shot() {
        let mut combat = rifle();
        combat.record_shot(10);
        let target = Vec2Fixed::from_ints(3, 0);
        assert_eq!(
            engagement(Vec2Fixed::ZERO, &combat, target, 15),
            Engagement::Reloading
        );
        assert_eq!(
            engagement(Vec2Fixed::ZERO, &combat, target, 30),
            Engagement::Fire
        );
    }

    #[test]
    fn test_engagement_chases_out_of_range() {
        let target = Vec2Fixed::from_ints(9, 0);
        assert_eq!(
            engagement(Vec2Fixed::ZERO, &rifle(), target, 0),
            Engagement::Chase(target)
        );
    }

    #[test]
    fn test_movement_steps_and_arrives() {
        let mut position = Position::new(Vec2Fixed::ZERO);
        let mut movement = Movement::new(Fixed::from_num(20));
        movement.destination = Some(Vec2Fixed::from_ints(2, 0));

        {
            let mut units = vec![(1, &mut position, &mut movement)];
            assert!(movement_system(&mut units, false).is_empty());
        }
        assert_eq!(position.value, Vec2Fixed::from_ints(1, 0));

        {
            let mut units = vec![(1, &mut position, &mut movement)];
            assert_eq!(movement_system(&mut units, false), vec![1]);
        }
        assert_eq!(position.value, Vec2Fixed::from_ints(2, 0));
        assert!(!movement.is_moving());
    }

    #[test]
    fn test_unlocked_movement_arrives_in_one_tick() {
        let mut position = Position::new(Vec2Fixed::ZERO);
        let mut movement = Movement::new(Fixed::from_num(1));
        movement.destination = Some(Vec2Fixed::from_ints(500, -300));

        let mut units = vec![(4, &mut position, &mut movement)];
        assert_eq!(movement_system(&mut units, true), vec![4]);
        assert_eq!(position.value, Vec2Fixed::from_ints(500, -300));
    }

    #[test]
    fn test_health_system_finds_dead() {
        let alive = Health::new(10);
        let mut dead = Health::new(10);
        dead.apply_damage(10);
        assert_eq!(health_system(&[(1, &alive), (2, &dead)]), vec![2]);
    }

    #[test]
    fn test_clamp_move_order() {
        let far = Vec2Fixed::from_ints(1000, 0);
        let clamped = clamp_move_order(
            Vec2Fixed::ZERO,
            far,
            Fixed::from_num(4),
            Fixed::from_num(60),
            false,
        );
        let epsilon = Fixed::from_num(1) / Fixed::from_num(10000);
        assert!((clamped.x - Fixed::from_num(240)).abs() < epsilon);
        assert_eq!(clamped.y, Fixed::ZERO);
        assert_eq!(
            clamp_move_order(Vec2Fixed::ZERO, far, Fixed::from_num(4), Fixed::from_num(60), true),
            far
        );
    }
}
