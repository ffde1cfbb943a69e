//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the match authority produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays and desync checks only work if the simulation is 100%
//! deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`skirmish_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted unit id order.
//!
//! - **Wall-clock time**: Turn timers count ticks, never real time.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (movement, combat, etc.)
//! 2. **Property tests**: Random command scripts must still replay exactly
//! 3. **Parallel tests**: Running N simulations on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use skirmish_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use skirmish_test_utils::determinism::verify_determinism;
/// use skirmish_test_utils::fixtures::{duel_config, started_match};
///
/// let result = verify_determinism(
///     3,
///     100,
///     || started_match(duel_config(20, 10)),
///     |sim| {
///         sim.tick();
///     },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run the simulation twice from `setup_fn` and compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        |sim| sim.state_hash(),
    );
    result.is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// or memory layout differences.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a serialization round-trip preserves state exactly, and
/// that the restored copy keeps evolving identically.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();

    for _ in 0..num_ticks {
        sim.tick();
    }

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };

    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    for _ in 0..num_ticks {
        sim.tick();
        restored.tick();
    }
    restored.state_hash() == sim.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of the match authority.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::components::{PlayerId, UnitCommand, UnitId};
    use skirmish_core::math::{Fixed, Vec2Fixed};

    use crate::fixtures::ScriptStep;

    /// Generate a fixed-point coordinate, mostly on a small battlefield.
    ///
    /// One in four values is drawn from the whole `Fixed` range, so move
    /// orders far off the map are covered too.
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        prop_oneof![
            3 => (-100i32..100i32).prop_map(Fixed::from_num),
            1 => any::<i64>().prop_map(Fixed::from_bits),
        ]
    }

    /// Generate a fixed-point 2D vector for positions.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_position(), arb_fixed_position()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate a unit id in `1..=max_unit`, including ids owned by the
    /// other side.
    pub fn arb_unit_id(max_unit: UnitId) -> impl Strategy<Value = UnitId> {
        1..=max_unit
    }

    /// Generate any command over units `1..=max_unit`.
    pub fn arb_unit_command(max_unit: UnitId) -> impl Strategy<Value = UnitCommand> {
        prop_oneof![
            3 => (arb_unit_id(max_unit), arb_vec2_position())
                .prop_map(|(unit, destination)| UnitCommand::Move { unit, destination }),
            3 => (arb_unit_id(max_unit), arb_unit_id(max_unit))
                .prop_map(|(unit, target)| UnitCommand::Attack { unit, target }),
            1 => Just(UnitCommand::EndTurn),
        ]
    }

    /// Generate a script step from one of `players`.
    pub fn arb_script_step(
        players: Vec<PlayerId>,
        max_unit: UnitId,
    ) -> impl Strategy<Value = ScriptStep> {
        (
            proptest::sample::select(players),
            arb_unit_command(max_unit),
            0u32..30,
        )
            .prop_map(|(player, command, ticks_after)| ScriptStep {
                player,
                command,
                ticks_after,
            })
    }

    /// Generate a script of up to `max_len` steps for players 1 and 2.
    pub fn arb_script(max_unit: UnitId, max_len: usize) -> impl Strategy<Value = Vec<ScriptStep>> {
        proptest::collection::vec(arb_script_step(vec![1, 2], max_unit), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{duel_config, run_script, skirmish_config, started_match};
    use proptest::prelude::*;
    use skirmish_core::components::UnitCommand;

    fn engaged_duel() -> Simulation {
        let mut sim = started_match(duel_config(14, 6));
        sim.apply_command(1, UnitCommand::Attack { unit: 1, target: 2 });
        sim
    }

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
        result.assert_deterministic();
        assert_eq!(result.unique_hashes(), vec![10]);
    }

    #[test]
    fn test_idle_match_determinism() {
        assert!(verify_simulation_determinism(
            || started_match(duel_config(20, 10)),
            200
        ));
    }

    #[test]
    fn test_combat_determinism() {
        assert!(verify_simulation_determinism(engaged_duel, 300));
        assert_eq!(find_first_divergence(engaged_duel, 300), None);
    }

    #[test]
    fn test_parallel_combat_simulations() {
        run_parallel_simulations(engaged_duel, 4, 300).assert_deterministic();
    }

    #[test]
    fn test_serialization_mid_combat() {
        assert!(verify_serialization_determinism(engaged_duel, 50));
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
    }

    proptest! {
        /// Any command script replays to the same state.
        #[test]
        fn prop_scripts_are_replayable(script in strategies::arb_script(4, 12)) {
            let setup = || {
                let mut sim = started_match(skirmish_config());
                run_script(&mut sim, &script);
                sim
            };
            let result = verify_determinism(2, 20, setup, |s| { s.tick(); }, |s| s.state_hash());
            prop_assert!(result.is_deterministic);
        }

        /// Scripts never break the turn and roster invariants.
        #[test]
        fn prop_scripts_keep_invariants(script in strategies::arb_script(4, 12)) {
            let mut sim = started_match(skirmish_config());
            for step in &script {
                let before = sim.state_hash();
                let outcome = sim.apply_command(step.player, step.command.clone());
                if outcome.rejection.is_some() {
                    prop_assert_eq!(sim.state_hash(), before);
                }
                prop_assert!(sim.check_invariants().is_ok());
                for _ in 0..step.ticks_after {
                    sim.tick();
                    prop_assert!(sim.check_invariants().is_ok());
                }
            }
        }
    }
}
