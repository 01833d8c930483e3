//! The simulation systems, in tick order.
//!
//! - [`WaveSystem`]: wave scheduling and monster spawning
//! - [`CombatSystem`]: tower attacks, projectile resolution, buff ticking
//! - [`PathfindingSystem`]: waypoint steering and base-reached handling
//! - [`MovementSystem`]: kinematic integration
//!
//! Ordering comes from each system's [`crate::Stage`], not from
//! registration order.

mod combat;
mod movement;
mod pathfinding;
mod waves;

pub use combat::{
    CombatSystem, CHAIN_JUMP_RADIUS, DEFAULT_SLOW_AMOUNT, DEFAULT_SLOW_DURATION_MS, HIT_RADIUS,
    MULTI_SPREAD_RADIUS,
};
pub use movement::MovementSystem;
pub use pathfinding::{PathfindingSystem, ARRIVAL_THRESHOLD};
pub use waves::WaveSystem;
