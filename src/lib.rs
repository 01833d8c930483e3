//! Tower Defense - Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation for tower-defense gameplay:
//! tower targeting, projectile flight, damage mitigation, status effects, and
//! waypoint path-following. Presentation layers consume [`Snapshot`] values
//! and drive the simulation through the [`GameWorld`] command surface.

pub mod api;
pub mod components;
pub mod config;
pub mod ecs;
pub mod events;
pub mod map;
pub mod pool;
pub mod spatial;
pub mod systems;
pub mod time;
pub mod world;

pub use api::{CommandError, GameWorld};
pub use components::*;
pub use config::{
    DamageType, LevelConfig, MonsterConfig, MonsterKind, MonsterSpawn, TowerConfig, TowerKind,
    TowerUpgrade, WaveConfig,
};
pub use ecs::{ComponentKind, EcsStore, Entity, EntityId, Stage, System, TickContext};
pub use events::GameEvent;
pub use map::PathMap;
pub use pool::{ObjectPool, PoolManager};
pub use spatial::{SpatialGrid, SpatialIndex};
pub use systems::*;
pub use time::{SimClock, FIXED_STEP_MS, MAX_STEPS_PER_FRAME};
pub use world::Snapshot;
