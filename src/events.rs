//! Events emitted by systems during a fixed step.
//!
//! Systems push into the tick's sink; the driver applies the economy and
//! lives bookkeeping, then retains everything for the presentation layer to
//! drain. Serialized with an adjacent `type` tag so consumers can dispatch
//! on it.

use crate::config::{MonsterKind, TowerKind};
use crate::ecs::EntityId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    WaveStarted { wave: u32 },
    MonsterSpawned { id: EntityId, kind: MonsterKind, wave: u32 },
    MonsterKilled { id: EntityId, reward: u32 },
    MonsterReachedBase { id: EntityId },
    WaveCleared { wave: u32, reward: u32 },
    LevelCompleted,
    TowerPlaced { id: EntityId, kind: TowerKind, cost: u32 },
    TowerUpgraded { id: EntityId, level: u32, cost: u32 },
    TowerSold { id: EntityId, refund: u32 },
    ProjectileExpired { id: EntityId },
    GameOver,
}
