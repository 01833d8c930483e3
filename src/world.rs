//! Serializable snapshots for the presentation layer.
//!
//! The renderer never touches the store; each frame it takes a [`Snapshot`]
//! (or its JSON form) and draws from that. Snapshots carry entity ids so a
//! renderer can track continuity between frames.

use crate::api::GameWorld;
use crate::config::{MonsterKind, TowerKind};
use crate::ecs::{ComponentKind, EntityId};
use crate::BuffType;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TowerSnapshot {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub kind: TowerKind,
    pub level: u32,
    pub range: f32,
    pub damage: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonsterSnapshot {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub kind: MonsterKind,
    pub hp: f32,
    pub max_hp: f32,
    pub shield_hp: f32,
    pub flying: bool,
    pub slowed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectileSnapshot {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub kind: crate::components::ProjectileKind,
    pub target: Option<EntityId>,
}

/// Full render state for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub time_ms: f64,
    pub gold: u32,
    pub lives: u32,
    pub wave: u32,
    pub game_over: bool,
    pub towers: Vec<TowerSnapshot>,
    pub monsters: Vec<MonsterSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
}

impl Snapshot {
    pub fn from_world(world: &GameWorld) -> Self {
        let store = world.store();
        let mut towers = Vec::new();
        let mut monsters = Vec::new();
        let mut projectiles = Vec::new();

        for id in store.query(&[ComponentKind::Position]) {
            let Some(entity) = store.entity(id) else {
                continue;
            };
            let Some(position) = entity.components.position else {
                continue;
            };
            if let Some(tower) = entity.components.tower.as_ref() {
                towers.push(TowerSnapshot {
                    id,
                    x: position.x,
                    y: position.y,
                    kind: tower.config.kind,
                    level: tower.level,
                    range: tower.current_range(),
                    damage: tower.current_damage(),
                });
            }
            if let Some(monster) = entity.components.monster.as_ref() {
                let health = entity.components.health.as_ref();
                monsters.push(MonsterSnapshot {
                    id,
                    x: position.x,
                    y: position.y,
                    kind: monster.config.kind,
                    hp: health.map_or(0.0, |h| h.current_hp),
                    max_hp: health.map_or(0.0, |h| h.max_hp),
                    shield_hp: health.map_or(0.0, |h| h.shield_hp),
                    flying: monster.is_flying(),
                    slowed: entity
                        .components
                        .buffs
                        .as_ref()
                        .map_or(false, |b| b.has(BuffType::Slow)),
                });
            }
            if let Some(projectile) = entity.components.projectile.as_ref() {
                projectiles.push(ProjectileSnapshot {
                    id,
                    x: position.x,
                    y: position.y,
                    kind: projectile.kind,
                    target: projectile.target,
                });
            }
        }

        Self {
            tick: world.current_tick(),
            time_ms: world.current_time_ms(),
            gold: world.gold(),
            lives: world.lives(),
            wave: world.current_wave(),
            game_over: world.is_game_over(),
            towers,
            monsters,
            projectiles,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
