//! Waypoint steering for monsters.
//!
//! Monsters walk the map's waypoint polyline. A freshly spawned monster
//! acquires the waypoint after the nearest one (walking back to a waypoint
//! behind it would reverse its progress). Arrival within the threshold
//! advances to the next waypoint; advancing past the last one means the
//! base is reached: the monster is destroyed and an event is emitted so the
//! driver can deduct a life.

use crate::components::Position;
use crate::ecs::{ComponentKind, EcsStore, EntityId, Stage, System, TickContext};
use crate::events::GameEvent;
use crate::map::PathMap;
use std::sync::Arc;

/// Within this many world units of a waypoint center counts as arrived.
pub const ARRIVAL_THRESHOLD: f32 = 5.0;

pub struct PathfindingSystem {
    map: Arc<PathMap>,
}

impl PathfindingSystem {
    pub fn new(map: Arc<PathMap>) -> Self {
        Self { map }
    }
}

impl System for PathfindingSystem {
    fn stage(&self) -> Stage {
        Stage::Pathfinding
    }

    fn update(&mut self, store: &mut EcsStore, active: &[EntityId], ctx: &mut TickContext<'_>) {
        for &id in active {
            let Some(entity) = store.entity(id) else {
                continue;
            };
            if !(entity.has(ComponentKind::Monster)
                && entity.has(ComponentKind::Position)
                && entity.has(ComponentKind::Velocity))
            {
                continue;
            }

            let Some(position) = entity.components.position else {
                continue;
            };
            let speed_multiplier = entity
                .components
                .buffs
                .as_ref()
                .map_or(1.0, |b| b.speed_multiplier());
            let (base_speed, mut target) = match entity.components.monster.as_ref() {
                Some(monster) => (monster.config.move_speed, monster.target_waypoint),
                None => continue,
            };

            // Acquire: the waypoint after the nearest, or stop if the path
            // ends there.
            if target.is_none() {
                match self.map.nearest_waypoint(position.x, position.y) {
                    Some(nearest) if nearest + 1 < self.map.waypoint_count() => {
                        target = Some(nearest + 1);
                    }
                    _ => {
                        if let Some(entity) = store.entity_mut(id) {
                            if let Some(velocity) = entity.components.velocity.as_mut() {
                                velocity.stop();
                            }
                        }
                        continue;
                    }
                }
            }

            let mut target_index = match target {
                Some(index) => index,
                None => continue,
            };
            let Some((mut wx, mut wy)) = self.map.world_position(target_index) else {
                continue;
            };

            // Arrival advances; past the last waypoint the base is reached.
            let mut reached_base = false;
            if position.distance_to(&Position::new(wx, wy)) <= ARRIVAL_THRESHOLD {
                let next = target_index + 1;
                if next >= self.map.waypoint_count() {
                    reached_base = true;
                } else {
                    target_index = next;
                    if let Some((nx, ny)) = self.map.world_position(next) {
                        (wx, wy) = (nx, ny);
                    }
                }
            }

            if reached_base {
                if let Some(entity) = store.entity_mut(id) {
                    if let Some(velocity) = entity.components.velocity.as_mut() {
                        velocity.stop();
                    }
                }
                ctx.events.push(GameEvent::MonsterReachedBase { id });
                let _ = store.destroy_entity(id);
                continue;
            }

            let dx = wx - position.x;
            let dy = wy - position.y;
            let distance = (dx * dx + dy * dy).sqrt();
            let speed = base_speed * speed_multiplier;
            let dt_s = ctx.dt_ms / 1000.0;

            if let Some(entity) = store.entity_mut(id) {
                let components = &mut entity.components;
                if let Some(monster) = components.monster.as_mut() {
                    monster.target_waypoint = Some(target_index);
                    monster.distance_traveled += speed * dt_s;
                }
                if let Some(velocity) = components.velocity.as_mut() {
                    if distance > 0.0 {
                        velocity.set(dx / distance * speed, dy / distance * speed);
                    } else {
                        velocity.stop();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Buff, Buffs, Monster, Velocity};
    use crate::config::fixtures;
    use crate::pool::PoolManager;
    use crate::spatial::SpatialGrid;

    fn test_map() -> Arc<PathMap> {
        Arc::new(PathMap::from_level(&fixtures::level()))
    }

    fn spawn_monster(store: &mut EcsStore, x: f32, y: f32) -> EntityId {
        let config = Arc::new(fixtures::monster(crate::MonsterKind::Normal));
        let entity = store.create_entity();
        entity.components.position = Some(Position::new(x, y));
        entity.components.velocity = Some(Velocity::new(config.move_speed));
        entity.components.monster = Some(Monster::new(config, 10));
        entity.components.buffs = Some(Buffs::new());
        entity.id()
    }

    fn tick(store: &mut EcsStore, dt_ms: f32) -> Vec<GameEvent> {
        let mut grid = SpatialGrid::new(50.0);
        let mut pools = PoolManager::new();
        let mut events = Vec::new();
        let mut ctx = TickContext {
            dt_ms,
            now_ms: 0.0,
            monsters: &mut grid,
            pools: &mut pools,
            events: &mut events,
        };
        store.update(&mut ctx);
        events
    }

    #[test]
    fn test_acquires_waypoint_after_nearest() {
        let map = test_map();
        let mut store = EcsStore::new();
        // Spawned at waypoint 0's center: target should become waypoint 1.
        let id = spawn_monster(&mut store, 25.0, 275.0);
        store.add_system(PathfindingSystem::new(map));

        let _ = tick(&mut store, 16.67);

        let entity = store.entity(id).unwrap();
        let monster = entity.components.monster.as_ref().unwrap();
        assert_eq!(monster.target_waypoint, Some(1));
        // Heading along +x toward waypoint 1 at full speed.
        let velocity = entity.components.velocity.unwrap();
        assert!((velocity.vx - 50.0).abs() < 1e-3);
        assert!(velocity.vy.abs() < 1e-3);
    }

    #[test]
    fn test_spawn_near_last_waypoint_stops() {
        let map = test_map();
        let mut store = EcsStore::new();
        // Nearest is the final waypoint: nothing after it to walk toward.
        let id = spawn_monster(&mut store, 474.0, 275.0);
        store.add_system(PathfindingSystem::new(map));

        let events = tick(&mut store, 16.67);

        assert!(events.is_empty());
        let entity = store.entity(id).unwrap();
        assert_eq!(entity.components.velocity.unwrap().speed, 0.0);
        assert_eq!(
            entity.components.monster.as_ref().unwrap().target_waypoint,
            None
        );
    }

    #[test]
    fn test_reaching_final_waypoint_destroys_and_emits() {
        let map = test_map();
        let mut store = EcsStore::new();
        let id = spawn_monster(&mut store, 473.0, 275.0);
        // Mid-walk toward the final waypoint, already within the threshold.
        if let Some(entity) = store.entity_mut(id) {
            if let Some(monster) = entity.components.monster.as_mut() {
                monster.target_waypoint = Some(1);
            }
        }
        store.add_system(PathfindingSystem::new(map));

        let events = tick(&mut store, 16.67);

        assert_eq!(events, vec![GameEvent::MonsterReachedBase { id }]);
        assert!(store.entity(id).is_none());
    }

    #[test]
    fn test_slow_buff_scales_steering_speed() {
        let map = test_map();
        let mut store = EcsStore::new();
        let id = spawn_monster(&mut store, 25.0, 275.0);
        if let Some(entity) = store.entity_mut(id) {
            if let Some(buffs) = entity.components.buffs.as_mut() {
                buffs.apply(Buff::slow(0.4, 3000.0));
            }
        }
        store.add_system(PathfindingSystem::new(map));

        let _ = tick(&mut store, 16.67);
        let entity = store.entity(id).unwrap();
        let velocity = entity.components.velocity.unwrap();
        assert!((velocity.speed - 30.0).abs() < 1e-3);

        // Buff gone: back to full speed.
        if let Some(entity) = store.entity_mut(id) {
            if let Some(buffs) = entity.components.buffs.as_mut() {
                let _ = buffs.tick(3000.0);
            }
        }
        let _ = tick(&mut store, 16.67);
        let entity = store.entity(id).unwrap();
        assert!((entity.components.velocity.unwrap().speed - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_waypoint_transitions_across_full_path() {
        let map = test_map();
        let mut store = EcsStore::new();
        let id = spawn_monster(&mut store, 25.0, 275.0);
        store.add_system(PathfindingSystem::new(map.clone()));
        store.add_system(crate::systems::MovementSystem);

        // 50 units/s over 450 units plus threshold slack: 12 seconds of
        // 16.67 ms ticks is plenty.
        let mut reached = false;
        for _ in 0..(12 * 60) {
            let events = tick(&mut store, 16.67);
            if events.contains(&GameEvent::MonsterReachedBase { id }) {
                reached = true;
                break;
            }
        }
        assert!(reached);
        assert!(store.entity(id).is_none());
    }
}
