//! Kinematic integration: `position += velocity * dt`.

use crate::ecs::{EcsStore, EntityId, Stage, System, TickContext};

/// Last stage of the tick. Applies to every active entity with both a
/// position and a velocity; no collision handling.
#[derive(Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn stage(&self) -> Stage {
        Stage::Movement
    }

    fn update(&mut self, store: &mut EcsStore, active: &[EntityId], ctx: &mut TickContext<'_>) {
        let dt_s = ctx.dt_ms / 1000.0;
        for &id in active {
            let Some(entity) = store.entity_mut(id) else {
                continue;
            };
            let components = &mut entity.components;
            if let (Some(position), Some(velocity)) =
                (components.position.as_mut(), components.velocity.as_ref())
            {
                position.x += velocity.vx * dt_s;
                position.y += velocity.vy * dt_s;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Position, Velocity};
    use crate::pool::PoolManager;
    use crate::spatial::SpatialGrid;

    #[test]
    fn test_position_advances_by_velocity_times_dt() {
        let mut store = EcsStore::new();
        let entity = store.create_entity();
        entity.components.position = Some(Position::new(10.0, 20.0));
        let mut velocity = Velocity::new(100.0);
        velocity.set(60.0, -30.0);
        entity.components.velocity = Some(velocity);
        let id = entity.id();

        store.add_system(MovementSystem);
        let mut grid = SpatialGrid::new(50.0);
        let mut pools = PoolManager::new();
        let mut events = Vec::new();
        let mut ctx = TickContext {
            dt_ms: 500.0,
            now_ms: 0.0,
            monsters: &mut grid,
            pools: &mut pools,
            events: &mut events,
        };
        store.update(&mut ctx);

        let entity = store.entity(id).unwrap();
        let position = entity.components.position.unwrap();
        assert!((position.x - 40.0).abs() < 1e-3);
        assert!((position.y - 5.0).abs() < 1e-3);
    }
}
