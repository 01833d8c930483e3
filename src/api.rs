//! The driver and command surface the presentation layer talks to.
//!
//! [`GameWorld`] owns everything: the entity store and its systems, the
//! monster spatial grid, the projectile pool, the clock, the map, and the
//! player's gold and lives. Each frame the caller feeds the elapsed wall
//! time into [`GameWorld::step`]; the world drains whole fixed steps from
//! the accumulator and, for each one, rebuilds the monster grid, runs the
//! system pipeline, applies the emitted events to the economy, and
//! garbage-collects the store.
//!
//! Commands validate before they mutate and fail with a [`CommandError`];
//! a rejected command changes nothing.

use crate::components::{Position, Projectile, Tower};
use crate::config::{LevelConfig, MonsterConfig, MonsterKind, TowerConfig, TowerKind};
use crate::ecs::{ComponentKind, EcsStore, EntityId, Stage, TickContext};
use crate::events::GameEvent;
use crate::map::PathMap;
use crate::pool::{ObjectPool, PoolManager};
use crate::spatial::SpatialIndex;
use crate::systems::{CombatSystem, MovementSystem, PathfindingSystem, WaveSystem};
use crate::time::{SimClock, FIXED_STEP_MS};
use crate::world::Snapshot;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

const MONSTER_GRID: &str = "monsters";
const MONSTER_GRID_CELL: f32 = 50.0;
const PROJECTILE_POOL: &str = "projectiles";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("tile ({x}, {y}) is outside the map")]
    OutOfBounds { x: i32, y: i32 },
    #[error("tile ({x}, {y}) is on the monster path")]
    OnPath { x: i32, y: i32 },
    #[error("tile ({x}, {y}) is already occupied")]
    Occupied { x: i32, y: i32 },
    #[error("no tower config for {0:?}")]
    UnknownTower(TowerKind),
    #[error("not enough gold: need {need}, have {have}")]
    InsufficientGold { need: u32, have: u32 },
    #[error("no tower with id {0}")]
    NoSuchTower(EntityId),
    #[error("tower {0} is at the end of its upgrade path")]
    MaxLevel(EntityId),
}

pub struct GameWorld {
    store: EcsStore,
    spatial: SpatialIndex,
    pools: PoolManager,
    clock: SimClock,
    map: Arc<PathMap>,
    tower_configs: HashMap<TowerKind, Arc<TowerConfig>>,
    gold: u32,
    lives: u32,
    wave: u32,
    game_over: bool,
    /// Tiles holding a tower, for placement collision.
    occupied: HashMap<(i32, i32), EntityId>,
    pending_events: Vec<GameEvent>,
}

impl GameWorld {
    pub fn new(
        level: LevelConfig,
        towers: Vec<TowerConfig>,
        monsters: Vec<MonsterConfig>,
    ) -> Self {
        let gold = level.initial_gold;
        let lives = level.initial_lives;
        let level = Arc::new(level);
        let map = Arc::new(PathMap::from_level(&level));
        let tower_configs: HashMap<TowerKind, Arc<TowerConfig>> = towers
            .into_iter()
            .map(|config| (config.kind, Arc::new(config)))
            .collect();
        let monster_configs: HashMap<MonsterKind, Arc<MonsterConfig>> = monsters
            .into_iter()
            .map(|config| (config.kind, Arc::new(config)))
            .collect();

        let mut store = EcsStore::new();
        store.add_system(WaveSystem::new(level, monster_configs, map.clone()));
        store.add_system(CombatSystem);
        store.add_system(PathfindingSystem::new(map.clone()));
        store.add_system(MovementSystem);

        let mut spatial = SpatialIndex::new();
        spatial.create_grid(MONSTER_GRID, MONSTER_GRID_CELL);

        let mut pools = PoolManager::new();
        pools.register(
            PROJECTILE_POOL,
            ObjectPool::new(
                Projectile::default,
                Some(Box::new(|p: &mut Projectile| p.reset())),
                32,
                256,
            ),
        );

        Self {
            store,
            spatial,
            pools,
            clock: SimClock::new(),
            map,
            tower_configs,
            gold,
            lives,
            wave: 0,
            game_over: false,
            occupied: HashMap::new(),
            pending_events: Vec::new(),
        }
    }

    // -- stepping ---------------------------------------------------------

    /// Feed one frame's elapsed wall time; returns how many fixed steps
    /// ran.
    pub fn step(&mut self, frame_dt_ms: f32) -> u32 {
        let steps = self.clock.advance(frame_dt_ms);
        for _ in 0..steps {
            self.fixed_update();
        }
        steps
    }

    fn fixed_update(&mut self) {
        let Some(grid) = self.spatial.grid_mut(MONSTER_GRID) else {
            return;
        };
        grid.clear();
        for id in self
            .store
            .query(&[ComponentKind::Monster, ComponentKind::Position])
        {
            if let Some(position) = self
                .store
                .entity(id)
                .and_then(|e| e.components.position.as_ref())
            {
                grid.add(position.x, position.y, id);
            }
        }

        let mut events = Vec::new();
        let mut ctx = TickContext {
            dt_ms: FIXED_STEP_MS,
            now_ms: self.clock.now_ms(),
            monsters: grid,
            pools: &mut self.pools,
            events: &mut events,
        };
        self.store.update(&mut ctx);

        self.clock.complete_step();
        self.apply_events(&mut events);
        self.pending_events.append(&mut events);
        self.store.cleanup();
    }

    /// Economy and lives bookkeeping for one tick's events.
    fn apply_events(&mut self, events: &mut Vec<GameEvent>) {
        let mut lives_lost = 0u32;
        for event in events.iter() {
            match event {
                GameEvent::WaveStarted { wave } => self.wave = *wave,
                GameEvent::MonsterKilled { reward, .. } => self.gold += reward,
                GameEvent::WaveCleared { reward, .. } => self.gold += reward,
                GameEvent::MonsterReachedBase { .. } => lives_lost += 1,
                _ => {}
            }
        }
        if lives_lost > 0 && !self.game_over {
            self.lives = self.lives.saturating_sub(lives_lost);
            if self.lives == 0 {
                self.game_over = true;
                // Spawning stops; the rest of the pipeline keeps running so
                // the final state stays inspectable.
                self.store.set_system_enabled(Stage::Waves, false);
                log::info!("game over at wave {}", self.wave);
                events.push(GameEvent::GameOver);
            }
        }
    }

    // -- commands ---------------------------------------------------------

    pub fn place_tower(
        &mut self,
        kind: TowerKind,
        tile_x: i32,
        tile_y: i32,
    ) -> Result<EntityId, CommandError> {
        if !self.map.in_bounds(tile_x, tile_y) {
            return Err(CommandError::OutOfBounds {
                x: tile_x,
                y: tile_y,
            });
        }
        if self.map.is_on_path(tile_x, tile_y) {
            return Err(CommandError::OnPath {
                x: tile_x,
                y: tile_y,
            });
        }
        if self.occupied.contains_key(&(tile_x, tile_y)) {
            return Err(CommandError::Occupied {
                x: tile_x,
                y: tile_y,
            });
        }
        let config = self
            .tower_configs
            .get(&kind)
            .cloned()
            .ok_or(CommandError::UnknownTower(kind))?;
        if self.gold < config.cost {
            return Err(CommandError::InsufficientGold {
                need: config.cost,
                have: self.gold,
            });
        }

        self.gold -= config.cost;
        let cost = config.cost;
        let (x, y) = self.map.tile_center(tile_x, tile_y);
        let entity = self.store.create_entity();
        entity.components.position = Some(Position::new(x, y));
        entity.components.tower = Some(Tower::new(config));
        let id = entity.id();
        self.occupied.insert((tile_x, tile_y), id);
        log::debug!("placed {kind:?} tower {id} at ({tile_x}, {tile_y})");
        self.pending_events
            .push(GameEvent::TowerPlaced { id, kind, cost });
        Ok(id)
    }

    /// Advance a tower one level along its upgrade path; returns the new
    /// level.
    pub fn upgrade_tower(&mut self, id: EntityId) -> Result<u32, CommandError> {
        let cost = self
            .store
            .entity(id)
            .and_then(|e| e.components.tower.as_ref())
            .ok_or(CommandError::NoSuchTower(id))?
            .upgrade_cost()
            .ok_or(CommandError::MaxLevel(id))?;
        if self.gold < cost {
            return Err(CommandError::InsufficientGold {
                need: cost,
                have: self.gold,
            });
        }

        self.gold -= cost;
        let level = match self
            .store
            .entity_mut(id)
            .and_then(|e| e.components.tower.as_mut())
        {
            Some(tower) => {
                let _ = tower.upgrade();
                tower.level
            }
            None => return Err(CommandError::NoSuchTower(id)),
        };
        log::debug!("upgraded tower {id} to level {level}");
        self.pending_events
            .push(GameEvent::TowerUpgraded { id, level, cost });
        Ok(level)
    }

    /// Remove a tower for 70% of everything spent on it; returns the
    /// refund.
    pub fn sell_tower(&mut self, id: EntityId) -> Result<u32, CommandError> {
        let (refund, tile) = {
            let entity = self
                .store
                .entity(id)
                .ok_or(CommandError::NoSuchTower(id))?;
            let tower = entity
                .components
                .tower
                .as_ref()
                .ok_or(CommandError::NoSuchTower(id))?;
            let tile = entity
                .components
                .position
                .map(|p| self.map.tile_at(p.x, p.y));
            (tower.sell_price(), tile)
        };

        self.gold += refund;
        if let Some(tile) = tile {
            self.occupied.remove(&tile);
        }
        let _ = self.store.destroy_entity(id);
        log::debug!("sold tower {id} for {refund}");
        self.pending_events.push(GameEvent::TowerSold { id, refund });
        Ok(refund)
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.clock.set_time_scale(scale);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.clock.set_paused(paused);
    }

    // -- queries ----------------------------------------------------------

    pub fn gold(&self) -> u32 {
        self.gold
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    /// 1-based number of the wave currently running; 0 before the first.
    pub fn current_wave(&self) -> u32 {
        self.wave
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn current_tick(&self) -> u64 {
        self.clock.tick()
    }

    pub fn current_time_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    pub fn store(&self) -> &EcsStore {
        &self.store
    }

    pub fn map(&self) -> &PathMap {
        &self.map
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_world(self)
    }

    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        self.snapshot().to_json()
    }

    /// Everything emitted since the last drain, in emission order.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixtures;
    use crate::time::MAX_STEPS_PER_FRAME;

    fn world_with(kinds: &[TowerKind]) -> GameWorld {
        GameWorld::new(
            fixtures::level(),
            kinds.iter().map(|&k| fixtures::tower(k)).collect(),
            vec![
                fixtures::monster(MonsterKind::Normal),
                fixtures::monster(MonsterKind::Fast),
            ],
        )
    }

    fn run_ms(world: &mut GameWorld, ms: f32) {
        let mut left = ms;
        while left > 0.0 {
            world.step(FIXED_STEP_MS);
            left -= FIXED_STEP_MS;
        }
    }

    #[test]
    fn test_place_tower_validation() {
        let mut world = world_with(&[TowerKind::Single]);

        assert_eq!(
            world.place_tower(TowerKind::Single, 20, 0),
            Err(CommandError::OutOfBounds { x: 20, y: 0 })
        );
        assert_eq!(
            world.place_tower(TowerKind::Single, 3, 5),
            Err(CommandError::OnPath { x: 3, y: 5 })
        );
        assert_eq!(
            world.place_tower(TowerKind::Aoe, 3, 3),
            Err(CommandError::UnknownTower(TowerKind::Aoe))
        );

        let id = world.place_tower(TowerKind::Single, 3, 3).unwrap();
        assert_eq!(world.gold(), 50);
        assert_eq!(
            world.place_tower(TowerKind::Single, 3, 3),
            Err(CommandError::Occupied { x: 3, y: 3 })
        );

        // 50 left buys one more; the third is rejected and changes nothing.
        let _ = world.place_tower(TowerKind::Single, 4, 3).unwrap();
        assert_eq!(
            world.place_tower(TowerKind::Single, 5, 3),
            Err(CommandError::InsufficientGold { need: 50, have: 0 })
        );
        assert_eq!(world.gold(), 0);
        assert!(world.store().entity(id).is_some());
    }

    #[test]
    fn test_upgrade_and_sell() {
        let mut world = world_with(&[TowerKind::Single]);
        let id = world.place_tower(TowerKind::Single, 3, 3).unwrap();

        assert_eq!(world.upgrade_tower(id), Ok(2));
        // 100 - 50 - 30 = 20: the level-2 step costs 60.
        assert_eq!(
            world.upgrade_tower(id),
            Err(CommandError::InsufficientGold { need: 60, have: 20 })
        );

        // Spent 80, refund floor(0.7 * 80) = 56.
        assert_eq!(world.sell_tower(id), Ok(56));
        assert_eq!(world.gold(), 76);
        assert!(world.store().entity(id).is_none());
        assert_eq!(world.sell_tower(id), Err(CommandError::NoSuchTower(id)));

        // The tile frees up.
        assert!(world.place_tower(TowerKind::Single, 3, 3).is_ok());

        let events = world.drain_events();
        assert!(events.contains(&GameEvent::TowerUpgraded {
            id,
            level: 2,
            cost: 30
        }));
        assert!(events.contains(&GameEvent::TowerSold { id, refund: 56 }));
    }

    #[test]
    fn test_step_cap_bounds_a_stalled_frame() {
        let mut world = world_with(&[]);
        assert_eq!(world.step(60_000.0), MAX_STEPS_PER_FRAME);
        assert_eq!(world.current_tick() as u32, MAX_STEPS_PER_FRAME);
    }

    #[test]
    fn test_pause_and_time_scale() {
        let mut world = world_with(&[]);
        world.set_paused(true);
        assert_eq!(world.step(1000.0), 0);
        assert_eq!(world.current_tick(), 0);

        world.set_paused(false);
        world.set_time_scale(2.0);
        assert_eq!(world.step(FIXED_STEP_MS * 1.01), 2);
    }

    #[test]
    fn test_wave_starts_and_monster_walks() {
        let mut world = world_with(&[]);
        run_ms(&mut world, 500.0);

        assert_eq!(world.current_wave(), 1);
        let snapshot = world.snapshot();
        assert_eq!(snapshot.monsters.len(), 1);
        // Walking right along the path from the first waypoint.
        assert!(snapshot.monsters[0].x > 25.0);
        assert!((snapshot.monsters[0].y - 275.0).abs() < 1.0);
    }

    #[test]
    fn test_leaked_monster_costs_a_life() {
        let mut level = fixtures::level();
        level.initial_lives = 2;
        let mut world = GameWorld::new(
            level,
            Vec::new(),
            vec![fixtures::monster(MonsterKind::Normal)],
        );

        // 450 units at 50/s is nine seconds; give it twelve.
        run_ms(&mut world, 12_000.0);

        assert_eq!(world.lives(), 1);
        assert!(!world.is_game_over());
        let events = world.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::MonsterReachedBase { .. })));
        assert!(events.contains(&GameEvent::WaveCleared { wave: 1, reward: 25 }));
    }

    #[test]
    fn test_game_over_stops_spawning() {
        let mut level = fixtures::level();
        level.initial_lives = 1;
        // A second wave that would spawn if the game kept going.
        let wave = level.waves[0].clone();
        level.waves.push(wave);
        let mut world = GameWorld::new(
            level,
            Vec::new(),
            vec![fixtures::monster(MonsterKind::Normal)],
        );

        run_ms(&mut world, 12_000.0);
        assert!(world.is_game_over());
        assert_eq!(world.lives(), 0);
        let events = world.drain_events();
        assert!(events.contains(&GameEvent::GameOver));

        // No wave 2 spawns after the loss.
        run_ms(&mut world, 3_000.0);
        assert!(world
            .drain_events()
            .iter()
            .all(|e| !matches!(e, GameEvent::MonsterSpawned { .. })));
        assert_eq!(world.snapshot().monsters.len(), 0);
    }

    #[test]
    fn test_tower_defends_the_level() {
        let mut world = world_with(&[TowerKind::Single]);
        // One row above the path, covering the middle of the run.
        let _ = world.place_tower(TowerKind::Single, 4, 4).unwrap();

        run_ms(&mut world, 8_000.0);

        let events = world.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::MonsterKilled { .. })));
        assert!(events.contains(&GameEvent::LevelCompleted));
        assert_eq!(world.lives(), 20);
        // 100 start - 50 tower + 10 kill + 25 wave clear.
        assert_eq!(world.gold(), 85);
        assert!(!world.is_game_over());
        assert_eq!(world.snapshot().monsters.len(), 0);
    }
}
