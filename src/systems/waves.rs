//! Wave scheduling and monster spawning.
//!
//! Runs first each tick. Drives the level's wave list: each wave waits out
//! its start delay, then spawns its entries on their own delay/interval
//! cadence. Once every monster of the wave is spawned and gone (killed or
//! through to the base) the wave's reward is granted and the next wave
//! starts. After the final wave clears the level is complete.

use crate::components::{Buffs, Health, Monster, Position, Velocity};
use crate::config::{LevelConfig, MonsterConfig, MonsterKind};
use crate::ecs::{EcsStore, EntityId, Stage, System, TickContext};
use crate::events::GameEvent;
use crate::map::PathMap;
use std::collections::HashMap;
use std::sync::Arc;

enum WavePhase {
    /// Waiting out the wave's start delay.
    Delay,
    /// Spawning entries; `elapsed_ms` counts from the wave start.
    Spawning,
    /// Everything spawned; waiting for the last monster to go away.
    AwaitClear,
    /// No waves left.
    Done,
}

struct EntryProgress {
    spawned: u32,
}

pub struct WaveSystem {
    level: Arc<LevelConfig>,
    monsters: HashMap<MonsterKind, Arc<MonsterConfig>>,
    map: Arc<PathMap>,
    wave_index: usize,
    phase: WavePhase,
    timer_ms: f32,
    elapsed_ms: f32,
    entries: Vec<EntryProgress>,
    alive: Vec<EntityId>,
}

impl WaveSystem {
    pub fn new(
        level: Arc<LevelConfig>,
        monsters: HashMap<MonsterKind, Arc<MonsterConfig>>,
        map: Arc<PathMap>,
    ) -> Self {
        let phase = if level.waves.is_empty() {
            WavePhase::Done
        } else {
            WavePhase::Delay
        };
        Self {
            level,
            monsters,
            map,
            wave_index: 0,
            phase,
            timer_ms: 0.0,
            elapsed_ms: 0.0,
            entries: Vec::new(),
            alive: Vec::new(),
        }
    }

    /// 1-based wave number of the wave currently running.
    fn wave_number(&self) -> u32 {
        self.wave_index as u32 + 1
    }

    fn start_wave(&mut self, ctx: &mut TickContext<'_>) {
        let wave = &self.level.waves[self.wave_index];
        self.entries = wave
            .monsters
            .iter()
            .map(|_| EntryProgress { spawned: 0 })
            .collect();
        self.elapsed_ms = 0.0;
        self.alive.clear();
        self.phase = WavePhase::Spawning;
        log::info!("wave {} started", self.wave_number());
        ctx.events.push(GameEvent::WaveStarted {
            wave: self.wave_number(),
        });
    }

    fn spawn_monster(
        &mut self,
        kind: MonsterKind,
        store: &mut EcsStore,
        ctx: &mut TickContext<'_>,
    ) {
        let Some(config) = self.monsters.get(&kind).cloned() else {
            log::warn!("no monster config for {kind:?}, skipping spawn");
            return;
        };
        let Some((x, y)) = self.map.world_position(0) else {
            return;
        };
        let wave = self.wave_number();
        let entity = store.create_entity();
        entity.components.position = Some(Position::new(x, y));
        entity.components.velocity = Some(Velocity::new(config.move_speed));
        entity.components.health = Some(Health::with_shield(
            config.scaled_hp(wave),
            config.scaled_shield(wave),
        ));
        entity.components.buffs = Some(Buffs::new());
        let reward = config.scaled_reward(wave);
        entity.components.monster = Some(Monster::new(config, reward));
        let id = entity.id();
        self.alive.push(id);
        ctx.events.push(GameEvent::MonsterSpawned { id, kind, wave });
    }

    fn run_spawns(&mut self, store: &mut EcsStore, ctx: &mut TickContext<'_>) {
        self.elapsed_ms += ctx.dt_ms;
        self.spawn_due(store, ctx);
    }

    fn spawn_due(&mut self, store: &mut EcsStore, ctx: &mut TickContext<'_>) {
        let entry_count = self.entries.len();
        let mut all_done = true;
        for index in 0..entry_count {
            let spawn = self.level.waves[self.wave_index].monsters[index].clone();
            loop {
                let spawned = self.entries[index].spawned;
                if spawned >= spawn.count {
                    break;
                }
                let due_at = spawn.delay_ms + spawned as f32 * spawn.interval_ms;
                if self.elapsed_ms < due_at {
                    all_done = false;
                    break;
                }
                self.entries[index].spawned += 1;
                self.spawn_monster(spawn.kind, store, ctx);
            }
        }
        if all_done {
            self.phase = WavePhase::AwaitClear;
        }
    }

    fn check_cleared(&mut self, store: &EcsStore, ctx: &mut TickContext<'_>) {
        if self.alive.iter().any(|&id| store.entity(id).is_some()) {
            return;
        }
        let wave = self.wave_number();
        let reward = self.level.waves[self.wave_index].reward;
        ctx.events.push(GameEvent::WaveCleared { wave, reward });
        log::info!("wave {wave} cleared, reward {reward}");

        self.wave_index += 1;
        if self.wave_index >= self.level.waves.len() {
            self.phase = WavePhase::Done;
            ctx.events.push(GameEvent::LevelCompleted);
        } else {
            self.phase = WavePhase::Delay;
            self.timer_ms = 0.0;
        }
    }
}

impl System for WaveSystem {
    fn stage(&self) -> Stage {
        Stage::Waves
    }

    fn update(&mut self, store: &mut EcsStore, _active: &[EntityId], ctx: &mut TickContext<'_>) {
        match self.phase {
            WavePhase::Delay => {
                self.timer_ms += ctx.dt_ms;
                let delay = self.level.waves[self.wave_index].delay_ms;
                if self.timer_ms >= delay {
                    self.start_wave(ctx);
                    // Only the slice of this tick past the delay boundary
                    // counts toward the spawn cadence.
                    self.elapsed_ms = self.timer_ms - delay;
                    self.spawn_due(store, ctx);
                }
            }
            WavePhase::Spawning => self.run_spawns(store, ctx),
            WavePhase::AwaitClear => self.check_cleared(store, ctx),
            WavePhase::Done => {}
        }
    }
}
