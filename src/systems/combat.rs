//! Tower attacks, projectile resolution, and buff ticking.
//!
//! Three phases per tick, in order:
//!
//! 1. Towers rescan for the strictly closest valid target on every attack
//!    and fire when their cooldown allows, spawning homing projectiles.
//! 2. In-flight projectiles age, steer toward their target, and resolve
//!    impacts (damage, slows, splash, chain, multi). A projectile whose
//!    target vanished keeps flying on its last heading until its lifetime
//!    runs out; that is a miss, not an error.
//! 3. Buff timers tick down; damage-over-time is applied and expiry side
//!    effects run.
//!
//! Each phase gathers its decisions from immutable reads before mutating,
//! so target scans never observe half-applied state.

use crate::components::{Buff, BuffType, Buffs, Position, Projectile, ProjectileKind, Velocity};
use crate::config::TowerKind;
use crate::ecs::{ComponentKind, EcsStore, EntityId, Stage, System, TickContext};
use crate::events::GameEvent;
use crate::spatial::SpatialGrid;

/// A projectile within this distance of its target has hit it.
pub const HIT_RADIUS: f32 = 10.0;

/// How far a chain projectile may jump between victims.
pub const CHAIN_JUMP_RADIUS: f32 = 100.0;

/// Radius around the impact point a multi-shot spreads to.
pub const MULTI_SPREAD_RADIUS: f32 = 60.0;

/// Slow applied by slow towers whose config omits the numbers.
pub const DEFAULT_SLOW_AMOUNT: f32 = 0.4;
pub const DEFAULT_SLOW_DURATION_MS: f32 = 3000.0;

#[derive(Default)]
pub struct CombatSystem;

struct TargetDecision {
    tower: EntityId,
    target: Option<EntityId>,
}

struct Impact {
    projectile: EntityId,
    target: EntityId,
    at: Position,
}

impl System for CombatSystem {
    fn stage(&self) -> Stage {
        Stage::Combat
    }

    fn update(&mut self, store: &mut EcsStore, active: &[EntityId], ctx: &mut TickContext<'_>) {
        self.run_towers(store, active, ctx);
        self.run_projectiles(store, active, ctx);
        self.run_buffs(store, active, ctx);
    }
}

impl CombatSystem {
    // -- phase 1: tower attacks -------------------------------------------

    fn run_towers(&mut self, store: &mut EcsStore, active: &[EntityId], ctx: &mut TickContext<'_>) {
        let mut decisions = Vec::new();
        for &id in active {
            let Some(entity) = store.entity(id) else {
                continue;
            };
            let (Some(tower), Some(&position)) = (
                entity.components.tower.as_ref(),
                entity.components.position.as_ref(),
            ) else {
                continue;
            };
            if !tower.can_attack(ctx.now_ms) {
                continue;
            }
            let range = tower.current_range();
            let laser = tower.config.kind == TowerKind::Laser;
            let target = acquire_target(store, ctx.monsters, &position, range, laser);
            decisions.push(TargetDecision { tower: id, target });
        }

        for decision in decisions {
            self.apply_shot(store, ctx, decision);
        }
    }

    fn apply_shot(&mut self, store: &mut EcsStore, ctx: &mut TickContext<'_>, decision: TargetDecision) {
        // Tower state first: retarget, and gate the cooldown only on a shot.
        let shot = {
            let Some(entity) = store.entity_mut(decision.tower) else {
                return;
            };
            let Some(tower) = entity.components.tower.as_mut() else {
                return;
            };
            tower.target = decision.target;
            let Some(target) = decision.target else {
                return;
            };
            tower.record_attack(ctx.now_ms);
            let kind = match tower.config.kind {
                TowerKind::Single => ProjectileKind::Bullet,
                TowerKind::Aoe => ProjectileKind::Aoe,
                TowerKind::Slow => ProjectileKind::Slow,
                TowerKind::Laser => ProjectileKind::Laser,
                TowerKind::Chain => ProjectileKind::Chain,
                TowerKind::Multi => ProjectileKind::Multi,
            };
            (
                target,
                kind,
                tower.current_damage(),
                tower.config.damage_type,
                tower.config.projectile_speed,
                tower.config.splash_radius.unwrap_or(0.0),
                tower.config.chain_count.unwrap_or(0),
                tower.config.multi_count.unwrap_or(0),
            )
        };
        let (target, kind, damage, damage_type, speed, splash, chain, multi) = shot;

        let (Some(&origin), Some(&target_position)) = (
            store
                .entity(decision.tower)
                .and_then(|e| e.components.position.as_ref()),
            store
                .entity(target)
                .and_then(|e| e.components.position.as_ref()),
        ) else {
            return;
        };

        let mut payload = match ctx.pools.pool_mut::<Projectile>("projectiles") {
            Some(pool) => pool.get(),
            None => Projectile::default(),
        };
        payload.kind = kind;
        payload.damage = damage;
        payload.damage_type = damage_type;
        payload.speed = speed;
        payload.target = Some(target);
        payload.source = Some(decision.tower);
        payload.splash_radius = splash;
        payload.chain_count = chain;
        payload.multi_count = multi;

        let mut velocity = Velocity::new(speed);
        let dx = target_position.x - origin.x;
        let dy = target_position.y - origin.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance > 0.0 {
            velocity.set(dx / distance * speed, dy / distance * speed);
        }

        let entity = store.create_entity();
        entity.components.position = Some(origin);
        entity.components.velocity = Some(velocity);
        entity.components.projectile = Some(payload);
    }

    // -- phase 2: projectile flight and impact ----------------------------

    fn run_projectiles(
        &mut self,
        store: &mut EcsStore,
        active: &[EntityId],
        ctx: &mut TickContext<'_>,
    ) {
        let mut impacts = Vec::new();
        for &id in active {
            // Age the shot; expiry wins over anything else this tick.
            let expired = {
                let Some(entity) = store.entity_mut(id) else {
                    continue;
                };
                let Some(projectile) = entity.components.projectile.as_mut() else {
                    continue;
                };
                projectile.tick_lifetime(ctx.dt_ms)
            };
            if expired {
                self.reclaim(store, ctx, id);
                ctx.events.push(GameEvent::ProjectileExpired { id });
                let _ = store.destroy_entity(id);
                continue;
            }

            let Some(entity) = store.entity(id) else {
                continue;
            };
            let (Some(projectile), Some(&position)) = (
                entity.components.projectile.as_ref(),
                entity.components.position.as_ref(),
            ) else {
                continue;
            };
            let speed = projectile.speed;
            let Some(target) = projectile.target else {
                continue;
            };
            let target_position = store
                .entity(target)
                .and_then(|e| e.components.position.as_ref())
                .copied();

            // Target gone: fly on, last heading, until lifetime expiry.
            let Some(target_position) = target_position else {
                continue;
            };

            if position.distance_to(&target_position) <= HIT_RADIUS {
                impacts.push(Impact {
                    projectile: id,
                    target,
                    at: target_position,
                });
                continue;
            }

            // Home in.
            let dx = target_position.x - position.x;
            let dy = target_position.y - position.y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > 0.0 {
                if let Some(entity) = store.entity_mut(id) {
                    if let Some(velocity) = entity.components.velocity.as_mut() {
                        velocity.set(dx / distance * speed, dy / distance * speed);
                    }
                }
            }
        }

        for impact in impacts {
            self.resolve_impact(store, ctx, impact);
        }
    }

    fn resolve_impact(&mut self, store: &mut EcsStore, ctx: &mut TickContext<'_>, impact: Impact) {
        let Some(payload) = store
            .entity_mut(impact.projectile)
            .and_then(|e| e.components.projectile.take())
        else {
            return;
        };
        let _ = store.destroy_entity(impact.projectile);

        let _ = apply_damage(store, ctx, impact.target, payload.damage, payload.damage_type);

        match payload.kind {
            ProjectileKind::Slow => {
                self.apply_slow(store, impact.target, payload.source);
            }
            ProjectileKind::Aoe => {
                self.apply_splash(store, ctx, &impact, &payload);
            }
            ProjectileKind::Chain => {
                self.apply_chain(store, ctx, &impact, payload.clone());
            }
            ProjectileKind::Multi => {
                self.apply_multi(store, ctx, &impact, &payload);
            }
            ProjectileKind::Bullet | ProjectileKind::Laser => {}
        }

        if let Some(pool) = ctx.pools.pool_mut::<Projectile>("projectiles") {
            pool.release(payload);
        }
    }

    fn apply_slow(&mut self, store: &mut EcsStore, target: EntityId, source: Option<EntityId>) {
        let (amount, duration) = source
            .and_then(|s| store.entity(s))
            .and_then(|e| e.components.tower.as_ref())
            .map(|t| {
                (
                    t.config.slow_amount.unwrap_or(DEFAULT_SLOW_AMOUNT),
                    t.config.slow_duration_ms.unwrap_or(DEFAULT_SLOW_DURATION_MS),
                )
            })
            .unwrap_or((DEFAULT_SLOW_AMOUNT, DEFAULT_SLOW_DURATION_MS));

        let Some(entity) = store.entity_mut(target) else {
            return;
        };
        // Status effects attach the buff set lazily.
        let buffs = entity.components.buffs.get_or_insert_with(Buffs::new);
        let mut buff = Buff::slow(amount, duration);
        if let Some(source) = source {
            buff = buff.from_source(source);
        }
        buffs.apply(buff);
    }

    fn apply_splash(
        &mut self,
        store: &mut EcsStore,
        ctx: &mut TickContext<'_>,
        impact: &Impact,
        payload: &Projectile,
    ) {
        if payload.splash_radius <= 0.0 {
            return;
        }
        let candidates = ctx
            .monsters
            .get_nearby(impact.at.x, impact.at.y, payload.splash_radius);
        for candidate in candidates {
            if candidate == impact.target {
                continue;
            }
            let within = store
                .entity(candidate)
                .and_then(|e| e.components.position.as_ref())
                .map_or(false, |p| p.distance_to(&impact.at) <= payload.splash_radius);
            if within {
                let _ = apply_damage(store, ctx, candidate, payload.damage, payload.damage_type);
            }
        }
    }

    /// Replays the hit on the nearest not-yet-struck monster within the
    /// jump radius, up to `chain_count` victims total.
    fn apply_chain(
        &mut self,
        store: &mut EcsStore,
        ctx: &mut TickContext<'_>,
        impact: &Impact,
        mut payload: Projectile,
    ) {
        payload.mark_chained(impact.target);
        let mut from = impact.at;
        while (payload.chain_hit.len() as u32) < payload.chain_count {
            let candidates = ctx.monsters.get_nearby(from.x, from.y, CHAIN_JUMP_RADIUS);
            let mut next: Option<(EntityId, Position, f32)> = None;
            for candidate in candidates {
                if !payload.can_chain_to(candidate) {
                    continue;
                }
                let Some(position) = store
                    .entity(candidate)
                    .filter(|e| is_living_monster(e))
                    .and_then(|e| e.components.position.as_ref())
                    .copied()
                else {
                    continue;
                };
                let distance = position.distance_to(&from);
                if distance > CHAIN_JUMP_RADIUS {
                    continue;
                }
                if next.map_or(true, |(_, _, best)| distance < best) {
                    next = Some((candidate, position, distance));
                }
            }
            let Some((victim, position, _)) = next else {
                break;
            };
            payload.mark_chained(victim);
            let _ = apply_damage(store, ctx, victim, payload.damage, payload.damage_type);
            from = position;
        }
    }

    /// Damages the `multi_count - 1` nearest other monsters around the
    /// impact point.
    fn apply_multi(
        &mut self,
        store: &mut EcsStore,
        ctx: &mut TickContext<'_>,
        impact: &Impact,
        payload: &Projectile,
    ) {
        if payload.multi_count <= 1 {
            return;
        }
        let candidates = ctx
            .monsters
            .get_nearby(impact.at.x, impact.at.y, MULTI_SPREAD_RADIUS);
        let mut ranked: Vec<(f32, EntityId)> = Vec::new();
        for candidate in candidates {
            if candidate == impact.target {
                continue;
            }
            let Some(position) = store
                .entity(candidate)
                .filter(|e| is_living_monster(e))
                .and_then(|e| e.components.position.as_ref())
            else {
                continue;
            };
            let distance = position.distance_to(&impact.at);
            if distance <= MULTI_SPREAD_RADIUS {
                ranked.push((distance, candidate));
            }
        }
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        for &(_, victim) in ranked.iter().take(payload.multi_count as usize - 1) {
            let _ = apply_damage(store, ctx, victim, payload.damage, payload.damage_type);
        }
    }

    /// Return a destroyed projectile's payload to the pool.
    fn reclaim(&mut self, store: &mut EcsStore, ctx: &mut TickContext<'_>, id: EntityId) {
        let payload = store
            .entity_mut(id)
            .and_then(|e| e.components.projectile.take());
        if let (Some(payload), Some(pool)) =
            (payload, ctx.pools.pool_mut::<Projectile>("projectiles"))
        {
            pool.release(payload);
        }
    }

    // -- phase 3: buff ticking --------------------------------------------

    fn run_buffs(&mut self, store: &mut EcsStore, active: &[EntityId], ctx: &mut TickContext<'_>) {
        for &id in active {
            let mut killed_reward = None;
            {
                let Some(entity) = store.entity_mut(id) else {
                    continue;
                };
                let components = &mut entity.components;
                let Some(buffs) = components.buffs.as_mut() else {
                    continue;
                };
                let dot = buffs.value_of(BuffType::Dot);
                let expired = buffs.tick(ctx.dt_ms);

                if let Some(health) = components.health.as_mut() {
                    if dot > 0.0 {
                        // DoT bypasses resistances.
                        health.take_damage(dot * ctx.dt_ms / 1000.0);
                    }
                    for buff in &expired {
                        if buff.kind == BuffType::Shield {
                            // The buff owns the shield; expiry zeroes what
                            // is left of it.
                            health.set_shield(0.0);
                        }
                    }
                    if !health.alive {
                        killed_reward = components.monster.as_ref().map(|m| m.reward);
                    }
                }
            }
            if let Some(reward) = killed_reward {
                ctx.events.push(GameEvent::MonsterKilled { id, reward });
                let _ = store.destroy_entity(id);
            }
        }
    }
}

fn is_living_monster(entity: &crate::ecs::Entity) -> bool {
    entity.has(ComponentKind::Monster)
        && entity
            .components
            .health
            .as_ref()
            .map_or(false, |h| h.alive)
}

fn valid_target(
    store: &EcsStore,
    id: EntityId,
    from: &Position,
    range: f32,
    laser: bool,
) -> bool {
    let Some(entity) = store.entity(id) else {
        return false;
    };
    if !is_living_monster(entity) {
        return false;
    }
    let flying = entity
        .components
        .monster
        .as_ref()
        .map_or(false, |m| m.is_flying());
    if flying && !laser {
        return false;
    }
    entity
        .components
        .position
        .as_ref()
        .map_or(false, |p| p.distance_to(from) <= range)
}

/// Strictly closest valid monster within range; the grid supplies
/// conservative candidates, the exact distance test happens here.
fn acquire_target(
    store: &EcsStore,
    grid: &SpatialGrid<EntityId>,
    from: &Position,
    range: f32,
    laser: bool,
) -> Option<EntityId> {
    let mut best: Option<(EntityId, f32)> = None;
    for candidate in grid.get_nearby(from.x, from.y, range) {
        if !valid_target(store, candidate, from, range, laser) {
            continue;
        }
        let Some(position) = store
            .entity(candidate)
            .and_then(|e| e.components.position.as_ref())
        else {
            continue;
        };
        let distance = position.distance_to(from);
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((candidate, distance));
        }
    }
    best.map(|(id, _)| id)
}

/// Run the mitigation pipeline and apply the result; emits the kill event
/// and destroys the monster when it dies. Returns whether it died.
fn apply_damage(
    store: &mut EcsStore,
    ctx: &mut TickContext<'_>,
    target: EntityId,
    raw: f32,
    damage_type: crate::config::DamageType,
) -> bool {
    let mut killed_reward = None;
    {
        let Some(entity) = store.entity_mut(target) else {
            return false;
        };
        let components = &mut entity.components;
        let (Some(monster), Some(health)) =
            (components.monster.as_ref(), components.health.as_mut())
        else {
            return false;
        };
        let dealt = monster.damage_after_resist(raw, damage_type);
        health.take_damage(dealt);
        if !health.alive {
            killed_reward = Some(monster.reward);
        }
    }
    match killed_reward {
        Some(reward) => {
            ctx.events.push(GameEvent::MonsterKilled { id: target, reward });
            let _ = store.destroy_entity(target);
            true
        }
        None => false,
    }
}
