//! Gameplay components and their invariant-preserving mutators.
//!
//! Components are plain data with small methods; systems own all
//! cross-component logic. Each entity carries at most one component per
//! [`ComponentKind`], stored in a [`ComponentSet`].

use crate::config::{DamageType, MonsterConfig, TowerConfig, TowerUpgrade};
use crate::ecs::{ComponentKind, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One `Option` slot per component kind. Presence is the component's
/// enabled state; removing a slot disables that aspect of the entity.
#[derive(Debug, Default)]
pub struct ComponentSet {
    pub position: Option<Position>,
    pub velocity: Option<Velocity>,
    pub health: Option<Health>,
    pub buffs: Option<Buffs>,
    pub tower: Option<Tower>,
    pub monster: Option<Monster>,
    pub projectile: Option<Projectile>,
}

impl ComponentSet {
    pub fn has(&self, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Position => self.position.is_some(),
            ComponentKind::Velocity => self.velocity.is_some(),
            ComponentKind::Health => self.health.is_some(),
            ComponentKind::Buffs => self.buffs.is_some(),
            ComponentKind::Tower => self.tower.is_some(),
            ComponentKind::Monster => self.monster.is_some(),
            ComponentKind::Projectile => self.projectile.is_some(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Position / Velocity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// 2D velocity whose magnitude never exceeds `max_speed`. Every mutation
/// re-derives `speed` and rescales the vector if it breaks the cap,
/// preserving direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
    /// Derived magnitude, kept in sync by the mutators.
    pub speed: f32,
    pub max_speed: f32,
}

impl Velocity {
    pub fn new(max_speed: f32) -> Self {
        Self {
            max_speed,
            ..Self::default()
        }
    }

    pub fn set(&mut self, vx: f32, vy: f32) {
        self.vx = vx;
        self.vy = vy;
        self.renormalize();
    }

    pub fn add(&mut self, dvx: f32, dvy: f32) {
        self.vx += dvx;
        self.vy += dvy;
        self.renormalize();
    }

    pub fn stop(&mut self) {
        self.vx = 0.0;
        self.vy = 0.0;
        self.speed = 0.0;
    }

    fn renormalize(&mut self) {
        self.speed = (self.vx * self.vx + self.vy * self.vy).sqrt();
        if self.speed > self.max_speed && self.speed > 0.0 {
            let scale = self.max_speed / self.speed;
            self.vx *= scale;
            self.vy *= scale;
            self.speed = self.max_speed;
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Hit points with an optional shield layer. Damage drains the shield
/// before HP; dead entities ignore further damage and healing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current_hp: f32,
    pub max_hp: f32,
    pub shield_hp: f32,
    pub alive: bool,
}

impl Health {
    pub fn new(max_hp: f32) -> Self {
        Self::with_shield(max_hp, 0.0)
    }

    pub fn with_shield(max_hp: f32, shield_hp: f32) -> Self {
        Self {
            current_hp: max_hp,
            max_hp,
            shield_hp,
            alive: true,
        }
    }

    /// Apply post-mitigation damage. Shield absorbs first; HP floors at
    /// zero and `alive` flips when it gets there.
    pub fn take_damage(&mut self, amount: f32) {
        if !self.alive || amount <= 0.0 {
            return;
        }
        let absorbed = self.shield_hp.min(amount);
        self.shield_hp -= absorbed;
        self.current_hp = (self.current_hp - (amount - absorbed)).max(0.0);
        if self.current_hp <= 0.0 {
            self.alive = false;
        }
    }

    /// Restore HP up to `max_hp`. No effect on the dead.
    pub fn heal(&mut self, amount: f32) {
        if !self.alive || amount <= 0.0 {
            return;
        }
        self.current_hp = (self.current_hp + amount).min(self.max_hp);
    }

    pub fn set_shield(&mut self, shield_hp: f32) {
        self.shield_hp = shield_hp.max(0.0);
    }

    pub fn add_shield(&mut self, amount: f32) {
        self.set_shield(self.shield_hp + amount);
    }

    /// HP as a fraction of maximum, for presentation.
    pub fn fraction(&self) -> f32 {
        if self.max_hp > 0.0 {
            self.current_hp / self.max_hp
        } else {
            0.0
        }
    }

    pub fn is_full(&self) -> bool {
        self.current_hp >= self.max_hp
    }

    /// Restore to full and alive, shield included.
    pub fn reset(&mut self, shield_hp: f32) {
        self.current_hp = self.max_hp;
        self.shield_hp = shield_hp;
        self.alive = true;
    }
}

// ---------------------------------------------------------------------------
// Buffs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffType {
    Slow,
    SpeedBoost,
    DamageBoost,
    ArmorBreak,
    Shield,
    /// Damage over time; `value` is damage per second, applied unmitigated.
    Dot,
    Stun,
}

/// Stable identity for a buff: its type plus the entity that applied it.
/// Re-applying through the same key refreshes or stacks instead of
/// duplicating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuffKey {
    pub kind: BuffType,
    pub source: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Buff {
    pub kind: BuffType,
    /// Effective magnitude; for stackable buffs this is
    /// `per_stack_value * stacks`.
    pub value: f32,
    pub per_stack_value: f32,
    pub duration_ms: f32,
    pub remaining_ms: f32,
    pub source: Option<EntityId>,
    pub stackable: bool,
    pub max_stacks: u32,
    pub stacks: u32,
}

impl Buff {
    pub fn new(kind: BuffType, value: f32, duration_ms: f32) -> Self {
        Self {
            kind,
            value,
            per_stack_value: value,
            duration_ms,
            remaining_ms: duration_ms,
            source: None,
            stackable: false,
            max_stacks: 1,
            stacks: 1,
        }
    }

    pub fn from_source(mut self, source: EntityId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn stacking(mut self, max_stacks: u32) -> Self {
        self.stackable = true;
        self.max_stacks = max_stacks.max(1);
        self
    }

    /// Movement slow: `amount` in [0, 1] is the speed fraction removed.
    pub fn slow(amount: f32, duration_ms: f32) -> Self {
        Self::new(BuffType::Slow, amount, duration_ms)
    }

    /// Temporary shield; expiry zeroes the owner's remaining shield HP.
    pub fn shield(amount: f32, duration_ms: f32) -> Self {
        Self::new(BuffType::Shield, amount, duration_ms)
    }

    /// Damage per second for the duration.
    pub fn dot(damage_per_second: f32, duration_ms: f32) -> Self {
        Self::new(BuffType::Dot, damage_per_second, duration_ms)
    }

    fn key(&self) -> BuffKey {
        BuffKey {
            kind: self.kind,
            source: self.source,
        }
    }
}

/// Active buffs on one entity, keyed by [`BuffKey`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buffs {
    active: HashMap<BuffKey, Buff>,
}

impl Buffs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach, stack, or refresh.
    ///
    /// An existing stackable buff gains a stack (capped at `max_stacks`),
    /// its value becomes `per_stack_value * stacks`, and its remaining time
    /// becomes the longer of current and full duration. An existing
    /// non-stackable buff refreshes magnitude and remaining time without
    /// duplicating.
    pub fn apply(&mut self, buff: Buff) {
        match self.active.get_mut(&buff.key()) {
            Some(existing) if existing.stackable => {
                existing.stacks = (existing.stacks + 1).min(existing.max_stacks);
                existing.value = existing.per_stack_value * existing.stacks as f32;
                existing.remaining_ms = existing.remaining_ms.max(buff.duration_ms);
            }
            Some(existing) => {
                existing.value = buff.value;
                existing.remaining_ms = existing.remaining_ms.max(buff.duration_ms);
            }
            None => {
                self.active.insert(buff.key(), buff);
            }
        }
    }

    /// Advance all timers by `dt_ms`, removing and returning expired buffs
    /// so the caller can apply expiry side effects.
    pub fn tick(&mut self, dt_ms: f32) -> Vec<Buff> {
        for buff in self.active.values_mut() {
            buff.remaining_ms -= dt_ms;
        }
        let mut expired = Vec::new();
        self.active.retain(|_, buff| {
            if buff.remaining_ms <= 0.0 {
                expired.push(buff.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Sum of `value` across active buffs of the given type.
    pub fn value_of(&self, kind: BuffType) -> f32 {
        self.active
            .values()
            .filter(|b| b.kind == kind)
            .map(|b| b.value)
            .sum()
    }

    /// Multiplier on movement speed from slow effects, floored at zero.
    /// Stun zeroes movement outright.
    pub fn speed_multiplier(&self) -> f32 {
        if self.has(BuffType::Stun) {
            return 0.0;
        }
        (1.0 - self.value_of(BuffType::Slow)).max(0.0)
    }

    pub fn has(&self, kind: BuffType) -> bool {
        self.active.values().any(|b| b.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buff> {
        self.active.values()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

// ---------------------------------------------------------------------------
// Tower
// ---------------------------------------------------------------------------

/// A placed tower. Stats derive from the shared config plus every upgrade
/// step the tower has advanced past (`upgrade.level < level`).
#[derive(Debug, Clone)]
pub struct Tower {
    pub config: Arc<TowerConfig>,
    pub level: u32,
    /// Simulation time of the last shot, for the attack-rate gate.
    pub last_attack_ms: f64,
    /// Weak reference, re-validated every tick.
    pub target: Option<EntityId>,
}

impl Tower {
    pub fn new(config: Arc<TowerConfig>) -> Self {
        Self {
            config,
            level: 1,
            last_attack_ms: f64::NEG_INFINITY,
            target: None,
        }
    }

    fn bonus(&self, field: impl Fn(&TowerUpgrade) -> f32) -> f32 {
        self.config
            .upgrade_path
            .iter()
            .filter(|u| u.level < self.level)
            .map(field)
            .sum()
    }

    pub fn current_damage(&self) -> f32 {
        self.config.base_damage + self.bonus(|u| u.damage_bonus)
    }

    /// Attacks per second at the current level.
    pub fn current_attack_rate(&self) -> f32 {
        self.config.attack_rate + self.bonus(|u| u.attack_rate_bonus)
    }

    pub fn current_range(&self) -> f32 {
        self.config.range + self.bonus(|u| u.range_bonus)
    }

    /// The cooldown gate: at least `1000 / attack_rate` ms since the last
    /// shot.
    pub fn can_attack(&self, now_ms: f64) -> bool {
        let rate = self.current_attack_rate();
        if rate <= 0.0 {
            return false;
        }
        now_ms - self.last_attack_ms >= (1000.0 / rate) as f64
    }

    pub fn record_attack(&mut self, now_ms: f64) {
        self.last_attack_ms = now_ms;
    }

    /// The upgrade step purchasable right now, if the path extends further.
    pub fn next_upgrade(&self) -> Option<&TowerUpgrade> {
        self.config.upgrade_path.iter().find(|u| u.level == self.level)
    }

    pub fn can_upgrade(&self) -> bool {
        self.next_upgrade().is_some()
    }

    pub fn upgrade_cost(&self) -> Option<u32> {
        self.next_upgrade().map(|u| u.cost)
    }

    /// Advance one level if the path allows it.
    pub fn upgrade(&mut self) -> bool {
        if self.can_upgrade() {
            self.level += 1;
            true
        } else {
            false
        }
    }

    /// Base cost plus every purchased upgrade step.
    pub fn total_spent(&self) -> u32 {
        self.config.cost
            + self
                .config
                .upgrade_path
                .iter()
                .filter(|u| u.level < self.level)
                .map(|u| u.cost)
                .sum::<u32>()
    }

    /// Sell refund: 70% of everything spent, floored.
    pub fn sell_price(&self) -> u32 {
        (self.total_spent() as f32 * 0.7).floor() as u32
    }
}

// ---------------------------------------------------------------------------
// Monster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Monster {
    pub config: Arc<MonsterConfig>,
    /// Index into the path's waypoint list; `None` until pathfinding
    /// acquires a target.
    pub target_waypoint: Option<usize>,
    pub distance_traveled: f32,
    /// Kill reward, already wave-scaled at spawn time.
    pub reward: u32,
}

impl Monster {
    pub fn new(config: Arc<MonsterConfig>, reward: u32) -> Self {
        Self {
            config,
            target_waypoint: None,
            distance_traveled: 0.0,
            reward,
        }
    }

    pub fn is_flying(&self) -> bool {
        self.config.flying
    }

    pub fn is_boss(&self) -> bool {
        self.config.boss
    }

    pub fn resist(&self, damage_type: DamageType) -> f32 {
        match damage_type {
            DamageType::Physical => self.config.physical_resist,
            DamageType::Magical => self.config.magical_resist,
            DamageType::True => 0.0,
        }
    }

    /// Post-mitigation damage: true damage passes through untouched;
    /// everything else is `floor(max(0, raw * (1 - resist)))`.
    pub fn damage_after_resist(&self, raw: f32, damage_type: DamageType) -> f32 {
        if damage_type == DamageType::True {
            return raw.max(0.0);
        }
        (raw * (1.0 - self.resist(damage_type))).max(0.0).floor()
    }
}

// ---------------------------------------------------------------------------
// Projectile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    Bullet,
    Laser,
    Aoe,
    Chain,
    Multi,
    Slow,
}

pub const PROJECTILE_DEFAULT_LIFETIME_MS: f32 = 5000.0;

/// An in-flight shot. Pooled: [`Projectile::reset`] is the pool's release
/// hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub kind: ProjectileKind,
    pub damage: f32,
    pub damage_type: DamageType,
    pub speed: f32,
    /// Weak reference; a vanished target turns the shot into a miss.
    pub target: Option<EntityId>,
    pub source: Option<EntityId>,
    pub lifetime_ms: f32,
    pub max_lifetime_ms: f32,
    pub splash_radius: f32,
    pub chain_count: u32,
    /// Victims already hit by this chain, never hit twice.
    pub chain_hit: Vec<EntityId>,
    pub multi_count: u32,
}

impl Default for Projectile {
    fn default() -> Self {
        Self {
            kind: ProjectileKind::Bullet,
            damage: 0.0,
            damage_type: DamageType::Physical,
            speed: 0.0,
            target: None,
            source: None,
            lifetime_ms: 0.0,
            max_lifetime_ms: PROJECTILE_DEFAULT_LIFETIME_MS,
            splash_radius: 0.0,
            chain_count: 0,
            chain_hit: Vec::new(),
            multi_count: 0,
        }
    }
}

impl Projectile {
    pub fn new(kind: ProjectileKind, damage: f32, damage_type: DamageType, speed: f32) -> Self {
        Self {
            kind,
            damage,
            damage_type,
            speed,
            ..Self::default()
        }
    }

    /// Advance the flight timer; `true` once the shot has outlived
    /// `max_lifetime_ms`.
    pub fn tick_lifetime(&mut self, dt_ms: f32) -> bool {
        self.lifetime_ms += dt_ms;
        self.lifetime_ms >= self.max_lifetime_ms
    }

    pub fn can_chain_to(&self, id: EntityId) -> bool {
        !self.chain_hit.contains(&id)
    }

    pub fn mark_chained(&mut self, id: EntityId) {
        self.chain_hit.push(id);
    }

    /// Pool release hook: back to a blank bullet, keeping the chain-hit
    /// buffer's capacity.
    pub fn reset(&mut self) {
        let mut chain_hit = std::mem::take(&mut self.chain_hit);
        chain_hit.clear();
        *self = Self::default();
        self.chain_hit = chain_hit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_cap_preserves_direction() {
        let mut v = Velocity::new(100.0);
        v.set(300.0, 400.0);
        assert!((v.speed - 100.0).abs() < 1e-3);
        // Direction 3:4 preserved.
        assert!((v.vx - 60.0).abs() < 1e-3);
        assert!((v.vy - 80.0).abs() < 1e-3);
    }

    #[test]
    fn test_velocity_stop() {
        let mut v = Velocity::new(100.0);
        v.set(50.0, 0.0);
        v.stop();
        assert_eq!(v.speed, 0.0);
        assert_eq!((v.vx, v.vy), (0.0, 0.0));
    }

    #[test]
    fn test_damage_drains_shield_first() {
        let mut h = Health::with_shield(100.0, 30.0);
        h.take_damage(50.0);
        assert_eq!(h.shield_hp, 0.0);
        assert_eq!(h.current_hp, 80.0);
        assert!(h.alive);
    }

    #[test]
    fn test_dead_entities_ignore_damage_and_heal() {
        let mut h = Health::new(10.0);
        h.take_damage(25.0);
        assert!(!h.alive);
        assert_eq!(h.current_hp, 0.0);

        h.take_damage(5.0);
        h.heal(5.0);
        assert_eq!(h.current_hp, 0.0);

        h.reset(0.0);
        assert!(h.alive);
        assert!(h.is_full());
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut h = Health::new(100.0);
        h.take_damage(30.0);
        h.heal(500.0);
        assert_eq!(h.current_hp, 100.0);
    }

    #[test]
    fn test_resist_pipeline_floors() {
        let monster = Monster::new(
            Arc::new(crate::config::fixtures::monster(crate::MonsterKind::Heavy)),
            10,
        );
        // 15 raw physical against 0.5 resist: 7.5 floored to 7.
        assert_eq!(monster.damage_after_resist(15.0, DamageType::Physical), 7.0);
        // True damage bypasses resistance and rounding.
        assert_eq!(monster.damage_after_resist(15.0, DamageType::True), 15.0);
    }

    #[test]
    fn test_stackable_buff_caps_and_refreshes() {
        let mut buffs = Buffs::new();
        let poison = || Buff::dot(2.0, 1000.0).stacking(3);
        buffs.apply(poison());
        buffs.apply(poison());
        assert_eq!(buffs.len(), 1);
        assert!((buffs.value_of(BuffType::Dot) - 4.0).abs() < 1e-6);

        buffs.apply(poison());
        buffs.apply(poison());
        // Capped at 3 stacks.
        assert!((buffs.value_of(BuffType::Dot) - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_stackable_buff_refreshes_not_duplicates() {
        let mut buffs = Buffs::new();
        buffs.apply(Buff::slow(0.4, 3000.0));
        let _ = buffs.tick(1000.0);
        buffs.apply(Buff::slow(0.4, 3000.0));
        assert_eq!(buffs.len(), 1);
        assert!((buffs.value_of(BuffType::Slow) - 0.4).abs() < 1e-6);

        // Refreshed to the full duration: survives another 2500 ms.
        let expired = buffs.tick(2500.0);
        assert!(expired.is_empty());
        let expired = buffs.tick(600.0);
        assert_eq!(expired.len(), 1);
        assert!(buffs.is_empty());
    }

    #[test]
    fn test_buffs_from_different_sources_coexist() {
        let mut buffs = Buffs::new();
        buffs.apply(Buff::slow(0.2, 1000.0).from_source(EntityId(1)));
        buffs.apply(Buff::slow(0.3, 1000.0).from_source(EntityId(2)));
        assert_eq!(buffs.len(), 2);
        assert!((buffs.value_of(BuffType::Slow) - 0.5).abs() < 1e-6);
        assert!((buffs.speed_multiplier() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_speed_multiplier_floors_at_zero() {
        let mut buffs = Buffs::new();
        buffs.apply(Buff::slow(0.8, 1000.0).from_source(EntityId(1)));
        buffs.apply(Buff::slow(0.8, 1000.0).from_source(EntityId(2)));
        assert_eq!(buffs.speed_multiplier(), 0.0);
    }

    #[test]
    fn test_stun_zeroes_movement() {
        let mut buffs = Buffs::new();
        buffs.apply(Buff::new(BuffType::Stun, 1.0, 500.0));
        assert_eq!(buffs.speed_multiplier(), 0.0);
    }

    #[test]
    fn test_tower_upgrades_and_sell_price() {
        let config = Arc::new(crate::config::fixtures::tower(crate::TowerKind::Single));
        let mut tower = Tower::new(config);
        assert_eq!(tower.current_damage(), 15.0);
        assert_eq!(tower.upgrade_cost(), Some(30));

        assert!(tower.upgrade());
        assert_eq!(tower.level, 2);
        assert_eq!(tower.current_damage(), 20.0);
        assert_eq!(tower.current_range(), 130.0);

        assert!(tower.upgrade());
        assert_eq!(tower.current_damage(), 30.0);
        // Path exhausted.
        assert!(!tower.upgrade());
        assert_eq!(tower.level, 3);

        // Spent 50 + 30 + 60 = 140; refund floor(0.7 * 140) = 98.
        assert_eq!(tower.sell_price(), 98);
    }

    #[test]
    fn test_attack_gate() {
        let config = Arc::new(crate::config::fixtures::tower(crate::TowerKind::Single));
        let mut tower = Tower::new(config);
        // Never fired: first shot is free.
        assert!(tower.can_attack(0.0));
        tower.record_attack(0.0);
        assert!(!tower.can_attack(999.0));
        assert!(tower.can_attack(1000.0));
    }

    #[test]
    fn test_projectile_lifetime_and_chain_dedupe() {
        let mut p = Projectile::new(ProjectileKind::Chain, 10.0, DamageType::Physical, 300.0);
        assert!(!p.tick_lifetime(4999.0));
        assert!(p.tick_lifetime(1.0));

        p.mark_chained(EntityId(3));
        assert!(!p.can_chain_to(EntityId(3)));
        assert!(p.can_chain_to(EntityId(4)));

        p.reset();
        assert!(p.chain_hit.is_empty());
        assert_eq!(p.lifetime_ms, 0.0);
        assert_eq!(p.kind, ProjectileKind::Bullet);
    }
}
