//! Static gameplay data: tower, monster, and level definitions.
//!
//! These tables are external data fed into the simulation, not state it
//! owns, so everything here derives `Deserialize` and the core treats the
//! loaded values as immutable (shared via `Arc` once the world is built).

use serde::{Deserialize, Serialize};

/// Per-wave difficulty multiplier: HP, shield, and reward scale by
/// `1.1^(wave - 1)` (floored); movement speed does not scale.
pub fn wave_multiplier(wave: u32) -> f32 {
    1.1f32.powi(wave.saturating_sub(1) as i32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TowerKind {
    Single,
    Aoe,
    Slow,
    Laser,
    Chain,
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterKind {
    Normal,
    Fast,
    Heavy,
    Flying,
    Shield,
    Boss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Physical,
    Magical,
    /// Bypasses all resistances and rounding.
    True,
}

/// One purchasable step of a tower's upgrade path. `level` is the tower
/// level at which the step becomes purchasable; its bonuses apply once the
/// tower has advanced past it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerUpgrade {
    pub level: u32,
    pub cost: u32,
    #[serde(default)]
    pub damage_bonus: f32,
    #[serde(default)]
    pub attack_rate_bonus: f32,
    #[serde(default)]
    pub range_bonus: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerConfig {
    pub kind: TowerKind,
    pub name: String,
    pub damage_type: DamageType,
    pub base_damage: f32,
    /// Attacks per second.
    pub attack_rate: f32,
    pub range: f32,
    pub cost: u32,
    pub projectile_speed: f32,
    #[serde(default)]
    pub splash_radius: Option<f32>,
    #[serde(default)]
    pub chain_count: Option<u32>,
    #[serde(default)]
    pub slow_amount: Option<f32>,
    #[serde(default)]
    pub slow_duration_ms: Option<f32>,
    #[serde(default)]
    pub multi_count: Option<u32>,
    #[serde(default)]
    pub upgrade_path: Vec<TowerUpgrade>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterConfig {
    pub kind: MonsterKind,
    pub name: String,
    pub base_hp: f32,
    /// World units per second.
    pub move_speed: f32,
    #[serde(default)]
    pub physical_resist: f32,
    #[serde(default)]
    pub magical_resist: f32,
    pub reward: u32,
    #[serde(default)]
    pub shield_hp: Option<f32>,
    #[serde(default)]
    pub flying: bool,
    #[serde(default)]
    pub boss: bool,
}

impl MonsterConfig {
    pub fn scaled_hp(&self, wave: u32) -> f32 {
        (self.base_hp * wave_multiplier(wave)).floor()
    }

    pub fn scaled_shield(&self, wave: u32) -> f32 {
        match self.shield_hp {
            Some(shield) => (shield * wave_multiplier(wave)).floor(),
            None => 0.0,
        }
    }

    pub fn scaled_reward(&self, wave: u32) -> u32 {
        (self.reward as f32 * wave_multiplier(wave)).floor() as u32
    }
}

/// One homogeneous burst of spawns within a wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterSpawn {
    pub kind: MonsterKind,
    pub count: u32,
    /// Gap between consecutive spawns of this entry.
    pub interval_ms: f32,
    /// Offset of the entry's first spawn from the wave start.
    #[serde(default)]
    pub delay_ms: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveConfig {
    pub monsters: Vec<MonsterSpawn>,
    /// Gold granted when every monster of the wave is gone.
    pub reward: u32,
    /// Pause before the wave's first spawn entry starts counting.
    #[serde(default)]
    pub delay_ms: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub name: String,
    /// Map dimensions in tiles.
    pub width: i32,
    pub height: i32,
    pub tile_size: f32,
    /// Monster path as tile coordinates, in traversal order.
    pub waypoints: Vec<(i32, i32)>,
    pub initial_gold: u32,
    pub initial_lives: u32,
    pub waves: Vec<WaveConfig>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wave_multiplier() {
        assert!((wave_multiplier(1) - 1.0).abs() < 1e-6);
        assert!((wave_multiplier(3) - 1.21).abs() < 1e-4);
    }

    #[test]
    fn test_wave_scaling_floors_and_skips_speed() {
        let heavy = fixtures::monster(MonsterKind::Heavy);
        // 150 * 1.1 = 165.0 exactly; wave 3: 150 * 1.21 = 181.5 -> 181.
        assert_eq!(heavy.scaled_hp(3), 181.0);
        assert_eq!(heavy.scaled_reward(3), 12);
        // Speed is untouched by the wave number.
        assert_eq!(heavy.move_speed, 50.0);
    }

    #[test]
    fn test_configs_round_trip_through_json() {
        let level = fixtures::level();
        let json = serde_json::to_string(&level).unwrap();
        let back: LevelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, level);
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{
            "kind": "single",
            "name": "Gun",
            "damage_type": "physical",
            "base_damage": 15.0,
            "attack_rate": 1.0,
            "range": 120.0,
            "cost": 50,
            "projectile_speed": 300.0
        }"#;
        let config: TowerConfig = serde_json::from_str(json).unwrap();
        assert!(config.splash_radius.is_none());
        assert!(config.upgrade_path.is_empty());
    }
}
