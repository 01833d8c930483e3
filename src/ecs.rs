//! Entity/component store and the staged system pipeline.
//!
//! Entities are opaque identities owning at most one component per
//! [`ComponentKind`]. Destruction is a two-step affair: `destroy_entity`
//! disables the entity and clears its components immediately, while the
//! map entry lingers until [`EcsStore::cleanup`] garbage-collects it.
//! Identifiers are never reused, so a stale [`EntityId`] held across ticks
//! simply fails to resolve.
//!
//! ## System Ordering
//!
//! Systems run in [`Stage`] order, a fixed pipeline rather than sortable
//! priority numbers:
//!
//! 1. `Waves` - spawns monsters per the level's wave schedule
//! 2. `Combat` - tower attacks, projectile resolution, buff ticking
//! 3. `Pathfinding` - steers monsters toward their next waypoint
//! 4. `Movement` - integrates velocity into position
//!
//! Each call to [`EcsStore::update`] snapshots the enabled entity list once;
//! a system that destroys entities mid-tick does not shrink the list seen by
//! later systems in the same tick (they observe the destruction only when
//! resolving ids through the store).

use crate::components::ComponentSet;
use crate::events::GameEvent;
use crate::pool::PoolManager;
use crate::spatial::SpatialGrid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque entity identity. Monotonically increasing, never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity_{}", self.0)
    }
}

/// Closed set of component kinds, used as the mapping key for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Position,
    Velocity,
    Health,
    Buffs,
    Tower,
    Monster,
    Projectile,
}

/// An identity plus its component set.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    /// Disabled entities are excluded from queries and system updates until
    /// garbage-collected.
    pub enabled: bool,
    pub components: ComponentSet,
}

impl Entity {
    fn new(id: EntityId) -> Self {
        Self {
            id,
            enabled: true,
            components: ComponentSet::default(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn has(&self, kind: ComponentKind) -> bool {
        self.components.has(kind)
    }
}

/// Simulation pipeline stages, in tick order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Waves,
    Combat,
    Pathfinding,
    Movement,
}

/// Shared per-tick state handed to every system.
///
/// `now_ms` is accumulated simulation time, not wall-clock time; attack
/// cooldowns and buff durations are measured against it so replays are
/// deterministic at any time scale.
pub struct TickContext<'a> {
    /// Fixed step length in milliseconds.
    pub dt_ms: f32,
    /// Simulation time at the start of this step, in milliseconds.
    pub now_ms: f64,
    /// Spatial index over monster entities, rebuilt each step.
    pub monsters: &'a mut SpatialGrid<EntityId>,
    /// Named object pools (projectile payloads and the like).
    pub pools: &'a mut PoolManager,
    /// Event sink drained by the driver after the step.
    pub events: &'a mut Vec<GameEvent>,
}

/// A system operating on the store once per fixed step.
pub trait System {
    fn stage(&self) -> Stage;

    /// `active` is the enabled-entity snapshot taken at the start of the
    /// tick; resolve ids through the store before touching them, since an
    /// earlier system may have destroyed them.
    fn update(&mut self, store: &mut EcsStore, active: &[EntityId], ctx: &mut TickContext<'_>);
}

struct SystemSlot {
    enabled: bool,
    system: Box<dyn System>,
}

/// The sole owner of entities and components for one running simulation.
///
/// Explicitly constructed and passed around; one instance per simulation,
/// [`EcsStore::clear`] for test isolation.
#[derive(Default)]
pub struct EcsStore {
    entities: BTreeMap<EntityId, Entity>,
    systems: Vec<SystemSlot>,
    next_id: u64,
}

impl EcsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a freshly identified, enabled entity.
    pub fn create_entity(&mut self) -> &mut Entity {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.entry(id).or_insert_with(|| Entity::new(id))
    }

    /// Resolve an enabled entity. Disabled or unknown ids yield `None`.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id).filter(|e| e.enabled)
    }

    /// Mutable variant of [`EcsStore::entity`].
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id).filter(|e| e.enabled)
    }

    /// Disable the entity and clear its components. Returns `true` only the
    /// first time; repeated calls (or unknown ids) return `false`.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) if entity.enabled => {
                entity.enabled = false;
                entity.components.clear();
                true
            }
            _ => false,
        }
    }

    /// All enabled entities whose component set is a superset of `kinds`
    /// (AND semantics), in insertion order.
    pub fn query(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.enabled && kinds.iter().all(|&k| e.has(k)))
            .map(|e| e.id)
            .collect()
    }

    /// Snapshot of all enabled entity ids, in insertion order.
    pub fn active_entities(&self) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.enabled)
            .map(|e| e.id)
            .collect()
    }

    /// Register a system; the pipeline stays sorted by [`Stage`], with
    /// registration order preserved within a stage.
    pub fn add_system(&mut self, system: impl System + 'static) {
        self.systems.push(SystemSlot {
            enabled: true,
            system: Box::new(system),
        });
        self.systems.sort_by_key(|slot| slot.system.stage());
    }

    /// Remove the first system registered for `stage`.
    pub fn remove_system(&mut self, stage: Stage) -> bool {
        match self.systems.iter().position(|s| s.system.stage() == stage) {
            Some(index) => {
                let _ = self.systems.remove(index);
                true
            }
            None => false,
        }
    }

    /// Enable or disable every system registered for `stage`.
    pub fn set_system_enabled(&mut self, stage: Stage, enabled: bool) {
        for slot in &mut self.systems {
            if slot.system.stage() == stage {
                slot.enabled = enabled;
            }
        }
    }

    /// Run one fixed step: snapshot the enabled entities, then invoke every
    /// enabled system in stage order against that snapshot.
    pub fn update(&mut self, ctx: &mut TickContext<'_>) {
        let active = self.active_entities();
        let mut systems = std::mem::take(&mut self.systems);
        for slot in systems.iter_mut() {
            if slot.enabled {
                slot.system.update(self, &active, ctx);
            }
        }
        // Systems registered during the tick land in self.systems; merge.
        systems.append(&mut self.systems);
        self.systems = systems;
        self.systems.sort_by_key(|slot| slot.system.stage());
    }

    /// Drop disabled entries from the store.
    pub fn cleanup(&mut self) {
        self.entities.retain(|_, e| e.enabled);
    }

    /// Total entity count, disabled entries included.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Count of enabled entities.
    pub fn active_count(&self) -> usize {
        self.entities.values().filter(|e| e.enabled).count()
    }

    /// Remove all entities. Registered systems are kept; identifiers keep
    /// increasing so ids from before the clear never resolve again.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Position;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn run_update(store: &mut EcsStore) -> Vec<GameEvent> {
        let mut grid = SpatialGrid::new(50.0);
        let mut pools = PoolManager::new();
        let mut events = Vec::new();
        let mut ctx = TickContext {
            dt_ms: 16.67,
            now_ms: 0.0,
            monsters: &mut grid,
            pools: &mut pools,
            events: &mut events,
        };
        store.update(&mut ctx);
        events
    }

    struct RecordingSystem {
        stage: Stage,
        label: &'static str,
        trace: Rc<RefCell<Vec<&'static str>>>,
        seen: Rc<RefCell<Vec<usize>>>,
    }

    impl System for RecordingSystem {
        fn stage(&self) -> Stage {
            self.stage
        }

        fn update(&mut self, _store: &mut EcsStore, active: &[EntityId], _ctx: &mut TickContext) {
            self.trace.borrow_mut().push(self.label);
            self.seen.borrow_mut().push(active.len());
        }
    }

    struct DestroyerSystem {
        victim: EntityId,
    }

    impl System for DestroyerSystem {
        fn stage(&self) -> Stage {
            Stage::Combat
        }

        fn update(&mut self, store: &mut EcsStore, _active: &[EntityId], _ctx: &mut TickContext) {
            let _ = store.destroy_entity(self.victim);
        }
    }

    #[test]
    fn test_create_entity_unique_ids() {
        let mut store = EcsStore::new();
        let a = store.create_entity().id();
        let b = store.create_entity().id();
        assert_ne!(a, b);
        assert!(store.entity(a).is_some());
        assert!(store.entity(b).is_some());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut store = EcsStore::new();
        let id = store.create_entity().id();
        assert!(store.destroy_entity(id));
        assert!(!store.destroy_entity(id));
        assert!(store.entity(id).is_none());
    }

    #[test]
    fn test_query_requires_all_kinds() {
        let mut store = EcsStore::new();
        let with_pos = store.create_entity();
        with_pos.components.position = Some(Position::new(1.0, 2.0));
        let with_pos = with_pos.id();
        let empty = store.create_entity().id();

        let found = store.query(&[ComponentKind::Position]);
        assert_eq!(found, vec![with_pos]);
        assert!(!found.contains(&empty));

        // AND semantics: no entity carries both Position and Health.
        assert!(store
            .query(&[ComponentKind::Position, ComponentKind::Health])
            .is_empty());
    }

    #[test]
    fn test_disabled_entities_excluded_until_cleanup() {
        let mut store = EcsStore::new();
        let a = store.create_entity();
        a.components.position = Some(Position::default());
        let a = a.id();
        let _ = store.destroy_entity(a);

        assert!(store.query(&[ComponentKind::Position]).is_empty());
        assert_eq!(store.entity_count(), 1);
        assert_eq!(store.active_count(), 0);

        store.cleanup();
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn test_systems_run_in_stage_order() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = EcsStore::new();
        // Registered out of order on purpose.
        store.add_system(RecordingSystem {
            stage: Stage::Movement,
            label: "movement",
            trace: trace.clone(),
            seen: seen.clone(),
        });
        store.add_system(RecordingSystem {
            stage: Stage::Combat,
            label: "combat",
            trace: trace.clone(),
            seen: seen.clone(),
        });
        store.add_system(RecordingSystem {
            stage: Stage::Pathfinding,
            label: "pathfinding",
            trace: trace.clone(),
            seen: seen.clone(),
        });

        let _ = run_update(&mut store);
        assert_eq!(*trace.borrow(), vec!["combat", "pathfinding", "movement"]);
    }

    #[test]
    fn test_disabled_system_is_skipped() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = EcsStore::new();
        store.add_system(RecordingSystem {
            stage: Stage::Combat,
            label: "combat",
            trace: trace.clone(),
            seen: seen.clone(),
        });
        store.set_system_enabled(Stage::Combat, false);

        let _ = run_update(&mut store);
        assert!(trace.borrow().is_empty());

        store.set_system_enabled(Stage::Combat, true);
        let _ = run_update(&mut store);
        assert_eq!(*trace.borrow(), vec!["combat"]);
    }

    #[test]
    fn test_update_snapshot_survives_mid_tick_destruction() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = EcsStore::new();
        let victim = store.create_entity().id();

        store.add_system(DestroyerSystem { victim });
        store.add_system(RecordingSystem {
            stage: Stage::Movement,
            label: "after",
            trace: trace.clone(),
            seen: seen.clone(),
        });

        let _ = run_update(&mut store);
        // The later system still received the start-of-tick snapshot.
        assert_eq!(*seen.borrow(), vec![1]);
        // But resolution through the store reflects the destruction.
        assert!(store.entity(victim).is_none());
    }

    #[test]
    fn test_remove_system() {
        let mut store = EcsStore::new();
        store.add_system(DestroyerSystem {
            victim: EntityId(999),
        });
        assert!(store.remove_system(Stage::Combat));
        assert!(!store.remove_system(Stage::Combat));
    }
}
