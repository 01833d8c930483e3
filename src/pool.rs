//! Object pooling for frequently churned values.
//!
//! Projectile payloads turn over constantly during combat; pooling them
//! avoids reallocating their chain-hit buffers every shot. A pool holds a
//! create hook, an optional reset hook run on release, and a hard `max_size`
//! above which released values are silently dropped.

use std::any::Any;
use std::collections::HashMap;

/// A bounded free-list of reusable `T` values.
pub struct ObjectPool<T> {
    items: Vec<T>,
    create: Box<dyn Fn() -> T>,
    reset: Option<Box<dyn Fn(&mut T)>>,
    max_size: usize,
}

impl<T> ObjectPool<T> {
    pub fn new(
        create: impl Fn() -> T + 'static,
        reset: Option<Box<dyn Fn(&mut T)>>,
        initial_size: usize,
        max_size: usize,
    ) -> Self {
        let mut pool = Self {
            items: Vec::new(),
            create: Box::new(create),
            reset,
            max_size,
        };
        pool.warm_up(initial_size);
        pool
    }

    /// Pop a pooled value, constructing a fresh one when empty.
    pub fn get(&mut self) -> T {
        match self.items.pop() {
            Some(item) => item,
            None => (self.create)(),
        }
    }

    /// Reset and store the value, unless the pool is already at `max_size`
    /// (then it is dropped).
    pub fn release(&mut self, mut item: T) {
        if self.items.len() >= self.max_size {
            return;
        }
        if let Some(reset) = &self.reset {
            reset(&mut item);
        }
        self.items.push(item);
    }

    /// Pre-construct values until the pool holds `min(n, max_size)`.
    pub fn warm_up(&mut self, n: usize) {
        let target = n.min(self.max_size);
        while self.items.len() < target {
            let item = (self.create)();
            self.items.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Named registry of heterogeneous pools, owned by the driver and handed to
/// systems through the tick context.
#[derive(Default)]
pub struct PoolManager {
    pools: HashMap<String, Box<dyn Any>>,
}

impl PoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a pool under `name`.
    pub fn register<T: 'static>(&mut self, name: &str, pool: ObjectPool<T>) {
        self.pools.insert(name.to_owned(), Box::new(pool));
    }

    /// Typed lookup; `None` if the name is unknown or holds a pool of a
    /// different type.
    pub fn pool_mut<T: 'static>(&mut self, name: &str) -> Option<&mut ObjectPool<T>> {
        self.pools.get_mut(name)?.downcast_mut::<ObjectPool<T>>()
    }

    pub fn pool<T: 'static>(&self, name: &str) -> Option<&ObjectPool<T>> {
        self.pools.get(name)?.downcast_ref::<ObjectPool<T>>()
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.pools.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }
}
