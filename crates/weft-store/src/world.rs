//! The entity/component store.
//!
//! [`World`] owns the identity lifecycle for blocks: a bounded slot
//! pool with free-list recycling and per-slot generation counters, plus
//! one typed column per component type. Presence of a component *is*
//! the type tag — there is no separate schema.
//!
//! # Access Discipline
//!
//! Every operation takes the single store lock for its duration. No
//! method invokes caller code while holding the lock except
//! [`modify`](World::modify), whose closure must not call back into the
//! store. Query results are copied out, so iterate-then-mutate is safe.

use crate::error::StoreError;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use weft_types::{Entity, MAX_ENTITIES};

/// Type-erased storage for one component type.
trait Column: Send {
    fn detach(&mut self, index: usize);
    fn has(&self, index: usize) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense slot-indexed storage for components of type `T`.
struct TypedColumn<T> {
    cells: Vec<Option<T>>,
}

impl<T: Send + 'static> TypedColumn<T> {
    fn new() -> Self {
        let mut cells = Vec::with_capacity(MAX_ENTITIES);
        cells.resize_with(MAX_ENTITIES, || None);
        Self { cells }
    }
}

impl<T: Send + 'static> Column for TypedColumn<T> {
    fn detach(&mut self, index: usize) {
        self.cells[index] = None;
    }

    fn has(&self, index: usize) -> bool {
        self.cells[index].is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Inner {
    /// Slot indices available for reuse, FIFO.
    free: VecDeque<u32>,
    /// Current generation per slot; bumped when a slot is released.
    generations: Vec<u32>,
    /// Liveness per slot.
    alive: Vec<bool>,
    live_count: usize,
    columns: HashMap<TypeId, Box<dyn Column>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            free: (0..MAX_ENTITIES as u32).collect(),
            generations: vec![0; MAX_ENTITIES],
            alive: vec![false; MAX_ENTITIES],
            live_count: 0,
            columns: HashMap::new(),
        }
    }

    /// A handle is current iff its slot is live and the generation
    /// matches. A stale handle never aliases a recycled slot.
    fn is_current(&self, e: Entity) -> bool {
        let idx = e.index() as usize;
        idx < MAX_ENTITIES && self.alive[idx] && self.generations[idx] == e.generation()
    }

    fn column_mut<T: Send + 'static>(&mut self) -> &mut TypedColumn<T> {
        self.columns
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(TypedColumn::<T>::new()))
            .as_any_mut()
            .downcast_mut::<TypedColumn<T>>()
            .expect("column type registered under its own TypeId")
    }

    fn column<T: Send + 'static>(&self) -> Option<&TypedColumn<T>> {
        self.columns
            .get(&TypeId::of::<T>())
            .map(|c| {
                c.as_any()
                    .downcast_ref::<TypedColumn<T>>()
                    .expect("column type registered under its own TypeId")
            })
    }
}

/// Typed, indexed storage for per-block facts.
///
/// See the [crate docs](crate) for the concurrency model and a usage
/// example.
pub struct World {
    inner: Mutex<Inner>,
}

impl World {
    /// Creates an empty world with the full pool free.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Allocates a fresh entity.
    ///
    /// # Errors
    ///
    /// [`StoreError::PoolExhausted`] when all slots are live. This is
    /// a fatal contract violation for callers, not a retry condition.
    pub fn create(&self) -> Result<Entity, StoreError> {
        let mut inner = self.inner.lock();
        let Some(index) = inner.free.pop_front() else {
            return Err(StoreError::PoolExhausted {
                capacity: MAX_ENTITIES,
            });
        };
        inner.alive[index as usize] = true;
        inner.live_count += 1;
        Ok(Entity::new(index, inner.generations[index as usize]))
    }

    /// Destroys a live entity: detaches all components, releases the
    /// slot to the free-list, and bumps the slot's generation.
    ///
    /// # Errors
    ///
    /// [`StoreError::StaleEntity`] if the handle is not current.
    /// Double-destroy is a contract violation and surfaces here.
    pub fn destroy(&self, e: Entity) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.is_current(e) {
            return Err(StoreError::StaleEntity(e));
        }
        let idx = e.index() as usize;
        for column in inner.columns.values_mut() {
            column.detach(idx);
        }
        inner.alive[idx] = false;
        inner.generations[idx] = inner.generations[idx].wrapping_add(1);
        inner.free.push_back(e.index());
        inner.live_count -= 1;
        Ok(())
    }

    /// Returns whether the handle refers to a live entity.
    #[must_use]
    pub fn is_live(&self, e: Entity) -> bool {
        self.inner.lock().is_current(e)
    }

    /// Number of live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.lock().live_count
    }

    /// Attaches a component to an entity.
    ///
    /// # Errors
    ///
    /// - [`StoreError::StaleEntity`] if the handle is not current.
    /// - [`StoreError::DuplicateComponent`] if a component of this
    ///   type is already attached. Use [`modify`](Self::modify) or
    ///   [`remove`](Self::remove) first to replace.
    pub fn add<T: Send + 'static>(&self, e: Entity, component: T) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.is_current(e) {
            return Err(StoreError::StaleEntity(e));
        }
        let idx = e.index() as usize;
        let column = inner.column_mut::<T>();
        if column.cells[idx].is_some() {
            return Err(StoreError::DuplicateComponent {
                entity: e,
                type_name: std::any::type_name::<T>(),
            });
        }
        column.cells[idx] = Some(component);
        Ok(())
    }

    /// Returns a copy of the component, or `None` if absent or the
    /// handle is stale.
    #[must_use]
    pub fn get<T: Clone + Send + 'static>(&self, e: Entity) -> Option<T> {
        let inner = self.inner.lock();
        if !inner.is_current(e) {
            return None;
        }
        inner
            .column::<T>()
            .and_then(|col| col.cells[e.index() as usize].clone())
    }

    /// Mutates a component in place under the store lock.
    ///
    /// Returns `true` if the component existed and the closure ran.
    /// The closure must not call back into the store.
    pub fn modify<T, F>(&self, e: Entity, f: F) -> bool
    where
        T: Send + 'static,
        F: FnOnce(&mut T),
    {
        let mut inner = self.inner.lock();
        if !inner.is_current(e) {
            return false;
        }
        let idx = e.index() as usize;
        match inner.column_mut::<T>().cells[idx].as_mut() {
            Some(component) => {
                f(component);
                true
            }
            None => false,
        }
    }

    /// Returns whether the entity carries a component of type `T`.
    #[must_use]
    pub fn has<T: Send + 'static>(&self, e: Entity) -> bool {
        let inner = self.inner.lock();
        inner.is_current(e)
            && inner
                .column::<T>()
                .is_some_and(|col| col.has(e.index() as usize))
    }

    /// Detaches and returns the component, or `None` if absent.
    pub fn remove<T: Send + 'static>(&self, e: Entity) -> Option<T> {
        let mut inner = self.inner.lock();
        if !inner.is_current(e) {
            return None;
        }
        let idx = e.index() as usize;
        inner.column_mut::<T>().cells[idx].take()
    }

    /// All live entities carrying a component of type `T`, in
    /// ascending slot order. The set is a copy.
    #[must_use]
    pub fn entities_with<T: Send + 'static>(&self) -> Vec<Entity> {
        let inner = self.inner.lock();
        let Some(column) = inner.column::<T>() else {
            return Vec::new();
        };
        column
            .cells
            .iter()
            .enumerate()
            .filter(|(idx, cell)| cell.is_some() && inner.alive[*idx])
            .map(|(idx, _)| Entity::new(idx as u32, inner.generations[idx]))
            .collect()
    }

    /// All live entities carrying components of both `A` and `B`
    /// (set intersection), in ascending slot order.
    #[must_use]
    pub fn entities_with2<A: Send + 'static, B: Send + 'static>(&self) -> Vec<Entity> {
        let inner = self.inner.lock();
        let (Some(a), Some(b)) = (inner.column::<A>(), inner.column::<B>()) else {
            return Vec::new();
        };
        (0..MAX_ENTITIES)
            .filter(|&idx| inner.alive[idx] && a.has(idx) && b.has(idx))
            .map(|idx| Entity::new(idx as u32, inner.generations[idx]))
            .collect()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(&'static str);

    #[derive(Debug, Clone, PartialEq)]
    struct Count(usize);

    #[test]
    fn create_add_get_roundtrip() {
        let world = World::new();
        let e = world.create().expect("capacity");

        world.add(e, Tag("hello")).expect("fresh entity");
        assert_eq!(world.get::<Tag>(e), Some(Tag("hello")));
        assert!(world.has::<Tag>(e));
        assert!(!world.has::<Count>(e));
    }

    #[test]
    fn duplicate_add_rejected() {
        let world = World::new();
        let e = world.create().expect("capacity");

        world.add(e, Tag("a")).expect("fresh entity");
        let err = world.add(e, Tag("b")).expect_err("second add must fail");
        assert!(matches!(err, StoreError::DuplicateComponent { .. }));
        // Original component untouched.
        assert_eq!(world.get::<Tag>(e), Some(Tag("a")));
    }

    #[test]
    fn destroy_detaches_and_recycles() {
        let world = World::new();
        let e = world.create().expect("capacity");
        world.add(e, Tag("x")).expect("fresh entity");

        world.destroy(e).expect("live entity");
        assert!(!world.is_live(e));
        assert_eq!(world.get::<Tag>(e), None);
        assert_eq!(world.live_count(), 0);
    }

    #[test]
    fn double_destroy_is_contract_violation() {
        let world = World::new();
        let e = world.create().expect("capacity");
        world.destroy(e).expect("live entity");

        let err = world.destroy(e).expect_err("second destroy must fail");
        assert!(matches!(err, StoreError::StaleEntity(_)));
    }

    #[test]
    fn stale_handle_cannot_see_recycled_slot() {
        let world = World::new();
        let old = world.create().expect("capacity");
        world.add(old, Tag("old")).expect("fresh entity");
        world.destroy(old).expect("live entity");

        // Exhaust the free list far enough to reuse the slot.
        let mut reused = None;
        for _ in 0..MAX_ENTITIES {
            let e = world.create().expect("capacity");
            if e.index() == old.index() {
                reused = Some(e);
                break;
            }
        }
        let reused = reused.expect("slot must be recycled within one pool sweep");
        world.add(reused, Tag("new")).expect("fresh entity");

        assert_ne!(old, reused);
        assert_eq!(world.get::<Tag>(old), None, "stale handle must read nothing");
        assert_eq!(world.get::<Tag>(reused), Some(Tag("new")));
    }

    #[test]
    fn pool_exhaustion_is_fatal() {
        let world = World::new();
        for _ in 0..MAX_ENTITIES {
            world.create().expect("capacity");
        }
        let err = world.create().expect_err("pool must be exhausted");
        assert!(matches!(err, StoreError::PoolExhausted { .. }));
    }

    #[test]
    fn modify_in_place() {
        let world = World::new();
        let e = world.create().expect("capacity");
        world.add(e, Count(1)).expect("fresh entity");

        assert!(world.modify::<Count, _>(e, |c| c.0 += 10));
        assert_eq!(world.get::<Count>(e), Some(Count(11)));

        // Absent component: closure does not run.
        assert!(!world.modify::<Tag, _>(e, |_| panic!("must not run")));
    }

    #[test]
    fn entities_with_returns_copies_in_slot_order() {
        let world = World::new();
        let a = world.create().expect("capacity");
        let b = world.create().expect("capacity");
        let c = world.create().expect("capacity");
        world.add(a, Tag("a")).expect("fresh");
        world.add(c, Tag("c")).expect("fresh");
        world.add(b, Count(2)).expect("fresh");

        assert_eq!(world.entities_with::<Tag>(), vec![a, c]);

        // Mutating while iterating the copy is fine.
        for e in world.entities_with::<Tag>() {
            world.destroy(e).expect("live entity");
        }
        assert!(world.entities_with::<Tag>().is_empty());
        assert_eq!(world.entities_with::<Count>(), vec![b]);
    }

    #[test]
    fn entities_with2_intersects() {
        let world = World::new();
        let both = world.create().expect("capacity");
        let only_tag = world.create().expect("capacity");
        world.add(both, Tag("x")).expect("fresh");
        world.add(both, Count(1)).expect("fresh");
        world.add(only_tag, Tag("y")).expect("fresh");

        assert_eq!(world.entities_with2::<Tag, Count>(), vec![both]);
        assert_eq!(world.entities_with2::<Count, Tag>(), vec![both]);
    }

    #[test]
    fn remove_detaches_single_type() {
        let world = World::new();
        let e = world.create().expect("capacity");
        world.add(e, Tag("x")).expect("fresh");
        world.add(e, Count(9)).expect("fresh");

        assert_eq!(world.remove::<Tag>(e), Some(Tag("x")));
        assert_eq!(world.remove::<Tag>(e), None);
        assert!(world.has::<Count>(e));
    }
}
