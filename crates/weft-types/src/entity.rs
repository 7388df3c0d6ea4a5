//! Entity identifiers.
//!
//! An [`Entity`] is the stable identity of one block in the generator
//! document. Identity is the axis along which all per-block facts
//! (raw text, position, rendered output, caches) are correlated over
//! time, so the handle must survive edits that leave a block's content
//! unchanged and must *not* survive destruction of the block.

use serde::{Deserialize, Serialize};

/// Capacity of the entity pool.
///
/// The pool is a deliberate bound: a single generator document with
/// more than this many concurrently live blocks indicates runaway
/// state, not a legitimate workload. Exhaustion is a contract
/// violation, not a recoverable condition.
pub const MAX_ENTITIES: usize = 1000;

/// Handle to one live block in the [`World`].
///
/// An `Entity` is a slot index into a bounded pool plus a generation
/// counter. The index is recycled through a free-list when the entity
/// is destroyed; the generation is bumped on each recycle so handles
/// from a previous occupant of the slot are detectably stale.
///
/// # Example
///
/// ```
/// use weft_types::Entity;
///
/// let a = Entity::new(3, 0);
/// let b = Entity::new(3, 1);
///
/// assert_eq!(a.index(), b.index());
/// assert_ne!(a, b); // same slot, different generation
/// ```
///
/// [`World`]: https://docs.rs/weft-store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Creates an entity handle from raw parts.
    ///
    /// Normally only the pool constructs handles; this is public so
    /// tests and serialization round-trips can rebuild them.
    #[must_use]
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index into the pool.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Recycle generation of the slot at creation time.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "blk:{}v{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_slot_different_generation_not_equal() {
        let first = Entity::new(7, 0);
        let recycled = Entity::new(7, 1);

        assert_ne!(first, recycled);
        assert_eq!(first.index(), recycled.index());
    }

    #[test]
    fn display_format() {
        let e = Entity::new(42, 3);
        assert_eq!(e.to_string(), "blk:42v3");
    }

    #[test]
    fn usable_as_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(Entity::new(1, 0), "a");
        map.insert(Entity::new(1, 1), "b");

        assert_eq!(map.len(), 2);
        assert_eq!(map[&Entity::new(1, 0)], "a");
    }
}
