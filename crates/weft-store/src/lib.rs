//! Entity/component substrate and event mailbox for WEFT.
//!
//! This crate is the domain-free storage layer under the engine:
//!
//! - [`World`] — typed, indexed storage for per-block facts. Entities
//!   are drawn from a bounded pool with free-list recycling and a
//!   generation counter; components are attached 0-or-1 per entity and
//!   presence is the type tag.
//! - [`Mailbox`] — a single-producer/single-consumer queue decoupling
//!   the filesystem notifier thread from the processing loop.
//!
//! # Concurrency Model
//!
//! Every [`World`] operation acquires one exclusive lock for its
//! duration, making the store linearizable across the processing loop
//! and the notifier thread. Entity sets returned by queries are copies;
//! callers may freely mutate the store while iterating them.
//!
//! # Usage
//!
//! ```
//! use weft_store::World;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { index: usize }
//!
//! let world = World::new();
//! let e = world.create().expect("pool has capacity");
//!
//! world.add(e, Position { index: 0 }).expect("fresh entity");
//! assert!(world.has::<Position>(e));
//!
//! world.modify::<Position, _>(e, |p| p.index = 3);
//! assert_eq!(world.get::<Position>(e), Some(Position { index: 3 }));
//!
//! world.destroy(e).expect("live entity");
//! assert!(!world.has::<Position>(e));
//! ```

mod error;
mod mailbox;
mod world;

pub use error::StoreError;
pub use mailbox::Mailbox;
pub use world::World;

// Re-export so downstream crates only name one substrate crate.
pub use weft_types::{Entity, MAX_ENTITIES};
