//! Store layer errors.
//!
//! All store errors are contract violations: they indicate a caller
//! broke an invariant (pool capacity, single-component rule, liveness
//! checks), not a transient environmental condition. None of them are
//! recoverable.

use thiserror::Error;
use weft_types::{Entity, ErrorCode};

/// Store layer error.
///
/// | Variant | Code | Meaning |
/// |---------|------|---------|
/// | [`PoolExhausted`](Self::PoolExhausted) | `STORE_POOL_EXHAUSTED` | All entity slots live |
/// | [`StaleEntity`](Self::StaleEntity) | `STORE_STALE_ENTITY` | Handle refers to a destroyed/recycled slot |
/// | [`DuplicateComponent`](Self::DuplicateComponent) | `STORE_DUPLICATE_COMPONENT` | Component of that type already attached |
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Every slot in the bounded entity pool is live.
    ///
    /// The pool bound is deliberate; exhaustion means block state is
    /// leaking, so this is fatal rather than retried.
    #[error("entity pool exhausted ({capacity} slots live)")]
    PoolExhausted {
        /// Pool capacity at the time of exhaustion.
        capacity: usize,
    },

    /// The handle does not refer to a live entity.
    ///
    /// Either the entity was destroyed, or the slot was recycled and
    /// the handle's generation no longer matches.
    #[error("stale entity handle: {0}")]
    StaleEntity(Entity),

    /// A component of the same type is already attached.
    ///
    /// Components are 0-or-1 per entity; attach-over-attach is a bug
    /// in the caller, not a merge request.
    #[error("component {type_name} already attached to {entity}")]
    DuplicateComponent {
        /// Entity carrying the existing component.
        entity: Entity,
        /// Type name of the rejected component.
        type_name: &'static str,
    },
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::PoolExhausted { .. } => "STORE_POOL_EXHAUSTED",
            Self::StaleEntity(_) => "STORE_STALE_ENTITY",
            Self::DuplicateComponent { .. } => "STORE_DUPLICATE_COMPONENT",
        }
    }

    fn is_recoverable(&self) -> bool {
        // All store errors are contract violations.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::assert_error_codes;

    fn all_variants() -> Vec<StoreError> {
        vec![
            StoreError::PoolExhausted { capacity: 1000 },
            StoreError::StaleEntity(Entity::new(0, 0)),
            StoreError::DuplicateComponent {
                entity: Entity::new(0, 0),
                type_name: "RawText",
            },
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "STORE_");
    }

    #[test]
    fn nothing_is_recoverable() {
        for err in all_variants() {
            assert!(!err.is_recoverable(), "{} must not be recoverable", err.code());
        }
    }

    #[test]
    fn display_mentions_entity() {
        let err = StoreError::StaleEntity(Entity::new(5, 2));
        assert!(err.to_string().contains("blk:5v2"));
    }
}
