//! Engine layer errors.
//!
//! Only contract violations and environmental failures at the engine
//! boundary surface here. Per-directive failures never become
//! `EngineError`: they are rendered inline into the affected block so
//! the rest of the document keeps building.

use std::path::PathBuf;
use thiserror::Error;
use weft_store::StoreError;
use weft_types::ErrorCode;

/// Engine layer error.
///
/// | Variant | Code | Recoverable |
/// |---------|------|-------------|
/// | [`Store`](Self::Store) | `ENGINE_STORE` | No |
/// | [`Io`](Self::Io) | `ENGINE_IO` | Yes |
/// | [`Watch`](Self::Watch) | `ENGINE_WATCH` | No |
#[derive(Debug, Error)]
pub enum EngineError {
    /// A store invariant was broken. Fatal — the entity substrate is
    /// the one part of the pipeline that must never be wrong.
    #[error("store contract violation: {0}")]
    Store(#[from] StoreError),

    /// Output or side-file I/O failed.
    #[error("i/o failure on {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The filesystem watcher could not be installed.
    #[error("watcher setup failed: {0}")]
    Watch(#[from] notify::Error),
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "ENGINE_STORE",
            Self::Io { .. } => "ENGINE_IO",
            Self::Watch(_) => "ENGINE_WATCH",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A transient write failure may clear on the next tick.
        matches!(self, Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        let errs = vec![
            EngineError::Store(StoreError::PoolExhausted { capacity: 1000 }),
            EngineError::Io {
                path: PathBuf::from("/tmp/out.txt"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            },
        ];
        assert_error_codes(&errs, "ENGINE_");
    }

    #[test]
    fn io_is_recoverable_store_is_not() {
        let io = EngineError::Io {
            path: PathBuf::from("x"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "x"),
        };
        assert!(io.is_recoverable());

        let store = EngineError::Store(StoreError::PoolExhausted { capacity: 1000 });
        assert!(!store.is_recoverable());
    }
}
