//! Directive handlers.
//!
//! One submodule per command. Handlers never return errors upward:
//! every failure becomes explanatory text in the block's rendered
//! output so the rest of the document keeps building. The executor
//! system owns gating and caching policy; handlers own the side
//! effect itself.

mod gen;
mod insert;
mod run;
mod web;

pub use gen::{execute_gen, GenCacheEntry};
pub use insert::execute_insert;
pub use run::{execute_run, tokenize_argv};
pub use web::execute_web;

use std::collections::HashMap;
use std::path::Path;

use crate::config::WeftConfig;
use crate::fetch::PageFetcher;
use crate::query::QueryService;
use weft_store::World;

/// Known directive commands.
///
/// Unknown command names are deliberately not represented here: they
/// are inert for forward compatibility, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// Inline a file or directory tree.
    Insert,
    /// Run a child process and capture stdout.
    Run,
    /// Query the language model.
    Gen,
    /// Fetch a web page as text.
    Web,
}

impl DirectiveKind {
    /// Maps a command name to its handler, or `None` for an unknown
    /// command.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "insert" => Some(Self::Insert),
            "run" => Some(Self::Run),
            "gen" => Some(Self::Gen),
            "web" => Some(Self::Web),
            _ => None,
        }
    }
}

/// Process-lifetime result caches, one map per directive kind.
///
/// Owned by the engine and threaded through the executor so separate
/// documents in one process never share entries. No eviction: sized
/// for single-document editing sessions.
#[derive(Debug, Default)]
pub struct DirectiveCaches {
    /// Run fingerprint to captured stdout.
    pub run: HashMap<String, String>,
    /// Gen fingerprint to completion text plus stability flag.
    pub gen: HashMap<String, GenCacheEntry>,
    /// URL to extracted page text.
    pub web: HashMap<String, String>,
}

/// Shared environment handed to every handler invocation.
pub struct DirectiveContext<'a> {
    pub world: &'a World,
    pub config: &'a WeftConfig,
    pub query: &'a dyn QueryService,
    pub fetcher: &'a dyn PageFetcher,
    /// Directory against which relative paths in directives resolve.
    pub base_dir: &'a Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_map_to_kinds() {
        assert_eq!(DirectiveKind::from_name("insert"), Some(DirectiveKind::Insert));
        assert_eq!(DirectiveKind::from_name("run"), Some(DirectiveKind::Run));
        assert_eq!(DirectiveKind::from_name("gen"), Some(DirectiveKind::Gen));
        assert_eq!(DirectiveKind::from_name("web"), Some(DirectiveKind::Web));
    }

    #[test]
    fn unknown_commands_are_inert() {
        assert_eq!(DirectiveKind::from_name("frobnicate"), None);
        assert_eq!(DirectiveKind::from_name(""), None);
        // Case-sensitive by contract.
        assert_eq!(DirectiveKind::from_name("Run"), None);
    }
}
