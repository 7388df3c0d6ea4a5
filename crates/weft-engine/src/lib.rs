//! WEFT engine — a reactive build pipeline for generator documents.
//!
//! A generator document is a sequence of blank-line-delimited blocks:
//! prose, directives (`?insert`, `?run`, `?gen`, `?web`), labels
//! (`/name` … `\name`) and global configuration lines (`!key=value`).
//! The engine watches the document and incrementally compiles it into a
//! derived output file, re-running only the directives whose inputs
//! changed and substituting `:name:` cross-references between blocks.
//!
//! # Pipeline
//!
//! Each tick runs four systems in fixed order over the shared
//! [`World`](weft_store::World); no system calls another directly — all
//! communication happens through components on entities:
//!
//! ```text
//! notifier thread ──► Mailbox ──► tick
//!                                   │
//!            ┌──────────────────────┼──────────────────────┐
//!            ▼                      ▼                      ▼
//!      Reconciler ──► Label Resolver ──► Directive ──► Renderer
//!      (parse+diff)   (:name: subst)     Executor      (assemble,
//!                                        (insert/run/   write on
//!                                         gen/web)      change)
//! ```
//!
//! - **Reconciler** re-parses the source and matches blocks against
//!   prior state by raw-text fingerprint, preserving entity identity
//!   for unchanged content, updating positions for moved blocks, and
//!   tombstoning removals.
//! - **Label Resolver** substitutes `:name:` references with the
//!   publishing block's current rendered value, tracking per-reference
//!   staleness through [`ResolvedLabelSnapshot`](components::ResolvedLabelSnapshot).
//! - **Directive Executor** dispatches ready directives to their
//!   handlers, caching results by content fingerprint so side effects
//!   run at most once per distinct input.
//! - **Renderer** destroys tombstones, assembles output in ascending
//!   block position and rewrites the output file only on change.
//!
//! # External Collaborators
//!
//! The engine sees its environment only through narrow seams: the
//! [`QueryService`](query::QueryService) trait (language-model
//! backend), the [`PageFetcher`](fetch::PageFetcher) trait (web
//! content extraction) and `std::process::Command` in argv form (never
//! a shell). Tests substitute fakes at these seams.

pub mod components;
pub mod config;
pub mod directives;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod parser;
pub mod query;
pub mod systems;
pub mod watch;

pub use components::GlobalConfig;
pub use config::{ConfigError, ConfigLoader, WeftConfig};
pub use engine::{prepare_document_paths, DocumentPaths, Engine, Event, TickOutcome};
pub use error::EngineError;
pub use fetch::{FetchError, HttpPageFetcher, PageFetcher};
pub use query::{HttpQueryService, ModelSpec, QueryError, QueryService};
pub use watch::DocumentWatcher;
