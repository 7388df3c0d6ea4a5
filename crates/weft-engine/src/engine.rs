//! The tick loop: mailbox in, systems in fixed order, output file out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use weft_store::{Mailbox, World};
use weft_types::ErrorCode;

use crate::components::{readiness, readiness_entity, set_readiness, ReadinessFlags};
use crate::config::WeftConfig;
use crate::directives::{DirectiveCaches, DirectiveContext};
use crate::error::EngineError;
use crate::fetch::PageFetcher;
use crate::query::QueryService;
use crate::systems::{execute_directives, reconcile, render, resolve_labels};

/// Events delivered to the tick loop through the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The watched document changed on disk.
    FileModified(PathBuf),
}

/// Where the engine reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    /// The watched generator document.
    pub source: PathBuf,
    /// The derived output artifact.
    pub output: PathBuf,
    /// Directory against which directive-relative paths resolve.
    pub base_dir: PathBuf,
}

/// Derives the conventional path set for a document base name: the
/// source is `<dir>/<base>`, the output `<dir>/<base>.txt`.
#[must_use]
pub fn prepare_document_paths(base_name: &str, dir: &Path) -> DocumentPaths {
    DocumentPaths {
        source: dir.join(base_name),
        output: dir.join(format!("{base_name}.txt")),
        base_dir: dir.to_path_buf(),
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// True when the tick short-circuited: no events pending and the
    /// previous pass was fully stable.
    pub idle: bool,
    /// Whether the output file was rewritten.
    pub wrote: bool,
    pub labels_stable: bool,
    pub output_stable: bool,
}

/// Delay between ticks while idle or settling.
const TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Owns the store, the caches and the collaborator handles; drives the
/// four systems once per [`tick`](Engine::tick).
pub struct Engine {
    world: World,
    mailbox: Arc<Mailbox<Event>>,
    paths: DocumentPaths,
    config: WeftConfig,
    caches: DirectiveCaches,
    query: Box<dyn QueryService>,
    fetcher: Box<dyn PageFetcher>,
    last_rendered: Option<String>,
}

impl Engine {
    /// Builds an engine over an empty store. Nothing happens until an
    /// event is pushed and [`tick`](Self::tick) runs; push one
    /// [`Event::FileModified`] up front to compile the initial state.
    #[must_use]
    pub fn new(
        paths: DocumentPaths,
        config: WeftConfig,
        query: Box<dyn QueryService>,
        fetcher: Box<dyn PageFetcher>,
    ) -> Self {
        Self {
            world: World::new(),
            mailbox: Arc::new(Mailbox::new()),
            paths,
            config,
            caches: DirectiveCaches::default(),
            query,
            fetcher,
            last_rendered: None,
        }
    }

    /// Shared handle for producers (the watcher thread, startup kick).
    #[must_use]
    pub fn mailbox(&self) -> Arc<Mailbox<Event>> {
        Arc::clone(&self.mailbox)
    }

    /// The underlying store. Read access for inspection and tests.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Runs one full pass: drain events, reconcile if the document
    /// changed, resolve labels, execute directives, render.
    ///
    /// With no pending events and a fully stable previous pass, the
    /// tick is a no-op.
    ///
    /// # Errors
    ///
    /// [`EngineError::Store`] on a broken store contract,
    /// [`EngineError::Io`] when the output cannot be written. An
    /// unreadable *source* is not an error: the pass is skipped and
    /// prior state retained, since a transient read failure during an
    /// editor save must not destroy cached work.
    pub fn tick(&mut self) -> Result<TickOutcome, EngineError> {
        let events = self.mailbox.drain();
        let flags = readiness(&self.world);
        if events.is_empty() && flags.labels_stable && flags.output_stable {
            return Ok(TickOutcome {
                idle: true,
                wrote: false,
                labels_stable: true,
                output_stable: true,
            });
        }

        if !events.is_empty() {
            debug!(count = events.len(), "processing change events");
            match std::fs::read_to_string(&self.paths.source) {
                Ok(source) => {
                    reconcile(&self.world, &source)?;
                }
                Err(e) => {
                    warn!(
                        path = %self.paths.source.display(),
                        error = %e,
                        "source unreadable, retaining prior state"
                    );
                }
            }
        }

        let resolve_outcome = resolve_labels(&self.world);
        let ctx = DirectiveContext {
            world: &self.world,
            config: &self.config,
            query: self.query.as_ref(),
            fetcher: self.fetcher.as_ref(),
            base_dir: &self.paths.base_dir,
        };
        let execute_outcome = execute_directives(&ctx, &mut self.caches)?;
        let render_outcome = render(&self.world, &self.paths.output, &mut self.last_rendered)?;

        let flags = ReadinessFlags {
            labels_stable: resolve_outcome.changed == 0,
            output_stable: execute_outcome.changed == 0 && !render_outcome.wrote,
        };
        readiness_entity(&self.world)?;
        set_readiness(&self.world, flags);

        Ok(TickOutcome {
            idle: false,
            wrote: render_outcome.wrote,
            labels_stable: flags.labels_stable,
            output_stable: flags.output_stable,
        })
    }

    /// Ticks until the process is interrupted.
    ///
    /// Recoverable failures (transient I/O) are logged and the loop
    /// continues; contract violations propagate.
    ///
    /// # Errors
    ///
    /// The first non-recoverable [`EngineError`].
    pub fn run(&mut self) -> Result<(), EngineError> {
        info!(
            source = %self.paths.source.display(),
            output = %self.paths.output.display(),
            "engine running"
        );
        loop {
            match self.tick() {
                Ok(outcome) => {
                    if outcome.wrote {
                        debug!("tick rewrote output");
                    }
                }
                Err(e) if e.is_recoverable() => {
                    warn!(code = e.code(), error = %e, "recoverable tick failure");
                }
                Err(e) => return Err(e),
            }
            std::thread::sleep(TICK_INTERVAL);
        }
    }
}
