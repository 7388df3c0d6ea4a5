//! WEFT CLI — watch a generator document and keep its output current.
//!
//! # Configuration
//!
//! Settings merge with priority, highest first:
//!
//! 1. CLI arguments
//! 2. Environment variables (`WEFT_*`)
//! 3. Project config (`.weft/config.toml` in the document directory)
//! 4. Global config (`~/.weft/config.toml`)
//! 5. Default values
//!
//! # Environment Variables
//!
//! - `WEFT_DEBUG`: enable debug logging (`true`/`false`)
//! - `WEFT_MODEL`: default model name for `?gen`
//! - `WEFT_API_KEY`: model API credential
//! - `WEFT_MAX_TOKENS`: default completion cap
//! - `WEFT_PYTHON_EXEC`: interpreter for `?run python …`

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use weft_engine::{
    prepare_document_paths, ConfigLoader, DocumentWatcher, Engine, Event, HttpPageFetcher,
    HttpQueryService,
};

/// WEFT — a reactive build engine for generator documents.
#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(version, about, long_about = None)]
struct Args {
    /// Base name of the generator document. The source is `<NAME>` in
    /// the base directory; output goes to `<NAME>.txt` beside it.
    base_name: String,

    /// Base directory containing the document (defaults to the
    /// current directory).
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Terminal filter: --debug > --verbose > RUST_LOG env > default
    // "warn". HTTP internals are suppressed at WARN to keep debug
    // output readable.
    let filter = if args.debug {
        EnvFilter::new("debug,hyper=warn,h2=warn,reqwest=warn,rustls=warn")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let base_dir = args
        .path
        .canonicalize()
        .with_context(|| format!("base directory '{}' not accessible", args.path.display()))?;

    let mut config = ConfigLoader::new()
        .with_project_root(&base_dir)
        .load()
        .context("configuration failed to load")?;
    if args.debug {
        config.debug = true;
    }

    let paths = prepare_document_paths(&args.base_name, &base_dir);
    if paths.source.is_dir() {
        bail!(
            "'{}' is a directory, not a generator document",
            paths.source.display()
        );
    }
    if !paths.source.is_file() {
        // First use: start from an empty document so the editor and
        // the watcher have something to attach to.
        std::fs::write(&paths.source, "").with_context(|| {
            format!("could not create '{}'", paths.source.display())
        })?;
        info!(path = %paths.source.display(), "created empty generator document");
    }

    let query = HttpQueryService::new().context("query backend failed to initialize")?;
    let fetcher = HttpPageFetcher::new().context("web fetcher failed to initialize")?;

    let source = paths.source.clone();
    let mut engine = Engine::new(paths, config, Box::new(query), Box::new(fetcher));

    let _watcher = DocumentWatcher::spawn(&source, engine.mailbox())
        .context("filesystem watcher failed to start")?;

    // Kick the first compile; later ticks are driven by saves.
    engine.mailbox().push(Event::FileModified(source.clone()));

    info!(document = %source.display(), "watching");
    engine.run().context("engine stopped on a fatal error")?;
    Ok(())
}
