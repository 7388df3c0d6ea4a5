//! Filesystem change notifier.
//!
//! A [`DocumentWatcher`] owns the platform watcher and translates raw
//! notifications into [`Event::FileModified`] pushes on the shared
//! mailbox. It never touches the store; the tick loop is the only
//! consumer of state.
//!
//! The watch is installed on the document's parent directory rather
//! than the file itself: most editors save by rename-replace, which
//! silently drops a watch installed on the inode.

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use weft_store::Mailbox;

use crate::engine::Event;
use crate::error::EngineError;

/// Owns the running watcher; dropping it stops notifications.
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
}

impl DocumentWatcher {
    /// Starts watching `document` and pushing change events into
    /// `mailbox`.
    ///
    /// Only create and modify notifications for the document itself
    /// are forwarded; sibling-file noise in the same directory is
    /// dropped here.
    ///
    /// # Errors
    ///
    /// [`EngineError::Watch`] when the watch cannot be installed, for
    /// example because the parent directory does not exist.
    pub fn spawn(document: &Path, mailbox: Arc<Mailbox<Event>>) -> Result<Self, EngineError> {
        let watched = document.to_path_buf();
        let dir = document.parent().unwrap_or_else(|| Path::new("."));

        let target = watched.clone();
        let file_name = watched.file_name().map(std::ffi::OsStr::to_os_string);
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        return;
                    }
                    // Compare by file name: the backend may report
                    // canonicalized paths that differ from the path we
                    // were given, and the watch is non-recursive.
                    if event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(std::ffi::OsStr::to_os_string) == file_name)
                    {
                        debug!(path = %target.display(), "document change observed");
                        mailbox.push(Event::FileModified(target.clone()));
                    }
                }
                Err(e) => warn!(error = %e, "watcher notification error"),
            })?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        debug!(dir = %dir.display(), file = %watched.display(), "watch installed");
        Ok(Self { _watcher: watcher })
    }
}
