// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! File system watcher for the download root

use glob::Pattern;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{LibrarianError, Result};

/// Events emitted by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file appeared (created or renamed into place)
    FileCreated(PathBuf),
    /// A directory appeared; never sorted
    DirectoryCreated(PathBuf),
    /// Watcher error
    Error(String),
}

/// Non-recursive watcher over one root
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
    events: mpsc::UnboundedReceiver<WatchEvent>,
}

impl FileWatcher {
    /// Start watching `root`
    pub fn new(root: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => convert_event(event),
                    Err(e) => Some(WatchEvent::Error(e.to_string())),
                };
                if let Some(event) = event {
                    let _ = tx.send(event);
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(root, RecursiveMode::NonRecursive)?;
        info!("Watching: {:?}", root);

        Ok(Self {
            _watcher: watcher,
            root: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
            events: rx,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next event, or `None` once the watcher is gone
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }

    /// Only entries directly under the root are sorted
    pub fn is_direct_child(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) => {
                parent == self.root
                    || parent.canonicalize().map(|p| p == self.root).unwrap_or(false)
            }
            None => false,
        }
    }
}

/// Convert notify event to our event type
fn convert_event(event: Event) -> Option<WatchEvent> {
    let path = match event.kind {
        EventKind::Create(CreateKind::Folder) => {
            return event.paths.first().map(|p| WatchEvent::DirectoryCreated(p.clone()));
        }
        // a rename inside the root also arrives as Name(Both); Name(To) alone covers it
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.first()?.clone()
        }
        _ => return None,
    };

    if path.is_dir() {
        Some(WatchEvent::DirectoryCreated(path))
    } else {
        Some(WatchEvent::FileCreated(path))
    }
}

/// Decides which new files are worth sorting
#[derive(Debug, Clone)]
pub struct EventFilter {
    ignore: Vec<Pattern>,
}

impl EventFilter {
    pub fn new(ignore_patterns: &[String]) -> Result<Self> {
        let ignore = ignore_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    LibrarianError::Config(format!("Invalid ignore pattern {:?}: {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { ignore })
    }

    /// Check if a file should be processed
    pub fn should_process(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return false,
        };

        // Skip hidden files
        if filename.starts_with('.') {
            return false;
        }

        // Skip in-progress downloads
        let lowered = filename.to_lowercase();
        if self.ignore.iter().any(|p| p.matches(&lowered)) {
            return false;
        }

        // Skip system files
        let skip_names = ["desktop.ini", "thumbs.db"];
        !skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n))
    }
}

/// Wait for file to be stable (not being written)
pub async fn wait_for_stable(path: &Path, max_wait: Duration) -> bool {
    let check_interval = Duration::from_millis(500);
    let start = std::time::Instant::now();

    let mut last_size = match tokio::fs::metadata(path).await {
        Ok(m) => m.len(),
        Err(_) => return false,
    };

    loop {
        tokio::time::sleep(check_interval).await;

        // Check if we've exceeded max wait time
        if start.elapsed() > max_wait {
            warn!("File stability check timed out for {:?}", path);
            return true; // Proceed anyway
        }

        // Check if file still exists
        let current_size = match tokio::fs::metadata(path).await {
            Ok(m) => m.len(),
            Err(_) => return false, // File was deleted
        };

        // If size hasn't changed, file is stable
        if current_size == last_size {
            return true;
        }

        last_size = current_size;
        debug!("File {:?} still being written, size: {}", path, current_size);
    }
}
