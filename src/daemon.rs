// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Watch loop: watcher → accumulator → dispatcher, plus the sweep timer

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::batch::{run_accumulator, Batch, FileEvent};
use crate::config::AppConfig;
use crate::dispatch::{list_files, Dispatcher};
use crate::sweep::run_sweeps;
use crate::watcher::{wait_for_stable, EventFilter, FileWatcher, WatchEvent};
use crate::Result;

/// Dispatch one batch inside its own span
pub async fn dispatch_batch(dispatcher: &Dispatcher, batch: Batch) {
    let span = info_span!("batch", id = %batch.id);
    async {
        info!("Processing batch of {} files", batch.len());
        let report = dispatcher.dispatch(&batch.events).await;
        info!("Batch done: {}", report.summary());
    }
    .instrument(span)
    .await
}

/// Take batches off `batches` and dispatch each on its own task, so a slow
/// oracle never holds up the accumulator. Returns once the channel closes and
/// every in-flight batch is done.
pub async fn run_dispatcher(dispatcher: Arc<Dispatcher>, mut batches: mpsc::UnboundedReceiver<Batch>) {
    let mut in_flight = JoinSet::new();

    while let Some(batch) = batches.recv().await {
        let dispatcher = dispatcher.clone();
        in_flight.spawn(async move { dispatch_batch(&dispatcher, batch).await });

        // reap finished batches
        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
}

/// Options for the watch loop that do not live in the config file
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Queue files already in the root at startup
    pub process_existing: bool,
}

/// Run the watch loop until `shutdown` flips to true
pub async fn run(
    config: &AppConfig,
    dispatcher: Arc<Dispatcher>,
    options: WatchOptions,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let root = config.watch_root();
    let filter = EventFilter::new(&config.filters.ignore_patterns)?;
    let mut watcher = FileWatcher::new(&root)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel::<FileEvent>();
    let (batch_tx, batch_rx) = mpsc::unbounded_channel::<Batch>();

    let accumulator = tokio::spawn(run_accumulator(
        event_rx,
        batch_tx,
        config.timing.batch_max,
        config.batch_debounce(),
    ));
    let dispatch_loop = tokio::spawn(run_dispatcher(dispatcher.clone(), batch_rx));
    let sweeps = tokio::spawn(run_sweeps(
        dispatcher.clone(),
        filter.clone(),
        config.sweep_interval(),
        shutdown.clone(),
    ));

    if options.process_existing {
        let existing = list_files(&root).await?;
        info!("Queueing {} existing files", existing.len());
        for path in existing.into_iter().filter(|p| filter.should_process(p)) {
            let _ = event_tx.send(FileEvent::new(path));
        }
    }

    let stability_wait = config.stability_wait();
    info!("Watching for new files in: {:?}", root);

    loop {
        tokio::select! {
            event = watcher.next_event() => match event {
                Some(WatchEvent::FileCreated(path)) => {
                    if !watcher.is_direct_child(&path) || !filter.should_process(&path) {
                        debug!("Ignoring {:?}", path);
                        continue;
                    }
                    info!("New file detected: {:?}", path);
                    let tx = event_tx.clone();
                    tokio::spawn(async move {
                        if wait_for_stable(&path, stability_wait).await {
                            let _ = tx.send(FileEvent::new(path));
                        } else {
                            debug!("File disappeared during stability check: {:?}", path);
                        }
                    });
                }
                Some(WatchEvent::DirectoryCreated(path)) => {
                    debug!("Ignoring directory: {:?}", path);
                }
                Some(WatchEvent::Error(e)) => warn!("Watcher error: {}", e),
                None => {
                    warn!("Watcher stopped");
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    // closing the event channel flushes the open batch
    drop(event_tx);
    let _ = accumulator.await;
    let _ = dispatch_loop.await;
    sweeps.abort();
    Ok(())
}

/// Resolve a folder argument for re-categorization: absolute paths are used
/// as given, `AI Library/<name>` and bare names are taken relative to the
/// archive root.
pub fn resolve_library_folder(config: &AppConfig, arg: &str) -> PathBuf {
    let path = PathBuf::from(arg);
    if path.is_absolute() {
        return path;
    }

    let library = config.library_dir();
    let prefix = library
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let relative = arg
        .strip_prefix(&format!("{}/", prefix))
        .or_else(|| arg.strip_prefix(&format!("{}\\", prefix)))
        .unwrap_or(arg);
    library.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age::fake::FixedAges;
    use crate::dispatch::DispatchSettings;
    use crate::oracle::fake::ScriptedBackend;
    use crate::oracle::Categorizer;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_library_folder() {
        let config = AppConfig::default().with_watch_root(Path::new("/home/u/Downloads"));
        let library = PathBuf::from("/home/u/Downloads/AI Library");

        assert_eq!(
            resolve_library_folder(&config, "AI Library/Business Reports"),
            library.join("Business Reports")
        );
        assert_eq!(resolve_library_folder(&config, "Screenshots"), library.join("Screenshots"));
        assert_eq!(resolve_library_folder(&config, "/srv/other"), PathBuf::from("/srv/other"));
    }

    #[tokio::test]
    async fn test_accumulated_batches_reach_the_dispatcher() {
        let dir = TempDir::new().unwrap();
        let watch = dir.path().join("Downloads");
        let settings = DispatchSettings {
            watch_root: watch.clone(),
            recents_dir: watch.join("Recents"),
            library_dir: watch.join("AI Library"),
            recent_window: chrono::Duration::hours(72),
            excluded_extensions: Vec::new(),
        };
        std::fs::create_dir_all(&settings.recents_dir).unwrap();
        std::fs::create_dir_all(&settings.library_dir).unwrap();

        let backend = Arc::new(ScriptedBackend::mapping(&[("old.pdf", "Archive Papers")]));
        let ages = FixedAges::new().with("old.pdf", chrono::Duration::days(9));
        let dispatcher = Arc::new(
            Dispatcher::new(settings.clone(), Categorizer::new(backend.clone(), "sys"))
                .with_timestamps(Arc::new(ages)),
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let accumulator =
            tokio::spawn(run_accumulator(event_rx, batch_tx, 10, Duration::from_millis(50)));
        let dispatch_loop = tokio::spawn(run_dispatcher(dispatcher, batch_rx));

        for name in ["new.txt", "old.pdf", "other.txt"] {
            let path = watch.join(name);
            std::fs::write(&path, b"x").unwrap();
            event_tx.send(FileEvent::new(path)).unwrap();
        }
        drop(event_tx);
        accumulator.await.unwrap();
        dispatch_loop.await.unwrap();

        assert!(settings.recents_dir.join("new.txt").is_file());
        assert!(settings.recents_dir.join("other.txt").is_file());
        assert!(settings.library_dir.join("Archive Papers/old.pdf").is_file());
        assert_eq!(backend.calls(), 1);
    }
}
