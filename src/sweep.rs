// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Periodic sweep of the holding area for files that have aged out, and of
//! the watch root for files earlier cycles left behind

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::age::{classify, AgeClass};
use crate::batch::FileEvent;
use crate::dispatch::{list_files, DispatchReport, Dispatcher};
use crate::watcher::EventFilter;
use crate::Result;

/// Files in the holding area that are past the recent window
pub async fn collect_aged(dispatcher: &Dispatcher) -> Result<Vec<PathBuf>> {
    let settings = dispatcher.settings();
    let now = Utc::now();
    let mut aged = Vec::new();

    for path in list_files(&settings.recents_dir).await? {
        if settings.is_excluded(&path) {
            continue;
        }
        match dispatcher.timestamps().created_at(&path) {
            Ok(created) => {
                if classify(created, now, settings.recent_window) == AgeClass::Aged {
                    debug!("{:?} has aged out of the holding area", path);
                    aged.push(path);
                }
            }
            Err(e) => warn!("Cannot age {:?}, retrying next sweep: {}", path, e),
        }
    }

    Ok(aged)
}

/// Files still sitting in the watch root: unsorted or unclassifiable files
/// from earlier cycles. Excluded types and names the watcher would ignore
/// are skipped.
pub async fn collect_stragglers(dispatcher: &Dispatcher, filter: &EventFilter) -> Result<Vec<PathBuf>> {
    let settings = dispatcher.settings();
    Ok(list_files(&settings.watch_root)
        .await?
        .into_iter()
        .filter(|p| filter.should_process(p) && !settings.is_excluded(p))
        .collect())
}

/// Run one sweep: re-dispatch whatever is still in the watch root, then
/// archive everything in the holding area that has aged out
pub async fn sweep_once(dispatcher: &Dispatcher, filter: &EventFilter) -> Result<DispatchReport> {
    let mut report = DispatchReport::default();

    let stragglers = collect_stragglers(dispatcher, filter).await?;
    if !stragglers.is_empty() {
        info!("Sweep retrying {} files left in {:?}", stragglers.len(), dispatcher.settings().watch_root);
        let events: Vec<FileEvent> = stragglers.into_iter().map(FileEvent::new).collect();
        report.extend(dispatcher.dispatch(&events).await);
    }

    let aged = collect_aged(dispatcher).await?;
    if aged.is_empty() {
        debug!("Sweep found no aged files in the holding area");
    } else {
        info!("Sweep found {} aged files in {:?}", aged.len(), dispatcher.settings().recents_dir);
        report.extend(dispatcher.categorize(&aged).await);
    }

    Ok(report)
}

/// Sweep every `period` until `shutdown` flips to true. The first sweep runs
/// one period after start.
pub async fn run_sweeps(
    dispatcher: Arc<Dispatcher>,
    filter: EventFilter,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep_once(&dispatcher, &filter).await {
                    Ok(report) if !report.is_empty() => info!("Sweep: {}", report.summary()),
                    Ok(_) => {}
                    Err(e) => error!("Error sweeping: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
