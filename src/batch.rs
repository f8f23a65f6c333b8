// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Batching of file events: a batch closes when it is full or when no new
//! event has arrived for the debounce window.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// A new entry noticed in the watched root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub detected_at: DateTime<Utc>,
}

impl FileEvent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            detected_at: Utc::now(),
        }
    }
}

/// Events handed to the dispatcher together
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: Uuid,
    pub events: Vec<FileEvent>,
}

impl Batch {
    fn new(events: Vec<FileEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Pending events and the size cap. Idle when nothing is pending.
#[derive(Debug)]
pub struct BatchAccumulator {
    max: usize,
    pending: Vec<FileEvent>,
}

impl BatchAccumulator {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            max,
            pending: Vec::with_capacity(max),
        }
    }

    /// True while a batch is open and the debounce timer should be armed
    pub fn is_collecting(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Add an event. Returns the batch when this event filled it. A path
    /// already pending is not added twice.
    pub fn push(&mut self, event: FileEvent) -> Option<Batch> {
        if self.pending.iter().any(|e| e.path == event.path) {
            debug!("{:?} already pending", event.path);
            return None;
        }
        self.pending.push(event);
        if self.pending.len() >= self.max {
            self.flush()
        } else {
            None
        }
    }

    /// Close the open batch, if any
    pub fn flush(&mut self) -> Option<Batch> {
        if self.pending.is_empty() {
            return None;
        }
        let events = std::mem::replace(&mut self.pending, Vec::with_capacity(self.max));
        Some(Batch::new(events))
    }
}

/// Drive an accumulator from `events`, sending closed batches to `batches`.
///
/// Every event re-arms the debounce timer. A full batch is sent at once and
/// disarms it. Remaining events are flushed when `events` closes.
pub async fn run_accumulator(
    mut events: mpsc::UnboundedReceiver<FileEvent>,
    batches: mpsc::UnboundedSender<Batch>,
    max: usize,
    debounce: Duration,
) {
    let mut acc = BatchAccumulator::new(max);
    let timer = tokio::time::sleep(debounce);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Some(event) => {
                    debug!("Queued {:?} ({} pending)", event.path, acc.len() + 1);
                    match acc.push(event) {
                        Some(batch) => {
                            debug!("Batch full, flushing {} files", batch.len());
                            if batches.send(batch).is_err() {
                                return;
                            }
                        }
                        None => timer.as_mut().reset(Instant::now() + debounce),
                    }
                }
                None => {
                    if let Some(batch) = acc.flush() {
                        let _ = batches.send(batch);
                    }
                    return;
                }
            },
            () = &mut timer, if acc.is_collecting() => {
                if let Some(batch) = acc.flush() {
                    debug!("Debounce elapsed, flushing {} files", batch.len());
                    if batches.send(batch).is_err() {
                        return;
                    }
                }
            }
        }
    }
}
