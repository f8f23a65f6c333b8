// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Dispatch of batched files into the holding area or the categorized archive

use chrono::Utc;
use futures_util::future::join_all;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::age::{classify_path, AgeClass, FsTimestamps, TimestampSource};
use crate::batch::FileEvent;
use crate::config::AppConfig;
use crate::oracle::Categorizer;
use crate::resolver::FolderResolver;
use crate::{LibrarianError, Result};

/// Locations and thresholds a dispatcher works with
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub watch_root: PathBuf,
    pub recents_dir: PathBuf,
    pub library_dir: PathBuf,
    pub recent_window: chrono::Duration,
    /// Lowercase extensions without the dot
    pub excluded_extensions: Vec<String>,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            watch_root: config.watch_root(),
            recents_dir: config.recents_dir(),
            library_dir: config.library_dir(),
            recent_window: config.recent_window(),
            excluded_extensions: config
                .filters
                .excluded_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Disk images, installers and app bundles are never moved
    pub fn is_excluded(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_lowercase();
                self.excluded_extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Moved into the holding area
    Recent { dest: PathBuf },
    /// Moved into an archive folder
    Archived { folder: String, dest: PathBuf },
    /// Extension is on the deny-list
    Excluded,
    /// No usable category; left in place for a later cycle
    Unsorted,
    /// Source was already gone
    AlreadyHandled,
    /// Creation time could not be read; retried on a later cycle
    Unclassifiable(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: Outcome,
}

/// Per-file results of one dispatch
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl DispatchReport {
    fn push(&mut self, path: &Path, outcome: Outcome) {
        self.outcomes.push(FileOutcome {
            path: path.to_path_buf(),
            outcome,
        });
    }

    pub fn extend(&mut self, other: DispatchReport) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn outcome(&self, path: &Path) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.path == path).map(|o| &o.outcome)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} recent, {} archived, {} unsorted, {} excluded, {} skipped, {} failed",
            self.count(|o| matches!(o, Outcome::Recent { .. })),
            self.count(|o| matches!(o, Outcome::Archived { .. })),
            self.count(|o| matches!(o, Outcome::Unsorted)),
            self.count(|o| matches!(o, Outcome::Excluded)),
            self.count(|o| matches!(o, Outcome::AlreadyHandled | Outcome::Unclassifiable(_))),
            self.count(|o| matches!(o, Outcome::Failed(_))),
        )
    }
}

/// Routes files to the holding area or the archive.
///
/// Holds one lock per archive root so sweeps and live batches never run
/// their moves at the same time.
pub struct Dispatcher {
    settings: DispatchSettings,
    categorizer: Categorizer,
    timestamps: Arc<dyn TimestampSource>,
    lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings, categorizer: Categorizer) -> Self {
        Self {
            settings,
            categorizer,
            timestamps: Arc::new(FsTimestamps),
            lock: Mutex::new(()),
        }
    }

    pub fn with_timestamps(mut self, timestamps: Arc<dyn TimestampSource>) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    pub fn timestamps(&self) -> &dyn TimestampSource {
        self.timestamps.as_ref()
    }

    /// Sort one batch of newly detected files.
    ///
    /// Ages are read now, not at detection time. Failures are recorded per
    /// file and never stop the rest of the batch.
    pub async fn dispatch(&self, events: &[FileEvent]) -> DispatchReport {
        let _guard = self.lock.lock().await;
        let mut report = DispatchReport::default();
        let now = Utc::now();

        let mut recent = Vec::new();
        let mut aged = Vec::new();

        for event in events {
            let path = event.path.as_path();
            if self.settings.is_excluded(path) {
                info!("Excluded file from sorting: {:?}", path);
                report.push(path, Outcome::Excluded);
                continue;
            }

            match classify_path(self.timestamps.as_ref(), path, now, self.settings.recent_window) {
                Ok(AgeClass::Recent) => recent.push(path.to_path_buf()),
                Ok(AgeClass::Aged) => aged.push(path.to_path_buf()),
                Err(e) if e.is_not_found() => {
                    debug!("File gone before dispatch: {:?}", path);
                    report.push(path, Outcome::AlreadyHandled);
                }
                Err(e) => {
                    warn!("Skipping {:?} this cycle: {}", path, e);
                    report.push(path, Outcome::Unclassifiable(e.to_string()));
                }
            }
        }

        let recents_dir = &self.settings.recents_dir;
        let moves = recent.iter().map(|path| async move {
            (path, move_into(path, recents_dir).await)
        });
        for (path, result) in join_all(moves).await {
            let outcome = match result {
                Ok(dest) => {
                    info!("Moved recent file {:?} to {:?}", path, recents_dir);
                    Outcome::Recent { dest }
                }
                Err(e) => failure_outcome(path, recents_dir, e),
            };
            report.push(path, outcome);
        }

        if aged.is_empty() {
            debug!("No aged files to categorize");
        } else {
            self.archive(&aged, &mut report).await;
        }

        report
    }

    /// Categorize `files` and move each into its archive folder
    pub async fn categorize(&self, files: &[PathBuf]) -> DispatchReport {
        let _guard = self.lock.lock().await;
        let mut report = DispatchReport::default();
        self.archive(files, &mut report).await;
        report
    }

    /// Re-run categorization over every file inside an archive folder
    pub async fn recategorize_folder(&self, folder: &Path) -> Result<DispatchReport> {
        let files = list_files(folder).await?;
        info!("Re-categorizing {} files in {:?}", files.len(), folder);
        Ok(self.categorize(&files).await)
    }

    /// Re-categorize several folders; one failing folder does not stop the rest
    pub async fn recategorize(&self, folders: &[PathBuf]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for folder in folders {
            match self.recategorize_folder(folder).await {
                Ok(folder_report) => {
                    info!("{:?}: {}", folder, folder_report.summary());
                    report.extend(folder_report);
                }
                Err(e) => error!("Error re-categorizing folder {:?}: {}", folder, e),
            }
        }
        report
    }

    async fn archive(&self, files: &[PathBuf], report: &mut DispatchReport) {
        let library = &self.settings.library_dir;
        let mut resolver = match FolderResolver::load(library).await {
            Ok(resolver) => resolver,
            Err(e) => {
                error!("Cannot list archive folders in {:?}: {}", library, e);
                for path in files {
                    report.push(path, Outcome::Failed(e.to_string()));
                }
                return;
            }
        };

        for chunk in files.chunks(self.categorizer.max_request()) {
            let names: Vec<String> = chunk.iter().map(|p| file_name_of(p)).collect();
            info!("Processing batch of {} aged files", names.len());

            let suggestions = self.categorizer.suggest(&names, &resolver.known_names()).await;
            for (path, suggestion) in chunk.iter().zip(suggestions) {
                let outcome = self
                    .archive_one(path, suggestion.folder_name.as_deref(), &mut resolver)
                    .await;
                report.push(path, outcome);
            }
        }
    }

    async fn archive_one(
        &self,
        path: &Path,
        label: Option<&str>,
        resolver: &mut FolderResolver,
    ) -> Outcome {
        let Some(label) = label else {
            info!("No category suggestion for {:?}. Skipping.", path);
            return Outcome::Unsorted;
        };

        let folder = match resolver.resolve(label).await {
            Ok(Some(folder)) => folder,
            Ok(None) => {
                warn!("Category {:?} for {:?} is empty once sanitized. Skipping.", label, path);
                return Outcome::Unsorted;
            }
            Err(e) => {
                error!(
                    "Error creating folder for {:?} under {:?} (file {:?}): {}",
                    label,
                    resolver.root(),
                    path,
                    e
                );
                return Outcome::Failed(e.to_string());
            }
        };

        match move_into(path, &folder.path).await {
            Ok(dest) => {
                info!("Moved {:?} to {:?} under \"{}\"", path, folder.path, folder.name);
                Outcome::Archived {
                    folder: folder.name,
                    dest,
                }
            }
            Err(e) => failure_outcome(path, &folder.path, e),
        }
    }
}

fn failure_outcome(path: &Path, dest_dir: &Path, e: LibrarianError) -> Outcome {
    if e.is_not_found() && !path.exists() {
        debug!("{:?} already handled: {}", path, e);
        Outcome::AlreadyHandled
    } else {
        error!("Error moving {:?} to {:?}: {}", path, dest_dir, e);
        Outcome::Failed(e.to_string())
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Files directly inside `dir`, skipping subdirectories and dotfiles
pub async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        match entry.file_type().await {
            Ok(t) if t.is_file() => files.push(entry.path()),
            Ok(_) => {}
            Err(e) => warn!("Cannot stat {:?}: {}", entry.path(), e),
        }
    }

    files.sort();
    Ok(files)
}

/// Move `source` into `dir` keeping its name; an existing file there is replaced
pub async fn move_into(source: &Path, dir: &Path) -> Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| LibrarianError::Move {
        from: source.to_path_buf(),
        to: dir.to_path_buf(),
        source: std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let dest = dir.join(name);
    move_file(source, &dest).await?;
    Ok(dest)
}

/// Rename, or copy and remove when source and destination are on different
/// filesystems
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    let wrap = |source| LibrarianError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!("Cross-device move of {:?}, copying", from);
            tokio::fs::copy(from, to).await.map_err(wrap)?;
            tokio::fs::remove_file(from).await.map_err(wrap)?;
            Ok(())
        }
        Err(e) => Err(wrap(e)),
    }
}

#[cfg(unix)]
fn is_cross_device(e: &std::io::Error) -> bool {
    // EXDEV on Linux and macOS
    e.raw_os_error() == Some(18)
}

#[cfg(windows)]
fn is_cross_device(e: &std::io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    e.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_e: &std::io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age::fake::FixedAges;
    use crate::oracle::fake::ScriptedBackend;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        watch: PathBuf,
        recents: PathBuf,
        library: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let watch = dir.path().join("Downloads");
            let recents = watch.join("Recents");
            let library = watch.join("AI Library");
            std::fs::create_dir_all(&recents).unwrap();
            std::fs::create_dir_all(&library).unwrap();
            Self { _dir: dir, watch, recents, library }
        }

        fn file(&self, name: &str) -> PathBuf {
            let path = self.watch.join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            path
        }

        fn settings(&self) -> DispatchSettings {
            DispatchSettings {
                watch_root: self.watch.clone(),
                recents_dir: self.recents.clone(),
                library_dir: self.library.clone(),
                recent_window: Duration::hours(72),
                excluded_extensions: vec!["dmg".to_string(), "pkg".to_string(), "app".to_string()],
            }
        }

        fn dispatcher(&self, backend: Arc<ScriptedBackend>, ages: FixedAges) -> Dispatcher {
            Dispatcher::new(self.settings(), Categorizer::new(backend, "sys"))
                .with_timestamps(Arc::new(ages))
        }
    }

    fn events(paths: &[&PathBuf]) -> Vec<FileEvent> {
        paths.iter().map(|p| FileEvent::new(*p)).collect()
    }

    #[tokio::test]
    async fn test_aged_file_is_archived_in_new_folder() {
        let fx = Fixture::new();
        let invoice = fx.file("invoice.pdf");
        let backend = Arc::new(ScriptedBackend::mapping(&[("invoice.pdf", "Finance Documents")]));
        let dispatcher = fx.dispatcher(
            backend.clone(),
            FixedAges::new().with("invoice.pdf", Duration::days(4)),
        );

        let report = dispatcher.dispatch(&events(&[&invoice])).await;

        let dest = fx.library.join("Finance Documents").join("invoice.pdf");
        assert_eq!(
            report.outcome(&invoice),
            Some(&Outcome::Archived { folder: "Finance Documents".to_string(), dest: dest.clone() })
        );
        assert!(dest.is_file());
        assert!(!invoice.exists());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_recent_file_goes_to_recents_without_oracle() {
        let fx = Fixture::new();
        let shot = fx.file("screenshot.png");
        let backend = Arc::new(ScriptedBackend::failing());
        let dispatcher = fx.dispatcher(
            backend.clone(),
            FixedAges::new().with("screenshot.png", Duration::hours(1)),
        );

        let report = dispatcher.dispatch(&events(&[&shot])).await;

        let dest = fx.recents.join("screenshot.png");
        assert_eq!(report.outcome(&shot), Some(&Outcome::Recent { dest: dest.clone() }));
        assert!(dest.is_file());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_excluded_files_are_left_alone() {
        let fx = Fixture::new();
        let image = fx.file("Installer.DMG");
        let backend = Arc::new(ScriptedBackend::failing());
        let dispatcher = fx.dispatcher(backend.clone(), FixedAges::new());

        let report = dispatcher.dispatch(&events(&[&image])).await;

        assert_eq!(report.outcome(&image), Some(&Outcome::Excluded));
        assert!(image.exists());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_one_failing_move_does_not_stop_the_batch() {
        let fx = Fixture::new();
        let files: Vec<PathBuf> = (1..=5).map(|n| fx.file(&format!("file{}.txt", n))).collect();
        // a non-empty directory occupies file3's destination
        let blocker = fx.recents.join("file3.txt");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("inner"), b"x").unwrap();

        let dispatcher = fx.dispatcher(Arc::new(ScriptedBackend::failing()), FixedAges::new());
        let report = dispatcher.dispatch(&events(&files.iter().collect::<Vec<_>>())).await;

        assert_eq!(report.len(), 5);
        for (n, path) in files.iter().enumerate() {
            if n == 2 {
                assert!(matches!(report.outcome(path), Some(Outcome::Failed(_))));
                assert!(path.exists());
            } else {
                assert!(matches!(report.outcome(path), Some(Outcome::Recent { .. })));
                assert!(fx.recents.join(path.file_name().unwrap()).is_file());
            }
        }
    }

    #[tokio::test]
    async fn test_collision_overwrites_destination() {
        let fx = Fixture::new();
        std::fs::write(fx.recents.join("notes.txt"), b"old").unwrap();
        let notes = fx.file("notes.txt");
        let dispatcher = fx.dispatcher(Arc::new(ScriptedBackend::failing()), FixedAges::new());

        dispatcher.dispatch(&events(&[&notes])).await;

        assert_eq!(std::fs::read(fx.recents.join("notes.txt")).unwrap(), b"notes.txt");
    }

    #[tokio::test]
    async fn test_missing_suggestion_leaves_file_in_place() {
        let fx = Fixture::new();
        let known = fx.file("known.pdf");
        let unknown = fx.file("unknown.bin");
        let backend = Arc::new(ScriptedBackend::mapping(&[("known.pdf", "manuals")]));
        let ages = FixedAges::new()
            .with("known.pdf", Duration::days(10))
            .with("unknown.bin", Duration::days(10));
        let dispatcher = fx.dispatcher(backend, ages);

        let report = dispatcher.dispatch(&events(&[&known, &unknown])).await;

        assert!(matches!(report.outcome(&known), Some(Outcome::Archived { folder, .. }) if folder == "Manuals"));
        assert_eq!(report.outcome(&unknown), Some(&Outcome::Unsorted));
        assert!(unknown.exists());
    }

    #[tokio::test]
    async fn test_oracle_failure_degrades_to_unsorted() {
        let fx = Fixture::new();
        let old = fx.file("old.pdf");
        let dispatcher = fx.dispatcher(
            Arc::new(ScriptedBackend::failing()),
            FixedAges::new().with("old.pdf", Duration::days(5)),
        );

        let report = dispatcher.dispatch(&events(&[&old])).await;
        assert_eq!(report.outcome(&old), Some(&Outcome::Unsorted));
        assert!(old.exists());
    }

    #[tokio::test]
    async fn test_existing_folder_is_matched_case_insensitively() {
        let fx = Fixture::new();
        std::fs::create_dir(fx.library.join("Vehicles")).unwrap();
        let manual = fx.file("4runner.pdf");
        let backend = Arc::new(ScriptedBackend::mapping(&[("4runner.pdf", "vehicles")]));
        let dispatcher = fx.dispatcher(
            backend.clone(),
            FixedAges::new().with("4runner.pdf", Duration::days(30)),
        );

        dispatcher.dispatch(&events(&[&manual])).await;

        assert!(fx.library.join("Vehicles").join("4runner.pdf").is_file());
        assert_eq!(std::fs::read_dir(&fx.library).unwrap().count(), 1);
        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].user.contains("- Vehicles"));
    }

    #[tokio::test]
    async fn test_vanished_file_is_already_handled() {
        let fx = Fixture::new();
        let ghost = fx.watch.join("ghost.txt");
        let dispatcher = fx.dispatcher(Arc::new(ScriptedBackend::failing()), FixedAges::new());

        let report = dispatcher.dispatch(&[FileEvent::new(&ghost)]).await;
        assert_eq!(report.outcome(&ghost), Some(&Outcome::AlreadyHandled));
    }

    #[tokio::test]
    async fn test_aged_files_are_sent_in_sub_batches() {
        let fx = Fixture::new();
        let mut ages = FixedAges::new();
        let mut files = Vec::new();
        let mut answers = Vec::new();
        for n in 0..12 {
            let name = format!("doc{:02}.pdf", n);
            ages = ages.with(&name, Duration::days(7));
            files.push(fx.file(&name));
            answers.push(name);
        }
        let pairs: Vec<(&str, &str)> = answers.iter().map(|n| (n.as_str(), "Documents Archive")).collect();
        let backend = Arc::new(ScriptedBackend::mapping(&pairs));
        let dispatcher = fx.dispatcher(backend.clone(), ages);

        let report = dispatcher.dispatch(&events(&files.iter().collect::<Vec<_>>())).await;

        let sizes: Vec<usize> = backend.requested().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 2]);
        assert_eq!(report.count(|o| matches!(o, Outcome::Archived { .. })), 12);
        // the second request already sees the folder the first one created
        assert!(backend.prompts.lock().unwrap()[1].user.contains("- Documents Archive"));
    }

    #[tokio::test]
    async fn test_failed_sub_batch_does_not_block_the_next() {
        let fx = Fixture::new();
        let mut ages = FixedAges::new();
        let mut files = Vec::new();
        for n in 0..12 {
            let name = format!("doc{:02}.pdf", n);
            ages = ages.with(&name, Duration::days(7));
            files.push(fx.file(&name));
        }
        let requests = AtomicUsize::new(0);
        let backend = Arc::new(ScriptedBackend::new(move |names| {
            if requests.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(LibrarianError::OracleUnavailable("timed out".to_string()));
            }
            Ok(names.iter().map(|n| format!("{}: Reports", n)).collect::<Vec<_>>().join("\n"))
        }));
        let dispatcher = fx.dispatcher(backend.clone(), ages);

        let report = dispatcher.dispatch(&events(&files.iter().collect::<Vec<_>>())).await;

        assert_eq!(backend.calls(), 2);
        assert_eq!(report.count(|o| matches!(o, Outcome::Unsorted)), 10);
        assert_eq!(report.count(|o| matches!(o, Outcome::Archived { .. })), 2);
        assert!(files[0].exists());
        assert!(fx.library.join("Reports").join("doc11.pdf").is_file());
    }

    #[tokio::test]
    async fn test_concurrent_cycles_share_one_new_folder() {
        let fx = Fixture::new();
        let live = fx.file("a.pdf");
        let held = fx.recents.join("b.pdf");
        std::fs::write(&held, b"b").unwrap();
        let backend = Arc::new(ScriptedBackend::mapping(&[
            ("a.pdf", "shared folder"),
            ("b.pdf", "Shared Folder"),
        ]));
        let dispatcher = fx.dispatcher(
            backend.clone(),
            FixedAges::new()
                .with("a.pdf", Duration::days(4))
                .with("b.pdf", Duration::days(4)),
        );

        let live_events = events(&[&live]);
        let held_files = vec![held.clone()];
        let (first, second) = tokio::join!(
            dispatcher.dispatch(&live_events),
            dispatcher.categorize(&held_files),
        );

        for report in [&first, &second] {
            assert_eq!(report.count(|o| matches!(o, Outcome::Failed(_))), 0);
        }
        let folders: Vec<_> = std::fs::read_dir(&fx.library).unwrap().collect();
        assert_eq!(folders.len(), 1);
        assert!(fx.library.join("Shared Folder").join("a.pdf").is_file());
        assert!(fx.library.join("Shared Folder").join("b.pdf").is_file());
        // the cycle that ran second saw the folder the first one created
        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].user.contains("- Shared Folder"));
    }

    #[tokio::test]
    async fn test_recategorize_folder_of_fifteen() {
        let fx = Fixture::new();
        let misc = fx.library.join("Misc");
        std::fs::create_dir(&misc).unwrap();
        for n in 0..15 {
            std::fs::write(misc.join(format!("item{:02}.jpg", n)), b"x").unwrap();
        }
        std::fs::write(misc.join(".DS_Store"), b"").unwrap();

        let answers: Vec<String> = (0..15).map(|n| format!("item{:02}.jpg", n)).collect();
        let pairs: Vec<(&str, &str)> = answers.iter().map(|n| (n.as_str(), "photos")).collect();
        let backend = Arc::new(ScriptedBackend::mapping(&pairs));
        let dispatcher = fx.dispatcher(backend.clone(), FixedAges::new());

        let report = dispatcher.recategorize_folder(&misc).await.unwrap();

        let sizes: Vec<usize> = backend.requested().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 5]);
        assert_eq!(report.count(|o| matches!(o, Outcome::Archived { .. })), 15);
        assert_eq!(list_files(&fx.library.join("Photos")).await.unwrap().len(), 15);
        assert!(misc.is_dir());
    }

    #[tokio::test]
    async fn test_recategorize_continues_past_missing_folder() {
        let fx = Fixture::new();
        let good = fx.library.join("Misc");
        std::fs::create_dir(&good).unwrap();
        std::fs::write(good.join("a.txt"), b"x").unwrap();

        let backend = Arc::new(ScriptedBackend::mapping(&[("a.txt", "Notes")]));
        let dispatcher = fx.dispatcher(backend, FixedAges::new());

        let report = dispatcher
            .recategorize(&[fx.library.join("Does Not Exist"), good.clone()])
            .await;
        assert_eq!(report.len(), 1);
        assert!(fx.library.join("Notes").join("a.txt").is_file());
    }

    #[test]
    fn test_exclusion_is_case_insensitive_and_dot_tolerant() {
        let mut config = AppConfig::default();
        config.filters.excluded_extensions = vec![".DMG".to_string()];
        let settings = DispatchSettings::from_config(&config);
        assert!(settings.is_excluded(Path::new("/x/Setup.dmg")));
        assert!(!settings.is_excluded(Path::new("/x/notes.txt")));
        assert!(!settings.is_excluded(Path::new("/x/Makefile")));
    }

    #[tokio::test]
    async fn test_move_file_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = move_file(&dir.path().join("a"), &dir.path().join("b")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
