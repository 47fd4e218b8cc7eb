//! Directory scanning and filesystem watching
//!
//! Discovers PDF files under a monitored root three ways: an initial
//! full walk, a fixed-delay timer that picks up files the watcher
//! missed, and a debounced filesystem watch for immediate reaction to
//! new files. A shared path-keyed registry de-duplicates discoveries
//! across all three sources.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use thiserror::Error;
use walkdir::WalkDir;

use crate::record::FileRecord;

/// Scanner error types
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("monitor root does not exist or is not a directory: {0}")]
    RootMissing(PathBuf),

    #[error("filesystem watch error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Poll granularity of the timer thread, kept short so `stop()` returns
/// promptly even with long scan intervals.
const TIMER_TICK: Duration = Duration::from_millis(250);

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    /// Root directory to monitor
    pub root: PathBuf,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Only accept files modified within this many hours (0 = unlimited)
    pub age_window_hours: u64,
    /// Delay between periodic rescans
    pub scan_interval: Duration,
    /// Settle delay after a create event before the file is examined
    pub settle_delay: Duration,
}

impl ScannerOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            age_window_hours: 0,
            scan_interval: Duration::from_secs(30),
            settle_delay: Duration::from_millis(500),
        }
    }

    /// Set subdirectory recursion
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the age window in hours (0 = unlimited)
    pub fn with_age_window_hours(mut self, hours: u64) -> Self {
        self.age_window_hours = hours;
        self
    }

    /// Set the periodic scan interval
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }
}

/// Concurrent path -> record registry shared by the scan sources and
/// the orchestrator. Explicitly owned and injected; never a global.
#[derive(Debug, Default)]
pub struct FileRegistry {
    entries: DashMap<PathBuf, FileRecord>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Insert or replace the record for its path
    pub fn register(&self, record: FileRecord) {
        self.entries.insert(record.path.clone(), record);
    }

    /// Insert only when the path is unknown; returns whether it was new
    pub fn register_if_absent(&self, record: FileRecord) -> bool {
        let mut inserted = false;
        self.entries.entry(record.path.clone()).or_insert_with(|| {
            inserted = true;
            record
        });
        inserted
    }

    /// Clone out the record for a path
    pub fn get(&self, path: &Path) -> Option<FileRecord> {
        self.entries.get(path).map(|entry| entry.value().clone())
    }

    /// Apply a mutation to the record for a path, if present
    pub fn update<F>(&self, path: &Path, mutate: F)
    where
        F: FnOnce(&mut FileRecord),
    {
        if let Some(mut entry) = self.entries.get_mut(path) {
            mutate(entry.value_mut());
        }
    }

    /// Snapshot of all records
    pub fn snapshot(&self) -> Vec<FileRecord> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Forget everything (manual full rescan)
    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Callback receiving each discovered batch of records
pub type BatchCallback = Arc<dyn Fn(Vec<FileRecord>) + Send + Sync>;

/// Case-insensitive PDF extension filter
pub fn is_pdf_file(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}

/// Whether a modification time falls inside the age window.
///
/// A window of zero hours accepts everything; a modification time in
/// the future (clock skew on network shares) also counts as fresh.
pub fn within_age_window(modified: SystemTime, now: SystemTime, window_hours: u64) -> bool {
    if window_hours == 0 {
        return true;
    }
    match now.duration_since(modified) {
        Ok(age) => age <= Duration::from_secs(window_hours * 3600),
        Err(_) => true,
    }
}

/// Walk the root and register every matching file.
///
/// With `only_new` set, paths already present in the registry are
/// skipped and left untouched; otherwise matches are re-registered
/// fresh (a full scan resets their state).
fn scan_directory(
    options: &ScannerOptions,
    registry: &FileRegistry,
    only_new: bool,
) -> Vec<FileRecord> {
    let now = SystemTime::now();
    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut found = Vec::new();

    for entry in WalkDir::new(&options.root)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "directory walk error");
                None
            }
        })
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if !is_pdf_file(&entry.file_name().to_string_lossy()) {
            continue;
        }
        if only_new && registry.contains(entry.path()) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "failed to stat file");
                continue;
            }
        };
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if !within_age_window(modified, now, options.age_window_hours) {
            continue;
        }

        let record = FileRecord::new(entry.path(), metadata.len(), modified);
        if only_new {
            if !registry.register_if_absent(record.clone()) {
                continue;
            }
        } else {
            registry.register(record.clone());
        }
        found.push(record);
    }

    found
}

/// Watches the monitor root and produces de-duplicated file records
pub struct DirectoryScanner {
    options: ScannerOptions,
    registry: Arc<FileRegistry>,
    running: Arc<AtomicBool>,
    timer: Option<JoinHandle<()>>,
    debouncer: Option<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

impl DirectoryScanner {
    pub fn new(options: ScannerOptions, registry: Arc<FileRegistry>) -> Self {
        Self {
            options,
            registry,
            running: Arc::new(AtomicBool::new(false)),
            timer: None,
            debouncer: None,
        }
    }

    /// The registry this scanner populates
    pub fn registry(&self) -> Arc<FileRegistry> {
        Arc::clone(&self.registry)
    }

    /// Full walk: register and return every matching file
    pub fn scan_all(&self) -> Vec<FileRecord> {
        let found = scan_directory(&self.options, &self.registry, false);
        tracing::info!(
            root = %self.options.root.display(),
            count = found.len(),
            "directory scan complete"
        );
        found
    }

    /// Walk returning only files not previously registered
    pub fn scan_for_new(&self) -> Vec<FileRecord> {
        scan_directory(&self.options, &self.registry, true)
    }

    /// Snapshot of every file registered so far
    pub fn known_files(&self) -> Vec<FileRecord> {
        self.registry.snapshot()
    }

    /// Forget all known files so the next scan starts fresh
    pub fn clear_known_files(&self) {
        self.registry.clear();
    }

    /// Whether the background loops are active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start monitoring: one initial scan, then the periodic timer and
    /// the filesystem watch. Every discovered batch goes to `on_batch`.
    pub fn start(&mut self, on_batch: BatchCallback) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("scanner already running");
            return Ok(());
        }

        if !self.options.root.is_dir() {
            self.running.store(false, Ordering::SeqCst);
            return Err(ScanError::RootMissing(self.options.root.clone()));
        }

        tracing::info!(root = %self.options.root.display(), "starting directory monitor");

        // Initial pass; an empty batch is still a completed cycle.
        on_batch(self.scan_all());

        self.start_timer(Arc::clone(&on_batch));
        self.start_watcher(on_batch)?;

        Ok(())
    }

    /// Periodic rescan loop picking up files the watcher missed
    fn start_timer(&mut self, on_batch: BatchCallback) {
        let options = self.options.clone();
        let registry = Arc::clone(&self.registry);
        let running = Arc::clone(&self.running);

        self.timer = Some(std::thread::spawn(move || {
            let mut waited = Duration::ZERO;
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(TIMER_TICK);
                waited += TIMER_TICK;
                if waited < options.scan_interval {
                    continue;
                }
                waited = Duration::ZERO;

                let new_files = scan_directory(&options, &registry, true);
                if new_files.is_empty() {
                    tracing::debug!(known = registry.len(), "periodic scan found nothing new");
                } else {
                    tracing::info!(count = new_files.len(), "periodic scan found new files");
                    on_batch(new_files);
                }
            }
        }));
    }

    /// Debounced filesystem watch; the debounce interval doubles as the
    /// settle delay that lets a writer finish before we look.
    fn start_watcher(&mut self, on_batch: BatchCallback) -> Result<()> {
        let options = self.options.clone();
        let registry = Arc::clone(&self.registry);
        let running = Arc::clone(&self.running);

        let mut debouncer = new_debouncer(
            options.settle_delay,
            None,
            move |result: std::result::Result<Vec<DebouncedEvent>, Vec<notify::Error>>| {
                match result {
                    Ok(events) => {
                        if !running.load(Ordering::SeqCst) {
                            return;
                        }
                        for event in events {
                            if !matches!(event.event.kind, EventKind::Create(_)) {
                                continue;
                            }
                            for path in &event.event.paths {
                                handle_created_file(path, &options, &registry, &on_batch);
                            }
                        }
                    }
                    Err(errors) => {
                        // Transient watch errors; the watcher stays up.
                        for error in errors {
                            tracing::warn!(error = %error, "filesystem watch error");
                        }
                    }
                }
            },
        )?;

        let mode = if self.options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        debouncer.watch(&self.options.root, mode)?;

        self.debouncer = Some(debouncer);
        tracing::info!("filesystem watch started");
        Ok(())
    }

    /// Stop the timer and close the watch.
    ///
    /// In-flight detections dispatched from earlier batches are not
    /// affected; dropping the watcher ends its loop without error.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        tracing::info!("stopping directory monitor");
        self.debouncer.take();
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
    }
}

impl Drop for DirectoryScanner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Register a file reported by the watcher, re-checking the filters
/// after the settle delay has already elapsed.
fn handle_created_file(
    path: &Path,
    options: &ScannerOptions,
    registry: &FileRegistry,
    on_batch: &BatchCallback,
) {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return,
    };
    if !is_pdf_file(&name) || !path.is_file() {
        return;
    }

    let record = match FileRecord::from_path(path) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read new file");
            return;
        }
    };
    if !within_age_window(record.modified, SystemTime::now(), options.age_window_hours) {
        return;
    }

    if registry.register_if_absent(record.clone()) {
        tracing::info!(file = %record.file_name, "new PDF file detected");
        on_batch(vec![record]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn write_file(dir: &Path, name: &str, size: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, vec![b'x'; size]).unwrap();
        path
    }

    fn scanner_for(root: &Path) -> DirectoryScanner {
        DirectoryScanner::new(ScannerOptions::new(root), Arc::new(FileRegistry::new()))
    }

    #[test]
    fn test_is_pdf_file_case_insensitive() {
        assert!(is_pdf_file("report.pdf"));
        assert!(is_pdf_file("REPORT.PDF"));
        assert!(is_pdf_file("mixed.PdF"));
        assert!(!is_pdf_file("report.pdf.txt"));
        assert!(!is_pdf_file("document.docx"));
        assert!(!is_pdf_file("pdf"));
    }

    #[test]
    fn test_age_window_zero_is_unlimited() {
        let ancient = SystemTime::UNIX_EPOCH;
        assert!(within_age_window(ancient, SystemTime::now(), 0));
    }

    #[test]
    fn test_age_window_bounds() {
        let now = SystemTime::now();
        let two_hours_ago = now - Duration::from_secs(2 * 3600);
        let ten_minutes_ago = now - Duration::from_secs(600);

        assert!(!within_age_window(two_hours_ago, now, 1));
        assert!(within_age_window(ten_minutes_ago, now, 1));
        assert!(within_age_window(two_hours_ago, now, 3));
    }

    #[test]
    fn test_future_modification_counts_as_fresh() {
        let now = SystemTime::now();
        let future = now + Duration::from_secs(60);
        assert!(within_age_window(future, now, 1));
    }

    #[test]
    fn test_scan_all_filters_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.pdf", 10);
        write_file(dir.path(), "B.PDF", 10);
        write_file(dir.path(), "c.txt", 10);
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        write_file(&sub, "d.pdf", 10);

        let scanner = scanner_for(dir.path());
        let found = scanner.scan_all();

        assert_eq!(found.len(), 3);
        assert_eq!(scanner.registry().len(), 3);
    }

    #[test]
    fn test_non_recursive_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.pdf", 10);
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        write_file(&sub, "d.pdf", 10);

        let options = ScannerOptions::new(dir.path()).with_recursive(false);
        let scanner = DirectoryScanner::new(options, Arc::new(FileRegistry::new()));

        assert_eq!(scanner.scan_all().len(), 1);
    }

    #[test]
    fn test_scan_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.pdf", 10);
        write_file(dir.path(), "b.pdf", 10);

        let scanner = scanner_for(dir.path());
        let first = scanner.scan_all();
        let second = scanner.scan_all();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(scanner.registry().len(), 2);

        let mut first_paths: Vec<_> = first.into_iter().map(|r| r.path).collect();
        let mut second_paths: Vec<_> = second.into_iter().map(|r| r.path).collect();
        first_paths.sort();
        second_paths.sort();
        assert_eq!(first_paths, second_paths);
    }

    #[test]
    fn test_scan_for_new_only_reports_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.pdf", 10);

        let scanner = scanner_for(dir.path());
        assert_eq!(scanner.scan_for_new().len(), 1);
        assert_eq!(scanner.scan_for_new().len(), 0);

        write_file(dir.path(), "b.pdf", 10);
        let new = scanner.scan_for_new();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].file_name, "b.pdf");
    }

    #[test]
    fn test_registry_never_duplicates_a_path() {
        let registry = FileRegistry::new();
        let record = FileRecord::new(Path::new("/data/a.pdf"), 1, SystemTime::UNIX_EPOCH);

        registry.register(record.clone());
        registry.register(record.clone());
        assert_eq!(registry.len(), 1);

        assert!(!registry.register_if_absent(record));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_update_mutates_in_place() {
        let registry = FileRegistry::new();
        let path = PathBuf::from("/data/a.pdf");
        registry.register(FileRecord::new(&path, 1, SystemTime::UNIX_EPOCH));

        registry.update(&path, |record| {
            record.notification_sent = true;
        });

        assert!(registry.get(&path).unwrap().notification_sent);
    }

    #[test]
    fn test_clear_forgets_known_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.pdf", 10);

        let scanner = scanner_for(dir.path());
        scanner.scan_all();
        assert_eq!(scanner.known_files().len(), 1);

        scanner.clear_known_files();
        assert!(scanner.registry().is_empty());
        assert_eq!(scanner.scan_for_new().len(), 1);
    }

    #[test]
    fn test_start_rejects_missing_root() {
        let missing = PathBuf::from("/nonexistent/monitor/root");
        let mut scanner = DirectoryScanner::new(
            ScannerOptions::new(&missing),
            Arc::new(FileRegistry::new()),
        );

        let result = scanner.start(Arc::new(|_| {}));
        assert!(matches!(result, Err(ScanError::RootMissing(_))));
        assert!(!scanner.is_running());
    }

    #[test]
    fn test_watch_detects_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut scanner = scanner_for(dir.path());

        let batches: Arc<Mutex<Vec<Vec<FileRecord>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        scanner
            .start(Arc::new(move |batch| {
                sink.lock().unwrap().push(batch);
            }))
            .unwrap();

        // Initial scan of the empty root delivers an empty batch
        assert_eq!(batches.lock().unwrap().len(), 1);

        write_file(dir.path(), "fresh.pdf", 10);

        // Wait out the settle delay plus scheduling slack
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            {
                let seen = batches.lock().unwrap();
                if seen.iter().any(|batch| {
                    batch.iter().any(|record| record.file_name == "fresh.pdf")
                }) {
                    break;
                }
            }
            assert!(
                std::time::Instant::now() < deadline,
                "watcher never reported fresh.pdf"
            );
            std::thread::sleep(Duration::from_millis(100));
        }

        scanner.stop();
        assert!(!scanner.is_running());
    }
}
