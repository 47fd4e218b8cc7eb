//! Scan cycle orchestration
//!
//! Turns "N files discovered" into "exactly one batch action". Each
//! discovered batch forms one cycle with its own countdown barrier;
//! detections complete concurrently and in any order, and the single
//! worker that brings the countdown to zero fires the batch
//! notification for that cycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use thiserror::Error;

use crate::detector::HybridDetector;
use crate::rasterizer::PageRasterizer;
use crate::record::{FileRecord, ReconversionStatus};
use crate::scanner::FileRegistry;

/// Orchestrator error types
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to build detection pool: {0}")]
    Pool(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Receiver of the per-cycle batch notification
pub trait BatchNotifier: Send + Sync {
    /// Deliver one batch: the suspicious subset plus the cycle total.
    /// Returns whether the external call succeeded.
    fn notify_batch(&self, suspicious: &[FileRecord], total: usize) -> bool;
}

/// Executor of the reconversion action for one task id
pub trait ReconversionRunner: Send + Sync {
    /// Returns whether the external action succeeded
    fn reconvert(&self, task_id: &str) -> bool;
}

/// State owned by exactly one scan cycle.
///
/// `pending` is the join barrier: it starts at the cycle total and the
/// decrement that observes the old value 1 is the unique firing point.
struct ScanCycle {
    total: usize,
    pending: AtomicUsize,
    suspicious: Mutex<Vec<FileRecord>>,
    done: Mutex<bool>,
    done_signal: Condvar,
}

impl ScanCycle {
    fn new(total: usize) -> Self {
        Self {
            total,
            pending: AtomicUsize::new(total),
            suspicious: Mutex::new(Vec::new()),
            done: Mutex::new(false),
            done_signal: Condvar::new(),
        }
    }

    fn mark_done(&self) {
        let mut done = self.done.lock().unwrap();
        *done = true;
        self.done_signal.notify_all();
    }
}

/// Handle for joining a cycle's completion
pub struct CycleHandle {
    cycle: Arc<ScanCycle>,
}

impl CycleHandle {
    /// Files in this cycle
    pub fn total(&self) -> usize {
        self.cycle.total
    }

    /// Whether all detections have completed and the batch action ran
    pub fn is_complete(&self) -> bool {
        *self.cycle.done.lock().unwrap()
    }

    /// Block until the cycle completes
    pub fn wait(&self) {
        let mut done = self.cycle.done.lock().unwrap();
        while !*done {
            done = self.cycle.done_signal.wait(done).unwrap();
        }
    }
}

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Bounded detection concurrency (0 = number of CPUs)
    pub detection_threads: usize,
    /// Whether suspicious files trigger the reconversion action
    pub reconversion_enabled: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            detection_threads: 4,
            reconversion_enabled: false,
        }
    }
}

/// Drives detection of discovered batches and fires the per-cycle
/// batch notification exactly once.
pub struct ScanOrchestrator<R: PageRasterizer + 'static> {
    detector: Arc<HybridDetector<R>>,
    registry: Arc<FileRegistry>,
    notifier: Option<Arc<dyn BatchNotifier>>,
    reconverter: Option<Arc<dyn ReconversionRunner>>,
    reconversion_enabled: bool,
    pool: Arc<rayon::ThreadPool>,
}

impl<R: PageRasterizer + 'static> ScanOrchestrator<R> {
    pub fn new(
        detector: HybridDetector<R>,
        registry: Arc<FileRegistry>,
        notifier: Option<Arc<dyn BatchNotifier>>,
        reconverter: Option<Arc<dyn ReconversionRunner>>,
        options: OrchestratorOptions,
    ) -> Result<Self> {
        let threads = if options.detection_threads == 0 {
            num_cpus::get()
        } else {
            options.detection_threads
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("detect-{i}"))
            .build()
            .map_err(|e| OrchestratorError::Pool(e.to_string()))?;

        Ok(Self {
            detector: Arc::new(detector),
            registry,
            notifier,
            reconverter,
            reconversion_enabled: options.reconversion_enabled,
            pool: Arc::new(pool),
        })
    }

    /// Start one scan cycle over a discovered batch.
    ///
    /// Dispatches every file to the detection pool and returns a handle
    /// immediately; the batch notification fires on whichever worker
    /// completes the last detection. An empty batch completes at once
    /// and fires nothing. Dropping the handle abandons nothing:
    /// in-flight detections still finish and update the registry.
    pub fn begin_cycle(&self, files: Vec<FileRecord>) -> CycleHandle {
        let cycle = Arc::new(ScanCycle::new(files.len()));

        if files.is_empty() {
            tracing::debug!("scan cycle with no files, nothing to do");
            cycle.mark_done();
            return CycleHandle { cycle };
        }

        tracing::info!(total = cycle.total, "scan cycle started");

        for file in files {
            let cycle = Arc::clone(&cycle);
            let detector = Arc::clone(&self.detector);
            let registry = Arc::clone(&self.registry);
            let notifier = self.notifier.clone();
            let reconverter = self.reconverter.clone();
            let reconversion_enabled = self.reconversion_enabled;
            let pool = Arc::clone(&self.pool);

            self.pool.spawn(move || {
                let mut record = file;
                detector.detect(&mut record);
                registry.register(record.clone());

                dispatch_reconversion(
                    &record,
                    reconversion_enabled,
                    reconverter,
                    &registry,
                    &pool,
                );

                complete_detection(&cycle, record, notifier.as_deref(), &registry);
            });
        }

        CycleHandle { cycle }
    }
}

/// Record one finished detection against its cycle; the decrement that
/// hits zero fires the batch notification.
fn complete_detection(
    cycle: &ScanCycle,
    record: FileRecord,
    notifier: Option<&dyn BatchNotifier>,
    registry: &FileRegistry,
) {
    if record.is_suspicious() {
        cycle.suspicious.lock().unwrap().push(record);
    }

    // The single worker observing 1 here owns the firing; any other
    // interleaving sees a different value.
    if cycle.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
        fire_batch(cycle, notifier, registry);
        cycle.mark_done();
    }
}

/// Fire the batch notification for a completed cycle, if warranted
fn fire_batch(cycle: &ScanCycle, notifier: Option<&dyn BatchNotifier>, registry: &FileRegistry) {
    let suspicious = cycle.suspicious.lock().unwrap().clone();

    if suspicious.is_empty() {
        tracing::info!(total = cycle.total, "scan cycle complete, no suspicious files");
        return;
    }

    tracing::info!(
        total = cycle.total,
        suspicious = suspicious.len(),
        "scan cycle complete, sending batch notification"
    );

    let Some(notifier) = notifier else {
        tracing::warn!("no notifier configured, suspicious files go unreported");
        return;
    };

    let sent = notifier.notify_batch(&suspicious, cycle.total);

    // One external call covers the whole batch; its outcome is recorded
    // uniformly on every file.
    for record in &suspicious {
        registry.update(&record.path, |entry| {
            entry.notification_sent = sent;
        });
    }
}

/// Decide the reconversion transition for a detected file and, when
/// warranted, run the action off the detection path so a slow external
/// script never delays the cycle barrier.
fn dispatch_reconversion(
    record: &FileRecord,
    enabled: bool,
    reconverter: Option<Arc<dyn ReconversionRunner>>,
    registry: &Arc<FileRegistry>,
    pool: &Arc<rayon::ThreadPool>,
) {
    if !record.is_suspicious() {
        registry.update(&record.path, |entry| {
            entry.reconversion = ReconversionStatus::NotNeeded;
        });
        return;
    }

    if !enabled {
        registry.update(&record.path, |entry| {
            entry.reconversion = ReconversionStatus::Skipped;
        });
        return;
    }

    let Some(reconverter) = reconverter else {
        tracing::warn!(file = %record.file_name, "no reconverter configured, skipping");
        registry.update(&record.path, |entry| {
            entry.reconversion = ReconversionStatus::Skipped;
        });
        return;
    };

    let Some(task_id) = record.task_id.clone() else {
        tracing::warn!(file = %record.file_name, "no task id, skipping reconversion");
        registry.update(&record.path, |entry| {
            entry.reconversion = ReconversionStatus::Skipped;
        });
        return;
    };

    tracing::info!(file = %record.file_name, task_id = %task_id, "triggering reconversion");
    registry.update(&record.path, |entry| {
        entry.reconversion = ReconversionStatus::Pending;
    });

    let path = record.path.clone();
    let file_name = record.file_name.clone();
    let registry = Arc::clone(registry);
    pool.spawn(move || {
        registry.update(&path, |entry| {
            entry.reconversion = ReconversionStatus::InProgress;
        });

        let ok = reconverter.reconvert(&task_id);

        let status = if ok {
            ReconversionStatus::Success
        } else {
            ReconversionStatus::Failed
        };
        if ok {
            tracing::info!(file = %file_name, task_id = %task_id, "reconversion succeeded");
        } else {
            tracing::warn!(file = %file_name, task_id = %task_id, "reconversion failed");
        }
        registry.update(&path, |entry| {
            entry.reconversion = status;
        });
    });
}
