//! blankwatch - empty-PDF directory monitor
//!
//! Watches a directory tree for PDF files, classifies each one as
//! structurally empty/suspicious with a two-signal heuristic, and fires
//! external side effects exactly once per discovered batch.
//!
//! # Features
//!
//! - **Directory scanning** ([`scanner`]) - full walks, periodic rescans,
//!   and a debounced filesystem watch over a shared de-duplicating registry
//! - **Hybrid detection** ([`detector`]) - file-size threshold plus
//!   content-pixel density inside a configurable region of interest
//! - **Page rasterization** ([`rasterizer`]) - first-page bitmaps via
//!   ImageMagick with an `lopdf` readability probe
//! - **Cycle orchestration** ([`orchestrator`]) - a per-cycle countdown
//!   barrier that fires one batch notification regardless of completion order
//! - **Action invokers** ([`notifier`], [`reconvert`]) - external SMS sender
//!   and reconversion script execution with streamed output
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use blankwatch::{
//!     DetectorOptions, DirectoryScanner, FileRegistry, HybridDetector,
//!     MagickRasterizer, OrchestratorOptions, ScanOrchestrator, ScannerOptions,
//! };
//!
//! let registry = Arc::new(FileRegistry::new());
//! let scanner = DirectoryScanner::new(
//!     ScannerOptions::new("/srv/conversions"),
//!     Arc::clone(&registry),
//! );
//!
//! let detector = HybridDetector::new(DetectorOptions::default(), MagickRasterizer::new());
//! let orchestrator = ScanOrchestrator::new(
//!     detector,
//!     registry,
//!     None,
//!     None,
//!     OrchestratorOptions::default(),
//! ).unwrap();
//!
//! let handle = orchestrator.begin_cycle(scanner.scan_all());
//! handle.wait();
//! ```
//!
//! # Architecture
//!
//! ```text
//! Scanner (walk / timer / watch) -> Orchestrator -> Detector pool
//!                                        |
//!                             completion barrier (one per cycle)
//!                                        |
//!                        Batch notification / Reconversion action
//! ```

pub mod area;
pub mod cli;
pub mod config;
pub mod detector;
pub mod exec;
pub mod notifier;
pub mod orchestrator;
pub mod rasterizer;
pub mod reconvert;
pub mod record;
pub mod scanner;
pub mod sink;
pub mod util;

// Re-exports for convenience
pub use area::{compute_area, DetectionArea};
pub use cli::{create_progress_bar, create_spinner, Cli, Commands, ExitCode};
pub use config::{CliOverrides, Config, ConfigError, Settings};
pub use detector::{
    content_density, count_content_pixels, is_content_pixel, DetectorOptions,
    DetectorOptionsBuilder, HybridDetector, ANALYSIS_DPI,
};
pub use exec::run_streamed;
pub use notifier::{
    build_batch_message, build_single_message, NotifierOptions, NotifyError, SmsNotifier,
};
pub use orchestrator::{
    BatchNotifier, CycleHandle, OrchestratorError, OrchestratorOptions, ReconversionRunner,
    ScanOrchestrator,
};
pub use rasterizer::{MagickRasterizer, PageRasterizer, RasterError, Rendered};
pub use reconvert::{
    platform_supported, substitute_task_id, ReconvertError, Reconverter, TASK_ID_PLACEHOLDER,
};
pub use record::{DetectionResult, FileRecord, ReconversionStatus};
pub use scanner::{
    is_pdf_file, within_age_window, BatchCallback, DirectoryScanner, FileRegistry, ScanError,
    ScannerOptions,
};
pub use sink::{LogSink, NullSink, Severity, TracingSink};
pub use util::{extract_task_id, format_file_size, is_valid_task_id};
