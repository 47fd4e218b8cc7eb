//! File record and classification state types
//!
//! One [`FileRecord`] exists per discovered PDF; the scanner creates it,
//! the detector fills in the classification, and the action invokers
//! update notification/reconversion state through the registry.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::util::format_file_size;

/// Outcome of one detection pass over a file.
///
/// Starts at `Pending` and transitions exactly once per pass to a
/// terminal value; a later scan cycle may overwrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionResult {
    /// Not yet detected
    #[default]
    Pending,
    /// Neither signal fired
    Normal,
    /// File size at or below the threshold only
    SuspiciousSize,
    /// Content pixel density below the threshold only
    SuspiciousPixels,
    /// Both signals fired
    SuspiciousBoth,
    /// Detection error (missing file, unreadable document)
    Failed,
}

impl DetectionResult {
    /// Whether this result flags the file as a suspected empty PDF
    pub fn is_suspicious(self) -> bool {
        matches!(
            self,
            DetectionResult::SuspiciousSize
                | DetectionResult::SuspiciousPixels
                | DetectionResult::SuspiciousBoth
        )
    }

    /// Human-readable label, kept out of the enum itself
    pub fn label(self) -> &'static str {
        match self {
            DetectionResult::Pending => "pending",
            DetectionResult::Normal => "normal",
            DetectionResult::SuspiciousSize => "suspicious (size)",
            DetectionResult::SuspiciousPixels => "suspicious (pixels)",
            DetectionResult::SuspiciousBoth => "suspicious (size+pixels)",
            DetectionResult::Failed => "failed",
        }
    }
}

/// Reconversion state machine per file
///
/// `NotNeeded` for normal results; `Skipped` when the feature is
/// disabled, the task id is missing, or no reconverter is configured;
/// otherwise `Pending -> InProgress -> {Success|Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconversionStatus {
    #[default]
    NotNeeded,
    Pending,
    InProgress,
    Success,
    Failed,
    Skipped,
}

impl ReconversionStatus {
    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            ReconversionStatus::NotNeeded => "not needed",
            ReconversionStatus::Pending => "pending",
            ReconversionStatus::InProgress => "in progress",
            ReconversionStatus::Success => "success",
            ReconversionStatus::Failed => "failed",
            ReconversionStatus::Skipped => "skipped",
        }
    }
}

/// One entry per discovered PDF file.
///
/// Identity is the absolute path: two records with the same path are the
/// same file regardless of content.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute file path (unique key)
    pub path: PathBuf,
    /// Display name
    pub file_name: String,
    /// Byte size at discovery time
    pub size_bytes: u64,
    /// Modification timestamp at discovery time
    pub modified: SystemTime,
    /// Task identifier derived from the path (may be absent)
    pub task_id: Option<String>,
    /// Current classification
    pub detection: DetectionResult,
    /// Whether a notification covering this file was sent successfully
    pub notification_sent: bool,
    /// Reconversion state
    pub reconversion: ReconversionStatus,
    /// Last error message, if any
    pub error_message: Option<String>,
}

impl FileRecord {
    /// Create a record from an on-disk file, reading its metadata
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        Ok(Self::new(path, metadata.len(), modified))
    }

    /// Create a record from already-known metadata
    pub fn new(path: &Path, size_bytes: u64, modified: SystemTime) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            file_name,
            size_bytes,
            modified,
            task_id: None,
            detection: DetectionResult::Pending,
            notification_sent: false,
            reconversion: ReconversionStatus::NotNeeded,
            error_message: None,
        }
    }

    /// Whether the current detection result flags this file
    pub fn is_suspicious(&self) -> bool {
        self.detection.is_suspicious()
    }

    /// Human-readable size
    pub fn formatted_size(&self) -> String {
        format_file_size(self.size_bytes)
    }
}

impl PartialEq for FileRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileRecord {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_result_default_is_pending() {
        assert_eq!(DetectionResult::default(), DetectionResult::Pending);
    }

    #[test]
    fn test_suspicious_variants() {
        assert!(DetectionResult::SuspiciousSize.is_suspicious());
        assert!(DetectionResult::SuspiciousPixels.is_suspicious());
        assert!(DetectionResult::SuspiciousBoth.is_suspicious());
        assert!(!DetectionResult::Normal.is_suspicious());
        assert!(!DetectionResult::Pending.is_suspicious());
        assert!(!DetectionResult::Failed.is_suspicious());
    }

    #[test]
    fn test_labels_are_distinct() {
        let labels = [
            DetectionResult::Pending.label(),
            DetectionResult::Normal.label(),
            DetectionResult::SuspiciousSize.label(),
            DetectionResult::SuspiciousPixels.label(),
            DetectionResult::SuspiciousBoth.label(),
            DetectionResult::Failed.label(),
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in labels.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_record_equality_is_path_based() {
        let a = FileRecord::new(Path::new("/data/a.pdf"), 100, SystemTime::UNIX_EPOCH);
        let mut b = FileRecord::new(Path::new("/data/a.pdf"), 9999, SystemTime::now());
        b.detection = DetectionResult::Normal;

        assert_eq!(a, b);

        let c = FileRecord::new(Path::new("/data/c.pdf"), 100, SystemTime::UNIX_EPOCH);
        assert_ne!(a, c);
    }

    #[test]
    fn test_new_record_initial_state() {
        let record = FileRecord::new(Path::new("/data/x.pdf"), 42, SystemTime::UNIX_EPOCH);

        assert_eq!(record.file_name, "x.pdf");
        assert_eq!(record.detection, DetectionResult::Pending);
        assert_eq!(record.reconversion, ReconversionStatus::NotNeeded);
        assert!(!record.notification_sent);
        assert!(record.task_id.is_none());
        assert!(record.error_message.is_none());
    }

    #[test]
    fn test_formatted_size() {
        let record = FileRecord::new(Path::new("/data/x.pdf"), 2048, SystemTime::UNIX_EPOCH);
        assert_eq!(record.formatted_size(), "2.00 KB");
    }
}
