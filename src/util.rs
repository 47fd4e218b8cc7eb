//! Common utilities for blankwatch
//!
//! Provides shared functionality across modules to reduce code duplication.

use std::path::Path;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Extract the task identifier from a PDF file path.
///
/// The task id is the name of the grandparent directory of the file,
/// e.g. `/data/U261EA21XXXXXX/result/hello.pdf` -> `U261EA21XXXXXX`.
/// Returns `None` when the path has fewer than two ancestor directories
/// or the candidate is a root or drive marker.
pub fn extract_task_id(path: &Path) -> Option<String> {
    let grandparent = path.parent()?.parent()?;

    // The grandparent of a shallow path can be a bare root ("/" or "C:\"),
    // which has no file name component.
    let name = grandparent.file_name()?.to_string_lossy().into_owned();

    if !is_valid_task_id(&name) {
        return None;
    }

    Some(name)
}

/// Validate a task id candidate.
///
/// Rejects empty strings, relative markers, and Windows drive prefixes
/// that can leak through lossy path decomposition.
pub fn is_valid_task_id(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return false;
    }

    if trimmed == "." || trimmed == ".." || trimmed == "/" || trimmed == "\\" {
        return false;
    }

    // Drive markers like "C:" or "d:"
    if trimmed.len() == 2 && trimmed.ends_with(':') {
        let first = trimmed.chars().next().unwrap_or(' ');
        if first.is_ascii_alphabetic() {
            return false;
        }
    }

    true
}
