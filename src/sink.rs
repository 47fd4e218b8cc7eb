//! Log sink seam
//!
//! Line-oriented status reporting for the scanner, detector, and action
//! invokers. Consumers (a UI, a file, a test harness) receive each line
//! as it is produced; the default sink forwards to `tracing`.

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Receiver of line-oriented status strings.
///
/// Implementations must tolerate delivery from arbitrary worker threads.
pub trait LogSink: Send + Sync {
    /// Deliver one status line
    fn emit(&self, severity: Severity, line: &str);

    /// Convenience wrapper for informational lines
    fn info(&self, line: &str) {
        self.emit(Severity::Info, line);
    }

    /// Convenience wrapper for warnings
    fn warn(&self, line: &str) {
        self.emit(Severity::Warn, line);
    }

    /// Convenience wrapper for errors
    fn error(&self, line: &str) {
        self.emit(Severity::Error, line);
    }
}

/// Default sink forwarding every line to the `tracing` subscriber
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, severity: Severity, line: &str) {
        match severity {
            Severity::Info => tracing::info!("{line}"),
            Severity::Warn => tracing::warn!("{line}"),
            Severity::Error => tracing::error!("{line}"),
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _severity: Severity, _line: &str) {}
}
