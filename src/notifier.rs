//! SMS-style notification invoker
//!
//! Builds the message for one file or one batch and hands it to a
//! configured external sender program. The program's merged output is
//! streamed to the log sink line by line; only exit code 0 counts as
//! success, and every failure resolves to a logged `false` rather than
//! an error reaching the orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::exec::run_streamed;
use crate::orchestrator::BatchNotifier;
use crate::record::{DetectionResult, FileRecord};
use crate::sink::LogSink;

/// Separator between file names in the batch message (full-width comma)
const BATCH_NAME_SEPARATOR: &str = "、";

/// Notification configuration problems
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("sender program path is not configured")]
    ProgramNotConfigured,

    #[error("sender program does not exist: {0}")]
    ProgramMissing(PathBuf),

    #[error("sender username is not configured")]
    UsernameMissing,

    #[error("no recipients configured")]
    RecipientsMissing,
}

pub type Result<T> = std::result::Result<T, NotifyError>;

/// Notification settings
#[derive(Debug, Clone, Default)]
pub struct NotifierOptions {
    /// External sender program
    pub program: Option<PathBuf>,
    /// Sender identity passed to the program
    pub username: String,
    /// Recipient identifiers, comma separated
    pub recipients: String,
}

/// Invokes the external SMS sender program
pub struct SmsNotifier {
    options: NotifierOptions,
    sink: Arc<dyn LogSink>,
}

impl SmsNotifier {
    pub fn new(options: NotifierOptions, sink: Arc<dyn LogSink>) -> Self {
        Self { options, sink }
    }

    /// Check that every required setting is present.
    ///
    /// Called before each send; a notifier with incomplete settings
    /// refuses to run instead of invoking the program.
    pub fn validate(&self) -> Result<&PathBuf> {
        let program = self
            .options
            .program
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(NotifyError::ProgramNotConfigured)?;
        if self.options.username.trim().is_empty() {
            return Err(NotifyError::UsernameMissing);
        }
        if self.options.recipients.trim().is_empty() {
            return Err(NotifyError::RecipientsMissing);
        }
        if !program.exists() {
            return Err(NotifyError::ProgramMissing(program.clone()));
        }
        Ok(program)
    }

    /// Send the single-file notification for one suspicious record
    pub fn send_single(&self, record: &FileRecord) -> bool {
        let message = build_single_message(record);
        self.send_message(&message)
    }

    /// Send one pre-built batch message covering a whole cycle
    pub fn send_batch(&self, suspicious: &[FileRecord], total: usize) -> bool {
        if suspicious.is_empty() {
            tracing::info!("no suspicious files, skipping batch notification");
            return true;
        }

        self.sink.info(&format!(
            "sending batch notification for {} suspected empty file(s)",
            suspicious.len()
        ));

        let message = build_batch_message(suspicious, total, Local::now());
        // The aggregate message goes out verbatim, not re-wrapped
        let sent = self.send_message(&message);

        if sent {
            self.sink.info(&format!(
                "batch notification sent, {} file(s) covered",
                suspicious.len()
            ));
        } else {
            self.sink.warn(&format!(
                "batch notification failed, {} file(s) affected",
                suspicious.len()
            ));
        }
        sent
    }

    /// Send a canned notification to verify the configuration end to end
    pub fn test_notification(&self) -> bool {
        let mut probe = FileRecord::new(
            &PathBuf::from("test.pdf"),
            0,
            SystemTime::now(),
        );
        probe.detection = DetectionResult::SuspiciousSize;

        self.sink.info("sending test notification...");
        let ok = self.send_single(&probe);
        self.sink.info(&format!(
            "test notification finished: {}",
            if ok { "success" } else { "failure" }
        ));
        ok
    }

    /// Run the sender program with the assembled argument vector
    fn send_message(&self, message: &str) -> bool {
        let program = match self.validate() {
            Ok(program) => program.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "notification refused");
                self.sink.warn(&format!("notification refused: {e}"));
                return false;
            }
        };

        let send_time = Local::now().format("%Y/%m/%d").to_string();
        let args = vec![
            "-integname=SendSMSMessage".to_string(),
            format!("-Username={}", self.options.username),
            format!("-msg={}", message),
            format!("-tel={}", self.options.recipients),
            format!("-SendTime={}", send_time),
        ];

        self.sink.info(&format!(
            "invoking sender: {} {}",
            program.display(),
            args.join(" ")
        ));

        let workdir = program.parent().map(|p| p.to_path_buf());
        match run_streamed(
            &program,
            &args,
            workdir.as_deref(),
            self.sink.as_ref(),
            "sender output",
        ) {
            Ok(0) => {
                self.sink.info("sender finished, exit code: 0");
                true
            }
            Ok(code) => {
                self.sink.warn(&format!("sender failed, exit code: {code}"));
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to launch sender");
                self.sink.error(&format!("failed to launch sender: {e}"));
                false
            }
        }
    }
}

impl BatchNotifier for SmsNotifier {
    fn notify_batch(&self, suspicious: &[FileRecord], total: usize) -> bool {
        self.send_batch(suspicious, total)
    }
}

/// Message for a single suspicious file
pub fn build_single_message(record: &FileRecord) -> String {
    format!(
        "detected suspicious empty PDF: {} (size: {})",
        record.file_name,
        record.formatted_size()
    )
}

/// Aggregate message for one scan cycle.
///
/// The timestamp is injected so the exact wording is testable.
pub fn build_batch_message(
    suspicious: &[FileRecord],
    total: usize,
    detected_at: DateTime<Local>,
) -> String {
    let names = suspicious
        .iter()
        .map(|record| record.file_name.as_str())
        .collect::<Vec<_>>()
        .join(BATCH_NAME_SEPARATOR);

    format!(
        "scanned {} PDFs; {} suspected empty: {}; detected at {}",
        total,
        suspicious.len(),
        names,
        detected_at.format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::test_support::CollectingSink;
    use crate::sink::NullSink;
    use chrono::TimeZone;
    use std::path::Path;

    fn record(name: &str, size: u64) -> FileRecord {
        FileRecord::new(&Path::new("/data/task/result").join(name), size, SystemTime::now())
    }

    fn notifier(options: NotifierOptions) -> SmsNotifier {
        SmsNotifier::new(options, Arc::new(NullSink))
    }

    #[test]
    fn test_single_message_format() {
        let message = build_single_message(&record("report.pdf", 2048));
        assert_eq!(
            message,
            "detected suspicious empty PDF: report.pdf (size: 2.00 KB)"
        );
    }

    #[test]
    fn test_batch_message_format() {
        let files = vec![record("a.pdf", 100), record("b.pdf", 200)];
        let at = Local.with_ymd_and_hms(2024, 3, 5, 14, 30, 9).unwrap();

        let message = build_batch_message(&files, 7, at);
        assert_eq!(
            message,
            "scanned 7 PDFs; 2 suspected empty: a.pdf、b.pdf; detected at 2024-03-05 14:30:09"
        );
    }

    #[test]
    fn test_batch_message_single_file_has_no_separator() {
        let files = vec![record("only.pdf", 100)];
        let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let message = build_batch_message(&files, 3, at);
        assert!(message.contains("1 suspected empty: only.pdf;"));
        assert!(!message.contains(BATCH_NAME_SEPARATOR));
    }

    #[test]
    fn test_validate_requires_program_path() {
        let n = notifier(NotifierOptions {
            program: None,
            username: "TC".to_string(),
            recipients: "123".to_string(),
        });
        assert!(matches!(n.validate(), Err(NotifyError::ProgramNotConfigured)));
    }

    #[test]
    fn test_validate_requires_username() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("sender");
        std::fs::write(&program, b"#!/bin/sh\n").unwrap();

        let n = notifier(NotifierOptions {
            program: Some(program),
            username: "   ".to_string(),
            recipients: "123".to_string(),
        });
        assert!(matches!(n.validate(), Err(NotifyError::UsernameMissing)));
    }

    #[test]
    fn test_validate_requires_recipients() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("sender");
        std::fs::write(&program, b"#!/bin/sh\n").unwrap();

        let n = notifier(NotifierOptions {
            program: Some(program),
            username: "TC".to_string(),
            recipients: "".to_string(),
        });
        assert!(matches!(n.validate(), Err(NotifyError::RecipientsMissing)));
    }

    #[test]
    fn test_validate_requires_existing_program() {
        let n = notifier(NotifierOptions {
            program: Some(PathBuf::from("/nonexistent/sender")),
            username: "TC".to_string(),
            recipients: "123".to_string(),
        });
        assert!(matches!(n.validate(), Err(NotifyError::ProgramMissing(_))));
    }

    #[test]
    fn test_send_refuses_without_invoking_when_unconfigured() {
        let sink = Arc::new(CollectingSink::default());
        let n = SmsNotifier::new(NotifierOptions::default(), sink.clone());

        assert!(!n.send_single(&record("a.pdf", 10)));
        assert!(sink.contains("notification refused"));
    }

    #[cfg(unix)]
    #[test]
    fn test_send_invokes_program_and_reads_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("sender.sh");
        std::fs::write(&program, b"#!/bin/sh\necho delivered\nexit 0\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let sink = Arc::new(CollectingSink::default());
        let n = SmsNotifier::new(
            NotifierOptions {
                program: Some(program),
                username: "TC".to_string(),
                recipients: "13800000000".to_string(),
            },
            sink.clone(),
        );

        assert!(n.send_single(&record("a.pdf", 10)));
        assert!(sink.contains("sender output: delivered"));
        assert!(sink.contains("exit code: 0"));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("sender.sh");
        std::fs::write(&program, b"#!/bin/sh\nexit 2\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let n = notifier(NotifierOptions {
            program: Some(program),
            username: "TC".to_string(),
            recipients: "123".to_string(),
        });

        assert!(!n.send_single(&record("a.pdf", 10)));
    }

    #[cfg(unix)]
    #[test]
    fn test_batch_send_passes_message_verbatim() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("sender.sh");
        // Echo the -msg argument back so the sink captures it
        std::fs::write(&program, b"#!/bin/sh\nfor a in \"$@\"; do echo \"$a\"; done\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let sink = Arc::new(CollectingSink::default());
        let n = SmsNotifier::new(
            NotifierOptions {
                program: Some(program),
                username: "TC".to_string(),
                recipients: "123".to_string(),
            },
            sink.clone(),
        );

        let files = vec![record("a.pdf", 100), record("b.pdf", 200)];
        assert!(n.send_batch(&files, 5));
        assert!(sink.contains("-msg=scanned 5 PDFs; 2 suspected empty: a.pdf、b.pdf"));
    }
}
