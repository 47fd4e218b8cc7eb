//! Reconversion action invoker
//!
//! Rebuilds a faulty conversion by running a user-supplied script
//! template with the file's task id substituted in. The template is
//! copied to a scratch file for each run so the original is never
//! touched, and the scratch file is removed no matter how the run ends.
//! Script execution requires the Windows command interpreter; other
//! platforms refuse up front.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::exec::run_streamed;
use crate::orchestrator::ReconversionRunner;
use crate::sink::LogSink;

/// Literal token replaced by the task id in the script template
pub const TASK_ID_PLACEHOLDER: &str = "{TASKID}";

/// Reconversion error types
#[derive(Debug, Error)]
pub enum ReconvertError {
    #[error("reconversion script template is not configured")]
    TemplateNotConfigured,

    #[error("reconversion script template does not exist: {0}")]
    TemplateMissing(PathBuf),

    #[error("script template lacks the {{TASKID}} placeholder: {0}")]
    PlaceholderMissing(PathBuf),

    #[error("task id is empty")]
    EmptyTaskId,

    #[error("reconversion requires the Windows command interpreter (current platform: {0})")]
    UnsupportedPlatform(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconvertError>;

/// Substitute the task id into a script template
pub fn substitute_task_id(template: &str, task_id: &str) -> String {
    template.replace(TASK_ID_PLACEHOLDER, task_id)
}

/// Whether this platform can execute the reconversion script
pub fn platform_supported() -> bool {
    cfg!(windows)
}

/// Invokes the reconversion script for one task id
pub struct Reconverter {
    template: Option<PathBuf>,
    sink: Arc<dyn LogSink>,
}

impl Reconverter {
    pub fn new(template: Option<PathBuf>, sink: Arc<dyn LogSink>) -> Self {
        Self { template, sink }
    }

    /// Check the template path and its content.
    ///
    /// Platform-independent on purpose: configuration problems should
    /// surface even on a machine that cannot run the script.
    pub fn validate_template(&self) -> Result<PathBuf> {
        let template = self
            .template
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ReconvertError::TemplateNotConfigured)?;

        if !template.exists() {
            return Err(ReconvertError::TemplateMissing(template.clone()));
        }

        let content = std::fs::read_to_string(template)?;
        if !content.contains(TASK_ID_PLACEHOLDER) {
            return Err(ReconvertError::PlaceholderMissing(template.clone()));
        }

        Ok(template.clone())
    }

    /// Whether the feature is runnable as configured on this machine
    pub fn validate_config(&self) -> bool {
        if !platform_supported() {
            tracing::warn!(
                platform = std::env::consts::OS,
                "reconversion is only supported on Windows"
            );
            return false;
        }
        match self.validate_template() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "reconversion configuration invalid");
                false
            }
        }
    }

    /// Run the reconversion script for a task id.
    ///
    /// Never returns an error: all failures are logged and collapse to
    /// `false` so the caller treats the action uniformly.
    pub fn execute(&self, task_id: &str) -> bool {
        match self.run(task_id) {
            Ok(true) => {
                tracing::info!(task_id, "reconversion succeeded");
                self.sink
                    .info(&format!("reconversion succeeded, task id: {task_id}"));
                true
            }
            Ok(false) => {
                tracing::warn!(task_id, "reconversion failed");
                self.sink
                    .warn(&format!("reconversion failed, task id: {task_id}"));
                false
            }
            Err(e) => {
                tracing::error!(task_id, error = %e, "reconversion error");
                self.sink.error(&format!("reconversion error: {e}"));
                false
            }
        }
    }

    fn run(&self, task_id: &str) -> Result<bool> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(ReconvertError::EmptyTaskId);
        }

        let template = self.validate_template()?;

        // Fail fast before any scratch file is written
        if !platform_supported() {
            return Err(ReconvertError::UnsupportedPlatform(std::env::consts::OS));
        }

        let content = std::fs::read_to_string(&template)?;
        let script = substitute_task_id(&content, task_id);

        // The scratch file is deleted on drop, success or not
        let mut scratch = tempfile::Builder::new()
            .prefix("reconversion_")
            .suffix(".bat")
            .tempfile()?;
        scratch.write_all(script.as_bytes())?;
        scratch.flush()?;

        self.sink.info(&format!(
            "running reconversion script for task id {task_id}: {}",
            scratch.path().display()
        ));

        let args = vec![
            "/c".to_string(),
            scratch.path().display().to_string(),
        ];
        let code = run_streamed(
            Path::new("cmd"),
            &args,
            template.parent(),
            self.sink.as_ref(),
            "reconversion output",
        )?;

        if code == 0 {
            self.sink.info(&format!("reconversion script finished, exit code: {code}"));
        } else {
            self.sink.warn(&format!("reconversion script failed, exit code: {code}"));
        }

        Ok(code == 0)
    }
}

impl ReconversionRunner for Reconverter {
    fn reconvert(&self, task_id: &str) -> bool {
        self.execute(task_id)
    }
}
