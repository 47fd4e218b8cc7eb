//! External process execution surface
//!
//! The one true OS boundary: launch a program with an argument vector
//! and working directory, merge its error stream into stdout, forward
//! every output line to the log sink as it arrives, and block until the
//! child exits. Launch failures become error values, never panics.

use std::io::{BufRead, BufReader};
use std::path::Path;

use duct::cmd;

use crate::sink::LogSink;

/// Exit code reported when the child was terminated without one
/// (e.g. killed by a signal).
pub const NO_EXIT_CODE: i32 = -1;

/// Run a program to completion, streaming merged output to `sink`.
///
/// Each line of the child's combined stdout/stderr is forwarded through
/// the sink prefixed with `label` as soon as it is read. Returns the
/// child's exit code; the caller decides what non-zero means.
pub fn run_streamed(
    program: &Path,
    args: &[String],
    workdir: Option<&Path>,
    sink: &dyn LogSink,
    label: &str,
) -> std::io::Result<i32> {
    let mut expression = cmd(program, args.iter().cloned())
        .stderr_to_stdout()
        .unchecked();
    if let Some(dir) = workdir {
        expression = expression.dir(dir);
    }

    let handle = expression.reader()?;
    let mut reader = BufReader::new(handle);

    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        sink.info(&format!("{}: {}", label, line.trim_end()));
    }

    // Reading to EOF waits for the child, so the status is available now.
    let code = match reader.get_ref().try_wait()? {
        Some(output) => output.status.code().unwrap_or(NO_EXIT_CODE),
        None => NO_EXIT_CODE,
    };

    Ok(code)
}
