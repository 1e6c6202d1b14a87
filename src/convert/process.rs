//! Bounded external process execution

use crate::error::ConversionError;
use std::io::Write;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Run `cmd` to completion within `timeout`
///
/// The child is killed when the time budget elapses.
pub(crate) async fn run_bounded(
    mut cmd: Command,
    timeout: Duration,
    strategy: &'static str,
) -> Result<Output, ConversionError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| ConversionError::Failed {
        strategy,
        reason: format!("failed to execute {program}: {e}"),
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            debug!(
                strategy,
                program = %program,
                status = %output.status,
                "external process finished"
            );
            Ok(output)
        }
        Ok(Err(e)) => Err(ConversionError::Failed {
            strategy,
            reason: format!("failed waiting for {program}: {e}"),
        }),
        Err(_) => Err(ConversionError::TimedOut {
            strategy,
            seconds: timeout.as_secs(),
        }),
    }
}

/// Map a finished automation run to success only if it left `target` behind
pub(crate) fn expect_output(
    output: &Output,
    target: &Path,
    strategy: &'static str,
) -> Result<(), ConversionError> {
    if !output.status.success() {
        return Err(ConversionError::Failed {
            strategy,
            reason: failure_reason(output),
        });
    }
    if !target.exists() {
        return Err(ConversionError::MissingOutput {
            strategy,
            expected: target.to_path_buf(),
        });
    }
    Ok(())
}

/// Write an automation script to a self-deleting temporary file
pub(crate) fn script_file(extension: &str, body: &str) -> std::io::Result<tempfile::TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("slm-convert-")
        .suffix(extension)
        .tempfile()?;
    file.write_all(body.as_bytes())?;
    file.flush()?;
    Ok(file.into_temp_path())
}

/// Trimmed stderr, falling back to stdout, then to the exit status
pub(crate) fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    format!("exited with {}", output.status)
}
