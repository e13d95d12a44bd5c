//! Child-process execution with optional bounded wait.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::UtilError;

/// Structured output from a command execution.
#[derive(Debug)]
pub struct CommandOutput {
    /// Standard output as a string.
    pub stdout: String,
    /// Standard error as a string.
    pub stderr: String,
    /// Whether the command exited successfully.
    pub success: bool,
    /// The exit code, if the process was not killed by a signal.
    pub exit_code: Option<i32>,
}

/// Interval between liveness polls while waiting on a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Execute a command and capture its output, optionally within a time limit.
///
/// With `timeout = None` this blocks until the child exits. With a timeout,
/// the child is killed once the deadline passes and `UtilError::Timeout` is
/// returned.
///
/// # Errors
/// Returns an error if the command cannot be spawned (e.g. binary not found)
/// or the deadline expires. A non-zero exit code is **not** an error; check
/// `CommandOutput::success` instead.
pub fn run_command(cmd: &mut Command, timeout: Option<Duration>) -> Result<CommandOutput, UtilError> {
    let Some(limit) = timeout else {
        let output = cmd
            .output()
            .map_err(|source| UtilError::CommandExec { source })?;
        return Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
            exit_code: output.status.code(),
        });
    };

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| UtilError::CommandExec { source })?;

    // Drain both pipes on background threads so a chatty child cannot
    // deadlock against a full pipe buffer while we poll for exit.
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now() + limit;
    let status = loop {
        match child.try_wait().map_err(|source| UtilError::CommandExec { source })? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(UtilError::Timeout {
                    seconds: limit.as_secs(),
                });
            }
            None => std::thread::sleep(POLL_INTERVAL),
        }
    };

    Ok(CommandOutput {
        stdout: join_reader(stdout_reader),
        stderr: join_reader(stderr_reader),
        success: status.success(),
        exit_code: status.code(),
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<std::thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
