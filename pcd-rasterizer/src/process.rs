use std::ffi::OsStr;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::BackendError;

// Captured output is capped so a chatty tool cannot balloon memory.
const MAX_CAPTURE_BYTES: usize = 10 * 1024 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs an external tool to completion, killing it when the deadline passes.
/// A non-zero exit becomes `BackendError::Failed` carrying the tool's stderr
/// verbatim (stdout when stderr is empty).
pub fn run_with_timeout<I, S>(
    tool: &'static str,
    args: I,
    timeout: Duration,
) -> Result<ProcessOutput, BackendError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = match Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BackendError::ToolNotFound { tool });
        }
        Err(e) => return Err(e.into()),
    };

    let stdout_handle = child.stdout.take().map(drain);
    let stderr_handle = child.stderr.take().map(drain);
    let started = Instant::now();

    loop {
        match child.try_wait()? {
            Some(status) => {
                let stdout = collect(stdout_handle);
                let stderr = collect(stderr_handle);
                if status.success() {
                    return Ok(ProcessOutput {
                        stdout,
                        stderr,
                        elapsed: started.elapsed(),
                    });
                }
                let detail = if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                };
                return Err(BackendError::Failed {
                    tool,
                    exit_code: status.code().unwrap_or(-1),
                    stderr: if detail.is_empty() {
                        "unknown error".to_string()
                    } else {
                        detail
                    },
                });
            }
            None => {
                if started.elapsed() >= timeout {
                    kill_and_reap(&mut child);
                    let _ = collect(stdout_handle);
                    let _ = collect(stderr_handle);
                    return Err(BackendError::Timeout {
                        tool,
                        elapsed: started.elapsed(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn drain(mut source: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut captured = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match source.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    // Keep reading past the cap so the child never blocks on
                    // a full pipe.
                    if captured.len() < MAX_CAPTURE_BYTES {
                        let take = n.min(MAX_CAPTURE_BYTES - captured.len());
                        captured.extend_from_slice(&buf[..take]);
                    }
                }
            }
        }
        captured
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_a_successful_command() {
        let output = run_with_timeout("sh", ["-c", "echo hello"], Duration::from_secs(10)).unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn nonzero_exit_carries_stderr() {
        let err = run_with_timeout(
            "sh",
            ["-c", "echo broken pipeline >&2; exit 3"],
            Duration::from_secs(10),
        )
        .unwrap_err();
        match err {
            BackendError::Failed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "broken pipeline");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn nonzero_exit_falls_back_to_stdout() {
        let err = run_with_timeout(
            "sh",
            ["-c", "echo only on stdout; exit 1"],
            Duration::from_secs(10),
        )
        .unwrap_err();
        match err {
            BackendError::Failed { stderr, .. } => assert_eq!(stderr, "only on stdout"),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn hung_command_is_killed_at_the_deadline() {
        let started = Instant::now();
        let err =
            run_with_timeout("sh", ["-c", "sleep 30"], Duration::from_millis(200)).unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_tool_is_reported_as_not_found() {
        let err = run_with_timeout(
            "definitely-not-an-installed-tool",
            ["--version"],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, BackendError::ToolNotFound { .. }));
    }
}
