use crate::error::AppError;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_STEP: Duration = Duration::from_millis(10);

/// Run `program` and return its trimmed stdout, killing it once `timeout` has passed.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Result<String, AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| AppError::Probe(format!("failed to spawn {program}: {e}")))?;

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            let mut out = String::new();
            if let Some(mut stdout) = child.stdout.take() {
                stdout.read_to_string(&mut out)?;
            }
            if !status.success() {
                return Err(AppError::Probe(format!("{program} exited with {status}")));
            }
            return Ok(out.trim().to_string());
        }

        if Instant::now() >= deadline {
            // Best effort: the child may have exited between the check and the kill.
            let _ = child.kill();
            let _ = child.wait();
            return Err(AppError::ProbeTimeout {
                timeout_ms: timeout.as_millis(),
            });
        }
        thread::sleep(POLL_STEP);
    }
}
