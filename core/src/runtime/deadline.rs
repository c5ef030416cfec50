use crate::error::{CoreError, CoreResult};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Runs `f` on a worker thread and gives up after `timeout`. A step that
/// overruns is reported as `Timeout`; its worker is left to finish on its own.
pub fn run_with_timeout<T, F>(label: &str, timeout: Duration, f: F) -> CoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> CoreResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name(format!("probe-{}", label))
        .spawn(move || {
            let _ = tx.send(f());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(r) => r,
        Err(RecvTimeoutError::Timeout) => Err(CoreError::Timeout(format!(
            "{} exceeded {} ms",
            label,
            timeout.as_millis()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(CoreError::ProbeStepFailure(format!(
            "{} worker exited without a result",
            label
        ))),
    }
}
