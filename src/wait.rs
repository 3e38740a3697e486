//! Bounded waiting and retrying.
//!
//! Every wait in the engine goes through [`wait_until`]: poll a predicate
//! against the live document until it produces a value or the timeout
//! elapses. Nothing blocks unconditionally.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::DriverError;

/// Poll `probe` every `poll` until it returns `Some`, or fail with
/// `DriverError::Timeout` once `timeout` has elapsed. The probe is always
/// evaluated at least once.
pub fn wait_until<T, F>(timeout: Duration, poll: Duration, mut probe: F) -> Result<T, DriverError>
where
    F: FnMut() -> Option<T>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe() {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            return Err(DriverError::Timeout(timeout));
        }
        thread::sleep(poll);
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The error is recoverable; run the action again.
    Retry,
    /// The error is terminal; stop and report it.
    GiveUp,
}

/// Run `action` up to `attempts` times. After each failure, `recover`
/// classifies the error (and may perform a fallback action of its own,
/// e.g. re-acquiring a stale handle) before the next attempt.
pub fn with_retries<T, E, A, R>(attempts: u32, mut action: A, mut recover: R) -> Result<T, E>
where
    A: FnMut(u32) -> Result<T, E>,
    R: FnMut(&E, u32) -> Recovery,
{
    let mut attempt = 0;
    loop {
        match action(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= attempts || recover(&err, attempt) == Recovery::GiveUp {
                    return Err(err);
                }
            }
        }
    }
}
