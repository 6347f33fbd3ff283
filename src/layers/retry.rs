use crate::core::Result;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// How often and how patiently to retry transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `attempts` counts every invocation, the first one included; zero is
    /// treated as one.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Maximum number of invocations
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Fixed pause between two invocations
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_secs(1))
    }
}

/// Runs `f`, retrying transient failures according to `policy`.
///
/// Non-transient errors are returned immediately. After the last allowed
/// attempt the final error is returned unchanged.
pub fn retry_on_failure<T, F>(policy: &RetryPolicy, mut f: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 1;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.attempts => {
                warn!("Attempt {} failed: {}", attempt, err);
                attempt += 1;
                thread::sleep(policy.delay);
            }
            Err(err) => {
                if err.is_transient() {
                    warn!("Attempt {} failed, giving up: {}", attempt, err);
                }
                return Err(err);
            }
        }
    }
}
