use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::warn;

/// Exponential-backoff retry for any fallible async operation.
///
/// Attempt `i` (0-based) that fails with attempts remaining waits
/// `backoff_factor^i` seconds before the next try; the final failure
/// propagates the original error unchanged.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_factor: f64) -> Self {
        Self {
            max_retries: max_retries.max(1),
            backoff_factor,
        }
    }

    /// Run `op` until it succeeds or `max_retries` attempts are spent.
    /// `what` names the operation in retry warnings.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        return Err(err);
                    }
                    let wait = self.backoff_factor.powi((attempt - 1) as i32);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {}s...",
                        what, attempt, self.max_retries, err, wait
                    );
                    tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 2.0)
    }
}
