use crate::error::{PipelineError, RunError};
use chrono::{DateTime, Utc};
use cron_parser::parse;
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 3,
            delay: Duration::from_secs(5 * 60),
        }
    }
}

pub fn next_execution(cron_pattern: &str, after: &DateTime<Utc>) -> Result<DateTime<Utc>, PipelineError> {
    // cron_parser panics on some malformed patterns
    let next = std::panic::catch_unwind(|| parse(cron_pattern, after))
        .map_err(|_| PipelineError::Config(format!("invalid cron pattern {cron_pattern:?}")))?;
    next.map_err(|e| PipelineError::Config(format!("invalid cron pattern {cron_pattern:?}: {e}")))
}

/// Runs `job` until it succeeds or the retries are used up, waiting `delay` between attempts.
pub async fn run_with_retries<T, F, Fut>(policy: &RetryPolicy, mut job: F) -> Result<T, RunError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RunError>>,
{
    let mut attempt = 0;
    loop {
        match job(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.retries => {
                attempt += 1;
                warn!(stage = %err.stage, error = %err, attempt, retries = policy.retries, "Run failed, retrying");
                sleep(policy.delay).await;
            }
            Err(err) => {
                error!(stage = %err.stage, error = %err, "Run failed, giving up");
                return Err(err);
            }
        }
    }
}

/// Waits for each cron tick and runs `job` with retries. Runs never overlap.
pub async fn run_on_schedule<T, F, Fut>(
    cron_pattern: &str,
    policy: &RetryPolicy,
    mut job: F,
) -> Result<(), PipelineError>
where
    T: std::fmt::Debug,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RunError>>,
{
    loop {
        let now = Utc::now();
        let next = next_execution(cron_pattern, &now)?;
        info!(next_execution = %next, "Waiting for next run");
        sleep((next - now).to_std().unwrap_or_default()).await;

        match run_with_retries(policy, &mut job).await {
            Ok(result) => info!(result = ?result, "Scheduled run succeeded"),
            Err(err) => error!(stage = %err.stage, error = %err, "Scheduled run failed"),
        }
    }
}
