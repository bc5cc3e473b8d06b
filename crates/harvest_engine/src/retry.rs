use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use harvest_core::{FetchOutcome, FetchStatus, FetchTarget};

use crate::engine::ProgressSink;
use crate::fetch::Fetcher;
use crate::{EngineEvent, FailureKind, FetchError};

/// Per-target retry policy: `max_attempts` tries, sleeping `initial_delay`
/// after the first retryable failure and multiplying by `backoff_factor`
/// after each further one. There is no sleep after the final attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2,
        }
    }
}

/// Source of backoff waits, injectable so tests can observe delays.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

enum Attempt {
    Settled(FetchStatus),
    Retry(FetchError),
}

async fn attempt_once(
    fetcher: &dyn Fetcher,
    target: &FetchTarget,
    attempt: u32,
    sink: &dyn ProgressSink,
) -> Attempt {
    match fetcher.fetch(&target.url).await {
        Ok(output) => {
            sink.emit(EngineEvent::Fetched {
                entity: target.entity.clone(),
                page: target.page,
                attempt,
                metadata: output.metadata,
            });
            Attempt::Settled(FetchStatus::Success(output.body))
        }
        Err(err) if err.kind.is_retryable() => Attempt::Retry(err),
        Err(err) => match err.kind {
            FailureKind::HttpStatus(code) => Attempt::Settled(FetchStatus::HttpError(code)),
            kind => Attempt::Settled(FetchStatus::Rejected(kind.to_string())),
        },
    }
}

/// Drives one target to exactly one outcome. `attempts` is updated as each
/// attempt starts so a caller that abandons the future can still report it.
pub(crate) async fn resolve_target(
    fetcher: &dyn Fetcher,
    sleeper: &dyn Sleeper,
    policy: &RetryPolicy,
    target: &FetchTarget,
    attempts: &AtomicU32,
    sink: &dyn ProgressSink,
) -> FetchOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;

    for attempt in 1..=max_attempts {
        attempts.store(attempt, Ordering::Relaxed);
        match attempt_once(fetcher, target, attempt, sink).await {
            Attempt::Settled(status) => return settle(target, attempt, status, sink),
            Attempt::Retry(err) => {
                if attempt == max_attempts {
                    break;
                }
                sink.emit(EngineEvent::Retrying {
                    entity: target.entity.clone(),
                    page: target.page,
                    attempt,
                    delay,
                    reason: err.kind,
                });
                sleeper.sleep(delay).await;
                delay = delay.saturating_mul(policy.backoff_factor);
            }
        }
    }

    settle(target, max_attempts, FetchStatus::ExhaustedRetries, sink)
}

fn settle(
    target: &FetchTarget,
    attempts: u32,
    status: FetchStatus,
    sink: &dyn ProgressSink,
) -> FetchOutcome {
    let outcome = FetchOutcome::new(target, attempts, status);
    sink.emit(EngineEvent::Resolved {
        entity: outcome.entity.clone(),
        page: outcome.page,
        attempts,
        succeeded: outcome.is_success(),
    });
    outcome
}
