use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::{stream, StreamExt};
use harvest_core::{FetchOutcome, FetchStatus, FetchTarget};
use tokio_util::sync::CancellationToken;

use crate::fetch::Fetcher;
use crate::retry::{resolve_target, RetryPolicy, Sleeper, TokioSleeper};
use crate::EngineEvent;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Forwards engine events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::Fetched {
                entity,
                page,
                attempt,
                metadata,
            } => {
                if metadata.final_url != metadata.original_url {
                    engine_debug!("{} page {}: redirected to {}", entity, page, metadata.final_url);
                }
                if metadata.lossy {
                    engine_warn!(
                        "{} page {}: body is not valid {}, malformed bytes replaced",
                        entity,
                        page,
                        metadata.encoding
                    );
                }
                engine_debug!(
                    "{} page {}: attempt {} got {} bytes ({}, {})",
                    entity,
                    page,
                    attempt,
                    metadata.byte_len,
                    metadata.status,
                    metadata.encoding
                );
            }
            EngineEvent::Retrying {
                entity,
                page,
                attempt,
                delay,
                reason,
            } => engine_warn!(
                "{} page {}: attempt {} failed ({}), retrying in {:?}",
                entity,
                page,
                attempt,
                reason,
                delay
            ),
            EngineEvent::Resolved {
                entity,
                page,
                attempts,
                succeeded: true,
            } => engine_debug!("{} page {}: fetched after {} attempt(s)", entity, page, attempts),
            EngineEvent::Resolved {
                entity,
                page,
                attempts,
                succeeded: false,
            } => engine_warn!("{} page {}: gave up after {} attempt(s)", entity, page, attempts),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub retry: RetryPolicy,
    /// Cap on concurrently unresolved targets; `None` dispatches all at once.
    pub max_in_flight: Option<usize>,
    /// Upper bound on a whole run. Targets still unresolved when it fires
    /// resolve to [`FetchStatus::Abandoned`].
    pub run_deadline: Option<Duration>,
}

/// Resolves fetch targets concurrently over one shared fetcher.
pub struct FetchEngine {
    fetcher: Arc<dyn Fetcher>,
    sleeper: Arc<dyn Sleeper>,
    settings: EngineSettings,
}

impl FetchEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: EngineSettings) -> Self {
        Self {
            fetcher,
            sleeper: Arc::new(TokioSleeper),
            settings,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns one outcome per target, in completion order. Never fails:
    /// per-target failures are carried in the outcomes.
    pub async fn run(&self, targets: Vec<FetchTarget>, sink: &dyn ProgressSink) -> Vec<FetchOutcome> {
        if targets.is_empty() {
            return Vec::new();
        }

        let total = targets.len();
        let limit = self.settings.max_in_flight.unwrap_or(total).max(1);
        let cancel = CancellationToken::new();
        let watchdog = self.settings.run_deadline.map(|deadline| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                engine_warn!("run deadline of {:?} reached, abandoning unresolved targets", deadline);
                cancel.cancel();
            })
        });

        engine_info!("dispatching {} targets, at most {} in flight", total, limit);
        let outcomes: Vec<FetchOutcome> = stream::iter(targets)
            .map(|target| self.resolve_or_abandon(target, &cancel, sink))
            .buffer_unordered(limit)
            .collect()
            .await;

        if let Some(handle) = watchdog {
            handle.abort();
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        engine_info!("resolved {} targets, {} without content", total, failed);
        outcomes
    }

    async fn resolve_or_abandon(
        &self,
        target: FetchTarget,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> FetchOutcome {
        let attempts = AtomicU32::new(0);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let attempts = attempts.load(Ordering::Relaxed);
                sink.emit(EngineEvent::Resolved {
                    entity: target.entity.clone(),
                    page: target.page,
                    attempts,
                    succeeded: false,
                });
                FetchOutcome::new(&target, attempts, FetchStatus::Abandoned)
            }
            outcome = resolve_target(
                self.fetcher.as_ref(),
                self.sleeper.as_ref(),
                &self.settings.retry,
                &target,
                &attempts,
                sink,
            ) => outcome,
        }
    }
}
