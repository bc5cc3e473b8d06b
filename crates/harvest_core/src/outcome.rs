use crate::FetchTarget;

/// Terminal state of a single target after the retry loop settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// 2xx response; carries the decoded body.
    Success(String),
    /// Non-retryable HTTP status.
    HttpError(u16),
    /// Failure that would repeat on every attempt (bad URL, oversized body).
    Rejected(String),
    /// Every attempt hit a retryable failure.
    ExhaustedRetries,
    /// Still unresolved when the run deadline fired.
    Abandoned,
}

/// Exactly one per target, however many attempts were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub entity: String,
    pub page: u32,
    pub attempts: u32,
    pub status: FetchStatus,
}

impl FetchOutcome {
    pub fn new(target: &FetchTarget, attempts: u32, status: FetchStatus) -> Self {
        Self {
            entity: target.entity.clone(),
            page: target.page,
            attempts,
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, FetchStatus::Success(_))
    }
}
