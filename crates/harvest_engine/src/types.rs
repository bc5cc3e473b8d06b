use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub body: String,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub encoding: String,
    pub byte_len: u64,
    /// Malformed sequences were replaced with U+FFFD while decoding.
    pub lossy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    ClientSetup,
    Network,
}

impl FailureKind {
    /// Only failures that may clear up on their own are retried: 429 and
    /// transport errors. Everything else fails identically on the next attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureKind::HttpStatus(code) => *code == 429,
            FailureKind::Timeout | FailureKind::RedirectLimitExceeded | FailureKind::Network => {
                true
            }
            FailureKind::InvalidUrl | FailureKind::TooLarge { .. } | FailureKind::ClientSetup => {
                false
            }
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::ClientSetup => write!(f, "http client setup failed"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Progress reported by the fetch engine while a run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Fetched {
        entity: String,
        page: u32,
        attempt: u32,
        metadata: FetchMetadata,
    },
    Retrying {
        entity: String,
        page: u32,
        attempt: u32,
        delay: Duration,
        reason: FailureKind,
    },
    Resolved {
        entity: String,
        page: u32,
        attempts: u32,
        succeeded: bool,
    },
}
