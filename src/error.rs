//! Error Types
//!
//! One error enum per external collaborator (ledger, content store, chain)
//! plus the run-level `DistributionError` they fold into. Per-user problems are
//! not errors at this level: the orchestrator turns them into a `SkipReason`.

use crate::types::RunReport;
use thiserror::Error;

/// A persisted enum column held a value this build does not know
#[derive(Debug, Clone, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Ledger (and user store) persistence errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt ledger row: {0}")]
    Corrupt(#[from] UnknownVariant),

    #[error("delta for user {user_id} overflows the ledger's integer range")]
    Overflow { user_id: i64 },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Content-addressed store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("content store rejected upload ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("content store unavailable: {0}")]
    Unavailable(String),
}

/// Settlement key and job contract errors
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("failed to read key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settlement key: {0}")]
    MalformedKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("contract call `{call}` failed: {reason}")]
    Contract { call: &'static str, reason: String },

    #[error("unknown job status code {0}")]
    UnknownStatus(u8),

    #[error("task count {0} does not fit in u32")]
    TaskCountOverflow(usize),
}

/// Batching configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("batch size must be a positive integer")]
    ZeroSize,
}

/// Failures that abort a distribution run
#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("user source error: {0}")]
    UserSource(#[source] LedgerError),

    #[error("manifest publish failed: {0}")]
    Publish(#[from] StoreError),

    #[error("job submission failed: {0}")]
    Submit(#[from] ChainError),

    #[error("batching failed: {0}")]
    Batch(#[from] BatchError),
}

/// A run stopped early
///
/// Carries the partial report so the caller still sees the receipts of the
/// batches submitted before the failure. Nothing already submitted is rolled
/// back.
#[derive(Debug, Error)]
#[error("distribution run aborted: {source}")]
pub struct RunAborted {
    /// Batch being processed when the run stopped (`None` if it failed before batching)
    pub batch_index: Option<usize>,
    pub report: RunReport,
    #[source]
    pub source: DistributionError,
}
