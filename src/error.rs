use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::split::SocialProvider;

/// Top-level error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Split validation error: {0}")]
    Split(#[from] SplitError),

    #[error("Identity resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Sequencing error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Ledger read failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Split validation errors. Local, deterministic, surfaced before any
/// network call is made; never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("Split must name at least one recipient")]
    NoRecipients,

    #[error("Too many recipients: {count} (maximum {max})")]
    TooManyRecipients { count: usize, max: usize },

    #[error("Duplicate recipient identity: {0}")]
    DuplicateIdentity(String),

    #[error("Invalid split: shares total {total_bps} bps, must equal exactly 10000")]
    InvalidSplit { total_bps: u32 },

    #[error("Recipient {index} has a zero share; omit the entry instead")]
    ZeroShare { index: usize },

    #[error("Overlay share {share_bps} bps out of range (1..=10000)")]
    OverlayShareOutOfRange { share_bps: u16 },

    #[error("No partner registration exists for address {0}")]
    PartnerNotRegistered(Pubkey),
}

/// Identity resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Definitive directory fact; retrying cannot change it.
    #[error("Identity {provider}/{username} has no linked wallet")]
    UnlinkedIdentity {
        provider: SocialProvider,
        username: String,
    },

    /// Two distinct identities resolved to the same address.
    #[error("Duplicate recipient address after resolution: {0}")]
    DuplicateRecipient(Pubkey),

    /// Transport-level failure talking to the directory; retryable.
    #[error("Directory lookup failed: {0}")]
    Directory(String),
}

impl From<reqwest::Error> for ResolveError {
    fn from(error: reqwest::Error) -> Self {
        ResolveError::Directory(format!("HTTP request error: {}", error))
    }
}

/// Sequencer errors. Every variant names the operation index it occurred at
/// so a caller can resume from the first unconfirmed operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Operation {op_index} still failing after {attempts} attempts: {last_error}")]
    TransientFailure {
        op_index: usize,
        attempts: u32,
        last_error: String,
    },

    /// Semantic rejection by the ledger, reason verbatim. Retrying an
    /// ill-formed operation deterministically fails again.
    #[error("Operation {op_index} rejected by ledger: {reason}")]
    Rejected { op_index: usize, reason: String },

    #[error("Deadline exceeded waiting on operation {op_index}")]
    DeadlineExceeded { op_index: usize },

    #[error("Operation {op_index} depends on operation {dependency} which is not confirmed")]
    DependencyNotConfirmed { op_index: usize, dependency: usize },

    #[error("Progress record does not match sequence: {0}")]
    ProgressMismatch(String),
}

/// Submission-level taxonomy returned by a ledger client. The sequencer maps
/// these into `SequenceError` with the failing operation index attached.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    /// Network timeout, RPC unavailable; worth retrying with backoff.
    #[error("Transient ledger failure: {0}")]
    Transient(String),

    /// The ledger rejected the operation for a semantic reason.
    #[error("Ledger rejection: {0}")]
    Rejected(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(error: anyhow::Error) -> Self {
        EngineError::Internal(format!("{:?}", error))
    }
}

/// Result type alias for the engine
pub type EngineResult<T> = Result<T, EngineError>;
