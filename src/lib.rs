//! Fee-split configuration engine.
//!
//! Validates a requested trading-fee split, resolves recipient identities
//! through an external directory, plans lookup-table batching for large
//! recipient sets, optionally layers a platform partner overlay, and
//! sequences the dependent on-chain steps (batch creation → settling delay →
//! batch extension → config registration → asset launch) with retries and
//! resumable partial progress.
//!
//! Planning stages are pure; all ledger effects go through the
//! [`ledger::LedgerClient`] seam, which [`sequence::Sequencer`] drives.

pub mod batch;
pub mod claims;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod resolve;
pub mod retry;
pub mod sequence;
pub mod split;

pub use config::{EngineConfig, SequencerConfig};
pub use constants::NON_BATCHED_CAPACITY;
pub use engine::{OverlayRequest, Registration, SplitEngine};
pub use error::{EngineError, EngineResult};
