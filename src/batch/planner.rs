use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::constants::{BATCH_EXTEND_CAPACITY, NON_BATCHED_CAPACITY};
use crate::split::ResolvedRecipient;

/// Lifecycle of one address batch. Only adjacent transitions are reachable;
/// `advance` steps forward one state and `Ready` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BatchState {
    Planned,
    Created,
    Settling,
    Extended,
    Ready,
}

impl BatchState {
    pub fn next(self) -> Option<BatchState> {
        match self {
            BatchState::Planned => Some(BatchState::Created),
            BatchState::Created => Some(BatchState::Settling),
            BatchState::Settling => Some(BatchState::Extended),
            BatchState::Extended => Some(BatchState::Ready),
            BatchState::Ready => None,
        }
    }

    /// Step to the next state; a no-op once `Ready`.
    pub fn advance(&mut self) {
        if let Some(next) = self.next() {
            *self = next;
        }
    }
}

/// One on-ledger lookup table holding a slice of the recipient addresses.
/// `handle` is unset until the create operation confirms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressBatch {
    pub handle: Option<Pubkey>,
    pub addresses: Vec<Pubkey>,
    pub state: BatchState,
}

/// The batching decision for one recipient set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPlan {
    pub required: bool,
    pub batches: Vec<AddressBatch>,
}

/// Decide whether the recipient set fits inline in the registration
/// transaction and, if not, partition its addresses into batches.
///
/// The ledger imposes a hard byte ceiling per transaction; inlining more
/// than `NON_BATCHED_CAPACITY` raw addresses overflows it. Above the
/// threshold, addresses are registered once in lookup tables and the
/// registration references them by compact handle instead — a one-time
/// setup cost traded for per-use compactness.
pub fn plan_batches(recipients: &[ResolvedRecipient]) -> BatchPlan {
    if recipients.len() <= NON_BATCHED_CAPACITY {
        return BatchPlan {
            required: false,
            batches: Vec::new(),
        };
    }

    let batches: Vec<AddressBatch> = recipients
        .chunks(BATCH_EXTEND_CAPACITY)
        .map(|chunk| AddressBatch {
            handle: None,
            addresses: chunk.iter().map(|r| r.address).collect(),
            state: BatchState::Planned,
        })
        .collect();

    debug!(
        "Batching {} recipients into {} lookup tables",
        recipients.len(),
        batches.len()
    );

    BatchPlan {
        required: true,
        batches,
    }
}
