use std::collections::HashMap;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::claims::ClaimablePosition;
use crate::error::LedgerError;
use crate::sequence::{CommitmentTier, LedgerOperation};

/// Batch handles produced so far in a sequence, keyed by batch index. Filled
/// in as each `CreateBatch` confirms; later operations reference them.
pub type BatchHandles = HashMap<usize, Pubkey>;

/// Result of submitting one operation's transaction.
#[derive(Debug, Clone)]
pub struct Submitted {
    /// Base58 transaction signature.
    pub signature: String,
    /// Handle the operation produced, if any: the lookup-table address for
    /// `CreateBatch`, the registration handle for `RegisterConfig`.
    pub produced: Option<Pubkey>,
}

/// Submission and read interface to the underlying ledger. One instance is
/// scoped to one signing context; concurrent sequences for different assets
/// each get their own so they cannot interfere.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Build, sign, and submit the operation's transaction. Does not wait
    /// for confirmation.
    async fn submit(
        &self,
        op: &LedgerOperation,
        handles: &BatchHandles,
    ) -> Result<Submitted, LedgerError>;

    /// One confirmation check: the slot the transaction was confirmed at
    /// under `tier`, or `None` if not yet confirmed. Polling policy belongs
    /// to the caller.
    async fn confirmation_slot(
        &self,
        signature: &str,
        tier: CommitmentTier,
    ) -> Result<Option<u64>, LedgerError>;

    /// Current ledger slot, used for settling-delay preconditions.
    async fn current_slot(&self) -> Result<u64, LedgerError>;

    /// Existing fee-split registration handle for an asset, if any. Backs
    /// the idempotent re-registration path.
    async fn registered_config(&self, asset: &Pubkey) -> Result<Option<Pubkey>, LedgerError>;

    /// Existing partner registration for a partner address, if any.
    async fn partner_registration(&self, partner: &Pubkey) -> Result<Option<Pubkey>, LedgerError>;

    /// Read-only snapshot of positions with claimable fees for an asset.
    async fn claimable_positions(
        &self,
        asset: &Pubkey,
    ) -> Result<Vec<ClaimablePosition>, LedgerError>;
}
