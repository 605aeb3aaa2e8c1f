use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

use crate::claims::ClaimablePosition;
use crate::constants::BATCH_SETTLING_SLOTS;
use crate::split::{FeeSplitPlan, ResolvedRecipient};

/// Parameters for the terminal launch step that makes the asset tradable
/// under the registered split.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchParams {
    pub initial_liquidity_lamports: u64,
    /// Reference to previously uploaded asset metadata.
    pub metadata_uri: String,
}

/// Commitment tier an operation is confirmed at. Intermediate steps take the
/// fast tier to keep the sequence moving, accepting reorganization risk; the
/// terminal launch is held to the strongest tier and re-verified on resume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommitmentTier {
    Confirmed,
    Finalized,
}

/// Abstract ledger operations the sequencer knows how to submit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LedgerOperation {
    /// Create lookup table `batch_index`; confirmation yields its handle.
    CreateBatch { batch_index: usize },
    /// Load the batch's addresses into its table. Must wait out the settling
    /// delay after the create confirms or the ledger rejects it.
    ExtendBatch {
        batch_index: usize,
        addresses: Vec<Pubkey>,
    },
    /// Register the fee split. Idempotent per asset: an existing
    /// registration is returned, never an error.
    RegisterConfig {
        asset: Pubkey,
        recipients: Vec<ResolvedRecipient>,
        partner_config: Option<Pubkey>,
        batched: bool,
    },
    LaunchAsset {
        asset: Pubkey,
        params: LaunchParams,
    },
    ClaimFees { position: ClaimablePosition },
}

impl LedgerOperation {
    /// Short name used in logs and failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerOperation::CreateBatch { .. } => "create_batch",
            LedgerOperation::ExtendBatch { .. } => "extend_batch",
            LedgerOperation::RegisterConfig { .. } => "register_config",
            LedgerOperation::LaunchAsset { .. } => "launch_asset",
            LedgerOperation::ClaimFees { .. } => "claim_fees",
        }
    }

    pub fn commitment(&self) -> CommitmentTier {
        match self {
            LedgerOperation::LaunchAsset { .. } => CommitmentTier::Finalized,
            _ => CommitmentTier::Confirmed,
        }
    }
}

/// One operation with its ordering constraints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedOperation {
    pub op: LedgerOperation,
    /// Indices of prior operations whose confirmation this one requires.
    pub must_follow: Vec<usize>,
    /// Ledger-time units that must elapse after the dependencies confirm
    /// before this operation may even be submitted.
    pub min_elapsed_settling_units: Option<u64>,
}

/// The ordered set of ledger operations realizing one `FeeSplitPlan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSequence {
    pub id: Uuid,
    pub asset: Pubkey,
    pub ops: Vec<PlannedOperation>,
}

/// Assemble the operation sequence for a validated, resolved plan.
///
/// Batched: create every table, extend every table (each extend gated on its
/// own create plus the settling delay), then register referencing the
/// handles. Unbatched: register directly with the inline recipient list. The
/// launch always rides on a confirmed registration.
pub fn build_sequence(plan: &FeeSplitPlan, launch: LaunchParams) -> OperationSequence {
    let mut ops = Vec::new();

    let batches = plan
        .batch_plan
        .as_ref()
        .filter(|bp| bp.required)
        .map(|bp| bp.batches.as_slice())
        .unwrap_or(&[]);

    let mut extend_indices = Vec::with_capacity(batches.len());
    for (batch_index, _) in batches.iter().enumerate() {
        ops.push(PlannedOperation {
            op: LedgerOperation::CreateBatch { batch_index },
            must_follow: Vec::new(),
            min_elapsed_settling_units: None,
        });
    }
    for (batch_index, batch) in batches.iter().enumerate() {
        extend_indices.push(ops.len());
        ops.push(PlannedOperation {
            op: LedgerOperation::ExtendBatch {
                batch_index,
                addresses: batch.addresses.clone(),
            },
            must_follow: vec![batch_index],
            min_elapsed_settling_units: Some(BATCH_SETTLING_SLOTS),
        });
    }

    let register_index = ops.len();
    ops.push(PlannedOperation {
        op: LedgerOperation::RegisterConfig {
            asset: plan.asset,
            recipients: plan.recipients.clone(),
            partner_config: plan.partner_overlay.map(|o| o.partner_config),
            batched: !batches.is_empty(),
        },
        must_follow: extend_indices,
        min_elapsed_settling_units: None,
    });

    ops.push(PlannedOperation {
        op: LedgerOperation::LaunchAsset {
            asset: plan.asset,
            params: launch,
        },
        must_follow: vec![register_index],
        min_elapsed_settling_units: None,
    });

    OperationSequence {
        id: Uuid::new_v4(),
        asset: plan.asset,
        ops,
    }
}
