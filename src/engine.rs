use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::batch::plan_batches;
use crate::config::SequencerConfig;
use crate::error::EngineResult;
use crate::ledger::LedgerClient;
use crate::resolve::{IdentityDirectory, IdentityResolver};
use crate::sequence::{
    build_sequence, LaunchParams, LedgerOperation, OperationSequence, SequenceFailure,
    SequenceProgress, SequenceState, Sequencer,
};
use crate::split::{
    attach_partner_overlay, validate_split, FeeRecipientRequest, FeeSplitPlan,
};

/// Caller's request for a partner overlay on a registration.
#[derive(Debug, Clone, Copy)]
pub struct OverlayRequest {
    pub partner_address: Pubkey,
    pub share_bps: u16,
}

/// Everything one registration produced: the finished plan, the operation
/// sequence that realizes it, and the execution progress. When `progress`
/// ends in `Failed`, the sequence and progress together are what `resume`
/// needs to pick up from the first unconfirmed operation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub plan: FeeSplitPlan,
    pub sequence: OperationSequence,
    pub progress: SequenceProgress,
}

impl Registration {
    pub fn completed(&self) -> bool {
        self.progress.state == SequenceState::Complete
    }

    /// The on-ledger registration handle, once `RegisterConfig` confirmed.
    pub fn handle(&self) -> Option<Pubkey> {
        self.sequence
            .ops
            .iter()
            .position(|p| matches!(p.op, LedgerOperation::RegisterConfig { .. }))
            .and_then(|index| self.progress.produced(index))
    }
}

/// Front door tying the pipeline together:
/// validate → resolve → plan batches → overlay → build → sequence.
///
/// The first four stages are pure or read-only; nothing touches the ledger
/// until the sequencer starts submitting. Validation failures therefore
/// always surface before any transaction exists.
pub struct SplitEngine<D, L> {
    resolver: IdentityResolver<D>,
    ledger: Arc<L>,
    sequencer: Sequencer<L>,
}

impl<D: IdentityDirectory, L: LedgerClient> SplitEngine<D, L> {
    pub fn new(directory: D, ledger: Arc<L>, sequencer_config: SequencerConfig) -> Self {
        Self {
            resolver: IdentityResolver::new(directory),
            sequencer: Sequencer::new(ledger.clone(), sequencer_config),
            ledger,
        }
    }

    /// Register a fee split for `asset` and launch it.
    ///
    /// Errors are pre-sequence failures (validation, resolution, overlay);
    /// once sequencing starts, the outcome — `Complete` or `Failed` with
    /// partial progress — is reported in the returned `Registration`. No
    /// rollback is attempted on failure; resume with [`SplitEngine::resume`].
    pub async fn register_split(
        &self,
        asset: Pubkey,
        requests: &[FeeRecipientRequest],
        overlay: Option<OverlayRequest>,
        launch: LaunchParams,
    ) -> EngineResult<Registration> {
        validate_split(requests)?;
        let recipients = self.resolver.resolve_all(requests).await?;

        let mut plan = FeeSplitPlan::new(asset, recipients);
        let batch_plan = plan_batches(&plan.recipients);
        if batch_plan.required {
            plan.batch_plan = Some(batch_plan);
        }

        if let Some(request) = overlay {
            attach_partner_overlay(
                &mut plan,
                request.partner_address,
                request.share_bps,
                self.ledger.as_ref(),
            )
            .await?;
        }

        let sequence = build_sequence(&plan, launch);
        info!(
            "Registering split for asset {}: {} recipients, {} operations",
            asset,
            plan.recipients.len(),
            sequence.ops.len()
        );

        let progress = match self.sequencer.run(&sequence).await {
            Ok(progress) => progress,
            Err(SequenceFailure { progress, .. }) => progress,
        };

        Ok(Registration {
            plan,
            sequence,
            progress,
        })
    }

    /// Continue a previously failed registration.
    pub async fn resume(
        &self,
        sequence: &OperationSequence,
        progress: SequenceProgress,
    ) -> Result<SequenceProgress, SequenceFailure> {
        self.sequencer.resume(sequence, progress).await
    }
}
