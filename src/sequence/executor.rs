use std::sync::Arc;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::batch::BatchState;
use crate::config::SequencerConfig;
use crate::error::{LedgerError, SequenceError};
use crate::ledger::{BatchHandles, LedgerClient};
use crate::retry::backoff_delay;
use crate::sequence::ops::{CommitmentTier, LedgerOperation, OperationSequence};

/// Per-operation progress. `Confirmed` is terminal; a resumed run skips
/// confirmed operations rather than resubmitting them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OpStatus {
    Pending,
    Submitted { signature: String },
    Confirmed {
        /// Absent when the operation was satisfied without a submission,
        /// as with an already-registered config.
        signature: Option<String>,
        slot: u64,
        produced: Option<Pubkey>,
    },
}

impl OpStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, OpStatus::Confirmed { .. })
    }

    fn confirmed_slot(&self) -> Option<u64> {
        match self {
            OpStatus::Confirmed { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

/// Where a sequence run currently stands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SequenceState {
    Pending,
    Submitting(usize),
    AwaitingConfirmation(usize),
    Settling(usize),
    Complete,
    Failed { op_index: usize, reason: String },
}

/// Resumable record of one sequence's execution. Serializable so a caller
/// can persist it across process restarts and resume from the first
/// unconfirmed operation instead of starting over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceProgress {
    pub sequence_id: Uuid,
    pub asset: Pubkey,
    pub state: SequenceState,
    pub statuses: Vec<OpStatus>,
    /// Lifecycle of each planned address batch, advanced as the sequence
    /// moves: Created on create confirmation, Settling while waiting out
    /// the delay, Extended on extend confirmation, Ready once registered.
    pub batch_states: Vec<BatchState>,
}

impl SequenceProgress {
    pub fn new(sequence: &OperationSequence) -> Self {
        let batch_count = sequence
            .ops
            .iter()
            .filter(|p| matches!(p.op, LedgerOperation::CreateBatch { .. }))
            .count();
        Self {
            sequence_id: sequence.id,
            asset: sequence.asset,
            state: SequenceState::Pending,
            statuses: vec![OpStatus::Pending; sequence.ops.len()],
            batch_states: vec![BatchState::Planned; batch_count],
        }
    }

    /// Index to resume from.
    pub fn first_unconfirmed(&self) -> Option<usize> {
        self.statuses.iter().position(|s| !s.is_confirmed())
    }

    /// Handle produced by operation `index`, if confirmed and it made one.
    pub fn produced(&self, index: usize) -> Option<Pubkey> {
        match self.statuses.get(index) {
            Some(OpStatus::Confirmed { produced, .. }) => *produced,
            _ => None,
        }
    }
}

/// A failed run, carrying the partial progress so the caller can resume.
#[derive(Debug)]
pub struct SequenceFailure {
    pub progress: SequenceProgress,
    pub error: SequenceError,
}

impl std::fmt::Display for SequenceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for SequenceFailure {}

/// Whether enough ledger time has passed since a dependency confirmed for a
/// settling-gated operation to be submitted.
pub fn settling_elapsed(dep_confirmed_slot: u64, current_slot: u64, units: u64) -> bool {
    current_slot >= dep_confirmed_slot.saturating_add(units)
}

/// Executes one `OperationSequence` against the ledger, strictly in order.
///
/// Operations within a sequence are serial by construction: each references
/// ledger state its predecessors produced. Independent assets' sequences are
/// independent; give each its own `Sequencer` over its own signing context
/// and run them concurrently.
pub struct Sequencer<L> {
    ledger: Arc<L>,
    config: SequencerConfig,
}

impl<L: LedgerClient> Sequencer<L> {
    pub fn new(ledger: Arc<L>, config: SequencerConfig) -> Self {
        Self { ledger, config }
    }

    pub async fn run(
        &self,
        sequence: &OperationSequence,
    ) -> Result<SequenceProgress, SequenceFailure> {
        self.resume(sequence, SequenceProgress::new(sequence)).await
    }

    /// Continue a sequence from previously recorded progress. Confirmed
    /// operations are never resubmitted. No rollback is ever attempted:
    /// whatever already landed on the ledger stays.
    pub async fn resume(
        &self,
        sequence: &OperationSequence,
        mut progress: SequenceProgress,
    ) -> Result<SequenceProgress, SequenceFailure> {
        if progress.statuses.len() != sequence.ops.len() || progress.sequence_id != sequence.id {
            let error = SequenceError::ProgressMismatch(format!(
                "progress for sequence {} does not fit sequence {}",
                progress.sequence_id, sequence.id
            ));
            return Err(fail(progress, 0, error));
        }

        let deadline = Instant::now() + self.config.deadline;

        for index in 0..sequence.ops.len() {
            let planned = &sequence.ops[index];

            if progress.statuses[index].is_confirmed() {
                // A recorded confirmation at the fast tier is trusted as-is.
                // Finalized-tier operations are re-verified against the
                // ledger: when the record no longer holds, the operation is
                // resubmitted rather than assumed done.
                let recheck = match (&progress.statuses[index], planned.op.commitment()) {
                    (
                        OpStatus::Confirmed {
                            signature: Some(signature),
                            ..
                        },
                        CommitmentTier::Finalized,
                    ) => signature.clone(),
                    _ => continue,
                };
                match self
                    .ledger
                    .confirmation_slot(&recheck, CommitmentTier::Finalized)
                    .await
                {
                    Ok(Some(_)) => continue,
                    Ok(None) => {
                        warn!(
                            "Recorded finality of {} (op {}) no longer holds, resubmitting",
                            planned.op.kind(),
                            index
                        );
                        progress.statuses[index] = OpStatus::Pending;
                    }
                    Err(e) => {
                        warn!(
                            "Finality re-check of op {} failed, keeping recorded status: {}",
                            index, e
                        );
                        continue;
                    }
                }
            }

            for &dependency in &planned.must_follow {
                if !progress.statuses[dependency].is_confirmed() {
                    let error = SequenceError::DependencyNotConfirmed {
                        op_index: index,
                        dependency,
                    };
                    return Err(fail(progress, index, error));
                }
            }

            // Idempotent registration: an existing config is reused, not
            // an error and not a second submission.
            if let LedgerOperation::RegisterConfig { asset, .. } = &planned.op {
                match self.ledger.registered_config(asset).await {
                    Ok(Some(handle)) => {
                        info!(
                            "Config for asset {} already registered at {}, reusing",
                            asset, handle
                        );
                        let slot = self.ledger.current_slot().await.unwrap_or(0);
                        progress.statuses[index] = OpStatus::Confirmed {
                            signature: None,
                            slot,
                            produced: Some(handle),
                        };
                        for state in &mut progress.batch_states {
                            *state = BatchState::Ready;
                        }
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Registration pre-check failed, submitting anyway: {}", e),
                }
            }

            // Settling gate, checked before submission. An operation whose
            // delay has not elapsed is not submitted at all; the ledger
            // would reject it.
            if let Some(units) = planned.min_elapsed_settling_units {
                let dep_slot = planned
                    .must_follow
                    .iter()
                    .filter_map(|&d| progress.statuses[d].confirmed_slot())
                    .max()
                    .unwrap_or(0);

                progress.state = SequenceState::Settling(index);
                if let LedgerOperation::ExtendBatch { batch_index, .. } = &planned.op {
                    progress.batch_states[*batch_index] = BatchState::Settling;
                }

                loop {
                    match self.ledger.current_slot().await {
                        Ok(current) if settling_elapsed(dep_slot, current, units) => break,
                        Ok(_) => {}
                        Err(e) => warn!("Slot poll failed while settling: {}", e),
                    }
                    if Instant::now() >= deadline {
                        let error = SequenceError::DeadlineExceeded { op_index: index };
                        return Err(fail(progress, index, error));
                    }
                    sleep(self.config.poll_interval).await;
                }
            }

            progress.state = SequenceState::Submitting(index);
            let handles = collect_handles(sequence, &progress);

            let mut attempt = 0;
            let submitted = loop {
                match self.ledger.submit(&planned.op, &handles).await {
                    Ok(submitted) => break submitted,
                    Err(LedgerError::Transient(message)) => {
                        attempt += 1;
                        if attempt >= self.config.max_retries {
                            let error = SequenceError::TransientFailure {
                                op_index: index,
                                attempts: attempt,
                                last_error: message,
                            };
                            return Err(fail(progress, index, error));
                        }
                        warn!(
                            "Submission of {} (op {}) failed, attempt {}: {}",
                            planned.op.kind(),
                            index,
                            attempt,
                            message
                        );
                        sleep(backoff_delay(
                            attempt - 1,
                            self.config.backoff_base,
                            self.config.backoff_cap,
                        ))
                        .await;
                    }
                    Err(LedgerError::Rejected(reason)) => {
                        error!(
                            "Ledger rejected {} (op {}): {}",
                            planned.op.kind(),
                            index,
                            reason
                        );
                        let error = SequenceError::Rejected {
                            op_index: index,
                            reason,
                        };
                        return Err(fail(progress, index, error));
                    }
                }
            };

            info!(
                "Submitted {} (op {}): {}",
                planned.op.kind(),
                index,
                submitted.signature
            );
            progress.statuses[index] = OpStatus::Submitted {
                signature: submitted.signature.clone(),
            };
            progress.state = SequenceState::AwaitingConfirmation(index);

            let slot = loop {
                match self
                    .ledger
                    .confirmation_slot(&submitted.signature, planned.op.commitment())
                    .await
                {
                    Ok(Some(slot)) => break slot,
                    Ok(None) => {}
                    Err(LedgerError::Transient(message)) => {
                        warn!("Confirmation poll failed: {}", message)
                    }
                    Err(LedgerError::Rejected(reason)) => {
                        let error = SequenceError::Rejected {
                            op_index: index,
                            reason,
                        };
                        return Err(fail(progress, index, error));
                    }
                }
                if Instant::now() >= deadline {
                    let error = SequenceError::DeadlineExceeded { op_index: index };
                    return Err(fail(progress, index, error));
                }
                sleep(self.config.poll_interval).await;
            };

            info!(
                "Confirmed {} (op {}) at slot {}",
                planned.op.kind(),
                index,
                slot
            );
            progress.statuses[index] = OpStatus::Confirmed {
                signature: Some(submitted.signature),
                slot,
                produced: submitted.produced,
            };

            match &planned.op {
                LedgerOperation::CreateBatch { batch_index } => {
                    progress.batch_states[*batch_index] = BatchState::Created;
                }
                LedgerOperation::ExtendBatch { batch_index, .. } => {
                    progress.batch_states[*batch_index] = BatchState::Extended;
                }
                LedgerOperation::RegisterConfig { .. } => {
                    for state in &mut progress.batch_states {
                        *state = BatchState::Ready;
                    }
                }
                _ => {}
            }
        }

        progress.state = SequenceState::Complete;
        Ok(progress)
    }
}

fn fail(
    mut progress: SequenceProgress,
    op_index: usize,
    error: SequenceError,
) -> SequenceFailure {
    progress.state = SequenceState::Failed {
        op_index,
        reason: error.to_string(),
    };
    SequenceFailure { progress, error }
}

/// Lookup-table handles confirmed so far, for operations that reference
/// batches by index.
fn collect_handles(sequence: &OperationSequence, progress: &SequenceProgress) -> BatchHandles {
    let mut handles = BatchHandles::new();
    for (index, planned) in sequence.ops.iter().enumerate() {
        if let LedgerOperation::CreateBatch { batch_index } = &planned.op {
            if let Some(handle) = progress.produced(index) {
                handles.insert(*batch_index, handle);
            }
        }
    }
    handles
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::batch::plan_batches;
    use crate::ledger::testutil::MockLedger;
    use crate::sequence::ops::{build_sequence, LaunchParams};
    use crate::split::{FeeSplitPlan, ResolvedRecipient};

    fn sequence_for(count: usize) -> OperationSequence {
        let recipients: Vec<ResolvedRecipient> = (0..count)
            .map(|_| ResolvedRecipient {
                address: Pubkey::new_unique(),
                share_bps: (10_000 / count) as u16,
            })
            .collect();
        let mut plan = FeeSplitPlan::new(Pubkey::new_unique(), recipients);
        let batch_plan = plan_batches(&plan.recipients);
        if batch_plan.required {
            plan.batch_plan = Some(batch_plan);
        }
        build_sequence(
            &plan,
            LaunchParams {
                initial_liquidity_lamports: 500_000_000,
                metadata_uri: "ipfs://QmMeta".to_string(),
            },
        )
    }

    fn fast_config() -> SequencerConfig {
        SequencerConfig {
            max_retries: 3,
            backoff_base: Duration::ZERO,
            backoff_cap: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
            deadline: Duration::from_secs(5),
        }
    }

    fn sequencer(ledger: &Arc<MockLedger>) -> Sequencer<MockLedger> {
        crate::ledger::testutil::init_tracing();
        Sequencer::new(ledger.clone(), fast_config())
    }

    #[tokio::test]
    async fn unbatched_sequence_completes_in_order() {
        let ledger = Arc::new(MockLedger::new());
        let sequence = sequence_for(3);

        let progress = sequencer(&ledger).run(&sequence).await.unwrap();

        assert_eq!(progress.state, SequenceState::Complete);
        assert!(progress.statuses.iter().all(|s| s.is_confirmed()));
        assert_eq!(
            ledger.submission_kinds(),
            vec!["register_config", "launch_asset"]
        );
    }

    #[tokio::test]
    async fn batched_sequence_completes_and_batches_become_ready() {
        let ledger = Arc::new(MockLedger::new());
        let sequence = sequence_for(40);

        let progress = sequencer(&ledger).run(&sequence).await.unwrap();

        assert_eq!(progress.state, SequenceState::Complete);
        assert_eq!(progress.batch_states, vec![BatchState::Ready; 2]);
        assert_eq!(
            ledger.submission_kinds(),
            vec![
                "create_batch",
                "create_batch",
                "extend_batch",
                "extend_batch",
                "register_config",
                "launch_asset"
            ]
        );
    }

    #[tokio::test]
    async fn extend_is_never_submitted_before_the_settling_delay() {
        let ledger = Arc::new(MockLedger::new());
        let sequence = sequence_for(40);

        sequencer(&ledger).run(&sequence).await.unwrap();

        // Every extend submission happened at a later slot than every
        // create submission: the settling gate forced at least one full
        // slot between a table's creation and its extension.
        let creates = ledger.submission_slots("create_batch");
        let extends = ledger.submission_slots("extend_batch");
        let latest_create = *creates.iter().max().unwrap();
        for slot in extends {
            assert!(slot > latest_create, "extend submitted before settling");
        }
    }

    #[tokio::test]
    async fn transient_submit_failures_are_retried() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_next_submissions(2);
        let sequence = sequence_for(3);

        let progress = sequencer(&ledger).run(&sequence).await.unwrap();
        assert_eq!(progress.state, SequenceState::Complete);
        // Two failed attempts plus the successful one, then the launch.
        assert_eq!(ledger.submission_attempts(), 4);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_op_index() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_next_submissions(10);
        let sequence = sequence_for(3);

        let failure = sequencer(&ledger).run(&sequence).await.unwrap_err();
        assert_eq!(
            failure.error,
            SequenceError::TransientFailure {
                op_index: 0,
                attempts: 3,
                last_error: "rpc unavailable".to_string()
            }
        );
        assert!(matches!(
            failure.progress.state,
            SequenceState::Failed { op_index: 0, .. }
        ));
    }

    #[tokio::test]
    async fn rejection_fails_fast_and_resume_continues_from_unconfirmed() {
        let ledger = Arc::new(MockLedger::new());
        ledger.reject_kind("launch_asset");
        let sequence = sequence_for(3);
        let sequencer = sequencer(&ledger);

        let failure = sequencer.run(&sequence).await.unwrap_err();
        assert!(matches!(
            failure.error,
            SequenceError::Rejected { op_index: 1, .. }
        ));
        let progress = failure.progress;
        assert_eq!(progress.first_unconfirmed(), Some(1));
        assert!(progress.statuses[0].is_confirmed());

        // Clear the rejection and resume: the registration is not
        // resubmitted, only the launch goes out again.
        ledger.clear_rejections();
        let resumed = sequencer.resume(&sequence, progress).await.unwrap();
        assert_eq!(resumed.state, SequenceState::Complete);
        assert_eq!(ledger.submissions_of("register_config"), 1);
        assert_eq!(ledger.submissions_of("launch_asset"), 2);
    }

    #[tokio::test]
    async fn reregistration_reuses_the_existing_handle() {
        let ledger = Arc::new(MockLedger::new());
        let sequence = sequence_for(3);
        let sequencer = sequencer(&ledger);

        let first = sequencer.run(&sequence).await.unwrap();
        let second = sequencer.run(&sequence).await.unwrap();

        let handle_of = |p: &SequenceProgress| {
            sequence
                .ops
                .iter()
                .position(|o| matches!(o.op, LedgerOperation::RegisterConfig { .. }))
                .and_then(|i| p.produced(i))
        };
        let first_handle = handle_of(&first).unwrap();
        let second_handle = handle_of(&second).unwrap();
        assert_eq!(first_handle, second_handle);
        // The second run never resubmitted the registration.
        assert_eq!(ledger.submissions_of("register_config"), 1);
    }

    #[tokio::test]
    async fn resume_reverifies_launch_finality() {
        let ledger = Arc::new(MockLedger::new());
        let sequence = sequence_for(3);
        let sequencer = sequencer(&ledger);

        let progress = sequencer.run(&sequence).await.unwrap();

        // Finality still holds: the re-check passes and nothing is
        // resubmitted.
        let resumed = sequencer.resume(&sequence, progress.clone()).await.unwrap();
        assert_eq!(resumed.state, SequenceState::Complete);
        assert_eq!(ledger.submissions_of("launch_asset"), 1);

        // The ledger no longer backs the recorded finality: the launch is
        // resubmitted, the confirmed registration is left alone.
        ledger.forget_finalized_once();
        let resumed = sequencer.resume(&sequence, progress).await.unwrap();
        assert_eq!(resumed.state, SequenceState::Complete);
        assert_eq!(ledger.submissions_of("launch_asset"), 2);
        assert_eq!(ledger.submissions_of("register_config"), 1);
    }

    #[tokio::test]
    async fn mismatched_progress_is_refused() {
        let ledger = Arc::new(MockLedger::new());
        let sequence = sequence_for(3);
        let other = sequence_for(3);
        let progress = SequenceProgress::new(&other);

        let failure = sequencer(&ledger)
            .resume(&sequence, progress)
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error,
            SequenceError::ProgressMismatch(_)
        ));
        assert_eq!(ledger.submission_attempts(), 0);
    }

    #[test]
    fn settling_arithmetic() {
        assert!(!settling_elapsed(100, 100, 1));
        assert!(settling_elapsed(100, 101, 1));
        assert!(!settling_elapsed(100, 101, 2));
        // Saturating at the top of the slot range rather than wrapping.
        assert!(settling_elapsed(u64::MAX, u64::MAX, 1));
    }

    #[tokio::test]
    async fn progress_round_trips_through_serde() {
        let ledger = Arc::new(MockLedger::new());
        let sequence = sequence_for(3);
        let progress = sequencer(&ledger).run(&sequence).await.unwrap();

        let json = serde_json::to_string(&progress).unwrap();
        let restored: SequenceProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.state, SequenceState::Complete);
        assert_eq!(restored.statuses, progress.statuses);
    }
}
