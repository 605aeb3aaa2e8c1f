//! In-memory ledger double shared by the executor, overlay, claim, and
//! engine tests. Confirms everything instantly; the slot advances one unit
//! per `current_slot` poll so settling waits terminate.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;

use crate::claims::ClaimablePosition;
use crate::error::LedgerError;
use crate::ledger::client::{BatchHandles, LedgerClient, Submitted};
use crate::sequence::{CommitmentTier, LedgerOperation};

/// Install the fmt subscriber once per test binary so `RUST_LOG` controls
/// log output from the code under test.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) struct SubmissionRecord {
    pub kind: &'static str,
    pub slot: u64,
}

pub(crate) struct MockLedger {
    slot: AtomicU64,
    attempts: AtomicUsize,
    next_signature: AtomicU64,
    config_handle: Pubkey,
    submissions: Mutex<Vec<SubmissionRecord>>,
    transient_remaining: AtomicUsize,
    finality_lapse: AtomicBool,
    rejected_kinds: Mutex<HashSet<&'static str>>,
    failing_claim_amounts: Mutex<HashSet<u64>>,
    existing_config: Mutex<Option<Pubkey>>,
    partners: Mutex<HashMap<Pubkey, Pubkey>>,
    positions: Mutex<Vec<ClaimablePosition>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            slot: AtomicU64::new(100),
            attempts: AtomicUsize::new(0),
            next_signature: AtomicU64::new(0),
            config_handle: Pubkey::new_unique(),
            submissions: Mutex::new(Vec::new()),
            transient_remaining: AtomicUsize::new(0),
            finality_lapse: AtomicBool::new(false),
            rejected_kinds: Mutex::new(HashSet::new()),
            failing_claim_amounts: Mutex::new(HashSet::new()),
            existing_config: Mutex::new(None),
            partners: Mutex::new(HashMap::new()),
            positions: Mutex::new(Vec::new()),
        }
    }

    pub fn register_partner(&self, partner: Pubkey, handle: Pubkey) {
        self.partners.lock().insert(partner, handle);
    }

    pub fn seed_positions(&self, positions: Vec<ClaimablePosition>) {
        *self.positions.lock() = positions;
    }

    /// The next `count` submissions fail with a transient error.
    pub fn fail_next_submissions(&self, count: usize) {
        self.transient_remaining.store(count, Ordering::SeqCst);
    }

    /// Submissions of this op kind are semantically rejected.
    pub fn reject_kind(&self, kind: &'static str) {
        self.rejected_kinds.lock().insert(kind);
    }

    pub fn clear_rejections(&self) {
        self.rejected_kinds.lock().clear();
    }

    /// The next finalized-tier status query answers "not finalized", as
    /// when the ledger's history no longer backs a recorded confirmation.
    pub fn forget_finalized_once(&self) {
        self.finality_lapse.store(true, Ordering::SeqCst);
    }

    /// Claims for positions with this amount are rejected.
    pub fn fail_claims_with_amount(&self, amount: u64) {
        self.failing_claim_amounts.lock().insert(amount);
    }

    /// Submissions of one kind that reached the ledger, rejected included.
    pub fn submissions_of(&self, kind: &str) -> usize {
        self.submissions.lock().iter().filter(|s| s.kind == kind).count()
    }

    pub fn submission_kinds(&self) -> Vec<&'static str> {
        self.submissions.lock().iter().map(|s| s.kind).collect()
    }

    pub fn submission_slots(&self, kind: &str) -> Vec<u64> {
        self.submissions
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.slot)
            .collect()
    }

    /// Every submit call, including failed attempts.
    pub fn submission_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit(
        &self,
        op: &LedgerOperation,
        _handles: &BatchHandles,
    ) -> Result<Submitted, LedgerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        loop {
            let remaining = self.transient_remaining.load(Ordering::SeqCst);
            if remaining == 0 {
                break;
            }
            if self
                .transient_remaining
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Err(LedgerError::Transient("rpc unavailable".to_string()));
            }
        }

        // A rejection still counts as a submission: the ledger received the
        // transaction and refused it. Transient failures never reach it.
        self.submissions.lock().push(SubmissionRecord {
            kind: op.kind(),
            slot: self.slot.load(Ordering::SeqCst),
        });

        if self.rejected_kinds.lock().contains(op.kind()) {
            return Err(LedgerError::Rejected("insufficient funds for fee".to_string()));
        }

        if let LedgerOperation::ClaimFees { position } = op {
            if self.failing_claim_amounts.lock().contains(&position.amount) {
                return Err(LedgerError::Rejected("pool vault is empty".to_string()));
            }
        }

        let produced = match op {
            LedgerOperation::CreateBatch { .. } => Some(Pubkey::new_unique()),
            LedgerOperation::RegisterConfig { .. } => {
                *self.existing_config.lock() = Some(self.config_handle);
                Some(self.config_handle)
            }
            _ => None,
        };

        let n = self.next_signature.fetch_add(1, Ordering::SeqCst);
        Ok(Submitted {
            signature: format!("mock-signature-{}", n),
            produced,
        })
    }

    async fn confirmation_slot(
        &self,
        _signature: &str,
        tier: CommitmentTier,
    ) -> Result<Option<u64>, LedgerError> {
        if tier == CommitmentTier::Finalized && self.finality_lapse.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.slot.load(Ordering::SeqCst)))
    }

    async fn current_slot(&self) -> Result<u64, LedgerError> {
        Ok(self.slot.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn registered_config(&self, _asset: &Pubkey) -> Result<Option<Pubkey>, LedgerError> {
        Ok(*self.existing_config.lock())
    }

    async fn partner_registration(&self, partner: &Pubkey) -> Result<Option<Pubkey>, LedgerError> {
        Ok(self.partners.lock().get(partner).copied())
    }

    async fn claimable_positions(
        &self,
        asset: &Pubkey,
    ) -> Result<Vec<ClaimablePosition>, LedgerError> {
        Ok(self
            .positions
            .lock()
            .iter()
            .filter(|p| p.asset == *asset)
            .copied()
            .collect())
    }
}
