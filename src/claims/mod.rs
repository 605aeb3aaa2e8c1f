use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::config::SequencerConfig;
use crate::error::LedgerError;
use crate::ledger::{BatchHandles, LedgerClient};
use crate::retry::backoff_delay;
use crate::sequence::LedgerOperation;

/// Pool a claimable fee position accrued in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PoolStage {
    PreGraduation = 0,
    PostGraduation = 1,
}

/// A read-only snapshot of fees waiting to be claimed. Owned by the ledger,
/// only consumed here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimablePosition {
    pub asset: Pubkey,
    pub source_pool: PoolStage,
    pub amount: u64,
}

/// Outcome for one position. Failures carry the reason; they never abort
/// the remaining positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub position: ClaimablePosition,
    pub signature: Option<String>,
    pub error: Option<String>,
}

impl ClaimOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimReport {
    pub outcomes: Vec<ClaimOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub completed_at: DateTime<Utc>,
}

/// Claim every given position, isolating failures per position.
pub async fn claim_positions<L: LedgerClient + ?Sized>(
    ledger: &L,
    positions: &[ClaimablePosition],
    config: &SequencerConfig,
) -> ClaimReport {
    let mut outcomes = Vec::with_capacity(positions.len());

    for position in positions {
        match claim_one(ledger, position, config).await {
            Ok(signature) => {
                info!(
                    "Claimed {} from {:?} pool of asset {}",
                    position.amount, position.source_pool, position.asset
                );
                outcomes.push(ClaimOutcome {
                    position: *position,
                    signature: Some(signature),
                    error: None,
                });
            }
            Err(error) => {
                warn!(
                    "Claim failed for {:?} pool of asset {}: {}",
                    position.source_pool, position.asset, error
                );
                outcomes.push(ClaimOutcome {
                    position: *position,
                    signature: None,
                    error: Some(error.to_string()),
                });
            }
        }
    }

    let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
    ClaimReport {
        failed: outcomes.len() - succeeded,
        succeeded,
        outcomes,
        completed_at: Utc::now(),
    }
}

/// Enumerate an asset's claimable positions, then claim them all.
pub async fn claim_all_for_asset<L: LedgerClient + ?Sized>(
    ledger: &L,
    asset: &Pubkey,
    config: &SequencerConfig,
) -> Result<ClaimReport, LedgerError> {
    let positions = ledger.claimable_positions(asset).await?;
    Ok(claim_positions(ledger, &positions, config).await)
}

async fn claim_one<L: LedgerClient + ?Sized>(
    ledger: &L,
    position: &ClaimablePosition,
    config: &SequencerConfig,
) -> Result<String, LedgerError> {
    let op = LedgerOperation::ClaimFees {
        position: *position,
    };
    let handles = BatchHandles::new();

    let mut attempt = 0;
    let submitted = loop {
        match ledger.submit(&op, &handles).await {
            Ok(submitted) => break submitted,
            Err(LedgerError::Transient(message)) => {
                attempt += 1;
                if attempt >= config.max_retries {
                    return Err(LedgerError::Transient(message));
                }
                sleep(backoff_delay(
                    attempt - 1,
                    config.backoff_base,
                    config.backoff_cap,
                ))
                .await;
            }
            Err(rejected) => return Err(rejected),
        }
    };

    let deadline = Instant::now() + config.deadline;
    loop {
        match ledger
            .confirmation_slot(&submitted.signature, op.commitment())
            .await
        {
            Ok(Some(_)) => return Ok(submitted.signature),
            Ok(None) => {}
            Err(LedgerError::Transient(message)) => {
                warn!("Claim confirmation poll failed: {}", message)
            }
            Err(rejected) => return Err(rejected),
        }
        if Instant::now() >= deadline {
            return Err(LedgerError::Transient(
                "claim confirmation deadline exceeded".to_string(),
            ));
        }
        sleep(config.poll_interval).await;
    }
}
