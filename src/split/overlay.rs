use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::constants::BPS_DENOMINATOR;
use crate::error::{EngineResult, SplitError};
use crate::ledger::LedgerClient;
use crate::split::models::{FeeSplitPlan, PartnerOverlay};

/// Attach a platform partner's fixed skim to a plan.
///
/// The overlay references a pre-existing partner registration, keyed
/// one-to-one by partner address; an operator wanting several independent
/// overlays uses several addresses. The overlay's share is computed against
/// gross fees at claim time and never touches `recipients[].share_bps` or
/// their 10_000-bps budget.
///
/// Overlay presence is decided at registration time. There is no way to
/// retrofit one onto an asset already registered without it, which is why
/// this takes the plan before the sequence is built.
pub async fn attach_partner_overlay<L: LedgerClient + ?Sized>(
    plan: &mut FeeSplitPlan,
    partner_address: Pubkey,
    share_bps: u16,
    ledger: &L,
) -> EngineResult<()> {
    if share_bps == 0 || share_bps > BPS_DENOMINATOR {
        return Err(SplitError::OverlayShareOutOfRange { share_bps }.into());
    }

    let partner_config = ledger
        .partner_registration(&partner_address)
        .await?
        .ok_or(SplitError::PartnerNotRegistered(partner_address))?;

    info!(
        "Attaching partner overlay {} ({} bps) to asset {}",
        partner_address, share_bps, plan.asset
    );

    plan.partner_overlay = Some(PartnerOverlay {
        partner_address,
        partner_config,
        share_bps,
    });

    Ok(())
}
