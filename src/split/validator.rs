use std::collections::HashSet;

use crate::constants::{BPS_DENOMINATOR, MAX_RECIPIENTS, MIN_RECIPIENTS};
use crate::error::SplitError;
use crate::split::models::FeeRecipientRequest;

/// Validate a requested split. Checks run in a fixed order and the first
/// failure wins. Pure and deterministic; performs no I/O.
///
/// There is no implicit "creator gets the rest": every recipient, the
/// creator included, must carry an explicit share and the shares must total
/// exactly 10_000 bps.
pub fn validate_split(requests: &[FeeRecipientRequest]) -> Result<(), SplitError> {
    check_count(requests)?;
    check_duplicates(requests)?;
    check_total(requests)?;
    check_shares(requests)?;
    Ok(())
}

/// Full-diagnostics variant: reports every violation instead of stopping at
/// the first, in the same order `validate_split` checks them.
pub fn validate_split_full(requests: &[FeeRecipientRequest]) -> Vec<SplitError> {
    let mut violations = Vec::new();
    if let Err(e) = check_count(requests) {
        violations.push(e);
    }
    if let Err(e) = check_duplicates(requests) {
        violations.push(e);
    }
    if let Err(e) = check_total(requests) {
        violations.push(e);
    }
    for (index, request) in requests.iter().enumerate() {
        if request.share_bps == 0 {
            violations.push(SplitError::ZeroShare { index });
        }
    }
    violations
}

fn check_count(requests: &[FeeRecipientRequest]) -> Result<(), SplitError> {
    if requests.len() < MIN_RECIPIENTS {
        return Err(SplitError::NoRecipients);
    }
    if requests.len() > MAX_RECIPIENTS {
        return Err(SplitError::TooManyRecipients {
            count: requests.len(),
            max: MAX_RECIPIENTS,
        });
    }
    Ok(())
}

fn check_duplicates(requests: &[FeeRecipientRequest]) -> Result<(), SplitError> {
    let mut seen = HashSet::new();
    for request in requests {
        let key = request.identity.dedup_key();
        if !seen.insert(key) {
            return Err(SplitError::DuplicateIdentity(request.identity.to_string()));
        }
    }
    Ok(())
}

fn check_total(requests: &[FeeRecipientRequest]) -> Result<(), SplitError> {
    // u16 * 100 entries cannot overflow u32
    let total_bps: u32 = requests.iter().map(|r| r.share_bps as u32).sum();
    if total_bps != BPS_DENOMINATOR as u32 {
        return Err(SplitError::InvalidSplit { total_bps });
    }
    Ok(())
}

fn check_shares(requests: &[FeeRecipientRequest]) -> Result<(), SplitError> {
    for (index, request) in requests.iter().enumerate() {
        if request.share_bps == 0 {
            return Err(SplitError::ZeroShare { index });
        }
    }
    Ok(())
}
