mod client;
mod solana;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{BatchHandles, LedgerClient, Submitted};
pub use solana::SolanaLedger;
