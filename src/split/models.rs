use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::batch::BatchPlan;

/// Directory providers a recipient identity can be keyed under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Twitter,
    Discord,
    Telegram,
    Github,
}

impl std::fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SocialProvider::Twitter => "twitter",
            SocialProvider::Discord => "discord",
            SocialProvider::Telegram => "telegram",
            SocialProvider::Github => "github",
        };
        f.write_str(name)
    }
}

/// A recipient as supplied by the caller: either a raw wallet address or a
/// social identity the directory resolves to one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecipientIdentity {
    Address(Pubkey),
    Social {
        provider: SocialProvider,
        username: String,
    },
}

impl RecipientIdentity {
    /// Canonical key used for duplicate detection before resolution.
    /// Usernames compare case-insensitively, matching the directory.
    pub fn dedup_key(&self) -> String {
        match self {
            RecipientIdentity::Address(address) => format!("address:{}", address),
            RecipientIdentity::Social { provider, username } => {
                format!("{}:{}", provider, username.to_lowercase())
            }
        }
    }
}

impl std::fmt::Display for RecipientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientIdentity::Address(address) => write!(f, "{}", address),
            RecipientIdentity::Social { provider, username } => {
                write!(f, "{}/{}", provider, username)
            }
        }
    }
}

/// One requested fee recipient, unresolved until passed through the resolver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeRecipientRequest {
    pub identity: RecipientIdentity,
    pub share_bps: u16,
}

impl FeeRecipientRequest {
    pub fn address(address: Pubkey, share_bps: u16) -> Self {
        Self {
            identity: RecipientIdentity::Address(address),
            share_bps,
        }
    }

    pub fn social(provider: SocialProvider, username: impl Into<String>, share_bps: u16) -> Self {
        Self {
            identity: RecipientIdentity::Social {
                provider,
                username: username.into(),
            },
            share_bps,
        }
    }
}

/// A recipient after resolution. Immutable thereafter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedRecipient {
    pub address: Pubkey,
    pub share_bps: u16,
}

/// A platform operator's fixed skim, taken from gross fees before the
/// recipient split divides the remainder. Lives outside the 10_000-bps
/// budget of the recipients; the two are additive in effect only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartnerOverlay {
    pub partner_address: Pubkey,
    /// Handle of the pre-existing partner registration on the ledger.
    pub partner_config: Pubkey,
    pub share_bps: u16,
}

/// A validated, resolved fee split for one asset. Immutable once registered
/// on the ledger; the engine only ever produces new plans for new assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSplitPlan {
    pub asset: Pubkey,
    pub recipients: Vec<ResolvedRecipient>,
    pub partner_overlay: Option<PartnerOverlay>,
    pub batch_plan: Option<BatchPlan>,
}

impl FeeSplitPlan {
    pub fn new(asset: Pubkey, recipients: Vec<ResolvedRecipient>) -> Self {
        Self {
            asset,
            recipients,
            partner_overlay: None,
            batch_plan: None,
        }
    }

    /// Addresses in recipient order, as handed to the batch planner.
    pub fn addresses(&self) -> Vec<Pubkey> {
        self.recipients.iter().map(|r| r.address).collect()
    }
}
