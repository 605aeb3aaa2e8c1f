use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use borsh::BorshSerialize;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_client::RpcClient;
use solana_client::rpc_request::RpcError;
use solana_sdk::address_lookup_table::instruction::{create_lookup_table, extend_lookup_table};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;
use tracing::info;

use crate::claims::{ClaimablePosition, PoolStage};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, LedgerError};
use crate::ledger::client::{BatchHandles, LedgerClient, Submitted};
use crate::sequence::{CommitmentTier, LedgerOperation};

// PDA seeds of the fee-router program
const FEE_CONFIG_SEED: &[u8] = b"fee_config";
const PARTNER_SEED: &[u8] = b"partner";
const POSITION_SEED: &[u8] = b"position";

// Instruction discriminators
const IX_REGISTER_CONFIG: u8 = 0;
const IX_LAUNCH_ASSET: u8 = 1;
const IX_CLAIM_FEES: u8 = 2;

#[derive(BorshSerialize)]
struct RecipientEntry {
    address: Pubkey,
    share_bps: u16,
}

#[derive(BorshSerialize)]
struct RegisterConfigData {
    recipients: Vec<RecipientEntry>,
    partner_config: Option<Pubkey>,
    /// Lookup-table handles replacing inline addresses when batched.
    address_batches: Vec<Pubkey>,
}

#[derive(BorshSerialize)]
struct LaunchAssetData {
    initial_liquidity_lamports: u64,
    metadata_uri: String,
}

#[derive(BorshSerialize)]
struct ClaimFeesData {
    source_pool: u8,
    amount: u64,
}

/// RPC-backed ledger client. Holds the signing keypair for exactly one
/// sequence's worth of submissions; spin up one per concurrent registration.
pub struct SolanaLedger {
    client: RpcClient,
    payer: Arc<Keypair>,
    fee_program_id: Pubkey,
    launch_program_id: Pubkey,
}

impl SolanaLedger {
    pub fn new(config: &EngineConfig, payer: Arc<Keypair>) -> EngineResult<Self> {
        let fee_program_id = Pubkey::from_str(&config.fee_program_id)
            .map_err(|_| EngineError::Config(format!("bad fee program id: {}", config.fee_program_id)))?;
        let launch_program_id = Pubkey::from_str(&config.launch_program_id).map_err(|_| {
            EngineError::Config(format!("bad launch program id: {}", config.launch_program_id))
        })?;
        let client =
            RpcClient::new_with_commitment(config.rpc_url.clone(), CommitmentConfig::confirmed());

        Ok(Self {
            client,
            payer,
            fee_program_id,
            launch_program_id,
        })
    }

    pub fn config_address(&self, asset: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[FEE_CONFIG_SEED, asset.as_ref()], &self.fee_program_id).0
    }

    fn partner_address(&self, partner: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[PARTNER_SEED, partner.as_ref()], &self.fee_program_id).0
    }

    fn position_address(&self, asset: &Pubkey, pool: PoolStage) -> Pubkey {
        let stage: &[u8] = match pool {
            PoolStage::PreGraduation => b"pre",
            PoolStage::PostGraduation => b"post",
        };
        Pubkey::find_program_address(&[POSITION_SEED, asset.as_ref(), stage], &self.fee_program_id)
            .0
    }

    fn sign_and_send(&self, instructions: &[Instruction]) -> Result<Signature, LedgerError> {
        let blockhash = self.client.get_latest_blockhash().map_err(classify)?;
        let message = Message::new(instructions, Some(&self.payer.pubkey()));
        let transaction = Transaction::new(&[&*self.payer], message, blockhash);
        self.client.send_transaction(&transaction).map_err(classify)
    }

    fn encode(discriminator: u8, payload: impl BorshSerialize) -> Result<Vec<u8>, LedgerError> {
        let mut data = vec![discriminator];
        let bytes = borsh::to_vec(&payload)
            .map_err(|e| LedgerError::Rejected(format!("instruction encoding failed: {}", e)))?;
        data.extend_from_slice(&bytes);
        Ok(data)
    }

    fn account(&self, address: &Pubkey) -> Result<Option<solana_sdk::account::Account>, LedgerError> {
        self.client
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .map(|response| response.value)
            .map_err(classify)
    }
}

fn classify(error: ClientError) -> LedgerError {
    match error.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError { .. }) => {
            LedgerError::Rejected(error.to_string())
        }
        ClientErrorKind::TransactionError(_) => LedgerError::Rejected(error.to_string()),
        _ => LedgerError::Transient(error.to_string()),
    }
}

#[async_trait]
impl LedgerClient for SolanaLedger {
    async fn submit(
        &self,
        op: &LedgerOperation,
        handles: &BatchHandles,
    ) -> Result<Submitted, LedgerError> {
        let authority = self.payer.pubkey();

        let (instruction, produced) = match op {
            LedgerOperation::CreateBatch { batch_index } => {
                let recent_slot = self
                    .client
                    .get_slot_with_commitment(CommitmentConfig::confirmed())
                    .map_err(classify)?;
                let (instruction, table_address) =
                    create_lookup_table(authority, authority, recent_slot);
                info!(
                    "Creating lookup table {} for batch {}",
                    table_address, batch_index
                );
                (instruction, Some(table_address))
            }

            LedgerOperation::ExtendBatch {
                batch_index,
                addresses,
            } => {
                let table_address = handles.get(batch_index).copied().ok_or_else(|| {
                    LedgerError::Rejected(format!("no lookup table handle for batch {}", batch_index))
                })?;
                let instruction = extend_lookup_table(
                    table_address,
                    authority,
                    Some(authority),
                    addresses.clone(),
                );
                (instruction, None)
            }

            LedgerOperation::RegisterConfig {
                asset,
                recipients,
                partner_config,
                batched,
            } => {
                let config_address = self.config_address(asset);
                let mut batch_keys: Vec<(usize, Pubkey)> =
                    handles.iter().map(|(i, k)| (*i, *k)).collect();
                batch_keys.sort_by_key(|(i, _)| *i);

                let data = Self::encode(
                    IX_REGISTER_CONFIG,
                    RegisterConfigData {
                        recipients: recipients
                            .iter()
                            .map(|r| RecipientEntry {
                                address: r.address,
                                share_bps: r.share_bps,
                            })
                            .collect(),
                        partner_config: *partner_config,
                        address_batches: if *batched {
                            batch_keys.into_iter().map(|(_, k)| k).collect()
                        } else {
                            Vec::new()
                        },
                    },
                )?;

                let instruction = Instruction {
                    program_id: self.fee_program_id,
                    accounts: vec![
                        AccountMeta::new(authority, true),
                        AccountMeta::new(config_address, false),
                        AccountMeta::new_readonly(*asset, false),
                        AccountMeta::new_readonly(system_program::id(), false),
                    ],
                    data,
                };
                (instruction, Some(config_address))
            }

            LedgerOperation::LaunchAsset { asset, params } => {
                let config_address = self.config_address(asset);
                let data = Self::encode(
                    IX_LAUNCH_ASSET,
                    LaunchAssetData {
                        initial_liquidity_lamports: params.initial_liquidity_lamports,
                        metadata_uri: params.metadata_uri.clone(),
                    },
                )?;
                let instruction = Instruction {
                    program_id: self.launch_program_id,
                    accounts: vec![
                        AccountMeta::new(authority, true),
                        AccountMeta::new(*asset, false),
                        AccountMeta::new_readonly(config_address, false),
                        AccountMeta::new_readonly(system_program::id(), false),
                    ],
                    data,
                };
                (instruction, None)
            }

            LedgerOperation::ClaimFees { position } => {
                let config_address = self.config_address(&position.asset);
                let position_address = self.position_address(&position.asset, position.source_pool);
                let data = Self::encode(
                    IX_CLAIM_FEES,
                    ClaimFeesData {
                        source_pool: position.source_pool as u8,
                        amount: position.amount,
                    },
                )?;
                let instruction = Instruction {
                    program_id: self.fee_program_id,
                    accounts: vec![
                        AccountMeta::new(authority, true),
                        AccountMeta::new(config_address, false),
                        AccountMeta::new(position_address, false),
                    ],
                    data,
                };
                (instruction, None)
            }
        };

        let signature = self.sign_and_send(&[instruction])?;
        Ok(Submitted {
            signature: signature.to_string(),
            produced,
        })
    }

    async fn confirmation_slot(
        &self,
        signature: &str,
        tier: CommitmentTier,
    ) -> Result<Option<u64>, LedgerError> {
        let signature = Signature::from_str(signature)
            .map_err(|_| LedgerError::Rejected(format!("invalid signature: {}", signature)))?;

        let statuses = self
            .client
            .get_signature_statuses(&[signature])
            .map_err(classify)?;

        let Some(Some(status)) = statuses.value.into_iter().next() else {
            return Ok(None);
        };

        if let Some(err) = status.err {
            return Err(LedgerError::Rejected(format!("{:?}", err)));
        }

        let commitment = match tier {
            CommitmentTier::Confirmed => CommitmentConfig::confirmed(),
            CommitmentTier::Finalized => CommitmentConfig::finalized(),
        };
        if status.satisfies_commitment(commitment) {
            Ok(Some(status.slot))
        } else {
            Ok(None)
        }
    }

    async fn current_slot(&self) -> Result<u64, LedgerError> {
        self.client
            .get_slot_with_commitment(CommitmentConfig::confirmed())
            .map_err(classify)
    }

    async fn registered_config(&self, asset: &Pubkey) -> Result<Option<Pubkey>, LedgerError> {
        let config_address = self.config_address(asset);
        Ok(self.account(&config_address)?.map(|_| config_address))
    }

    async fn partner_registration(&self, partner: &Pubkey) -> Result<Option<Pubkey>, LedgerError> {
        let partner_address = self.partner_address(partner);
        Ok(self.account(&partner_address)?.map(|_| partner_address))
    }

    async fn claimable_positions(
        &self,
        asset: &Pubkey,
    ) -> Result<Vec<ClaimablePosition>, LedgerError> {
        let mut positions = Vec::new();
        for pool in [PoolStage::PreGraduation, PoolStage::PostGraduation] {
            let address = self.position_address(asset, pool);
            let Some(account) = self.account(&address)? else {
                continue;
            };
            // Position layout: 8-byte discriminator, u64 claimable amount.
            if account.data.len() < 16 {
                continue;
            }
            let amount = u64::from_le_bytes(
                account.data[8..16]
                    .try_into()
                    .map_err(|_| LedgerError::Rejected("malformed position account".to_string()))?,
            );
            if amount > 0 {
                positions.push(ClaimablePosition {
                    asset: *asset,
                    source_pool: pool,
                    amount,
                });
            }
        }
        Ok(positions)
    }
}
