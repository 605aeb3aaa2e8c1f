use std::time::Duration;

use serde::Deserialize;

/// Process-level engine configuration, read from the environment.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub rpc_url: String,
    pub directory_url: String,
    pub fee_program_id: String,
    pub launch_program_id: String,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            rpc_url: std::env::var("SPLITFLOW_RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string()),
            directory_url: std::env::var("SPLITFLOW_DIRECTORY_URL")
                .unwrap_or_else(|_| "https://directory.splitflow.io".to_string()),
            fee_program_id: std::env::var("SPLITFLOW_FEE_PROGRAM_ID")
                .unwrap_or_else(|_| "FEEsp1itCfgv1111111111111111111111111111111".to_string()),
            launch_program_id: std::env::var("SPLITFLOW_LAUNCH_PROGRAM_ID")
                .unwrap_or_else(|_| "LNCHasset11111111111111111111111111111111111".to_string()),
        })
    }
}

/// Per-sequence execution knobs. One value per `Sequencer` instance; nothing
/// here is shared across concurrent sequences.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Submission attempts per operation before surfacing `TransientFailure`.
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,
    /// Backoff is capped here regardless of attempt count.
    pub backoff_cap: Duration,
    /// How often confirmation and settling status are polled.
    pub poll_interval: Duration,
    /// Overall wall-clock budget for one run or resume.
    pub deadline: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(8),
            poll_interval: Duration::from_millis(500),
            deadline: Duration::from_secs(180),
        }
    }
}
