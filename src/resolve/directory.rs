use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

use crate::config::EngineConfig;
use crate::error::ResolveError;
use crate::split::SocialProvider;

/// Lookup seam against the external identity directory.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// `Ok(None)` is a definitive "not linked" answer and must not be
    /// retried; `Err` is transport-level and may be.
    async fn lookup(
        &self,
        provider: SocialProvider,
        username: &str,
    ) -> Result<Option<Pubkey>, ResolveError>;
}

/// Production directory client speaking the directory's HTTP API.
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LinkResponse {
    wallet: String,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.directory_url.clone())
    }
}

#[async_trait]
impl IdentityDirectory for HttpDirectory {
    async fn lookup(
        &self,
        provider: SocialProvider,
        username: &str,
    ) -> Result<Option<Pubkey>, ResolveError> {
        let url = format!(
            "{}/v1/links/{}/{}",
            self.base_url.trim_end_matches('/'),
            provider,
            username
        );

        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ResolveError::Directory(format!(
                "directory returned {} for {}/{}",
                response.status(),
                provider,
                username
            )));
        }

        let link: LinkResponse = response.json().await?;
        let address = Pubkey::from_str(&link.wallet).map_err(|_| {
            ResolveError::Directory(format!(
                "directory returned malformed wallet for {}/{}",
                provider, username
            ))
        })?;

        Ok(Some(address))
    }
}
