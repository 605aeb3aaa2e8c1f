use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::resolve::directory::IdentityDirectory;
use crate::retry::backoff_delay;
use crate::split::{FeeRecipientRequest, RecipientIdentity, ResolvedRecipient, SocialProvider};

/// Resolves recipient identities to wallet addresses.
///
/// Address identities pass through untouched. Social identities go to the
/// directory, concurrently across recipients since there is no inter-item
/// ordering. Successful resolutions are cached for the life of the resolver;
/// "not linked" answers are never cached since the user may link later.
pub struct IdentityResolver<D> {
    directory: D,
    cache: Mutex<HashMap<(SocialProvider, String), Pubkey>>,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl<D: IdentityDirectory> IdentityResolver<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            cache: Mutex::new(HashMap::new()),
            max_attempts: 3,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(4),
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, base: Duration, cap: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Resolve every request, preserving order, then re-check for duplicate
    /// addresses across the whole set: two distinct identities resolving to
    /// one wallet is a caller error, not something to merge silently.
    pub async fn resolve_all(
        &self,
        requests: &[FeeRecipientRequest],
    ) -> Result<Vec<ResolvedRecipient>, ResolveError> {
        let lookups = requests.iter().map(|request| self.resolve_one(request));
        let resolved = futures::future::try_join_all(lookups).await?;

        let mut seen = HashSet::new();
        for recipient in &resolved {
            if !seen.insert(recipient.address) {
                return Err(ResolveError::DuplicateRecipient(recipient.address));
            }
        }

        Ok(resolved)
    }

    async fn resolve_one(
        &self,
        request: &FeeRecipientRequest,
    ) -> Result<ResolvedRecipient, ResolveError> {
        let address = match &request.identity {
            RecipientIdentity::Address(address) => *address,
            RecipientIdentity::Social { provider, username } => {
                self.resolve_social(*provider, username).await?
            }
        };
        Ok(ResolvedRecipient {
            address,
            share_bps: request.share_bps,
        })
    }

    async fn resolve_social(
        &self,
        provider: SocialProvider,
        username: &str,
    ) -> Result<Pubkey, ResolveError> {
        let key = (provider, username.to_lowercase());
        let cached = self.cache.lock().get(&key).copied();
        if let Some(address) = cached {
            debug!("Resolved {}/{} from cache", provider, username);
            return Ok(address);
        }

        let mut attempt = 0;
        loop {
            match self.directory.lookup(provider, username).await {
                Ok(Some(address)) => {
                    self.cache.lock().insert(key, address);
                    return Ok(address);
                }
                Ok(None) => {
                    // Directory fact; retrying cannot change it.
                    return Err(ResolveError::UnlinkedIdentity {
                        provider,
                        username: username.to_string(),
                    });
                }
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(error);
                    }
                    warn!(
                        "Directory lookup for {}/{} failed (attempt {}): {}",
                        provider, username, attempt, error
                    );
                    tokio::time::sleep(backoff_delay(
                        attempt - 1,
                        self.backoff_base,
                        self.backoff_cap,
                    ))
                    .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct MockDirectory {
        links: HashMap<(SocialProvider, String), Pubkey>,
        failures: Mutex<VecDeque<ResolveError>>,
        lookups: AtomicUsize,
    }

    impl MockDirectory {
        fn link(mut self, provider: SocialProvider, username: &str, address: Pubkey) -> Self {
            self.links.insert((provider, username.to_string()), address);
            self
        }

        fn failing_first(self, count: usize) -> Self {
            let mut queue = VecDeque::new();
            for _ in 0..count {
                queue.push_back(ResolveError::Directory("connection reset".to_string()));
            }
            *self.failures.lock() = queue;
            self
        }
    }

    #[async_trait]
    impl IdentityDirectory for MockDirectory {
        async fn lookup(
            &self,
            provider: SocialProvider,
            username: &str,
        ) -> Result<Option<Pubkey>, ResolveError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.failures.lock().pop_front() {
                return Err(error);
            }
            Ok(self
                .links
                .get(&(provider, username.to_string()))
                .copied())
        }
    }

    fn fast_resolver(directory: MockDirectory) -> IdentityResolver<MockDirectory> {
        IdentityResolver::new(directory).with_retry(3, Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn passes_addresses_through_and_resolves_socials() {
        let wallet = Pubkey::new_unique();
        let linked = Pubkey::new_unique();
        let resolver = fast_resolver(
            MockDirectory::default().link(SocialProvider::Twitter, "alice", linked),
        );

        let requests = vec![
            FeeRecipientRequest::address(wallet, 6000),
            FeeRecipientRequest::social(SocialProvider::Twitter, "alice", 4000),
        ];
        let resolved = resolver.resolve_all(&requests).await.unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].address, wallet);
        assert_eq!(resolved[0].share_bps, 6000);
        assert_eq!(resolved[1].address, linked);
        assert_eq!(resolved[1].share_bps, 4000);
    }

    #[tokio::test]
    async fn unlinked_identity_is_terminal_and_not_retried() {
        let resolver = fast_resolver(MockDirectory::default());
        let requests = vec![FeeRecipientRequest::social(
            SocialProvider::Discord,
            "ghost",
            10_000,
        )];

        let err = resolver.resolve_all(&requests).await.unwrap_err();
        assert!(matches!(err, ResolveError::UnlinkedIdentity { .. }));
        assert_eq!(resolver.directory.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_directory_failures_are_retried() {
        let linked = Pubkey::new_unique();
        let directory = MockDirectory::default()
            .link(SocialProvider::Github, "bob", linked)
            .failing_first(2);
        let resolver = fast_resolver(directory);

        let requests = vec![FeeRecipientRequest::social(
            SocialProvider::Github,
            "bob",
            10_000,
        )];
        let resolved = resolver.resolve_all(&requests).await.unwrap();
        assert_eq!(resolved[0].address, linked);
        assert_eq!(resolver.directory.lookups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_directory_error() {
        let directory = MockDirectory::default()
            .link(SocialProvider::Github, "bob", Pubkey::new_unique())
            .failing_first(5);
        let resolver = fast_resolver(directory);

        let requests = vec![FeeRecipientRequest::social(
            SocialProvider::Github,
            "bob",
            10_000,
        )];
        let err = resolver.resolve_all(&requests).await.unwrap_err();
        assert!(matches!(err, ResolveError::Directory(_)));
        assert_eq!(resolver.directory.lookups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn distinct_identities_sharing_a_wallet_are_rejected() {
        let shared = Pubkey::new_unique();
        let resolver = fast_resolver(
            MockDirectory::default().link(SocialProvider::Twitter, "alice", shared),
        );

        let requests = vec![
            FeeRecipientRequest::address(shared, 5000),
            FeeRecipientRequest::social(SocialProvider::Twitter, "alice", 5000),
        ];
        let err = resolver.resolve_all(&requests).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::DuplicateRecipient(address) if address == shared
        ));
    }

    #[tokio::test]
    async fn successful_resolutions_are_cached() {
        let linked = Pubkey::new_unique();
        let resolver = fast_resolver(
            MockDirectory::default().link(SocialProvider::Twitter, "alice", linked),
        );
        let requests = vec![FeeRecipientRequest::social(
            SocialProvider::Twitter,
            "alice",
            10_000,
        )];

        resolver.resolve_all(&requests).await.unwrap();
        resolver.resolve_all(&requests).await.unwrap();
        assert_eq!(resolver.directory.lookups.load(Ordering::SeqCst), 1);
    }
}
