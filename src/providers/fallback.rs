use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::core::{FetchResult, Subject};
use crate::error::AtlasError;
use crate::providers::MetadataProvider;
use crate::retry::RetryPolicy;

/// Primary-provider attempts made for one subject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchTally {
    pub attempts: u32,
    pub failures: u32,
}

impl std::ops::AddAssign for FetchTally {
    fn add_assign(&mut self, other: Self) {
        self.attempts += other.attempts;
        self.failures += other.failures;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub result: Option<FetchResult>,
    pub tally: FetchTally,
}

/// Tries providers in order; the first one that knows the subject wins.
/// Results are never merged across providers.
///
/// Only the first provider is retried, and only when a request never got an
/// answer. Every later provider is asked once; its errors count as "no data".
pub struct FallbackResolver {
    providers: Vec<Arc<dyn MetadataProvider>>,
    primary_retry: RetryPolicy,
}

impl FallbackResolver {
    pub fn new(providers: Vec<Arc<dyn MetadataProvider>>) -> Self {
        Self {
            providers,
            primary_retry: RetryPolicy::none(),
        }
    }

    pub fn with_primary_retry(mut self, policy: RetryPolicy) -> Self {
        self.primary_retry = policy;
        self
    }

    /// Add a provider at the end of the chain
    pub fn push(&mut self, provider: Arc<dyn MetadataProvider>) {
        self.providers.push(provider);
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn resolve(&self, subject: &Subject) -> Resolution {
        let (primary, secondaries) = match self.providers.split_first() {
            Some(split) => split,
            None => return Resolution::default(),
        };

        let attempts = AtomicU32::new(0);
        let failures = AtomicU32::new(0);
        let (attempts_ref, failures_ref) = (&attempts, &failures);

        let first = self
            .primary_retry
            .run(primary.name(), AtlasError::is_unanswered, move || async move {
                attempts_ref.fetch_add(1, Ordering::SeqCst);
                let result = primary.resolve(subject).await;
                if result.is_err() {
                    failures_ref.fetch_add(1, Ordering::SeqCst);
                }
                result
            })
            .await;

        let tally = FetchTally {
            attempts: attempts.load(Ordering::SeqCst),
            failures: failures.load(Ordering::SeqCst),
        };

        match first {
            Ok(Some(result)) => {
                tracing::debug!("Provider {} resolved {:?}", primary.name(), subject.query);
                return Resolution {
                    result: Some(result),
                    tally,
                };
            }
            Ok(None) => {
                tracing::debug!("Provider {} has nothing for {:?}", primary.name(), subject.query);
            }
            Err(e) => {
                tracing::warn!("⚠️ Provider {} failed for {:?}: {}", primary.name(), subject.query, e);
            }
        }

        for provider in secondaries {
            match provider.resolve(subject).await {
                Ok(Some(result)) => {
                    tracing::debug!("Provider {} resolved {:?}", provider.name(), subject.query);
                    return Resolution {
                        result: Some(result),
                        tally,
                    };
                }
                Ok(None) => {
                    tracing::debug!("Provider {} has nothing for {:?}", provider.name(), subject.query);
                }
                Err(e) => {
                    tracing::debug!("Provider {} failed for {:?}: {}", provider.name(), subject.query, e);
                }
            }
        }

        Resolution { result: None, tally }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    enum Behaviour {
        Found(&'static str),
        Missing,
        Fails(fn() -> AtlasError),
        /// Fails with the error for the first `n` calls, then finds the title
        FailsThenFinds(usize, fn() -> AtlasError, &'static str),
    }

    struct StubProvider {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetadataProvider for StubProvider {
        async fn resolve(&self, _subject: &Subject) -> Result<Option<FetchResult>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Found(title) => Ok(Some(FetchResult::new(self.name, *title))),
                Behaviour::Missing => Ok(None),
                Behaviour::Fails(make) => Err(make()),
                Behaviour::FailsThenFinds(n, make, title) => {
                    if call < *n {
                        Err(make())
                    } else {
                        Ok(Some(FetchResult::new(self.name, *title)))
                    }
                }
            }
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn network() -> AtlasError {
        AtlasError::Network("connection reset".into())
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = StubProvider::new("primary", Behaviour::Found("Naruto"));
        let secondary = StubProvider::new("secondary", Behaviour::Found("other"));
        let resolver = FallbackResolver::new(vec![primary.clone(), secondary.clone()]);

        let resolution = resolver.resolve(&Subject::anime("Naruto")).await;
        assert_eq!(resolution.result.unwrap().provider, "primary");
        assert_eq!(resolution.tally, FetchTally { attempts: 1, failures: 0 });
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_not_found_falls_back() {
        let primary = StubProvider::new("primary", Behaviour::Missing);
        let secondary = StubProvider::new("secondary", Behaviour::Found("Naruto"));
        let resolver = FallbackResolver::new(vec![primary.clone(), secondary.clone()]);

        let resolution = resolver.resolve(&Subject::anime("Naruto")).await;
        assert_eq!(resolution.result.unwrap().provider, "secondary");
        assert_eq!(resolution.tally.failures, 0);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_falls_back_without_retry() {
        let primary = StubProvider::new(
            "primary",
            Behaviour::Fails(|| AtlasError::EndpointExhausted { attempted: 3 }),
        );
        let secondary = StubProvider::new("secondary", Behaviour::Found("Naruto"));
        let resolver = FallbackResolver::new(vec![primary.clone(), secondary])
            .with_primary_retry(RetryPolicy::new(2, 300));

        let resolution = resolver.resolve(&Subject::anime("Naruto")).await;
        assert_eq!(resolution.result.unwrap().provider, "secondary");
        assert_eq!(resolution.tally, FetchTally { attempts: 1, failures: 1 });
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_missing_is_none() {
        let resolver = FallbackResolver::new(vec![
            StubProvider::new("primary", Behaviour::Missing),
            StubProvider::new("secondary", Behaviour::Missing),
        ]);
        assert!(resolver.resolve(&Subject::anime("x")).await.result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_primary_is_retried_with_backoff() {
        let primary = StubProvider::new("primary", Behaviour::FailsThenFinds(2, network, "Mushishi"));
        let secondary = StubProvider::new("secondary", Behaviour::Found("other"));
        let resolver = FallbackResolver::new(vec![primary.clone(), secondary.clone()])
            .with_primary_retry(RetryPolicy::new(2, 300));
        let start = tokio::time::Instant::now();

        let resolution = resolver.resolve(&Subject::anime("Mushishi")).await;

        assert_eq!(resolution.result.unwrap().provider, "primary");
        assert_eq!(resolution.tally, FetchTally { attempts: 3, failures: 2 });
        assert_eq!(secondary.calls(), 0);
        // 300ms + 600ms
        assert_eq!(start.elapsed(), std::time::Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_primary_is_not_retried_again() {
        let primary = StubProvider::new("primary", Behaviour::Fails(|| AtlasError::RateLimited));
        let secondary = StubProvider::new("secondary", Behaviour::Found("Naruto"));
        let resolver = FallbackResolver::new(vec![primary.clone(), secondary])
            .with_primary_retry(RetryPolicy::new(2, 300));

        let resolution = resolver.resolve(&Subject::anime("Naruto")).await;

        assert_eq!(resolution.result.unwrap().provider, "secondary");
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_secondary_is_asked_once_when_everything_fails() {
        let primary = StubProvider::new("primary", Behaviour::Fails(network));
        let secondary = StubProvider::new("secondary", Behaviour::Fails(network));
        let resolver = FallbackResolver::new(vec![primary.clone(), secondary.clone()])
            .with_primary_retry(RetryPolicy::new(2, 300));

        let resolution = resolver.resolve(&Subject::anime("Naruto")).await;

        assert!(resolution.result.is_none());
        assert_eq!(resolution.tally, FetchTally { attempts: 3, failures: 3 });
        assert_eq!(primary.calls(), 3);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_secondary_error_counts_as_no_data() {
        let resolver = FallbackResolver::new(vec![
            StubProvider::new("primary", Behaviour::Missing),
            StubProvider::new("secondary", Behaviour::Fails(network)),
        ]);

        let resolution = resolver.resolve(&Subject::anime("x")).await;
        assert!(resolution.result.is_none());
        assert_eq!(resolution.tally, FetchTally { attempts: 1, failures: 0 });
    }

    #[tokio::test]
    async fn test_empty_chain_resolves_nothing() {
        let resolution = FallbackResolver::new(vec![]).resolve(&Subject::anime("x")).await;
        assert_eq!(resolution, Resolution::default());
    }

    #[test]
    fn test_provider_names_in_order() {
        let mut resolver = FallbackResolver::new(vec![StubProvider::new("anilist", Behaviour::Missing)]);
        resolver.push(StubProvider::new("jikan", Behaviour::Missing));
        assert_eq!(resolver.provider_names(), vec!["anilist", "jikan"]);
    }
}
