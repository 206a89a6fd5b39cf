//! CNPJ registry lookups with a per-run memoizing cache.
//!
//! The cache owns every answer for the lifetime of one processing run,
//! including negative ones: an identifier the registry could not resolve is
//! never asked for twice.

mod brasil_api;

pub use brasil_api::{parse_company, BrasilApiClient};

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::LookupError;
use crate::invoice::rules::{normalize_cnpj, validate_cnpj};
use crate::models::config::LookupConfig;
use crate::models::document::CompanyInfo;

/// Smallest delay used after a rate-limit answer.
const MIN_BACKOFF: Duration = Duration::from_millis(100);

/// A registry that resolves one normalized 14-digit CNPJ per call.
pub trait RegistryClient {
    fn fetch(&self, cnpj: &str) -> Result<CompanyInfo, LookupError>;
}

/// Anything that can turn a CNPJ into registry data during extraction.
pub trait CompanyResolver {
    /// Resolve an identifier in any punctuation; `None` when unknown.
    fn resolve(&mut self, cnpj: &str) -> Option<CompanyInfo>;

    /// Counters for the run so far.
    fn stats(&self) -> LookupStats {
        LookupStats::default()
    }
}

/// Lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupStats {
    /// Requests sent to the registry, retries included.
    pub network_calls: usize,
    /// Answers served from the cache.
    pub cache_hits: usize,
    /// Distinct identifiers resolved (present or absent).
    pub resolved: usize,
}

/// Resolver for offline runs: never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl CompanyResolver for NoLookup {
    fn resolve(&mut self, _cnpj: &str) -> Option<CompanyInfo> {
        None
    }
}

/// Memoizing, rate-limited resolver over a registry client.
pub struct LookupCache<C> {
    client: C,
    entries: HashMap<String, Option<CompanyInfo>>,
    delay: Duration,
    max_delay: Duration,
    retry_on_rate_limit: bool,
    stats: LookupStats,
}

impl<C: RegistryClient> LookupCache<C> {
    pub fn new(client: C, config: &LookupConfig) -> Self {
        Self {
            client,
            entries: HashMap::new(),
            delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            retry_on_rate_limit: config.retry_on_rate_limit,
            stats: LookupStats::default(),
        }
    }

    pub fn with_delays(mut self, delay: Duration, max_delay: Duration) -> Self {
        self.delay = delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_retry(mut self, retry_on_rate_limit: bool) -> Self {
        self.retry_on_rate_limit = retry_on_rate_limit;
        self
    }

    /// Current pause before each network call.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn call(&mut self, cnpj: &str) -> Result<CompanyInfo, LookupError> {
        thread::sleep(self.delay);
        self.stats.network_calls += 1;
        self.client.fetch(cnpj)
    }

    fn fetch_with_retry(&mut self, cnpj: &str) -> Option<CompanyInfo> {
        let mut result = self.call(cnpj);

        if result == Err(LookupError::RateLimited) && self.retry_on_rate_limit {
            self.delay = next_delay(self.delay, self.max_delay);
            warn!(
                "Registry rate limit hit for {}, retrying in {:?}",
                cnpj, self.delay
            );
            result = self.call(cnpj);
        }

        match result {
            Ok(info) => {
                info!("CNPJ {} resolved: {}", cnpj, info.legal_name);
                Some(info)
            }
            Err(LookupError::NotFound) => {
                debug!("CNPJ {} not found in registry", cnpj);
                None
            }
            Err(e) => {
                warn!("Lookup failed for CNPJ {}: {}", cnpj, e);
                None
            }
        }
    }
}

impl<C: RegistryClient> CompanyResolver for LookupCache<C> {
    fn resolve(&mut self, cnpj: &str) -> Option<CompanyInfo> {
        if !validate_cnpj(cnpj) {
            warn!("Invalid CNPJ, skipping lookup: {}", cnpj);
            return None;
        }

        let digits = normalize_cnpj(cnpj);
        if let Some(entry) = self.entries.get(&digits) {
            debug!("CNPJ {} found in cache", digits);
            self.stats.cache_hits += 1;
            return entry.clone();
        }

        let info = self.fetch_with_retry(&digits);
        self.entries.insert(digits, info.clone());
        self.stats.resolved += 1;
        info
    }

    fn stats(&self) -> LookupStats {
        self.stats
    }
}

/// Delay after a rate-limit answer: doubled, at least `MIN_BACKOFF`, at most
/// `max`.
pub fn next_delay(current: Duration, max: Duration) -> Duration {
    (current * 2).max(MIN_BACKOFF).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    const VALID: &str = "11.222.333/0001-81";

    /// Replays scripted answers and counts calls.
    struct MockRegistry {
        answers: RefCell<VecDeque<Result<CompanyInfo, LookupError>>>,
        calls: Cell<usize>,
    }

    impl MockRegistry {
        fn new(answers: Vec<Result<CompanyInfo, LookupError>>) -> Self {
            Self {
                answers: RefCell::new(answers.into()),
                calls: Cell::new(0),
            }
        }
    }

    impl RegistryClient for &MockRegistry {
        fn fetch(&self, _cnpj: &str) -> Result<CompanyInfo, LookupError> {
            self.calls.set(self.calls.get() + 1);
            self.answers
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(LookupError::Status(500)))
        }
    }

    fn company(name: &str) -> CompanyInfo {
        CompanyInfo {
            legal_name: name.to_string(),
            region: Some("SP".to_string()),
            ..CompanyInfo::default()
        }
    }

    fn cache(registry: &MockRegistry) -> LookupCache<&MockRegistry> {
        LookupCache::new(registry, &LookupConfig::default())
            .with_delays(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_second_resolve_hits_cache() {
        let registry = MockRegistry::new(vec![Ok(company("RECICLA LTDA"))]);
        let mut cache = cache(&registry);

        assert_eq!(cache.resolve(VALID).unwrap().legal_name, "RECICLA LTDA");
        assert_eq!(cache.resolve("11222333000181").unwrap().legal_name, "RECICLA LTDA");
        assert_eq!(registry.calls.get(), 1);
        assert_eq!(
            cache.stats(),
            LookupStats {
                network_calls: 1,
                cache_hits: 1,
                resolved: 1,
            }
        );
    }

    #[test]
    fn test_invalid_identifier_never_calls() {
        let registry = MockRegistry::new(vec![]);
        let mut cache = cache(&registry);

        assert_eq!(cache.resolve("11.222.333/0001-82"), None);
        assert_eq!(cache.resolve("11111111111111"), None);
        assert_eq!(registry.calls.get(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failures_are_cached_as_absent() {
        let registry = MockRegistry::new(vec![Err(LookupError::NotFound)]);
        let mut cache = cache(&registry);

        assert_eq!(cache.resolve(VALID), None);
        assert_eq!(cache.resolve(VALID), None);
        assert_eq!(registry.calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_rate_limit_retries_once() {
        let registry = MockRegistry::new(vec![
            Err(LookupError::RateLimited),
            Ok(company("RECICLA LTDA")),
        ]);
        let mut cache = cache(&registry);

        assert!(cache.resolve(VALID).is_some());
        assert_eq!(registry.calls.get(), 2);
        assert_eq!(cache.stats().network_calls, 2);
    }

    #[test]
    fn test_second_rate_limit_is_cached_absent() {
        let registry = MockRegistry::new(vec![
            Err(LookupError::RateLimited),
            Err(LookupError::RateLimited),
        ]);
        let mut cache = cache(&registry);

        assert_eq!(cache.resolve(VALID), None);
        assert_eq!(cache.resolve(VALID), None);
        assert_eq!(registry.calls.get(), 2);
    }

    #[test]
    fn test_rate_limit_without_retry() {
        let registry = MockRegistry::new(vec![Err(LookupError::RateLimited)]);
        let mut cache = cache(&registry).with_retry(false);

        assert_eq!(cache.resolve(VALID), None);
        assert_eq!(registry.calls.get(), 1);
    }

    #[test]
    fn test_next_delay_is_bounded() {
        let max = Duration::from_millis(5000);
        assert_eq!(next_delay(Duration::from_millis(300), max), Duration::from_millis(600));
        assert_eq!(next_delay(Duration::from_millis(4000), max), max);
        assert_eq!(next_delay(Duration::ZERO, max), MIN_BACKOFF);
    }

    #[test]
    fn test_no_lookup() {
        let mut resolver = NoLookup;
        assert_eq!(resolver.resolve(VALID), None);
        assert_eq!(resolver.stats(), LookupStats::default());
    }
}
