use crate::cache::{DayDetailCache, Entries, FileStorage, MemoryStorage, SEED_DATA};
use crate::calendar::iso_key;
use crate::enrichment::{
    fetcher_from_config, insight_prompt, parse_enrichment, EnrichmentFetcher, EnrichmentRecord,
    Prompt, DEFAULT_INSIGHT, FALLBACK_INSIGHT,
};
use crate::{AppConfig, Error, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Resolves days to their details: cache first, then the fetcher, then a fixed fallback.
#[derive(Clone)]
pub struct DayDetailService {
    cache: Arc<Mutex<DayDetailCache>>,
    fetcher: Arc<dyn EnrichmentFetcher>,
}

impl DayDetailService {
    pub fn new<T>(cache: DayDetailCache, fetcher: T) -> DayDetailService
    where
        T: EnrichmentFetcher + 'static,
    {
        DayDetailService {
            cache: Arc::new(Mutex::new(cache)),
            fetcher: Arc::new(fetcher),
        }
    }

    /// Creates the service from configuration: the seeded cache backed by the configured file (or
    /// memory only) and the configured fetcher.
    pub fn from_config(config: &AppConfig) -> Result<DayDetailService> {
        let cache = match &config.storage.cache_path {
            Some(path) => {
                log::info!("caching day details in {}", path.display());
                DayDetailCache::load(FileStorage::new(path), SEED_DATA)?
            }
            None => {
                log::warn!("no cache path configured; fetched day details are lost on restart");
                DayDetailCache::load(MemoryStorage::default(), SEED_DATA)?
            }
        };

        Ok(DayDetailService::new(
            cache,
            fetcher_from_config(&config.enrichment)?,
        ))
    }

    /// Whether a live fetcher is configured.
    pub fn is_live(&self) -> bool {
        self.fetcher.is_live()
    }

    /// Returns the details of `date`. Never fails: without a fetcher or on fetch errors a fallback
    /// record is returned, which is not cached.
    pub async fn resolve(&self, date: NaiveDate) -> EnrichmentRecord {
        if let Some(record) = self.cached(date).await {
            return record;
        }

        if !self.fetcher.is_live() {
            return EnrichmentRecord::unavailable();
        }

        match self.fetch_and_store(date, Prompt::Detail).await {
            Ok(record) => record,
            Err(err) => {
                log::error!("failed to fetch details for {date}: {err}");
                EnrichmentRecord::failed()
            }
        }
    }

    /// Returns the cached details of `date`, if any.
    pub async fn cached(&self, date: NaiveDate) -> Option<EnrichmentRecord> {
        self.cache.lock().await.get(&iso_key(date)).cloned()
    }

    /// Returns the days out of `dates` that are not cached yet, keeping their order.
    pub async fn missing(&self, dates: &[NaiveDate]) -> Vec<NaiveDate> {
        let cache = self.cache.lock().await;
        dates
            .iter()
            .copied()
            .filter(|date| !cache.has(&iso_key(*date)))
            .collect()
    }

    /// Fetches the details of `date`, parses them and stores them in the cache.
    ///
    /// A failure to persist the cache is logged; the parsed record is returned regardless.
    pub async fn fetch_and_store(&self, date: NaiveDate, prompt: Prompt) -> Result<EnrichmentRecord> {
        let text = self.fetcher.generate(&prompt.render(date)).await?;
        let record = parse_enrichment(&text);
        let key = iso_key(date);

        // The lock is only taken after the fetch, never across it.
        let mut cache = self.cache.lock().await;
        if let Err(err) = cache.put(key.as_str(), record.clone()) {
            log::error!("failed to persist day details for {key}: {err}");
        }

        // Another request may have stored this day in the meantime; the first record wins.
        Ok(cache.get(&key).cloned().unwrap_or(record))
    }

    /// A copy of all cached details.
    pub async fn snapshot(&self) -> Entries {
        self.cache.lock().await.entries().clone()
    }

    pub async fn to_json(&self) -> Result<String> {
        self.cache.lock().await.to_json()
    }

    pub async fn seed_snippet(&self) -> Result<String> {
        self.cache.lock().await.seed_snippet()
    }

    /// A short cultural fact about Austria for the month. Not cached.
    pub async fn cultural_insight(&self, month_name: &str) -> String {
        match self.fetcher.generate(&insight_prompt(month_name)).await {
            Ok(text) if text.trim().is_empty() => DEFAULT_INSIGHT.to_owned(),
            Ok(text) => text.trim().to_owned(),
            Err(Error::FetcherUnavailable) => FALLBACK_INSIGHT.to_owned(),
            Err(err) => {
                log::error!("failed to fetch cultural insight: {err}");
                FALLBACK_INSIGHT.to_owned()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::{MemoryStorage, Storage, SEED_DATA};
    use crate::enrichment::gemini::ClientError;
    use crate::enrichment::{NullFetcher, DEFAULT_INSPIRATION};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    macro_rules! date {
        ($y:expr, $m:expr, $d:expr) => {
            NaiveDate::from_ymd_opt($y, $m, $d).unwrap()
        };
    }

    /// A fake fetcher which counts invocations and answers with a fixed text, or fails if the text
    /// is `None`.
    pub(crate) struct Counter {
        pub calls: AtomicUsize,
        pub answer: Option<String>,
    }

    impl Counter {
        pub fn answering(answer: &str) -> Arc<Counter> {
            Arc::new(Counter {
                calls: AtomicUsize::new(0),
                answer: Some(answer.to_owned()),
            })
        }

        pub fn failing() -> Arc<Counter> {
            Arc::new(Counter {
                calls: AtomicUsize::new(0),
                answer: None,
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EnrichmentFetcher for Counter {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Some(answer) => Ok(answer.clone()),
                None => Err(ClientError::EmptyResponse.into()),
            }
        }
    }

    fn empty_cache() -> DayDetailCache {
        DayDetailCache::new(MemoryStorage::default())
    }

    #[actix_rt::test]
    async fn second_resolve_is_a_cache_hit() {
        let counter = Counter::answering("Namenstag: Amandus\nInspiration: Frei sein.");
        let service = DayDetailService::new(empty_cache(), counter.clone());
        let day = date!(2026, 2, 6);

        let first = service.resolve(day).await;
        assert_eq!(first, EnrichmentRecord::new("Amandus", "Frei sein."));
        assert_eq!(counter.calls(), 1);

        let second = service.resolve(day).await;
        assert_eq!(second, first);
        assert_eq!(counter.calls(), 1);
    }

    #[actix_rt::test]
    async fn seeded_days_are_never_fetched() {
        let counter = Counter::answering("Namenstag: X");
        let cache = DayDetailCache::load(MemoryStorage::default(), SEED_DATA).unwrap();
        let service = DayDetailService::new(cache, counter.clone());

        let record = service.resolve(date!(2026, 12, 24)).await;
        assert_eq!(record.namenstag, "Adam und Eva");
        assert_eq!(counter.calls(), 0);
    }

    #[actix_rt::test]
    async fn partial_answer_is_cached_with_default() {
        let storage = Arc::new(MemoryStorage::default());
        let counter = Counter::answering("Namenstag: Anna");
        let service = DayDetailService::new(DayDetailCache::new(storage.clone()), counter.clone());
        let day = date!(2026, 7, 26);

        let record = service.resolve(day).await;
        assert_eq!(record.namenstag, "Anna");
        assert_eq!(record.inspiration, DEFAULT_INSPIRATION);
        assert_eq!(service.cached(day).await, Some(record));
        assert!(storage.read().unwrap().unwrap().contains("2026-07-26"));
    }

    #[actix_rt::test]
    async fn failures_are_not_cached() {
        let counter = Counter::failing();
        let service = DayDetailService::new(empty_cache(), counter.clone());
        let day = date!(2026, 3, 19);

        assert_eq!(service.resolve(day).await, EnrichmentRecord::failed());
        assert_eq!(service.cached(day).await, None);

        // The next call retries.
        assert_eq!(service.resolve(day).await, EnrichmentRecord::failed());
        assert_eq!(counter.calls(), 2);
    }

    #[actix_rt::test]
    async fn without_fetcher_a_fallback_is_returned() {
        let service = DayDetailService::new(empty_cache(), NullFetcher);
        let day = date!(2026, 3, 19);

        assert!(!service.is_live());
        assert_eq!(service.resolve(day).await, EnrichmentRecord::unavailable());
        assert_eq!(service.cached(day).await, None);
        assert!(service.snapshot().await.is_empty());
    }

    #[actix_rt::test]
    async fn missing_days_keep_order() {
        let service = DayDetailService::new(
            DayDetailCache::load(MemoryStorage::default(), SEED_DATA).unwrap(),
            NullFetcher,
        );

        let days = [date!(2026, 1, 1), date!(2026, 1, 3), date!(2026, 1, 2), date!(2026, 1, 4)];
        assert_eq!(
            service.missing(&days).await,
            vec![date!(2026, 1, 3), date!(2026, 1, 4)]
        );
    }

    #[actix_rt::test]
    async fn cultural_insight_fallbacks() {
        let service = DayDetailService::new(empty_cache(), NullFetcher);
        assert_eq!(service.cultural_insight("März").await, FALLBACK_INSIGHT);

        let service = DayDetailService::new(empty_cache(), Counter::failing());
        assert_eq!(service.cultural_insight("März").await, FALLBACK_INSIGHT);

        let service = DayDetailService::new(empty_cache(), Counter::answering("  "));
        assert_eq!(service.cultural_insight("März").await, DEFAULT_INSIGHT);

        let service = DayDetailService::new(empty_cache(), Counter::answering(" Krampus! "));
        assert_eq!(service.cultural_insight("Dezember").await, "Krampus!");

        // Insights never end up in the cache.
        assert!(service.snapshot().await.is_empty());
    }
}
