//! Extraction service
//!
//! The single entry point callers use to turn a source URL into a
//! [`VideoInfo`]: validate, classify, consult the cache, coalesce concurrent
//! identical requests, run the ladder, normalize, store.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use url::Url;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::process::ProcessRunner;
use crate::download::cache::{cache_key, ResultCache};
use crate::download::extractor::Extractor;
use crate::download::formats::{self, VideoInfo};
use crate::download::platform::{Platform, SourceRequest};

/// Outcome shared by every request coalesced onto one extraction
type Flight = OnceCell<AppResult<Arc<VideoInfo>>>;

pub struct ExtractionService {
    extractor: Extractor,
    cache: ResultCache,
    /// Per-key flights for single-flight extraction
    in_flight: DashMap<String, Arc<Flight>>,
    single_flight: bool,
    allow_generic: bool,
}

impl ExtractionService {
    pub fn new(extractor: Extractor, cache: ResultCache) -> Self {
        Self {
            extractor,
            cache,
            in_flight: DashMap::new(),
            single_flight: true,
            allow_generic: false,
        }
    }

    /// Service wired to the environment configuration.
    pub fn from_config(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::new(Extractor::from_config(runner), ResultCache::from_config())
            .with_single_flight(*config::SINGLE_FLIGHT)
            .with_generic_sources(*config::ALLOW_GENERIC_SOURCES)
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    pub fn with_generic_sources(mut self, allowed: bool) -> Self {
        self.allow_generic = allowed;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Keys with an extraction currently in flight.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Resolve `url` to a canonical result, from cache when possible.
    pub async fn get_info(&self, url: &str) -> AppResult<Arc<VideoInfo>> {
        let request = self.classify(url)?;

        if let Some(info) = self.cache.get(request.url()).await {
            return Ok(info);
        }

        if !self.single_flight {
            return self.extract_and_store(&request).await;
        }

        // One caller runs the extraction, the rest wait for its outcome, error
        // included. If that caller is dropped mid-run, a waiter takes over.
        let ticket = FlightTicket::join(&self.in_flight, cache_key(request.url()));
        let outcome = ticket
            .flight
            .get_or_init(|| async {
                // A flight that finished just before this one may have filled the cache
                match self.cache.get(request.url()).await {
                    Some(info) => Ok(info),
                    None => self.extract_and_store(&request).await,
                }
            })
            .await;
        outcome.clone()
    }

    /// Validate and classify a raw caller URL.
    pub fn classify(&self, url: &str) -> AppResult<SourceRequest> {
        let trimmed = url.trim();
        if trimmed.is_empty() || trimmed.len() > config::validation::MAX_URL_LENGTH {
            return Err(AppError::InvalidUrl("empty or too long".to_string()));
        }

        let parsed = Url::parse(trimmed).map_err(|e| AppError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(AppError::InvalidUrl(format!("unsupported scheme '{}'", parsed.scheme())));
        }

        let request = SourceRequest::new(trimmed);
        if request.platform() == Platform::Generic && !self.allow_generic {
            return Err(AppError::UnsupportedPlatform(parsed.host_str().unwrap_or_default().to_string()));
        }
        Ok(request)
    }

    async fn extract_and_store(&self, request: &SourceRequest) -> AppResult<Arc<VideoInfo>> {
        let raw = self.extractor.extract(request).await.map_err(|e| {
            log::error!("[{}] extraction failed for {}: {}", e.category(), request.url(), e);
            AppError::from(e)
        })?;

        let info = formats::normalize(&raw.json).map_err(|e| {
            log::error!("Normalization failed for {} (strategy {}): {}", request.url(), raw.strategy, e);
            AppError::from(e)
        })?;

        log::info!(
            "Extracted '{}' ({} formats) via [{}] after {} attempt(s)",
            info.title,
            info.formats.len(),
            raw.strategy,
            raw.attempts
        );

        let info = Arc::new(info);
        self.cache.put(request.url(), info.clone()).await;
        Ok(info)
    }
}

/// A caller's membership in a per-key flight.
///
/// Dropping it, on completion or cancellation alike, removes the map entry
/// once the outcome is set or no other caller still holds the flight.
struct FlightTicket<'a> {
    flights: &'a DashMap<String, Arc<Flight>>,
    key: String,
    flight: Arc<Flight>,
}

impl<'a> FlightTicket<'a> {
    fn join(flights: &'a DashMap<String, Arc<Flight>>, key: String) -> Self {
        let flight = flights.entry(key.clone()).or_default().value().clone();
        Self { flights, key, flight }
    }
}

impl Drop for FlightTicket<'_> {
    fn drop(&mut self) {
        // Release our handle first so the last ticket out always sees a count of 1
        let flight = std::mem::take(&mut self.flight);
        let ours = Arc::as_ptr(&flight);
        drop(flight);

        self.flights.remove_if(&self.key, |_, entry| {
            Arc::as_ptr(entry) == ours && (entry.initialized() || Arc::strong_count(entry) == 1)
        });
    }
}
