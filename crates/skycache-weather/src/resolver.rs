//! Cache-aside weather resolution.
//!
//! One call performs at most one cache read, one upstream fetch and one
//! best-effort cache write:
//!
//! ```text
//! validate -> cache get -> Hit  -> decode -> Done(cache)
//!                       -> Miss -> fetch -> decode -> cache set (best-effort) -> Done(api)
//!                       -> Err  -> Failed
//! ```
//!
//! There is no per-key lock. Concurrent misses for the same location each
//! fetch and each write; with a 60 second TTL that duplication is accepted.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::cache::{CacheLookup, CacheStore};
use crate::codec;
use crate::error::ResolveError;
use crate::location::{self, CacheKey};
use crate::provider::WeatherFetcher;
use crate::types::{DayWeather, Origin, WeatherRecord, WeatherResult};

/// Lifetime of a cached upstream payload.
pub const CACHE_TTL: Duration = Duration::from_secs(60);

/// Per-request state, dropped when the call returns.
struct FetchContext {
    location: String,
    key: CacheKey,
    upstream: String,
    started: Instant,
}

impl FetchContext {
    fn new(input: &str) -> Result<Self, ResolveError> {
        Ok(Self {
            location: input.trim().to_string(),
            key: CacheKey::for_location(input)?,
            upstream: location::upstream_location(input)?,
            started: Instant::now(),
        })
    }

    fn finish(self, record: WeatherRecord, origin: Origin) -> WeatherResult {
        tracing::debug!(
            "Resolved {} from {} in {:?}",
            self.key,
            origin,
            self.started.elapsed()
        );
        WeatherResult {
            location: self.location,
            record,
            origin,
            observed_at: Utc::now(),
        }
    }
}

/// Composes a cache, an upstream fetcher and the payload codec.
///
/// Both collaborators are shared handles created once at start-up.
pub struct WeatherResolver {
    cache: Arc<dyn CacheStore>,
    fetcher: Arc<dyn WeatherFetcher>,
    api_key: String,
}

impl WeatherResolver {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        fetcher: Arc<dyn WeatherFetcher>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            api_key: api_key.into(),
        }
    }

    /// Resolve weather for a user-entered location.
    pub async fn resolve(&self, input: &str) -> Result<WeatherResult, ResolveError> {
        self.resolve_with_cancel(input, &CancellationToken::new())
            .await
    }

    /// Resolve weather, giving up with [`ResolveError::Cancelled`] once
    /// `cancel` fires. In-flight cache and upstream calls are dropped and no
    /// cache write is started after cancellation.
    #[instrument(skip(self, cancel), level = "info")]
    pub async fn resolve_with_cancel(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherResult, ResolveError> {
        let ctx = FetchContext::new(input)?;

        let lookup = until_cancelled(cancel, self.cache.get(&ctx.key))
            .await?
            .map_err(|e| {
                tracing::warn!("Cache read failed for {}: {}", ctx.key, e);
                ResolveError::CacheBackend(e)
            })?;

        match lookup {
            CacheLookup::Hit(payload) => {
                tracing::info!("Cache HIT for {}", ctx.key.location());
                let record = codec::decode(&payload).map_err(|e| {
                    tracing::warn!("Corrupt cache entry for {}: {}", ctx.key, e);
                    ResolveError::CorruptCacheEntry(e)
                })?;
                return Ok(ctx.finish(record, Origin::Cache));
            }
            CacheLookup::Miss => {
                tracing::info!("Cache MISS for {} - fetching from upstream", ctx.key.location());
            }
        }

        let raw = until_cancelled(cancel, self.fetcher.fetch(&ctx.upstream, &self.api_key))
            .await?
            .map_err(|e| {
                tracing::warn!("Upstream request failed for {}: {}", ctx.key, e);
                ResolveError::from(e)
            })?;

        let record = codec::decode(&raw).map_err(|e| {
            tracing::warn!("Upstream payload for {} did not decode: {}", ctx.key, e);
            ResolveError::UpstreamPayloadInvalid(e)
        })?;

        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        self.write_through(&ctx.key, &raw).await;

        Ok(ctx.finish(record, Origin::Upstream))
    }

    /// Resolve a location, then pick out one day of its forecast.
    pub async fn resolve_day(
        &self,
        input: &str,
        date: NaiveDate,
    ) -> Result<DayWeather, ResolveError> {
        self.resolve_day_with_cancel(input, date, &CancellationToken::new())
            .await
    }

    pub async fn resolve_day_with_cancel(
        &self,
        input: &str,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<DayWeather, ResolveError> {
        let result = self.resolve_with_cancel(input, cancel).await?;

        let day = result
            .record
            .day(date)
            .cloned()
            .ok_or_else(|| ResolveError::DayNotFound {
                location: result.location.clone(),
                date,
            })?;

        Ok(DayWeather {
            location: result.location,
            day,
            current: result.record.current_conditions,
            origin: result.origin,
            observed_at: result.observed_at,
        })
    }

    /// Store a fresh payload. Failures are logged and swallowed.
    async fn write_through(&self, key: &CacheKey, raw: &[u8]) {
        match self.cache.set(key, raw, CACHE_TTL).await {
            Ok(()) => tracing::info!(
                "Cached weather for {} ({}s TTL)",
                key.location(),
                CACHE_TTL.as_secs()
            ),
            Err(e) => tracing::warn!(
                kind = "cache_write_failed",
                "Cache write failed for {}, serving fresh data anyway: {}",
                key,
                e
            ),
        }
    }
}

impl std::fmt::Debug for WeatherResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherResolver").finish_non_exhaustive()
    }
}

async fn until_cancelled<F>(cancel: &CancellationToken, fut: F) -> Result<F::Output, ResolveError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ResolveError::Cancelled),
        out = fut => Ok(out),
    }
}
