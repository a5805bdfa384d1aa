use crate::apis::factory::create_enabled_sources;
use crate::app::ports::HttpClientPort;
use crate::config::Config;
use crate::infra::random::SharedRng;
use crate::types::{HazardSource, NormalizedEvent};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How one adapter's part of an aggregation run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Ok { count: usize },
    Failed { reason: String },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: &'static str,
    pub outcome: SourceOutcome,
}

struct CachedRun {
    fetched_at: Instant,
    events: Vec<NormalizedEvent>,
}

/// Fans out to every registered adapter, merges what comes back and drops
/// repeated ids (first one in merge order wins).
///
/// Adapters run as separate tasks, each bounded by `source_timeout`. Whatever
/// happens to one of them (error, timeout, panic) it contributes an empty list
/// and the run carries on, so `aggregate` itself cannot fail.
pub struct Aggregator {
    sources: Vec<Arc<dyn HazardSource>>,
    source_timeout: Duration,
    cache_ttl: Option<Duration>,
    cache: Mutex<Option<CachedRun>>,
    // Held across a cache refill so concurrent misses wait for one fan-out
    refresh: Mutex<()>,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn HazardSource>>, source_timeout: Duration) -> Self {
        Self {
            sources,
            source_timeout,
            cache_ttl: None,
            cache: Mutex::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Reuse a run's result for `ttl`. `None` fetches on every call.
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl.filter(|t| !t.is_zero());
        self
    }

    /// Aggregator over every adapter the configuration enables.
    pub fn from_config(
        config: &Config,
        http: Arc<dyn HttpClientPort>,
        rng: Arc<SharedRng>,
    ) -> Self {
        Self::new(create_enabled_sources(config, http, rng), config.source_timeout())
            .with_cache_ttl(config.cache_ttl())
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.source_name()).collect()
    }

    /// Merged events, newest first. Served from the cache while it is fresh.
    ///
    /// Callers that miss together share one refill: the first runs the
    /// fan-out and the rest pick up its result from the cache.
    pub async fn aggregate(&self) -> Vec<NormalizedEvent> {
        let Some(ttl) = self.cache_ttl else {
            return self.aggregate_with_report().await.0;
        };
        if let Some(events) = self.cached(ttl).await {
            return events;
        }

        let _refresh = self.refresh.lock().await;
        if let Some(events) = self.cached(ttl).await {
            return events;
        }
        self.aggregate_with_report().await.0
    }

    async fn cached(&self, ttl: Duration) -> Option<Vec<NormalizedEvent>> {
        let cache = self.cache.lock().await;
        let run = cache.as_ref().filter(|run| run.fetched_at.elapsed() < ttl)?;
        debug!("Serving {} cached events", run.events.len());
        crate::metrics::aggregator::cache_hit();
        Some(run.events.clone())
    }

    /// Always fetches, and says how each adapter fared.
    pub async fn aggregate_with_report(&self) -> (Vec<NormalizedEvent>, Vec<SourceReport>) {
        let started = Instant::now();

        // Spawn first, await afterwards: every adapter is in flight before we wait on any
        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let limit = self.source_timeout;
                tokio::spawn(async move { tokio::time::timeout(limit, source.fetch_events()).await })
            })
            .collect();

        let mut events = Vec::new();
        let mut reports = Vec::with_capacity(handles.len());
        for (source, handle) in self.sources.iter().zip(handles) {
            let name = source.source_name();
            let outcome = match handle.await {
                Ok(Ok(Ok(batch))) => {
                    let count = batch.len();
                    crate::metrics::sources::events_emitted(name, count);
                    events.extend(batch);
                    SourceOutcome::Ok { count }
                }
                Ok(Ok(Err(e))) => {
                    warn!(source = name, error = %e, "source failed, contributing no events");
                    crate::metrics::sources::failure(name);
                    SourceOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
                Ok(Err(_elapsed)) => {
                    warn!(
                        source = name,
                        timeout_secs = self.source_timeout.as_secs_f64(),
                        "source timed out, contributing no events"
                    );
                    crate::metrics::sources::timeout(name);
                    SourceOutcome::TimedOut
                }
                Err(join_error) => {
                    warn!(source = name, error = %join_error, "source task aborted, contributing no events");
                    crate::metrics::sources::failure(name);
                    SourceOutcome::Failed {
                        reason: join_error.to_string(),
                    }
                }
            };
            reports.push(SourceReport {
                source: name,
                outcome,
            });
        }

        let duplicates = dedupe_by_id(&mut events);
        if duplicates > 0 {
            debug!(duplicates, "Dropped events with an already seen id");
        }
        sort_newest_first(&mut events);

        let elapsed = started.elapsed().as_secs_f64();
        crate::metrics::aggregator::run_completed(events.len(), elapsed);
        info!(
            events = events.len(),
            sources = reports.len(),
            elapsed_secs = elapsed,
            "Aggregation run complete"
        );

        if self.cache_ttl.is_some() {
            *self.cache.lock().await = Some(CachedRun {
                fetched_at: Instant::now(),
                events: events.clone(),
            });
        }

        (events, reports)
    }
}

/// Keeps the first event for each id, in merge order. Returns how many were dropped.
pub fn dedupe_by_id(events: &mut Vec<NormalizedEvent>) -> usize {
    let before = events.len();
    let mut seen = HashSet::with_capacity(before);
    events.retain(|event| seen.insert(event.id.clone()));
    before - events.len()
}

/// Descending by `occurred_at`. `sort_by` is stable, so ties keep merge order.
pub fn sort_newest_first(events: &mut [NormalizedEvent]) {
    events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
}
