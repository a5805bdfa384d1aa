use crate::apis::{fetch_body, index_id, lng_lat, provenance, redact_query, with_query};
use crate::app::ports::HttpClientPort;
use crate::config::{UsgsConfig, MAX_LOOKBACK_DAYS};
use crate::constants::{USGS_ID_PREFIX, USGS_PROVENANCE, USGS_SOURCE};
use crate::error::{HazardError, Result};
use crate::infra::random::SharedRng;
use crate::types::{
    from_epoch_millis, now_millis, value_as_f64, value_as_id, Coordinates, EventKind, HazardSource,
    NormalizedEvent,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Seismic events from the USGS FDSN event service (GeoJSON).
pub struct UsgsSource {
    config: UsgsConfig,
    http: Arc<dyn HttpClientPort>,
    rng: Arc<SharedRng>,
}

impl UsgsSource {
    pub fn new(config: UsgsConfig, http: Arc<dyn HttpClientPort>, rng: Arc<SharedRng>) -> Self {
        Self { config, http, rng }
    }

    /// Time-windowed query: everything since `lookback_days` ago above `min_magnitude`.
    pub fn query_url(&self, now: DateTime<Utc>) -> String {
        let days = self.config.lookback_days.clamp(0, MAX_LOOKBACK_DAYS);
        let start = now - Duration::days(days);
        with_query(
            &self.config.url,
            &format!(
                "format=geojson&starttime={}&minmagnitude={}",
                start.to_rfc3339_opts(SecondsFormat::Secs, true),
                self.config.min_magnitude
            ),
        )
    }
}

#[async_trait::async_trait]
impl HazardSource for UsgsSource {
    fn source_name(&self) -> &'static str {
        USGS_SOURCE
    }

    #[instrument(skip(self), fields(source = USGS_SOURCE))]
    async fn fetch_events(&self) -> Result<Vec<NormalizedEvent>> {
        let url = self.query_url(Utc::now());
        debug!("Fetching earthquakes from {}", redact_query(&url));
        let payload = fetch_body(self.http.as_ref(), &url).await?;
        let events = parse_feature_collection(
            &payload,
            &self.config.url,
            self.config.max_events,
            &self.rng,
        )?;
        info!("Successfully fetched {} earthquakes from USGS", events.len());
        Ok(events)
    }
}

/// Maps a GeoJSON feature collection into earthquake records.
///
/// Features without a usable `[lng, lat]` are skipped. When `max_events` is
/// set and more records survive, a uniform random subset of that size is kept
/// in upstream order.
pub fn parse_feature_collection(
    payload: &[u8],
    feed_url: &str,
    max_events: Option<usize>,
    rng: &SharedRng,
) -> Result<Vec<NormalizedEvent>> {
    let data: Value = serde_json::from_slice(payload)?;
    let features = data["features"]
        .as_array()
        .ok_or_else(|| HazardError::UnexpectedShape("USGS payload has no features array".into()))?;

    let now = now_millis();
    let mut events: Vec<NormalizedEvent> = features
        .iter()
        .enumerate()
        .filter_map(|(index, feature)| feature_to_event(index, feature, feed_url, now))
        .collect();

    if let Some(max) = max_events {
        if events.len() > max {
            debug!("Sampling {} of {} earthquakes", max, events.len());
            let keep = rng.sample_indices(events.len(), max);
            let mut keep = keep.into_iter().peekable();
            events = events
                .into_iter()
                .enumerate()
                .filter_map(|(i, event)| {
                    if keep.peek() == Some(&i) {
                        keep.next();
                        Some(event)
                    } else {
                        None
                    }
                })
                .collect();
        }
    }

    Ok(events)
}

fn feature_to_event(
    index: usize,
    feature: &Value,
    feed_url: &str,
    now: DateTime<Utc>,
) -> Option<NormalizedEvent> {
    let (lng, lat) = lng_lat(&feature["geometry"]["coordinates"])?;
    let Some(coordinates) = Coordinates::new(lng, lat) else {
        debug!(index, "Skipping earthquake with invalid coordinates");
        return None;
    };

    let props = &feature["properties"];
    let magnitude = value_as_f64(&props["mag"]);
    let place = props["place"]
        .as_str()
        .or_else(|| props["title"].as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let occurred_at = props["time"]
        .as_i64()
        .and_then(from_epoch_millis)
        .unwrap_or(now);
    let detail_url = props["url"].as_str().map(|s| s.to_string());

    let id = value_as_id(&feature["id"]).unwrap_or_else(|| index_id(index));
    let title = place.unwrap_or_else(|| match magnitude {
        Some(m) => format!("M {} earthquake", m),
        None => "Earthquake".to_string(),
    });
    let description = match magnitude {
        Some(m) => format!("Magnitude {}", m),
        None => "Magnitude unknown".to_string(),
    };

    let mut event = NormalizedEvent::new(
        format!("{}-{}", USGS_ID_PREFIX, id),
        EventKind::Earthquake,
        title,
        description,
        occurred_at,
        coordinates,
    );
    event.magnitude = magnitude;
    event.sources = vec![provenance(
        USGS_PROVENANCE,
        detail_url.as_deref().unwrap_or(feed_url),
    )];
    event.source_url = detail_url;
    Some(event)
}
