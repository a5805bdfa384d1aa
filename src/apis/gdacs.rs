use crate::apis::{
    fetch_body, index_id, is_point_geometry, lng_lat, provenance, redact_query, with_query,
};
use crate::app::ports::HttpClientPort;
use crate::config::GdacsConfig;
use crate::constants::{GDACS_ID_PREFIX, GDACS_PROVENANCE, GDACS_SOURCE};
use crate::error::{HazardError, Result};
use crate::types::{
    now_millis, parse_timestamp, value_as_f64, value_as_id, Coordinates, EventKind, HazardSource,
    NormalizedEvent,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Storm and cyclone tracks from the GDACS event list API.
pub struct GdacsSource {
    config: GdacsConfig,
    http: Arc<dyn HttpClientPort>,
}

impl GdacsSource {
    pub fn new(config: GdacsConfig, http: Arc<dyn HttpClientPort>) -> Self {
        Self { config, http }
    }

    fn query_url(&self) -> String {
        with_query(&self.config.url, &format!("eventlist={}", self.config.event_type))
    }
}

#[async_trait::async_trait]
impl HazardSource for GdacsSource {
    fn source_name(&self) -> &'static str {
        GDACS_SOURCE
    }

    #[instrument(skip(self), fields(source = GDACS_SOURCE, event_type = %self.config.event_type))]
    async fn fetch_events(&self) -> Result<Vec<NormalizedEvent>> {
        let url = self.query_url();
        debug!("Fetching storms from {}", redact_query(&url));
        let payload = fetch_body(self.http.as_ref(), &url).await?;
        let events = parse_event_list(&payload, &self.config.url)?;
        info!("Successfully fetched {} storms from GDACS", events.len());
        Ok(events)
    }
}

/// Maps the GDACS feature collection to storm records.
///
/// Only point features are used (the feed also ships track polygons). A
/// `[0, 0]` position means GDACS does not know where the event is, so those
/// features are dropped along with repeats of an already seen event episode.
pub fn parse_event_list(payload: &[u8], feed_url: &str) -> Result<Vec<NormalizedEvent>> {
    let data: Value = serde_json::from_slice(payload)?;
    let features = data["features"].as_array().ok_or_else(|| {
        HazardError::UnexpectedShape("GDACS payload has no features array".into())
    })?;

    let now = now_millis();
    let mut seen = HashSet::new();
    let mut events = Vec::new();

    for (index, feature) in features.iter().enumerate() {
        let geometry = &feature["geometry"];
        if !is_point_geometry(geometry) {
            continue;
        }
        let Some(event) = feature_to_event(index, feature, feed_url, now) else {
            debug!(index, "Skipping storm without a known location");
            continue;
        };
        if seen.insert(event.id.clone()) {
            events.push(event);
        }
    }

    Ok(events)
}

fn feature_to_event(
    index: usize,
    feature: &Value,
    feed_url: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<NormalizedEvent> {
    let (lng, lat) = lng_lat(&feature["geometry"]["coordinates"])?;
    if lng == 0.0 && lat == 0.0 {
        return None;
    }
    let coordinates = Coordinates::new(lng, lat)?;

    let props = &feature["properties"];
    let id = match (value_as_id(&props["eventid"]), value_as_id(&props["episodeid"])) {
        (Some(event), Some(episode)) => format!("{}-{}-{}", GDACS_ID_PREFIX, event, episode),
        (Some(event), None) => format!("{}-{}", GDACS_ID_PREFIX, event),
        _ => format!("{}-{}", GDACS_ID_PREFIX, index_id(index)),
    };

    let title = text(&props["name"])
        .or_else(|| text(&props["eventname"]))
        .or_else(|| text(&props["description"]))
        .unwrap_or("Tropical cyclone")
        .to_string();

    let severity = &props["severitydata"];
    let mut details = Vec::new();
    if let Some(alert) = text(&props["alertlevel"]) {
        details.push(format!("{} alert", alert));
    }
    if let Some(severity_text) = text(&severity["severitytext"]) {
        details.push(severity_text.to_string());
    }
    if let Some(country) = text(&props["country"]) {
        details.push(country.to_string());
    }
    let description = if details.is_empty() {
        "Storm event".to_string()
    } else {
        details.join(" - ")
    };

    let occurred_at = text(&props["fromdate"])
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let report_url = text(&props["url"]["report"]).map(str::to_string);

    let mut event = NormalizedEvent::new(
        id,
        EventKind::Storm,
        title,
        description,
        occurred_at,
        coordinates,
    );
    event.intensity = value_as_f64(&severity["severity"]);
    event.sources = vec![provenance(
        GDACS_PROVENANCE,
        report_url.as_deref().unwrap_or(feed_url),
    )];
    event.source_url = report_url;
    Some(event)
}

fn text(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}
