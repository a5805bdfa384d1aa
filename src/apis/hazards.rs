use crate::apis::{fetch_body, index_id, provenance, redact_query};
use crate::app::ports::HttpClientPort;
use crate::config::HazardsConfig;
use crate::constants::{HAZARDS_ID_PREFIX, HAZARDS_PROVENANCE, HAZARDS_SOURCE};
use crate::error::{HazardError, Result};
use crate::types::{
    now_millis, parse_timestamp, value_as_f64, value_as_id, Coordinates, EventKind, HazardSource,
    NormalizedEvent,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Generic hazard listings (UNDRR hazard information profiles).
pub struct HazardsSource {
    config: HazardsConfig,
    http: Arc<dyn HttpClientPort>,
}

impl HazardsSource {
    pub fn new(config: HazardsConfig, http: Arc<dyn HttpClientPort>) -> Self {
        Self { config, http }
    }
}

#[async_trait::async_trait]
impl HazardSource for HazardsSource {
    fn source_name(&self) -> &'static str {
        HAZARDS_SOURCE
    }

    #[instrument(skip(self), fields(source = HAZARDS_SOURCE))]
    async fn fetch_events(&self) -> Result<Vec<NormalizedEvent>> {
        debug!("Fetching hazards from {}", redact_query(&self.config.url));
        let payload = fetch_body(self.http.as_ref(), &self.config.url).await?;
        let events = parse_hazards(&payload, &self.config.url, self.config.default_intensity)?;
        info!("Successfully fetched {} hazards", events.len());
        Ok(events)
    }
}

/// The item list out of whichever envelope the upstream used today:
/// a bare array, `{"data": [...]}` or `{"results": [...]}`.
fn unwrap_items(data: &Value) -> Result<&Vec<Value>> {
    if let Some(items) = data.as_array() {
        return Ok(items);
    }
    ["data", "results"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_array))
        .ok_or_else(|| {
            HazardError::UnexpectedShape(
                "hazard payload is neither an array nor wraps one in data/results".into(),
            )
        })
}

pub fn parse_hazards(
    payload: &[u8],
    feed_url: &str,
    default_intensity: f64,
) -> Result<Vec<NormalizedEvent>> {
    let data: Value = serde_json::from_slice(payload)?;
    let items = unwrap_items(&data)?;
    let now = now_millis();

    Ok(items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let event = item_to_event(index, item, feed_url, default_intensity, now);
            if event.is_none() {
                debug!(index, "Dropping hazard without a usable location");
            }
            event
        })
        .collect())
}

/// First of `keys` present on `item` as a number or numeric string.
fn first_number(item: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| value_as_f64(&item[*key]))
}

fn first_text<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| item[*key].as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn item_to_event(
    index: usize,
    item: &Value,
    feed_url: &str,
    default_intensity: f64,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<NormalizedEvent> {
    let lat = first_number(item, &["latitude", "lat"])?;
    let lng = first_number(item, &["longitude", "lng", "lon"])?;
    let coordinates = Coordinates::new(lng, lat)?;

    let id = value_as_id(&item["id"]).unwrap_or_else(|| index_id(index));
    let title = first_text(item, &["short_name", "name", "title"])
        .map(str::to_string)
        .unwrap_or_else(|| format!("Hazard {}", index + 1));
    let description = first_text(item, &["description", "definition", "summary"])
        .map(str::to_string)
        .unwrap_or_else(|| "Reported hazard".to_string());
    let occurred_at = first_text(item, &["date", "created", "updated"])
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let intensity = first_number(item, &["intensity", "severity"]).unwrap_or(default_intensity);
    let detail_url = first_text(item, &["url", "link"]).map(str::to_string);

    let mut event = NormalizedEvent::new(
        format!("{}-{}", HAZARDS_ID_PREFIX, id),
        EventKind::Hazard,
        title,
        description,
        occurred_at,
        coordinates,
    );
    event.intensity = Some(intensity);
    event.sources = vec![provenance(
        HAZARDS_PROVENANCE,
        detail_url.as_deref().unwrap_or(feed_url),
    )];
    event.source_url = detail_url;
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FEED: &str = "https://hazards.example/api";

    fn items() -> Value {
        json!([
            { "id": 7, "short_name": "Flash flood", "latitude": 10.5, "longitude": 20.25,
              "severity": 3, "date": "2023-11-14T22:13:20Z" },
            { "name": "Landslide", "lat": "-5.0", "lng": "100.0", "intensity": 0.4 },
            { "id": "no-location", "name": "Nowhere" },
            { "id": "half", "lat": 1.0 },
            { "id": "lon", "lat": 1.0, "lon": 2.0 }
        ])
    }

    fn parse(body: &Value) -> Vec<NormalizedEvent> {
        parse_hazards(&serde_json::to_vec(body).unwrap(), FEED, 1.0).unwrap()
    }

    fn without_time(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
        let epoch = crate::types::from_epoch_millis(0).unwrap();
        events
            .into_iter()
            .map(|mut e| {
                e.occurred_at = epoch;
                e
            })
            .collect()
    }

    #[test]
    fn bare_array_and_wrappers_agree() {
        let bare = without_time(parse(&items()));
        let data = without_time(parse(&json!({ "data": items() })));
        let results = without_time(parse(&json!({ "results": items(), "count": 5 })));
        assert_eq!(bare.len(), 3);
        assert_eq!(bare, data);
        assert_eq!(bare, results);
    }

    #[test]
    fn maps_fields_under_either_naming() {
        let events = parse(&items());
        assert_eq!(events[0].id, "hazard-7");
        assert_eq!(events[0].title, "Flash flood");
        assert_eq!(events[0].coordinates, Coordinates::new(20.25, 10.5).unwrap());
        assert_eq!(events[0].intensity, Some(3.0));
        assert_eq!(
            events[0].occurred_at,
            crate::types::from_epoch_millis(1_700_000_000_000).unwrap()
        );

        assert_eq!(events[1].id, "hazard-idx-1");
        assert_eq!(events[1].coordinates, Coordinates::new(100.0, -5.0).unwrap());
        assert_eq!(events[1].intensity, Some(0.4));
        assert_eq!(events[1].kind, EventKind::Hazard);

        assert_eq!(events[2].id, "hazard-lon");
        assert_eq!(events[2].title, "Hazard 5");
    }

    #[test]
    fn numeric_upstream_id_and_missing_id_stay_distinct() {
        let events = parse(&json!([
            { "id": 1, "lat": 1.0, "lng": 1.0 },
            { "lat": 2.0, "lng": 2.0 }
        ]));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "hazard-1");
        assert_eq!(events[1].id, "hazard-idx-1");
        assert_ne!(events[0].id, events[1].id);
    }

    #[test]
    fn intensity_defaults_when_absent() {
        let body = serde_json::to_vec(&json!([{ "lat": 0.5, "lng": 0.5 }])).unwrap();
        let events = parse_hazards(&body, FEED, 2.5).unwrap();
        assert_eq!(events[0].intensity, Some(2.5));
        assert_eq!(events[0].sources[0].id, "UNDRR");
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        for body in [json!({ "items": [] }), json!("text"), json!(null), json!({ "data": {} })] {
            let bytes = serde_json::to_vec(&body).unwrap();
            assert!(parse_hazards(&bytes, FEED, 1.0).is_err(), "{} should be rejected", body);
        }
        assert!(parse_hazards(b"<html>", FEED, 1.0).is_err());
    }
}
