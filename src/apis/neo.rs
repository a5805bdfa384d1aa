use crate::apis::{fetch_body, index_id, lng_lat, provenance, redact_query, with_query};
use crate::app::ports::HttpClientPort;
use crate::config::NeoConfig;
use crate::constants::{NEO_ID_PREFIX, NEO_PROVENANCE, NEO_SOURCE};
use crate::error::{HazardError, Result};
use crate::infra::random::SharedRng;
use crate::types::{
    from_epoch_millis, now_millis, parse_timestamp, value_as_f64, value_as_id, Coordinates,
    EventKind, HazardSource, NormalizedEvent,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Close approaches from the NASA NeoWs feed.
pub struct NeoSource {
    config: NeoConfig,
    http: Arc<dyn HttpClientPort>,
    rng: Arc<SharedRng>,
}

impl NeoSource {
    pub fn new(config: NeoConfig, http: Arc<dyn HttpClientPort>, rng: Arc<SharedRng>) -> Self {
        Self { config, http, rng }
    }

    fn feed_url(&self) -> String {
        with_query(&self.config.url, &format!("api_key={}", self.config.api_key))
    }
}

#[async_trait::async_trait]
impl HazardSource for NeoSource {
    fn source_name(&self) -> &'static str {
        NEO_SOURCE
    }

    #[instrument(skip(self), fields(source = NEO_SOURCE))]
    async fn fetch_events(&self) -> Result<Vec<NormalizedEvent>> {
        let url = self.feed_url();
        // api_key lives in the query string
        debug!("Fetching near-earth objects from {}", redact_query(&url));
        let payload = fetch_body(self.http.as_ref(), &url).await?;
        let events = parse_neo_feed(&payload, &self.config.url, self.config.max_objects, &self.rng)?;
        info!("Successfully fetched {} near-earth objects", events.len());
        Ok(events)
    }
}

/// Flattens `near_earth_objects` (date → objects) in date order.
///
/// Each object yields one record from its first close approach; objects with
/// no approach data are skipped. `max_objects` bounds the total across all
/// dates, not per date.
pub fn parse_neo_feed(
    payload: &[u8],
    feed_url: &str,
    max_objects: usize,
    rng: &SharedRng,
) -> Result<Vec<NormalizedEvent>> {
    let data: Value = serde_json::from_slice(payload)?;
    let by_date = data["near_earth_objects"]
        .as_object()
        .ok_or_else(|| HazardError::MissingField("near_earth_objects".into()))?;

    let mut dates: Vec<&String> = by_date.keys().collect();
    dates.sort();

    let now = now_millis();
    let mut events = Vec::new();
    if max_objects == 0 {
        return Ok(events);
    }

    'dates: for date in dates {
        let Some(objects) = by_date[date.as_str()].as_array() else {
            debug!(date = %date, "Date bucket is not a list, skipping");
            continue;
        };
        for (index, object) in objects.iter().enumerate() {
            if let Some(event) = object_to_event(object, date, index, feed_url, now, rng) {
                events.push(event);
                if events.len() >= max_objects {
                    break 'dates;
                }
            }
        }
    }

    Ok(events)
}

fn object_to_event(
    object: &Value,
    date: &str,
    index: usize,
    feed_url: &str,
    now: chrono::DateTime<chrono::Utc>,
    rng: &SharedRng,
) -> Option<NormalizedEvent> {
    let approach = object["close_approach_data"].as_array()?.first()?;

    let id = value_as_id(&object["id"]).unwrap_or_else(|| index_id(format!("{}-{}", date, index)));
    let name = object["name"]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("Object {}", id));

    let coordinates = approach_point(approach)
        .or_else(|| approach_point(object))
        .unwrap_or_else(|| rng.point());

    let occurred_at = approach["epoch_date_close_approach"]
        .as_i64()
        .and_then(from_epoch_millis)
        .or_else(|| {
            approach["close_approach_date_full"]
                .as_str()
                .and_then(parse_timestamp)
        })
        .or_else(|| approach["close_approach_date"].as_str().and_then(parse_timestamp))
        .unwrap_or(now);

    let diameter_km = value_as_f64(
        &object["estimated_diameter"]["kilometers"]["estimated_diameter_max"],
    );
    let miss_km = value_as_f64(&approach["miss_distance"]["kilometers"]);
    let hazardous = object["is_potentially_hazardous_asteroid"]
        .as_bool()
        .unwrap_or(false);

    let mut description = match miss_km {
        Some(km) => format!("Close approach, miss distance {:.0} km", km),
        None => "Close approach".to_string(),
    };
    if hazardous {
        description.push_str(" (potentially hazardous)");
    }

    let detail_url = object["nasa_jpl_url"].as_str().map(|s| s.to_string());

    let mut event = NormalizedEvent::new(
        format!("{}-{}", NEO_ID_PREFIX, id),
        EventKind::Meteor,
        name,
        description,
        occurred_at,
        coordinates,
    );
    event.intensity = diameter_km;
    event.magnitude = value_as_f64(&object["absolute_magnitude_h"]);
    event.sources = vec![provenance(
        NEO_PROVENANCE,
        detail_url.as_deref().unwrap_or(feed_url),
    )];
    event.source_url = detail_url;
    Some(event)
}

/// `longitude`/`latitude` fields (or a `[lng, lat]` pair) when the record has them.
fn approach_point(value: &Value) -> Option<Coordinates> {
    let lng = value_as_f64(&value["longitude"]);
    let lat = value_as_f64(&value["latitude"]);
    match (lng, lat) {
        (Some(lng), Some(lat)) => Coordinates::new(lng, lat),
        _ => lng_lat(&value["coordinates"]).and_then(|(lng, lat)| Coordinates::new(lng, lat)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::testing::CannedHttp;
    use serde_json::json;

    const FEED: &str = "https://api.nasa.gov/neo/rest/v1/feed";

    fn object(id: &str, epoch: i64) -> Value {
        json!({
            "id": id,
            "name": format!("({})", id),
            "nasa_jpl_url": format!("https://ssd.jpl.nasa.gov/?sstr={}", id),
            "absolute_magnitude_h": 22.1,
            "is_potentially_hazardous_asteroid": false,
            "estimated_diameter": {
                "kilometers": { "estimated_diameter_min": 0.1, "estimated_diameter_max": 0.25 }
            },
            "close_approach_data": [
                {
                    "close_approach_date": "2023-11-14",
                    "close_approach_date_full": "2023-Nov-14 22:13",
                    "epoch_date_close_approach": epoch,
                    "miss_distance": { "kilometers": "4500000.7" }
                },
                { "epoch_date_close_approach": 0 }
            ]
        })
    }

    fn feed(days: &[(&str, usize)]) -> Vec<u8> {
        let mut buckets = serde_json::Map::new();
        for (date, count) in days {
            let objects: Vec<Value> = (0..*count)
                .map(|i| object(&format!("{}-{}", date, i), 1_700_000_000_000 + i as i64))
                .collect();
            buckets.insert(date.to_string(), Value::Array(objects));
        }
        serde_json::to_vec(&json!({ "element_count": 0, "near_earth_objects": buckets })).unwrap()
    }

    #[test]
    fn cap_applies_across_date_keys() {
        let payload = feed(&[("2023-11-14", 10), ("2023-11-15", 10), ("2023-11-16", 10)]);
        let events = parse_neo_feed(&payload, FEED, 20, &SharedRng::seeded(1)).unwrap();
        assert_eq!(events.len(), 20);
        assert!(events[..10].iter().all(|e| e.id.starts_with("neo-2023-11-14")));
        assert!(events[10..].iter().all(|e| e.id.starts_with("neo-2023-11-15")));

        let all = parse_neo_feed(&payload, FEED, 50, &SharedRng::seeded(1)).unwrap();
        assert_eq!(all.len(), 30);
    }

    #[test]
    fn cap_is_checked_inside_a_bucket() {
        let payload = feed(&[("2023-11-14", 10), ("2023-11-15", 10)]);
        let events = parse_neo_feed(&payload, FEED, 3, &SharedRng::seeded(1)).unwrap();
        assert_eq!(events.len(), 3);
        assert!(parse_neo_feed(&payload, FEED, 0, &SharedRng::seeded(1)).unwrap().is_empty());
    }

    #[test]
    fn uses_first_close_approach() {
        let payload = feed(&[("2023-11-14", 1)]);
        let events = parse_neo_feed(&payload, FEED, 20, &SharedRng::seeded(1)).unwrap();
        let neo = &events[0];
        assert_eq!(neo.kind, EventKind::Meteor);
        assert_eq!(neo.occurred_at, from_epoch_millis(1_700_000_000_000).unwrap());
        assert_eq!(neo.intensity, Some(0.25));
        assert_eq!(neo.magnitude, Some(22.1));
        assert_eq!(neo.description, "Close approach, miss distance 4500001 km");
        assert!(neo.categories.is_empty());
        assert_eq!(neo.sources[0].id, "NEOWS");
        assert!(neo.source_url.as_deref().unwrap().contains("sstr="));
    }

    #[test]
    fn missing_position_gets_seeded_placeholder() {
        let payload = feed(&[("2023-11-14", 2)]);
        let a = parse_neo_feed(&payload, FEED, 20, &SharedRng::seeded(5)).unwrap();
        let b = parse_neo_feed(&payload, FEED, 20, &SharedRng::seeded(5)).unwrap();
        assert_eq!(a[0].coordinates, b[0].coordinates);
        assert_ne!(a[0].coordinates, a[1].coordinates);
        for neo in &a {
            assert!(neo.coordinates.lng().is_finite() && neo.coordinates.lat().is_finite());
        }
    }

    #[test]
    fn explicit_position_is_kept() {
        let mut obj = object("x", 1_700_000_000_000);
        obj["close_approach_data"][0]["longitude"] = json!(12.5);
        obj["close_approach_data"][0]["latitude"] = json!(-45.0);
        let payload = serde_json::to_vec(&json!({ "near_earth_objects": { "2023-11-14": [obj] } })).unwrap();
        let events = parse_neo_feed(&payload, FEED, 20, &SharedRng::seeded(1)).unwrap();
        assert_eq!(events[0].coordinates, Coordinates::new(12.5, -45.0).unwrap());
    }

    #[test]
    fn falls_back_to_full_date_then_skips_objects_without_approaches() {
        let payload = serde_json::to_vec(&json!({
            "near_earth_objects": {
                "2023-11-14": [
                    { "id": "1", "close_approach_data": [] },
                    { "id": "2" },
                    { "id": "3", "close_approach_data": [{ "close_approach_date_full": "2023-Nov-14 22:13" }] }
                ]
            }
        }))
        .unwrap();
        let events = parse_neo_feed(&payload, FEED, 20, &SharedRng::seeded(1)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "neo-3");
        assert_eq!(events[0].title, "Object 3");
        assert_eq!(events[0].occurred_at, parse_timestamp("2023-11-14T22:13:00Z").unwrap());
        assert_eq!(events[0].intensity, None);
    }

    #[test]
    fn missing_bucket_map_is_an_error() {
        assert!(parse_neo_feed(br#"{"links":{}}"#, FEED, 20, &SharedRng::seeded(1)).is_err());
    }

    #[tokio::test]
    async fn sends_api_key() {
        let http = Arc::new(CannedHttp::ok(feed(&[("2023-11-14", 1)])));
        let config = NeoConfig {
            api_key: "secret".to_string(),
            ..NeoConfig::default()
        };
        let source = NeoSource::new(config, http.clone(), Arc::new(SharedRng::seeded(1)));
        assert_eq!(source.fetch_events().await.unwrap().len(), 1);
        assert_eq!(http.last_url().unwrap(), format!("{}?api_key=secret", FEED));
    }

    #[tokio::test]
    async fn api_key_joins_an_existing_query_string() {
        let http = Arc::new(CannedHttp::ok(feed(&[("2023-11-14", 1)])));
        let config = NeoConfig {
            url: format!("{}?start_date=2023-11-14", FEED),
            api_key: "secret".to_string(),
            ..NeoConfig::default()
        };
        let source = NeoSource::new(config, http.clone(), Arc::new(SharedRng::seeded(1)));
        source.fetch_events().await.unwrap();
        assert_eq!(
            http.last_url().unwrap(),
            format!("{}?start_date=2023-11-14&api_key=secret", FEED)
        );
    }
}
