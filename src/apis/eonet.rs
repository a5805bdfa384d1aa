use crate::apis::{fetch_body, index_id, is_point_geometry, lng_lat, redact_query, with_query};
use crate::app::ports::HttpClientPort;
use crate::config::EonetConfig;
use crate::constants::{EONET_ID_PREFIX, EONET_SOURCE};
use crate::error::{HazardError, Result};
use crate::types::{
    now_millis, parse_timestamp, value_as_f64, value_as_id, CategoryTag, Coordinates, EventKind,
    HazardSource, NormalizedEvent, SourceRef,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Open natural events from NASA EONET. Unlike the single-kind feeds this one
/// carries its own category and provenance lists.
pub struct EonetSource {
    config: EonetConfig,
    http: Arc<dyn HttpClientPort>,
}

impl EonetSource {
    pub fn new(config: EonetConfig, http: Arc<dyn HttpClientPort>) -> Self {
        Self { config, http }
    }

    fn query_url(&self) -> String {
        with_query(&self.config.url, &format!("status=open&limit={}", self.config.limit))
    }
}

#[async_trait::async_trait]
impl HazardSource for EonetSource {
    fn source_name(&self) -> &'static str {
        EONET_SOURCE
    }

    #[instrument(skip(self), fields(source = EONET_SOURCE))]
    async fn fetch_events(&self) -> Result<Vec<NormalizedEvent>> {
        let url = self.query_url();
        debug!("Fetching open events from {}", redact_query(&url));
        let payload = fetch_body(self.http.as_ref(), &url).await?;
        let events = parse_events(&payload)?;
        info!("Successfully fetched {} geometries from EONET", events.len());
        Ok(events)
    }
}

/// One record per point geometry of every event. Events tracked over time
/// (storms, drifting ice) therefore show up once per observation.
pub fn parse_events(payload: &[u8]) -> Result<Vec<NormalizedEvent>> {
    let data: Value = serde_json::from_slice(payload)?;
    let upstream_events = data["events"]
        .as_array()
        .ok_or_else(|| HazardError::MissingField("events".into()))?;

    let now = now_millis();
    let mut records = Vec::new();

    for (event_index, event) in upstream_events.iter().enumerate() {
        let Some(geometries) = event["geometry"].as_array() else {
            debug!(event_index, "Event has no geometry list");
            continue;
        };

        let event_id = value_as_id(&event["id"]).unwrap_or_else(|| index_id(event_index));
        let categories = tags(&event["categories"]);
        let sources = source_refs(&event["sources"]);
        let kind = categories
            .first()
            .map(|c| EventKind::from_category_id(&c.id))
            .unwrap_or(EventKind::Hazard);
        let title = event["title"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Event {}", event_id));
        let description = event["description"]
            .as_str()
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string)
            .or_else(|| categories.first().map(|c| c.title.clone()))
            .unwrap_or_default();
        let link = event["link"].as_str().map(str::to_string);

        for (geometry_index, geometry) in geometries.iter().enumerate() {
            if !is_point_geometry(geometry) {
                continue;
            }
            let Some(coordinates) = lng_lat(&geometry["coordinates"])
                .and_then(|(lng, lat)| Coordinates::new(lng, lat))
            else {
                debug!(event_id = %event_id, geometry_index, "Skipping geometry without coordinates");
                continue;
            };

            let occurred_at = geometry["date"]
                .as_str()
                .and_then(parse_timestamp)
                .unwrap_or(now);
            let magnitude = value_as_f64(&geometry["magnitudeValue"]);

            let mut record = NormalizedEvent::new(
                format!("{}-{}-{}", EONET_ID_PREFIX, event_id, geometry_index),
                kind,
                title.clone(),
                description.clone(),
                occurred_at,
                coordinates,
            );
            record.magnitude = magnitude;
            record.intensity = magnitude;
            record.source_url = link.clone();
            record.categories = categories.clone();
            record.sources = sources.clone();
            records.push(record);
        }
    }

    Ok(records)
}

fn tags(value: &Value) -> Vec<CategoryTag> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(CategoryTag {
                        id: value_as_id(&item["id"])?,
                        title: item["title"].as_str().unwrap_or_default().to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn source_refs(value: &Value) -> Vec<SourceRef> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(SourceRef {
                        id: value_as_id(&item["id"])?,
                        url: item["url"].as_str().unwrap_or_default().to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
