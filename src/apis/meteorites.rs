use crate::apis::{fetch_body, index_id, provenance, redact_query, with_query};
use crate::app::ports::HttpClientPort;
use crate::config::MeteoritesConfig;
use crate::constants::{METEORITES_ID_PREFIX, METEORITES_PROVENANCE, METEORITES_SOURCE};
use crate::error::{HazardError, Result};
use crate::types::{
    now_millis, parse_timestamp, value_as_f64, value_as_id, Coordinates, EventKind, HazardSource,
    NormalizedEvent,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Recorded meteorite landings from NASA's open-data catalogue.
pub struct MeteoritesSource {
    config: MeteoritesConfig,
    http: Arc<dyn HttpClientPort>,
}

impl MeteoritesSource {
    pub fn new(config: MeteoritesConfig, http: Arc<dyn HttpClientPort>) -> Self {
        Self { config, http }
    }

    fn query_url(&self) -> String {
        with_query(&self.config.url, &format!("$limit={}", self.config.limit))
    }
}

#[async_trait::async_trait]
impl HazardSource for MeteoritesSource {
    fn source_name(&self) -> &'static str {
        METEORITES_SOURCE
    }

    #[instrument(skip(self), fields(source = METEORITES_SOURCE))]
    async fn fetch_events(&self) -> Result<Vec<NormalizedEvent>> {
        let url = self.query_url();
        debug!("Fetching meteorite landings from {}", redact_query(&url));
        let payload = fetch_body(self.http.as_ref(), &url).await?;
        let events = parse_landings(&payload, &self.config.url)?;
        info!("Successfully fetched {} meteorite landings", events.len());
        Ok(events)
    }
}

/// Maps the landings array. Positions come from `reclat`/`reclong`, which the
/// dataset ships as numeric strings; rows without both are skipped.
pub fn parse_landings(payload: &[u8], feed_url: &str) -> Result<Vec<NormalizedEvent>> {
    let data: Value = serde_json::from_slice(payload)?;
    let rows = data.as_array().ok_or_else(|| {
        HazardError::UnexpectedShape("meteorite payload is not an array".into())
    })?;
    let now = now_millis();

    Ok(rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| row_to_event(index, row, feed_url, now))
        .collect())
}

fn row_to_event(
    index: usize,
    row: &Value,
    feed_url: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<NormalizedEvent> {
    let lat = value_as_f64(&row["reclat"])?;
    let lng = value_as_f64(&row["reclong"])?;
    let coordinates = Coordinates::new(lng, lat)?;

    let id = value_as_id(&row["id"]).unwrap_or_else(|| index_id(index));
    let name = row["name"].as_str().map(str::trim).filter(|n| !n.is_empty());
    let title = match name {
        Some(name) => format!("Meteorite: {}", name),
        None => "Meteorite landing".to_string(),
    };

    let mut details = Vec::new();
    if let Some(class) = row["recclass"].as_str().filter(|c| !c.is_empty()) {
        details.push(format!("class {}", class));
    }
    let mass = value_as_f64(&row["mass"]);
    if let Some(grams) = mass {
        details.push(format!("{} g", grams));
    }
    if let Some(fall) = row["fall"].as_str().filter(|f| !f.is_empty()) {
        details.push(fall.to_lowercase());
    }
    let description = if details.is_empty() {
        "Recorded meteorite landing".to_string()
    } else {
        details.join(", ")
    };

    let occurred_at = row["year"].as_str().and_then(parse_timestamp).unwrap_or(now);

    let mut event = NormalizedEvent::new(
        format!("{}-{}", METEORITES_ID_PREFIX, id),
        EventKind::Meteor,
        title,
        description,
        occurred_at,
        coordinates,
    );
    event.intensity = mass;
    event.sources = vec![provenance(METEORITES_PROVENANCE, feed_url)];
    Some(event)
}
