use crate::apis::{fetch_body, provenance, redact_query};
use crate::app::ports::HttpClientPort;
use crate::config::FirmsConfig;
use crate::constants::{FIRMS_ID_PREFIX, FIRMS_PROVENANCE, FIRMS_SOURCE};
use crate::error::Result;
use crate::types::{now_millis, Coordinates, EventKind, HazardSource, NormalizedEvent};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const DEFAULT_BRIGHTNESS: f64 = 300.0;
const DEFAULT_CONFIDENCE: &str = "Medium";
const DEFAULT_AREA: &str = "Unknown Area";

/// Active-fire hotspots from NASA FIRMS, delivered as CSV text.
pub struct FirmsSource {
    config: FirmsConfig,
    http: Arc<dyn HttpClientPort>,
}

impl FirmsSource {
    pub fn new(config: FirmsConfig, http: Arc<dyn HttpClientPort>) -> Self {
        Self { config, http }
    }
}

#[async_trait::async_trait]
impl HazardSource for FirmsSource {
    fn source_name(&self) -> &'static str {
        FIRMS_SOURCE
    }

    #[instrument(skip(self), fields(source = FIRMS_SOURCE))]
    async fn fetch_events(&self) -> Result<Vec<NormalizedEvent>> {
        debug!("Fetching fire hotspots from {}", redact_query(&self.config.url));
        let payload = fetch_body(self.http.as_ref(), &self.config.url).await?;
        let text = String::from_utf8_lossy(&payload);
        let events = parse_hotspots(&text, &self.config.url, self.config.max_rows);
        info!("Successfully parsed {} fire hotspots from FIRMS", events.len());
        Ok(events)
    }
}

/// Parses the hotspot CSV. The first line is skipped without being trusted
/// as a header, then at most `max_rows` lines are read, columns taken by
/// position: latitude, longitude, confidence, brightness, area.
///
/// Blank lines and lines whose first two columns are not coordinates are
/// skipped but still count against `max_rows`.
pub fn parse_hotspots(text: &str, feed_url: &str, max_rows: usize) -> Vec<NormalizedEvent> {
    // The feed carries no per-row timestamp we rely on, so the whole batch shares one
    let now = now_millis();

    text.lines()
        .skip(1)
        .take(max_rows)
        .enumerate()
        .filter_map(|(index, line)| {
            let event = line_to_event(index, line, feed_url, now);
            if event.is_none() && !line.trim().is_empty() {
                debug!(index, "Skipping hotspot line without usable coordinates");
            }
            event
        })
        .collect()
}

fn line_to_event(
    index: usize,
    line: &str,
    feed_url: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<NormalizedEvent> {
    if line.trim().is_empty() {
        return None;
    }

    let mut columns = line.split(',').map(str::trim);
    let lat: f64 = columns.next()?.parse().ok()?;
    let lng: f64 = columns.next()?.parse().ok()?;
    let coordinates = Coordinates::new(lng, lat)?;

    let confidence = non_empty(columns.next()).unwrap_or(DEFAULT_CONFIDENCE);
    let brightness = columns
        .next()
        .and_then(|b| b.parse::<f64>().ok())
        .filter(|b| b.is_finite() && *b != 0.0)
        .unwrap_or(DEFAULT_BRIGHTNESS);
    let area = non_empty(columns.next()).unwrap_or(DEFAULT_AREA);

    let mut event = NormalizedEvent::new(
        format!("{}-{}", FIRMS_ID_PREFIX, index),
        EventKind::Wildfire,
        format!("Active fire: {}", area),
        format!("{} confidence - {}", confidence, area),
        now,
        coordinates,
    );
    event.intensity = Some(brightness);
    event.sources = vec![provenance(FIRMS_PROVENANCE, feed_url)];
    Some(event)
}

fn non_empty(column: Option<&str>) -> Option<&str> {
    column.filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::testing::CannedHttp;

    const FEED: &str = "https://firms.example/csv";

    #[test]
    fn reads_columns_by_position() {
        let csv = "lat,lng,confidence,brightness,area\n34.5,-118.2,high,330.4,Los Angeles\n";
        let events = parse_hotspots(csv, FEED, 30);
        assert_eq!(events.len(), 1);
        let fire = &events[0];
        assert_eq!(fire.id, "fire-0");
        assert_eq!(fire.kind, EventKind::Wildfire);
        assert_eq!(fire.coordinates.lng(), -118.2);
        assert_eq!(fire.coordinates.lat(), 34.5);
        assert_eq!(fire.intensity, Some(330.4));
        assert_eq!(fire.description, "high confidence - Los Angeles");
        assert_eq!(fire.categories[0].id, "wildfires");
        assert_eq!(fire.sources[0].id, "FIRMS");
    }

    #[test]
    fn missing_columns_fall_back_to_defaults() {
        let csv = "header\n10.0,20.0\n11.0,21.0,,,\n";
        let events = parse_hotspots(csv, FEED, 30);
        assert_eq!(events.len(), 2);
        for fire in &events {
            assert_eq!(fire.intensity, Some(300.0));
            assert_eq!(fire.description, "Medium confidence - Unknown Area");
        }
        assert_eq!(events[1].id, "fire-1");
    }

    #[test]
    fn bad_lines_are_skipped_not_fatal() {
        let csv = "header\nabc,def\n\n1.0,NaN\n95.0,10.0\n5.0,6.0,low,310,Somewhere\n";
        let events = parse_hotspots(csv, FEED, 30);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "fire-4");
    }

    #[test]
    fn header_is_never_parsed_even_when_numeric() {
        let csv = "1.0,2.0\n3.0,4.0\n";
        let events = parse_hotspots(csv, FEED, 30);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].coordinates.lat(), 3.0);
    }

    #[test]
    fn row_cap_bounds_lines_consumed() {
        let mut csv = String::from("header\n");
        for i in 0..100 {
            csv.push_str(&format!("{}.0,{}.0,nominal,300,Area {}\n", i % 80, i, i));
        }
        assert_eq!(parse_hotspots(&csv, FEED, 30).len(), 30);
        assert_eq!(parse_hotspots(&csv, FEED, 5).len(), 5);
        assert!(parse_hotspots("header only", FEED, 30).is_empty());
    }

    #[tokio::test]
    async fn fetches_configured_url() {
        let http = Arc::new(CannedHttp::ok("h\n1.5,2.5,high,320,Here\n"));
        let config = FirmsConfig {
            url: FEED.to_string(),
            ..FirmsConfig::default()
        };
        let source = FirmsSource::new(config, http.clone());
        let events = source.fetch_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(http.last_url().as_deref(), Some(FEED));
    }
}
