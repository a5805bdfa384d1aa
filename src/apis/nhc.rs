use crate::apis::{fetch_body, provenance, redact_query};
use crate::app::ports::HttpClientPort;
use crate::config::NhcConfig;
use crate::constants::{NHC_ID_PREFIX, NHC_PROVENANCE, NHC_SOURCE};
use crate::error::Result;
use crate::types::{now_millis, Coordinates, EventKind, HazardSource, NormalizedEvent};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const STORM_MARKERS: [&str; 3] = ["TROPICAL", "HURRICANE", "STORM"];
const POSITION_PATTERN: &str = r"(\d+\.\d+)([NS])\s+(\d+\.\d+)([EW])";

/// Storm positions scraped from the National Hurricane Center's plain-text outlook.
pub struct NhcSource {
    config: NhcConfig,
    http: Arc<dyn HttpClientPort>,
}

impl NhcSource {
    pub fn new(config: NhcConfig, http: Arc<dyn HttpClientPort>) -> Self {
        Self { config, http }
    }
}

#[async_trait::async_trait]
impl HazardSource for NhcSource {
    fn source_name(&self) -> &'static str {
        NHC_SOURCE
    }

    #[instrument(skip(self), fields(source = NHC_SOURCE))]
    async fn fetch_events(&self) -> Result<Vec<NormalizedEvent>> {
        debug!("Fetching storm outlook from {}", redact_query(&self.config.url));
        let payload = fetch_body(self.http.as_ref(), &self.config.url).await?;
        let text = String::from_utf8_lossy(&payload);
        let events = parse_outlook(&text, &self.config.url)?;
        info!("Successfully parsed {} storms from the NHC outlook", events.len());
        Ok(events)
    }
}

/// One storm per outlook line that mentions a storm and carries a position
/// such as `25.3N 71.2W`. Southern and western hemispheres come out negative.
pub fn parse_outlook(text: &str, feed_url: &str) -> Result<Vec<NormalizedEvent>> {
    let position = Regex::new(POSITION_PATTERN)?;
    let now = now_millis();

    Ok(text
        .lines()
        .enumerate()
        .filter(|(_, line)| STORM_MARKERS.iter().any(|marker| line.contains(marker)))
        .filter_map(|(index, line)| {
            let captures = position.captures(line)?;
            let mut lat: f64 = captures.get(1)?.as_str().parse().ok()?;
            let mut lng: f64 = captures.get(3)?.as_str().parse().ok()?;
            if captures.get(2)?.as_str() == "S" {
                lat = -lat;
            }
            if captures.get(4)?.as_str() == "W" {
                lng = -lng;
            }
            let Some(coordinates) = Coordinates::new(lng, lat) else {
                debug!(index, "Outlook position out of range");
                return None;
            };

            let title = line
                .split(' ')
                .next()
                .filter(|word| !word.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Storm {}", index + 1));

            let mut event = NormalizedEvent::new(
                format!("{}-{}", NHC_ID_PREFIX, index),
                EventKind::Storm,
                title,
                line.trim().to_string(),
                now,
                coordinates,
            );
            event.sources = vec![provenance(NHC_PROVENANCE, feed_url)];
            Some(event)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::testing::CannedHttp;

    const FEED: &str = "https://www.nhc.noaa.gov/xgtwo/two_atl_0d0.txt";

    const OUTLOOK: &str = "\
ZCZC MIATWOAT ALL
Tropical Weather Outlook
HURRICANE ERNESTO LOCATED NEAR 25.3N 71.2W MOVING NORTH
 TROPICAL STORM NEAR 12.5S 160.0E OVER WARM WATER
STORM ACTIVITY IS DISORGANIZED
Showers near 10.0N 40.0W are not a storm line
";

    #[test]
    fn reads_hemispheres_from_storm_lines() {
        let events = parse_outlook(OUTLOOK, FEED).unwrap();
        assert_eq!(events.len(), 2);

        let ernesto = &events[0];
        assert_eq!(ernesto.id, "nhc-2");
        assert_eq!(ernesto.kind, EventKind::Storm);
        assert_eq!(ernesto.title, "HURRICANE");
        assert_eq!(ernesto.coordinates, Coordinates::new(-71.2, 25.3).unwrap());
        assert_eq!(
            ernesto.description,
            "HURRICANE ERNESTO LOCATED NEAR 25.3N 71.2W MOVING NORTH"
        );
        assert_eq!(ernesto.sources[0].id, "NHC");

        // Leading space leaves no first word
        let southern = &events[1];
        assert_eq!(southern.id, "nhc-3");
        assert_eq!(southern.title, "Storm 4");
        assert_eq!(southern.coordinates, Coordinates::new(160.0, -12.5).unwrap());
    }

    #[test]
    fn out_of_range_positions_are_skipped() {
        let events = parse_outlook("STORM AT 95.0N 10.0W\n", FEED).unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn fetches_plain_text() {
        let http = Arc::new(CannedHttp::ok(OUTLOOK));
        let source = NhcSource::new(NhcConfig::default(), http.clone());
        assert_eq!(source.fetch_events().await.unwrap().len(), 2);
        assert_eq!(http.last_url().unwrap(), FEED);
    }
}
