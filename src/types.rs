use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Category of a normalized event, used by the renderer to pick marker styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Earthquake,
    Wildfire,
    Meteor,
    Storm,
    Hazard,
}

impl EventKind {
    /// Id of the matching entry in the static category table, if there is one.
    pub fn category_id(&self) -> Option<&'static str> {
        match self {
            EventKind::Earthquake => Some("earthquakes"),
            EventKind::Wildfire => Some("wildfires"),
            EventKind::Storm => Some("severeStorms"),
            EventKind::Meteor | EventKind::Hazard => None,
        }
    }

    /// Kind for a categorized-feed category id. Unknown ids fall back to `Hazard`.
    pub fn from_category_id(id: &str) -> Self {
        match id {
            "earthquakes" => EventKind::Earthquake,
            "wildfires" => EventKind::Wildfire,
            "severeStorms" => EventKind::Storm,
            _ => EventKind::Hazard,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Earthquake => "earthquake",
            EventKind::Wildfire => "wildfire",
            EventKind::Meteor => "meteor",
            EventKind::Storm => "storm",
            EventKind::Hazard => "hazard",
        };
        f.write_str(name)
    }
}

/// A `[longitude, latitude]` pair. Construction rejects anything that cannot be plotted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    lng: f64,
    lat: f64,
}

impl Coordinates {
    pub fn new(lng: f64, lat: f64) -> Option<Self> {
        if !lng.is_finite() || !lat.is_finite() {
            return None;
        }
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some(Self { lng, lat })
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(c: Coordinates) -> Self {
        [c.lng, c.lat]
    }
}

impl TryFrom<[f64; 2]> for Coordinates {
    type Error = String;

    fn try_from(pair: [f64; 2]) -> std::result::Result<Self, Self::Error> {
        Coordinates::new(pair[0], pair[1])
            .ok_or_else(|| format!("invalid coordinates [{}, {}]", pair[0], pair[1]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTag {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub url: String,
}

/// The record shape every adapter produces and the delivery endpoint serializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub id: String,
    pub kind: EventKind,
    pub title: String,
    pub description: String,
    #[serde(with = "iso_millis")]
    pub occurred_at: DateTime<Utc>,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub magnitude: Option<f64>,
    #[serde(default)]
    pub intensity: Option<f64>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategoryTag>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

impl NormalizedEvent {
    /// Builds a record with the kind's table category attached and no optional fields.
    pub fn new(
        id: String,
        kind: EventKind,
        title: String,
        description: String,
        occurred_at: DateTime<Utc>,
        coordinates: Coordinates,
    ) -> Self {
        let categories = kind
            .category_id()
            .and_then(crate::constants::find_category)
            .map(|c| {
                vec![CategoryTag {
                    id: c.id.to_string(),
                    title: c.title.to_string(),
                }]
            })
            .unwrap_or_default();

        Self {
            id,
            kind,
            title,
            description,
            occurred_at,
            coordinates,
            magnitude: None,
            intensity: None,
            source_url: None,
            categories,
            sources: Vec::new(),
        }
    }
}

/// Core trait that every upstream feed adapter implements.
///
/// `fetch_events` is the fallible step; `fetch_records` is the fail-open
/// contract the rest of the system relies on.
#[async_trait::async_trait]
pub trait HazardSource: Send + Sync {
    /// Registry name of this adapter (`usgs`, `firms`, ...)
    fn source_name(&self) -> &'static str;

    /// Fetch and normalize everything the upstream currently offers.
    async fn fetch_events(&self) -> Result<Vec<NormalizedEvent>>;

    /// Like `fetch_events`, but any failure becomes an empty list.
    async fn fetch_records(&self) -> Vec<NormalizedEvent> {
        match self.fetch_events().await {
            Ok(events) => events,
            Err(e) => {
                warn!(source = self.source_name(), error = %e, "source failed, contributing no events");
                Vec::new()
            }
        }
    }
}

/// Current time truncated to milliseconds so it survives the ISO-8601 round trip.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

pub fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Parses the timestamp spellings the upstream feeds use. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive_formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%b-%d %H:%M",
    ];
    for format in &naive_formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Reads a number that upstreams sometimes send as a string.
pub fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Reads an identifier that may be a string or a number.
pub fn value_as_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// ISO-8601 rendering used on the wire.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coordinates_reject_non_finite_and_out_of_range() {
        assert!(Coordinates::new(f64::NAN, 10.0).is_none());
        assert!(Coordinates::new(10.0, f64::INFINITY).is_none());
        assert!(Coordinates::new(181.0, 0.0).is_none());
        assert!(Coordinates::new(0.0, -90.5).is_none());
        assert!(Coordinates::new(-122.4, 37.8).is_some());
    }

    #[test]
    fn coordinates_serialize_longitude_first() {
        let c = Coordinates::new(-122.4, 37.8).unwrap();
        assert_eq!(serde_json::to_value(c).unwrap(), json!([-122.4, 37.8]));
        assert!(serde_json::from_value::<Coordinates>(json!([500.0, 0.0])).is_err());
    }

    #[test]
    fn event_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(EventKind::Earthquake).unwrap(), json!("earthquake"));
        assert_eq!(EventKind::Storm.to_string(), "storm");
        assert_eq!(EventKind::from_category_id("volcanoes"), EventKind::Hazard);
    }

    #[test]
    fn new_event_carries_table_category() {
        let event = NormalizedEvent::new(
            "eq-1".into(),
            EventKind::Earthquake,
            "t".into(),
            "d".into(),
            now_millis(),
            Coordinates::new(1.0, 2.0).unwrap(),
        );
        assert_eq!(event.categories.len(), 1);
        assert_eq!(event.categories[0].id, "earthquakes");
        assert_eq!(event.categories[0].title, "Earthquakes");
    }

    #[test]
    fn parse_timestamp_variants() {
        let expected = from_epoch_millis(1_700_000_000_000).unwrap();
        assert_eq!(parse_timestamp("2023-11-14T22:13:20Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-11-14T22:13:20"), Some(expected));
        assert_eq!(parse_timestamp("2023-Nov-14 22:13").map(|d| d.timestamp()), Some(expected.timestamp() - 20));
        assert!(parse_timestamp("2023-11-14").is_some());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn numeric_coercion_accepts_strings() {
        assert_eq!(value_as_f64(&json!("12.5")), Some(12.5));
        assert_eq!(value_as_f64(&json!(3)), Some(3.0));
        assert_eq!(value_as_f64(&json!("abc")), None);
        assert_eq!(value_as_f64(&json!(null)), None);
        assert_eq!(value_as_id(&json!(42)), Some("42".to_string()));
        assert_eq!(value_as_id(&json!("  ")), None);
    }

    #[test]
    fn occurred_at_uses_millisecond_iso_strings() {
        let dt = from_epoch_millis(1_700_000_000_000).unwrap();
        assert_eq!(format_timestamp(&dt), "2023-11-14T22:13:20.000Z");
    }
}
