pub mod eonet;
pub mod factory;
pub mod firms;
pub mod gdacs;
pub mod hazards;
pub mod meteorites;
pub mod neo;
pub mod nhc;
pub mod usgs;

use crate::app::ports::HttpClientPort;
use crate::error::{HazardError, Result};
use crate::types::SourceRef;

/// GET `url` and hand back the body, treating any non-2xx answer as a failure.
pub(crate) async fn fetch_body(http: &dyn HttpClientPort, url: &str) -> Result<Vec<u8>> {
    let resp = http.get(url).await?;
    if !resp.is_success() {
        return Err(HazardError::UpstreamStatus {
            status: resp.status,
            url: url.to_string(),
        });
    }
    Ok(resp.bytes)
}

pub(crate) fn provenance(id: &str, url: &str) -> SourceRef {
    SourceRef {
        id: id.to_string(),
        url: url.to_string(),
    }
}

/// Reads `[lng, lat, ...]` out of a GeoJSON-style coordinate array.
pub(crate) fn lng_lat(value: &serde_json::Value) -> Option<(f64, f64)> {
    let pair = value.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    Some((pair[0].as_f64()?, pair[1].as_f64()?))
}

/// `true` when a GeoJSON geometry is absent a type or declares itself a Point.
pub(crate) fn is_point_geometry(geometry: &serde_json::Value) -> bool {
    match geometry.get("type").and_then(|t| t.as_str()) {
        Some(kind) => kind.eq_ignore_ascii_case("point"),
        None => true,
    }
}

/// Id segment for an item the upstream gave no id. The `idx-` namespace keeps
/// it clear of real upstream ids, which are often bare numbers.
pub(crate) fn index_id(index: impl std::fmt::Display) -> String {
    format!("idx-{}", index)
}

/// Appends `query` to `base`, joining with `&` when `base` already has a query string.
pub(crate) fn with_query(base: &str, query: &str) -> String {
    let separator = match base.find('?') {
        Some(at) if at + 1 == base.len() || base.ends_with('&') => "",
        Some(_) => "&",
        None => "?",
    };
    format!("{}{}{}", base, separator, query)
}

/// Strip query-string noise from a URL before putting it in logs.
pub(crate) fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_query_picks_the_separator() {
        assert_eq!(with_query("https://a.test/feed", "k=1"), "https://a.test/feed?k=1");
        assert_eq!(with_query("https://a.test/feed?x=2", "k=1"), "https://a.test/feed?x=2&k=1");
        assert_eq!(with_query("https://a.test/feed?", "k=1"), "https://a.test/feed?k=1");
        assert_eq!(with_query("https://a.test/feed?x=2&", "k=1"), "https://a.test/feed?x=2&k=1");
    }

    #[test]
    fn index_ids_stay_out_of_the_numeric_space() {
        assert_eq!(index_id(3), "idx-3");
        assert_ne!(index_id(1), "1");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::app::ports::{HttpClientPort, HttpGetResult};
    use crate::error::{HazardError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves one canned response and remembers the URLs it was asked for.
    pub struct CannedHttp {
        pub status: u16,
        pub body: Vec<u8>,
        pub requested: Mutex<Vec<String>>,
    }

    impl CannedHttp {
        pub fn ok(body: impl Into<Vec<u8>>) -> Self {
            Self {
                status: 200,
                body: body.into(),
                requested: Mutex::new(Vec::new()),
            }
        }

        pub fn status(status: u16) -> Self {
            Self {
                status,
                body: Vec::new(),
                requested: Mutex::new(Vec::new()),
            }
        }

        pub fn last_url(&self) -> Option<String> {
            self.requested.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl HttpClientPort for CannedHttp {
        async fn get(&self, url: &str) -> Result<HttpGetResult> {
            self.requested.lock().unwrap().push(url.to_string());
            Ok(HttpGetResult {
                status: self.status,
                bytes: self.body.clone(),
                content_type: "application/json".to_string(),
                content_length: self.body.len() as u64,
            })
        }
    }

    /// Always fails at the transport level.
    pub struct BrokenHttp;

    #[async_trait]
    impl HttpClientPort for BrokenHttp {
        async fn get(&self, url: &str) -> Result<HttpGetResult> {
            Err(HazardError::Api {
                message: format!("connection refused: {}", url),
            })
        }
    }
}
