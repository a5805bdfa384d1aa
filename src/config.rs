use crate::error::{HazardError, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Ten years. Keeps the earthquake query window within what `chrono` can represent.
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub aggregator: AggregatorConfig,
    pub logging: LoggingConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Upper bound on one adapter's whole fetch, on top of the HTTP timeout
    pub source_timeout_secs: u64,
    /// 0 disables the result cache
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
    pub file_prefix: String,
    pub file: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub usgs: UsgsConfig,
    pub firms: FirmsConfig,
    pub neo: NeoConfig,
    pub hazards: HazardsConfig,
    pub gdacs: GdacsConfig,
    pub eonet: EonetConfig,
    pub meteorites: MeteoritesConfig,
    pub nhc: NhcConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UsgsConfig {
    pub enabled: bool,
    pub url: String,
    pub lookback_days: i64,
    pub min_magnitude: f64,
    /// Random-sample down to this many features when the feed returns more
    pub max_events: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FirmsConfig {
    pub enabled: bool,
    pub url: String,
    pub max_rows: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NeoConfig {
    pub enabled: bool,
    pub url: String,
    pub api_key: String,
    pub max_objects: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HazardsConfig {
    pub enabled: bool,
    pub url: String,
    pub default_intensity: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GdacsConfig {
    pub enabled: bool,
    pub url: String,
    pub event_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EonetConfig {
    pub enabled: bool,
    pub url: String,
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeteoritesConfig {
    pub enabled: bool,
    pub url: String,
    /// Sent as the dataset's `$limit` parameter
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NhcConfig {
    pub enabled: bool,
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: crate::infra::http_client::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: 15,
            cache_ttl_secs: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "hazard_feed=info,info".to_string(),
            dir: "logs".to_string(),
            file_prefix: "hazard_feed.log".to_string(),
            file: true,
        }
    }
}

impl Default for UsgsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://earthquake.usgs.gov/fdsnws/event/1/query".to_string(),
            lookback_days: 7,
            min_magnitude: 2.0,
            max_events: Some(500),
        }
    }
}

impl Default for FirmsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://firms.modaps.eosdis.nasa.gov/api/country/csv/demo_key/MODIS_NRT/USA/1"
                .to_string(),
            max_rows: 30,
        }
    }
}

impl Default for NeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://api.nasa.gov/neo/rest/v1/feed".to_string(),
            api_key: "DEMO_KEY".to_string(),
            max_objects: 20,
        }
    }
}

impl Default for HazardsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://data.undrr.org/api/json/hips/hazards/1.0.0/?limit=50&page=1".to_string(),
            default_intensity: 1.0,
        }
    }
}

impl Default for GdacsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://www.gdacs.org/gdacsapi/api/events/geteventlist/SEARCH".to_string(),
            event_type: "TC".to_string(),
        }
    }
}

impl Default for EonetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://eonet.gsfc.nasa.gov/api/v3/events".to_string(),
            limit: 100,
        }
    }
}

impl Default for MeteoritesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://data.nasa.gov/resource/y77d-th95.json".to_string(),
            limit: 100,
        }
    }
}

impl Default for NhcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://www.nhc.noaa.gov/xgtwo/two_atl_0d0.txt".to_string(),
        }
    }
}

impl Config {
    /// Loads `path` (or `config.toml`), falling back to defaults when the file
    /// is absent, then applies environment overrides.
    ///
    /// Environment overrides:
    /// - `HAZARD_HOST`, `HAZARD_PORT`
    /// - `HAZARD_LOG_LEVEL`
    /// - `HAZARD_CACHE_TTL_SECS`
    /// - `HAZARD_HTTP_TIMEOUT_SECS`
    /// - `NASA_API_KEY` (near-earth-object feed)
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
        let mut config = match fs::read_to_string(config_path) {
            Ok(contents) => Self::from_toml(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound && path.is_none() => {
                tracing::info!(path = config_path, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => {
                return Err(HazardError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path, e
                )))
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Applies overrides from `lookup`; unparseable values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HAZARD_HOST").and_then(|v| v.parse().ok()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("HAZARD_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(level) = lookup("HAZARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(ttl) = lookup("HAZARD_CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.aggregator.cache_ttl_secs = ttl;
        }
        if let Some(secs) = lookup("HAZARD_HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.http.timeout_secs = secs;
        }
        if let Some(key) = lookup("NASA_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.sources.neo.api_key = key;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(HazardError::Config("http.timeout_secs must be positive".into()));
        }
        if self.aggregator.source_timeout_secs == 0 {
            return Err(HazardError::Config(
                "aggregator.source_timeout_secs must be positive".into(),
            ));
        }
        if !(0..=MAX_LOOKBACK_DAYS).contains(&self.sources.usgs.lookback_days) {
            return Err(HazardError::Config(format!(
                "sources.usgs.lookback_days must be between 0 and {}",
                MAX_LOOKBACK_DAYS
            )));
        }
        if self.sources.usgs.max_events == Some(0) {
            return Err(HazardError::Config("sources.usgs.max_events must be positive when set".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregator.source_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        match self.aggregator.cache_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Whether the named adapter is switched on. Unknown names are off.
    pub fn source_enabled(&self, name: &str) -> bool {
        use crate::constants::*;
        match name {
            USGS_SOURCE => self.sources.usgs.enabled,
            FIRMS_SOURCE => self.sources.firms.enabled,
            NEO_SOURCE => self.sources.neo.enabled,
            HAZARDS_SOURCE => self.sources.hazards.enabled,
            GDACS_SOURCE => self.sources.gdacs.enabled,
            EONET_SOURCE => self.sources.eonet.enabled,
            METEORITES_SOURCE => self.sources.meteorites.enabled,
            NHC_SOURCE => self.sources.nhc.enabled,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_cover_every_source() {
        let config = Config::default();
        for name in crate::constants::get_supported_sources() {
            assert!(config.source_enabled(name), "{} should default to enabled", name);
        }
        assert_eq!(config.sources.firms.max_rows, 30);
        assert_eq!(config.sources.neo.max_objects, 20);
        assert!(config.cache_ttl().is_none());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000

            [sources.firms]
            max_rows = 5

            [sources.eonet]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.sources.firms.max_rows, 5);
        assert!(config.sources.firms.enabled);
        assert!(!config.source_enabled("eonet"));
        assert_eq!(config.sources.neo.api_key, "DEMO_KEY");
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("HAZARD_PORT", "not-a-port"),
            ("HAZARD_CACHE_TTL_SECS", "30"),
            ("NASA_API_KEY", "abc123"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(30)));
        assert_eq!(config.sources.neo.api_key, "abc123");
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bounds_the_lookback_window() {
        let mut config = Config::default();
        config.sources.usgs.lookback_days = MAX_LOOKBACK_DAYS;
        assert!(config.validate().is_ok());
        config.sources.usgs.lookback_days = i64::MAX;
        assert!(config.validate().is_err());
        config.sources.usgs.lookback_days = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_source_is_disabled() {
        assert!(!Config::default().source_enabled("ticketmaster"));
    }
}
