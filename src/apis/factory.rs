use crate::apis::{
    eonet::EonetSource, firms::FirmsSource, gdacs::GdacsSource, hazards::HazardsSource,
    meteorites::MeteoritesSource, neo::NeoSource, nhc::NhcSource, usgs::UsgsSource,
};
use crate::app::ports::HttpClientPort;
use crate::config::Config;
use crate::constants::*;
use crate::infra::random::SharedRng;
use crate::types::HazardSource;
use std::sync::Arc;

/// Builds one adapter by its registry name, ignoring whether it is enabled.
pub fn create_source(
    name: &str,
    config: &Config,
    http: Arc<dyn HttpClientPort>,
    rng: Arc<SharedRng>,
) -> Option<Arc<dyn HazardSource>> {
    let sources = &config.sources;
    match name {
        USGS_SOURCE => Some(Arc::new(UsgsSource::new(sources.usgs.clone(), http, rng))),
        FIRMS_SOURCE => Some(Arc::new(FirmsSource::new(sources.firms.clone(), http))),
        NEO_SOURCE => Some(Arc::new(NeoSource::new(sources.neo.clone(), http, rng))),
        HAZARDS_SOURCE => Some(Arc::new(HazardsSource::new(sources.hazards.clone(), http))),
        GDACS_SOURCE => Some(Arc::new(GdacsSource::new(sources.gdacs.clone(), http))),
        EONET_SOURCE => Some(Arc::new(EonetSource::new(sources.eonet.clone(), http))),
        METEORITES_SOURCE => Some(Arc::new(MeteoritesSource::new(sources.meteorites.clone(), http))),
        NHC_SOURCE => Some(Arc::new(NhcSource::new(sources.nhc.clone(), http))),
        _ => None,
    }
}

/// Every enabled adapter, in registration order.
pub fn create_enabled_sources(
    config: &Config,
    http: Arc<dyn HttpClientPort>,
    rng: Arc<SharedRng>,
) -> Vec<Arc<dyn HazardSource>> {
    get_supported_sources()
        .into_iter()
        .filter(|name| config.source_enabled(name))
        .filter_map(|name| create_source(name, config, http.clone(), rng.clone()))
        .collect()
}
