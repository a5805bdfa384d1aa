/// Registry names for the upstream adapters. These are the names accepted on
/// the CLI and used as config section keys.
pub const USGS_SOURCE: &str = "usgs";
pub const FIRMS_SOURCE: &str = "firms";
pub const NEO_SOURCE: &str = "neo";
pub const HAZARDS_SOURCE: &str = "hazards";
pub const GDACS_SOURCE: &str = "gdacs";
pub const EONET_SOURCE: &str = "eonet";
pub const METEORITES_SOURCE: &str = "meteorites";
pub const NHC_SOURCE: &str = "nhc";

// Id prefixes keep records from different adapters apart after the merge
pub const USGS_ID_PREFIX: &str = "eq";
pub const FIRMS_ID_PREFIX: &str = "fire";
pub const NEO_ID_PREFIX: &str = "neo";
pub const HAZARDS_ID_PREFIX: &str = "hazard";
pub const GDACS_ID_PREFIX: &str = "storm";
pub const EONET_ID_PREFIX: &str = "eonet";
pub const METEORITES_ID_PREFIX: &str = "meteorite";
pub const NHC_ID_PREFIX: &str = "nhc";

// Provenance ids attached to each record's `sources`
pub const USGS_PROVENANCE: &str = "USGS_EHP";
pub const FIRMS_PROVENANCE: &str = "FIRMS";
pub const NEO_PROVENANCE: &str = "NEOWS";
pub const HAZARDS_PROVENANCE: &str = "UNDRR";
pub const GDACS_PROVENANCE: &str = "GDACS";
pub const METEORITES_PROVENANCE: &str = "NASA_METEORITES";
pub const NHC_PROVENANCE: &str = "NHC";

/// Fixed registration order. The aggregator merges in this order, which is
/// also the tie-break order for events with equal timestamps.
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![
        USGS_SOURCE,
        FIRMS_SOURCE,
        NEO_SOURCE,
        HAZARDS_SOURCE,
        GDACS_SOURCE,
        EONET_SOURCE,
        METEORITES_SOURCE,
        NHC_SOURCE,
    ]
}

/// One row of the static category table the renderer uses for legends and colors.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct HazardCategory {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub color: [u8; 3],
    pub emoji: &'static str,
}

pub static HAZARD_CATEGORIES: [HazardCategory; 13] = [
    HazardCategory {
        id: "drought",
        title: "Drought",
        description: "Long lasting absence of precipitation affecting agriculture and livestock, and the overall availability of food and water.",
        color: [85, 55, 0],
        emoji: "🌵",
    },
    HazardCategory {
        id: "dustHaze",
        title: "Dust and Haze",
        description: "Related to dust storms, air pollution and other non-volcanic aerosols. Volcano-related plumes shall be included with the originating eruption event.",
        color: [180, 150, 70],
        emoji: "😶‍🌫️",
    },
    HazardCategory {
        id: "earthquakes",
        title: "Earthquakes",
        description: "Related to all manner of shaking and displacement. Certain aftermath of earthquakes may also be found under landslides and floods.",
        color: [0, 100, 0],
        emoji: "🌍",
    },
    HazardCategory {
        id: "floods",
        title: "Floods",
        description: "Related to aspects of actual flooding--e.g., inundation, water extending beyond river and lake extents.",
        color: [0, 0, 150],
        emoji: "🌊",
    },
    HazardCategory {
        id: "landslides",
        title: "Landslides",
        description: "Related to landslides and variations thereof: mudslides, avalanche.",
        color: [80, 130, 60],
        emoji: "🪨",
    },
    HazardCategory {
        id: "manmade",
        title: "Manmade",
        description: "Events that have been human-induced and are extreme in their extent.",
        color: [255, 0, 255],
        emoji: "👷",
    },
    HazardCategory {
        id: "seaLakeIce",
        title: "Sea and Lake Ice",
        description: "Related to all ice that resides on oceans and lakes, including sea and lake ice (permanent and seasonal) and icebergs.",
        color: [0, 143, 143],
        emoji: "🧊",
    },
    HazardCategory {
        id: "severeStorms",
        title: "Severe Storms",
        description: "Related to the atmospheric aspect of storms (hurricanes, cyclones, tornadoes, etc.). Results of storms may be included under floods, landslides, etc.",
        color: [150, 150, 150],
        emoji: "🌪️",
    },
    HazardCategory {
        id: "snow",
        title: "Snow",
        description: "Related to snow events, particularly extreme/anomalous snowfall in either timing or extent/depth.",
        color: [255, 255, 255],
        emoji: "🌨️",
    },
    HazardCategory {
        id: "tempExtremes",
        title: "Temperature Extremes",
        description: "Related to anomalous land temperatures, either heat or cold.",
        color: [255, 134, 0],
        emoji: "🌡️",
    },
    HazardCategory {
        id: "volcanoes",
        title: "Volcanoes",
        description: "Related to both the physical effects of an eruption (rock, ash, lava) and the atmospheric (ash and gas plumes).",
        color: [150, 48, 0],
        emoji: "🌋",
    },
    HazardCategory {
        id: "waterColor",
        title: "Water Color",
        description: "Related to events that alter the appearance of water: phytoplankton, red tide, algae, sediment, whiting, etc.",
        color: [80, 80, 120],
        emoji: "💧",
    },
    HazardCategory {
        id: "wildfires",
        title: "Wildfires",
        description: "Wildland fires includes all nature of fire, in forest and plains, as well as those that spread to become urban and industrial fire events. Fires may be naturally caused or manmade.",
        color: [255, 0, 0],
        emoji: "🔥",
    },
];

pub fn find_category(id: &str) -> Option<&'static HazardCategory> {
    HAZARD_CATEGORIES.iter().find(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn category_ids_are_unique() {
        let ids: HashSet<_> = HAZARD_CATEGORIES.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), HAZARD_CATEGORIES.len());
    }

    #[test]
    fn find_category_by_id() {
        assert_eq!(find_category("wildfires").map(|c| c.color), Some([255, 0, 0]));
        assert!(find_category("meteors").is_none());
    }
}
