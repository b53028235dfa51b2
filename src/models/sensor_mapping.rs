/// How a single ambient sensor appears on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorMapping {
    /// Last segment of the sensor's topic, e.g. `inside` for `temphum/inside`.
    pub key: &'static str,
    /// Prefix used to build the sensor's field names, e.g. `In` -> `Climate.xInTemp.val`.
    pub display_prefix: &'static str,
    /// Whether the sensor has min/max fields on the climate page.
    pub has_min_max: bool,
    /// Whether the sensor's humidity is mirrored to the summary page.
    pub has_summary: bool,
}

/// Every sensor the display knows about. Keys must be unique.
pub static SENSOR_MAPPINGS: &[SensorMapping] = &[
    SensorMapping {
        key: "inside",
        display_prefix: "In",
        has_min_max: true,
        has_summary: true,
    },
    SensorMapping {
        key: "outside",
        display_prefix: "Out",
        has_min_max: true,
        has_summary: true,
    },
    SensorMapping {
        key: "fridge",
        display_prefix: "Rfg",
        has_min_max: false,
        has_summary: false,
    },
    SensorMapping {
        key: "freezer",
        display_prefix: "Frz",
        has_min_max: false,
        has_summary: false,
    },
];

/// Find the mapping for a sensor key. Unknown sensors yield `None`.
pub fn lookup(key: &str) -> Option<&'static SensorMapping> {
    SENSOR_MAPPINGS.iter().find(|mapping| mapping.key == key)
}

/// The sensor key of a topic is its last path segment.
pub fn topic_key(topic: &str) -> &str {
    topic.rsplit('/').next().unwrap_or(topic)
}
