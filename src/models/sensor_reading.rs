use serde::Deserialize;

/// One measured quantity from an ambient sensor. Not every sensor reports
/// its min/max.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SensorReading {
    pub current: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// Payload of a single message on the temperature/humidity feed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClimateReading {
    pub temp: SensorReading,
    pub humidity: SensorReading,
}

impl ClimateReading {
    /// Decode a JSON payload such as
    /// `{"temp":{"current":21.3,"min":19.0,"max":23.0},"humidity":{"current":55.2}}`.
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
