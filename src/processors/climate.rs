use tracing::{debug, trace};

use crate::{
    externals::display::sink::DisplaySink,
    formatters::scale_value,
    models::{
        sensor_mapping::{self, SensorMapping},
        sensor_reading::ClimateReading,
    },
};

use super::trigger::CrossFieldTrigger;

const SCALE: f64 = 10.0;

/// Mirrors the ambient temperature/humidity sensors onto the climate page.
#[derive(Clone)]
pub struct ClimateProcessor {
    sink: DisplaySink,
    trigger: CrossFieldTrigger,
}

impl ClimateProcessor {
    pub fn new(sink: DisplaySink, trigger: CrossFieldTrigger) -> Self {
        Self { sink, trigger }
    }

    /// Show one sensor reading. Sensors missing from the mapping table are
    /// ignored. The cross-field trigger fires either way.
    #[tracing::instrument(skip_all, fields(sensor = %topic_key))]
    pub async fn process(&self, topic_key: &str, reading: &ClimateReading) {
        match sensor_mapping::lookup(topic_key) {
            Some(mapping) => self.write_reading(mapping, reading).await,
            None => debug!("No mapping for sensor '{}', ignoring.", topic_key),
        }
        self.trigger.trigger().await;
    }

    async fn write_reading(&self, mapping: &SensorMapping, reading: &ClimateReading) {
        trace!("Writing reading for '{}'.", mapping.display_prefix);
        let prefix = mapping.display_prefix;

        self.write(&format!("Climate.x{}Temp.val", prefix), Some(reading.temp.current))
            .await;
        self.write(&format!("Climate.x{}Hum.val", prefix), Some(reading.humidity.current))
            .await;

        if mapping.has_min_max {
            self.write(&format!("Climate.x{}TempMin.val", prefix), reading.temp.min)
                .await;
            self.write(&format!("Climate.x{}TempMax.val", prefix), reading.temp.max)
                .await;
            self.write(&format!("Climate.x{}HumMin.val", prefix), reading.humidity.min)
                .await;
            self.write(&format!("Climate.x{}HumMax.val", prefix), reading.humidity.max)
                .await;
        }

        if mapping.has_summary {
            self.write(&format!("Summary.x{}Hum.val", prefix), Some(reading.humidity.current))
                .await;
        }
    }

    async fn write(&self, field: &str, value: Option<f64>) {
        match value.and_then(|value| scale_value(value, SCALE)) {
            Some(value) => {
                self.sink.set_field(field, value).await;
            }
            None => debug!("No usable value for '{}'.", field),
        }
    }
}
