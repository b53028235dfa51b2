use async_trait::async_trait;
use tracing::trace;

use crate::{
    externals::{display::sink::DisplaySink, property_bus::ItemsChangedHandler},
    models::raw_value::ChannelSnapshot,
};

use super::ScaledField;

/// Mirrors one solar charger. The location label (`Roof`, `Ground`) is part
/// of every destination field name.
pub struct SolarProcessor {
    location: String,
    sink: DisplaySink,
    fields: Vec<ScaledField>,
}

impl SolarProcessor {
    pub fn new(location: &str, sink: DisplaySink) -> Self {
        let fields = vec![
            ScaledField::new(
                "/Yield/Power",
                1.0,
                &[
                    format!("Summary.x{}Power.val", location),
                    format!("Electric.x{}Power.val", location),
                ],
            ),
            ScaledField::new(
                "/History/Daily/0/Yield",
                100.0,
                &[
                    format!("Summary.x{}Yield.val", location),
                    format!("Electric.x{}Yield.val", location),
                ],
            ),
            ScaledField::new(
                "/History/Daily/0/MaxPower",
                1.0,
                &[format!("Electric.x{}MaxPwr.val", location)],
            ),
        ];
        Self {
            location: location.to_string(),
            sink,
            fields,
        }
    }

    #[tracing::instrument(skip_all, fields(location = %self.location))]
    pub async fn process(&self, snapshot: &ChannelSnapshot) {
        trace!("Processing {} solar items.", snapshot.len());
        for field in &self.fields {
            if let Some(raw) = snapshot.get(field.key) {
                field.write(&self.sink, raw).await;
            }
        }
    }
}

#[async_trait]
impl ItemsChangedHandler for SolarProcessor {
    async fn items_changed(&self, snapshot: ChannelSnapshot) {
        self.process(&snapshot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{display_value::DisplayValue, raw_value::RawValue},
        testing::recording_sink,
    };

    fn snapshot(items: &[(&str, f64)]) -> ChannelSnapshot {
        items
            .iter()
            .map(|(key, value)| (key.to_string(), RawValue::Float(*value)))
            .collect()
    }

    #[tokio::test]
    async fn test_roof_fields() {
        let (sink, log) = recording_sink();
        let processor = SolarProcessor::new("Roof", sink);
        processor
            .process(&snapshot(&[
                ("/Yield/Power", 412.6),
                ("/History/Daily/0/Yield", 1.237),
                ("/History/Daily/0/MaxPower", 655.4),
            ]))
            .await;

        assert_eq!(log.values_of("Summary.xRoofPower.val"), vec![DisplayValue::Number(413)]);
        assert_eq!(log.values_of("Electric.xRoofPower.val"), vec![DisplayValue::Number(413)]);
        assert_eq!(log.values_of("Summary.xRoofYield.val"), vec![DisplayValue::Number(124)]);
        assert_eq!(log.values_of("Electric.xRoofYield.val"), vec![DisplayValue::Number(124)]);
        assert_eq!(log.values_of("Electric.xRoofMaxPwr.val"), vec![DisplayValue::Number(655)]);
        assert_eq!(log.fields().len(), 5);
    }

    #[tokio::test]
    async fn test_max_power_is_detail_page_only() {
        let (sink, log) = recording_sink();
        let processor = SolarProcessor::new("Ground", sink);
        processor
            .process(&snapshot(&[("/History/Daily/0/MaxPower", 120.0)]))
            .await;
        assert_eq!(log.names(), vec!["Electric.xGroundMaxPwr.val".to_string()]);
    }

    #[tokio::test]
    async fn test_locations_do_not_collide() {
        let (sink, log) = recording_sink();
        let roof = SolarProcessor::new("Roof", sink.clone());
        let ground = SolarProcessor::new("Ground", sink);

        roof.process(&snapshot(&[("/Yield/Power", 100.0)])).await;
        ground.process(&snapshot(&[("/Yield/Power", 50.0)])).await;

        assert_eq!(log.values_of("Electric.xRoofPower.val"), vec![DisplayValue::Number(100)]);
        assert_eq!(log.values_of("Electric.xGroundPower.val"), vec![DisplayValue::Number(50)]);
    }

    #[tokio::test]
    async fn test_unrelated_keys_are_ignored() {
        let (sink, log) = recording_sink();
        let processor = SolarProcessor::new("Roof", sink);
        processor
            .process(&snapshot(&[("/Pv/V", 40.2), ("/State", 3.0)]))
            .await;
        assert!(log.fields().is_empty());
    }
}
