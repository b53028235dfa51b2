use async_trait::async_trait;
use tracing::trace;

use crate::{
    externals::{display::sink::DisplaySink, property_bus::ItemsChangedHandler},
    formatters::time_to_go,
    models::raw_value::ChannelSnapshot,
};

use super::{trigger::CrossFieldTrigger, ScaledField};

pub const TIME_TO_GO_KEY: &str = "/TimeToGo";
pub const TIME_TO_GO_FIELD: &str = "Electric.txtTimeLeft.txt";
pub const TEMPERATURE_KEY: &str = "/Dc/0/Temperature";

/// Mirrors the battery monitor onto the summary and electric pages.
pub struct BatteryProcessor {
    sink: DisplaySink,
    trigger: CrossFieldTrigger,
    fields: Vec<ScaledField>,
}

impl BatteryProcessor {
    pub fn new(sink: DisplaySink, trigger: CrossFieldTrigger) -> Self {
        let fields = vec![
            ScaledField::new("/Dc/0/Power", 10.0, &["Summary.xPower.val", "Electric.xPower.val"]),
            ScaledField::new("/Soc", 100.0, &["Summary.xSoc.val", "Electric.xSoc.val"]),
            ScaledField::new("/Dc/0/Current", 10.0, &["Electric.xCurrent.val"]),
            ScaledField::new("/Dc/0/Voltage", 100.0, &["Electric.xVoltage.val"]),
            ScaledField::new("/ConsumedAmphours", 100.0, &["Electric.xConsumed.val"]),
            ScaledField::new(
                TEMPERATURE_KEY,
                10.0,
                &["Electric.xBatTemp.val", "Climate.xBatTemp.val"],
            ),
        ];
        Self {
            sink,
            trigger,
            fields,
        }
    }

    /// Write every field whose key is present in `snapshot`. Keys that are
    /// missing are left alone.
    #[tracing::instrument(skip_all)]
    pub async fn process(&self, snapshot: &ChannelSnapshot) {
        trace!("Processing {} battery items.", snapshot.len());
        for field in &self.fields {
            if let Some(raw) = snapshot.get(field.key) {
                field.write(&self.sink, raw).await;
            }
        }

        if let Some(raw) = snapshot.get(TIME_TO_GO_KEY) {
            self.sink.set_field(TIME_TO_GO_FIELD, time_to_go(raw)).await;
        }

        if snapshot.contains_key(TEMPERATURE_KEY) {
            self.trigger.trigger().await;
        }
    }
}

#[async_trait]
impl ItemsChangedHandler for BatteryProcessor {
    async fn items_changed(&self, snapshot: ChannelSnapshot) {
        self.process(&snapshot).await;
    }
}
