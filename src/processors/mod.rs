use tracing::debug;

use crate::{
    externals::display::sink::DisplaySink, formatters::scaled, models::raw_value::RawValue,
};

pub mod battery;
pub mod climate;
pub mod solar;
pub mod trigger;

/// A numeric property mirrored onto one or more display fields.
#[derive(Debug, Clone)]
pub struct ScaledField {
    pub key: &'static str,
    pub scale: f64,
    pub fields: Vec<String>,
}

impl ScaledField {
    pub fn new(key: &'static str, scale: f64, fields: &[impl AsRef<str>]) -> Self {
        Self {
            key,
            scale,
            fields: fields.iter().map(|field| field.as_ref().to_string()).collect(),
        }
    }

    /// Scale `raw` and write it to every field. A value that can't be scaled
    /// leaves the fields as they are.
    pub async fn write(&self, sink: &DisplaySink, raw: &RawValue) {
        let Some(value) = scaled(raw, self.scale) else {
            debug!("Skipping '{}', not a usable number: {:?}", self.key, raw);
            return;
        };
        for field in &self.fields {
            sink.set_field(field, value).await;
        }
    }
}
