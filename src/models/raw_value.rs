use std::collections::HashMap;

use derive_more::Display;

/// A value as delivered by an upstream collaborator. Anything that is not a
/// number or a string (null, arrays, booleans...) degrades to `Absent`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Float(f64),
    Text(String),
    Absent,
}

impl RawValue {
    /// The numeric value, if this is a `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&serde_json::Value> for RawValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(number) => {
                number.as_f64().map(RawValue::Float).unwrap_or(RawValue::Absent)
            }
            serde_json::Value::String(text) => RawValue::Text(text.clone()),
            _ => RawValue::Absent,
        }
    }
}

/// Identifies one property-bus source, e.g. `battery/0`.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(pub String);

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Property path (`/Dc/0/Power`) to value. Used both for the initial full
/// snapshot of a device and for incremental change notifications.
pub type ChannelSnapshot = HashMap<String, RawValue>;
