use chrono::{DateTime, TimeZone};

use crate::models::raw_value::RawValue;

/// Shown when a duration can't be formatted.
pub const PLACEHOLDER: &str = "-";

/// Format used for the clock on the summary page.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%y %H:%M:%S";

const SECONDS_PER_DAY: u64 = 60 * 60 * 24;
const SECONDS_PER_HOUR: u64 = 60 * 60;
const SECONDS_PER_MINUTE: u64 = 60;

/// Scale a raw value and round to the nearest integer.
/// Returns `None` if the value isn't numeric or doesn't fit a display integer.
pub fn scaled(raw: &RawValue, scale: f64) -> Option<i32> {
    raw.as_f64().and_then(|value| scale_value(value, scale))
}

/// Scale a plain number and round to the nearest integer.
pub fn scale_value(value: f64, scale: f64) -> Option<i32> {
    let scaled = (value * scale).round();
    if !scaled.is_finite() || scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
        return None;
    }
    Some(scaled as i32)
}

/// Render a remaining-time value given in seconds as `D.HH:MM`.
/// Anything other than a non-negative float renders as [`PLACEHOLDER`].
pub fn time_to_go(raw: &RawValue) -> String {
    match raw {
        RawValue::Float(seconds) if seconds.is_finite() && *seconds >= 0.0 => {
            let seconds = *seconds as u64;
            let days = seconds / SECONDS_PER_DAY;
            let remainder = seconds % SECONDS_PER_DAY;
            let hours = remainder / SECONDS_PER_HOUR;
            let minutes = (remainder % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
            format!("{}.{:02}:{:02}", days, hours, minutes)
        }
        _ => PLACEHOLDER.to_string(),
    }
}

/// Render a timestamp for the clock field.
pub fn timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format(TIMESTAMP_FORMAT).to_string()
}
