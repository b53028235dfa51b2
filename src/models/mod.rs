pub mod display_value;
pub mod raw_value;
pub mod sensor_mapping;
pub mod sensor_reading;
