pub mod display;
pub mod property_bus;
pub mod sensor_stream;
