pub mod clock;
pub mod sensor_stream;
