use thiserror::Error;

use crate::models::display_value::DisplayValue;

pub mod nextion;
pub mod sink;
pub mod task;

/// This trait separates the physical display link from the logic deciding
/// what to show, which keeps the processors unit testable.
pub trait DisplayTransport: Send {
    /// Write a single value to a named field on the display.
    fn set_field(&mut self, name: &str, value: &DisplayValue) -> Result<(), DisplayError>;
}

#[derive(Error, Debug)]
pub enum DisplayError {
    /// The serial port could not be opened or cloned.
    #[error("Failed to open display port. Error: {0}")]
    Open(#[from] serialport::Error),

    /// Writing the instruction to the port failed.
    #[error("Failed to write to display. Error: {0}")]
    Write(#[from] std::io::Error),

    /// The field name can't be sent as a display instruction.
    #[error("Invalid field name '{0}'.")]
    InvalidField(String),
}
