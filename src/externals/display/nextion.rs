use std::{io::Write, time::Duration};

use serialport::SerialPort;
use tracing::{debug, info};

use crate::models::display_value::DisplayValue;

use super::{DisplayError, DisplayTransport};

/// Every instruction and every reply on a Nextion link ends with three 0xFF bytes.
pub const TERMINATOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

const PORT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Writes field assignments to a Nextion panel over a serial port.
pub struct NextionTransport {
    port: Box<dyn SerialPort>,
}

impl NextionTransport {
    /// Open the serial port. Returns the transport and a second handle on the
    /// same port for reading events coming back from the panel.
    #[tracing::instrument(skip_all)]
    pub fn open(path: &str, baud_rate: u32) -> Result<(Self, Box<dyn SerialPort>), DisplayError> {
        let mut port = serialport::new(path, baud_rate)
            .timeout(PORT_TIMEOUT)
            .open()?;
        info!("Opened display port '{}' at {} baud.", path, baud_rate);

        // Flush whatever half-instruction the panel may have buffered.
        port.write_all(&TERMINATOR)?;

        let reader = port.try_clone()?;
        Ok((Self { port }, reader))
    }
}

impl DisplayTransport for NextionTransport {
    fn set_field(&mut self, name: &str, value: &DisplayValue) -> Result<(), DisplayError> {
        let instruction = encode_assignment(name, value)?;
        self.port.write_all(&instruction)?;
        debug!("Wrote {} bytes to display.", instruction.len());
        Ok(())
    }
}

/// Build the bytes for `name=value`, terminator included.
pub fn encode_assignment(name: &str, value: &DisplayValue) -> Result<Vec<u8>, DisplayError> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '[' || c == ']')
    {
        return Err(DisplayError::InvalidField(name.to_string()));
    }

    let mut instruction = match value {
        DisplayValue::Number(number) => format!("{}={}", name, number),
        DisplayValue::Text(text) => format!("{}=\"{}\"", name, escape_text(text)),
    }
    .into_bytes();
    instruction.extend_from_slice(&TERMINATOR);
    Ok(instruction)
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\r"),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    escaped
}

/// Something the panel told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextionEvent {
    Startup,
    Ready,
    Touch {
        page_id: u8,
        component_id: u8,
        pressed: bool,
    },
    /// A return code signalling that an instruction was rejected.
    Error { code: u8, description: &'static str },
    /// Any other complete frame.
    Other(Vec<u8>),
}

impl NextionEvent {
    /// Interpret one frame (terminator already stripped).
    pub fn from_frame(frame: &[u8]) -> Self {
        match frame {
            [0x00, 0x00, 0x00] => NextionEvent::Startup,
            [0x88] => NextionEvent::Ready,
            [0x65, page_id, component_id, event] => NextionEvent::Touch {
                page_id: *page_id,
                component_id: *component_id,
                pressed: *event == 0x01,
            },
            [code] => match error_description(*code) {
                Some(description) => NextionEvent::Error {
                    code: *code,
                    description,
                },
                None => NextionEvent::Other(frame.to_vec()),
            },
            _ => NextionEvent::Other(frame.to_vec()),
        }
    }
}

fn error_description(code: u8) -> Option<&'static str> {
    Some(match code {
        0x00 => "invalid instruction",
        0x02 => "invalid component id",
        0x03 => "invalid page id",
        0x1A => "invalid variable name or attribute",
        0x1B => "invalid variable operation",
        0x1C => "assignment failed",
        0x1E => "invalid quantity of parameters",
        0x20 => "invalid escape character",
        0x23 => "variable name too long",
        0x24 => "serial buffer overflow",
        _ => return None,
    })
}

/// Split as many complete frames as possible from a buffer.
/// Returns the decoded events and the bytes of any trailing partial frame.
pub fn decode_events_from_buffer(buffer: &[u8]) -> (Vec<NextionEvent>, &[u8]) {
    let mut remaining_buffer = buffer;
    let mut events = vec![];
    while let Some(end) = remaining_buffer
        .windows(TERMINATOR.len())
        .position(|window| window == TERMINATOR)
    {
        events.push(NextionEvent::from_frame(&remaining_buffer[..end]));
        remaining_buffer = &remaining_buffer[end + TERMINATOR.len()..];
    }
    (events, remaining_buffer)
}
