use std::{io::Read, time::Duration};

use anyhow::Result;
use serialport::SerialPort;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::nextion::{decode_events_from_buffer, NextionEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest unterminated tail kept between reads. No panel frame comes close.
const MAX_PENDING: usize = 1024;

/// Task: Listens for frames the display sends back (startup, touch, return
/// codes) and logs them. Exits on a read error or when cancelled.
#[tracing::instrument(skip_all)]
pub async fn task_log_display_events(token: CancellationToken, mut port: Box<dyn SerialPort>) {
    info!("Started.");

    let mut pending: Vec<u8> = vec![];
    loop {
        match read_from_port(&mut port) {
            Ok(bytes) => {
                for event in absorb_bytes(&mut pending, &bytes) {
                    log_event(event);
                }
            }
            Err(e) => {
                error!("Failed to read from display port. Error: {}", e);
                break;
            }
        }

        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        };
    }
}

/// Append freshly read bytes, decode every complete frame and keep the
/// unterminated tail. A tail longer than [`MAX_PENDING`] is line noise, so
/// only its last `MAX_PENDING` bytes survive.
fn absorb_bytes(pending: &mut Vec<u8>, bytes: &[u8]) -> Vec<NextionEvent> {
    pending.extend_from_slice(bytes);
    let (events, remaining) = decode_events_from_buffer(pending);
    let keep_from = pending.len() - remaining.len().min(MAX_PENDING);
    if remaining.len() > MAX_PENDING {
        debug!(
            "Dropping {} bytes of unterminated display input.",
            remaining.len() - MAX_PENDING
        );
    }
    pending.drain(..keep_from);
    events
}

fn log_event(event: NextionEvent) {
    match event {
        NextionEvent::Startup => info!("Display has booted up."),
        NextionEvent::Ready => debug!("Display is ready."),
        NextionEvent::Touch {
            page_id,
            component_id,
            pressed,
        } => info!(
            "Component {} on page {} was {}.",
            component_id,
            page_id,
            if pressed { "pressed" } else { "released" }
        ),
        NextionEvent::Error { code, description } => {
            warn!("Display rejected an instruction: {} (0x{:02X}).", description, code)
        }
        NextionEvent::Other(frame) => debug!("Unhandled display frame: {:02X?}", frame),
    }
}

#[instrument(skip_all)]
fn read_from_port(port: &mut Box<dyn SerialPort>) -> Result<Vec<u8>> {
    let available = port.bytes_to_read()?;
    if available == 0 {
        trace!("Nothing to read yet.");
        return Ok(vec![]);
    }

    let mut read_buffer: [u8; 1024] = [0; 1024];
    let bytes_read = port.read(&mut read_buffer)?;
    trace!("Received {} bytes", bytes_read);
    Ok(read_buffer[..bytes_read].to_vec())
}
