use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::models::display_value::DisplayValue;

use super::DisplayTransport;

/// Shared handle to the display. The transport is a single byte stream, so
/// every write takes the lock for the full instruction.
#[derive(Clone)]
pub struct DisplaySink {
    transport: Arc<Mutex<Box<dyn DisplayTransport>>>,
}

impl DisplaySink {
    pub fn new(transport: impl DisplayTransport + 'static) -> Self {
        Self {
            transport: Arc::new(Mutex::new(Box::new(transport))),
        }
    }

    /// Write a value to a field. Failures are logged and never escalated, so
    /// callers simply carry on with their next field.
    pub async fn set_field(&self, name: &str, value: impl Into<DisplayValue>) {
        let value = value.into();
        let mut transport = self.transport.lock().await;
        match transport.set_field(name, &value) {
            Ok(()) => trace!("Set '{}' to {}.", name, value),
            Err(e) => warn!("Failed to set '{}' to {}. Error: {}", name, value, e),
        }
    }
}
