use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::raw_value::{ChannelSnapshot, DeviceId};

pub mod task;
pub mod venus;

/// Receives change notifications for one device. Implementations are
/// awaited in place by the bus, so they must not block indefinitely.
#[async_trait]
pub trait ItemsChangedHandler: Send + Sync {
    async fn items_changed(&self, snapshot: ChannelSnapshot);
}

/// The bus publishing device attributes and their changes.
#[async_trait]
pub trait PropertyBus: Send + Sync {
    /// Fetch the full current state of a device.
    async fn get_items(&self, device: &DeviceId) -> Result<ChannelSnapshot, BusError>;

    /// Deliver every later change of `device` to `handler`, in source order.
    async fn on_items_changed(
        &self,
        device: &DeviceId,
        handler: Arc<dyn ItemsChangedHandler>,
    ) -> Result<(), BusError>;
}

#[derive(Error, Debug)]
pub enum BusError {
    /// The device is not one the bus was configured to follow.
    #[error("Unknown device '{0}'.")]
    UnknownDevice(DeviceId),

    /// The connection driver stopped before the bus ever connected.
    #[error("Bus driver stopped before connecting.")]
    Closed,
}
