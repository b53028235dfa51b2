use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::{sync::watch, time::Instant};
use tracing::{debug, trace, warn};

use crate::models::raw_value::{ChannelSnapshot, DeviceId, RawValue};

use super::{BusError, ItemsChangedHandler, PropertyBus};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 64;

/// Connection settings for the Venus OS MQTT bridge.
#[derive(Debug, Clone)]
pub struct VenusBusConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub portal_id: String,
    pub devices: Vec<DeviceId>,
    /// How long to collect the initial values, counted from the first
    /// connection, before serving `get_items`.
    pub settle: Duration,
}

#[derive(Default)]
struct BusState {
    snapshots: HashMap<DeviceId, ChannelSnapshot>,
    handlers: HashMap<DeviceId, Arc<dyn ItemsChangedHandler>>,
}

/// State shared between the bus handle and its driver task.
#[derive(Clone, Default)]
pub(super) struct SharedBusState {
    inner: Arc<Mutex<BusState>>,
}

impl SharedBusState {
    fn lock(&self) -> MutexGuard<'_, BusState> {
        // A handler never runs under the lock, so poisoning can't leave it half updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a changed value and hand it to the device's handler, if any.
    pub(super) async fn dispatch(&self, device: DeviceId, path: String, value: RawValue) {
        let handler = {
            let mut state = self.lock();
            state
                .snapshots
                .entry(device.clone())
                .or_default()
                .insert(path.clone(), value.clone());
            state.handlers.get(&device).cloned()
        };

        match handler {
            Some(handler) => {
                let mut snapshot = ChannelSnapshot::new();
                snapshot.insert(path, value);
                handler.items_changed(snapshot).await;
            }
            None => trace!("No handler for '{}' yet.", device),
        }
    }
}

/// Property bus backed by the Venus OS MQTT bridge, which publishes every
/// D-Bus item as `N/<portal>/<service>/<instance>/<path>` with a
/// `{"value": ...}` payload.
pub struct VenusBus {
    devices: Vec<DeviceId>,
    state: SharedBusState,
    ready_at: watch::Receiver<Option<Instant>>,
}

/// Everything the driver task needs to pump the MQTT connection.
pub struct VenusBusDriver {
    pub(super) client: AsyncClient,
    pub(super) eventloop: EventLoop,
    pub(super) portal_id: String,
    pub(super) devices: Vec<DeviceId>,
    pub(super) state: SharedBusState,
    settle: Duration,
    ready_at: watch::Sender<Option<Instant>>,
}

impl VenusBus {
    /// Create the bus handle and its driver. Nothing touches the network
    /// until the driver task is polled.
    pub fn new(config: VenusBusConfig) -> (Self, VenusBusDriver) {
        let mut options = MqttOptions::new(config.client_id, config.host, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let state = SharedBusState::default();
        let (ready_tx, ready_rx) = watch::channel(None);
        let bus = Self {
            devices: config.devices.clone(),
            state: state.clone(),
            ready_at: ready_rx,
        };
        let driver = VenusBusDriver {
            client,
            eventloop,
            portal_id: config.portal_id,
            devices: config.devices,
            state,
            settle: config.settle,
            ready_at: ready_tx,
        };
        (bus, driver)
    }

    fn check_device(&self, device: &DeviceId) -> Result<(), BusError> {
        if self.devices.contains(device) {
            Ok(())
        } else {
            Err(BusError::UnknownDevice(device.clone()))
        }
    }
}

#[async_trait]
impl PropertyBus for VenusBus {
    /// Waits for the first connection and the settle window after it, then
    /// returns every value seen so far.
    async fn get_items(&self, device: &DeviceId) -> Result<ChannelSnapshot, BusError> {
        self.check_device(device)?;
        let ready_at = {
            let mut ready_at = self.ready_at.clone();
            let settled = ready_at
                .wait_for(Option::is_some)
                .await
                .map_err(|_| BusError::Closed)?;
            (*settled).unwrap_or_else(Instant::now)
        };
        tokio::time::sleep_until(ready_at).await;

        let snapshot = self
            .state
            .lock()
            .snapshots
            .get(device)
            .cloned()
            .unwrap_or_default();
        debug!("Fetched {} items for '{}'.", snapshot.len(), device);
        Ok(snapshot)
    }

    async fn on_items_changed(
        &self,
        device: &DeviceId,
        handler: Arc<dyn ItemsChangedHandler>,
    ) -> Result<(), BusError> {
        self.check_device(device)?;
        self.state.lock().handlers.insert(device.clone(), handler);
        debug!("Registered change handler for '{}'.", device);
        Ok(())
    }
}

impl VenusBusDriver {
    /// Start the settle window. Only the first connection counts.
    pub(super) fn mark_connected(&self) {
        let settle = self.settle;
        self.ready_at.send_if_modified(|ready_at| {
            if ready_at.is_some() {
                return false;
            }
            *ready_at = Some(Instant::now() + settle);
            true
        });
    }

    pub(super) fn keepalive_topic(&self) -> String {
        format!("R/{}/keepalive", self.portal_id)
    }

    /// Ask the bridge to (re)publish everything. Never blocks the driver.
    pub(super) fn request_keepalive(&self) {
        if let Err(e) = self
            .client
            .try_publish(self.keepalive_topic(), QoS::AtMostOnce, false, "")
        {
            warn!("Failed to queue keepalive. Error: {}", e);
        }
    }

    pub(super) fn subscribe_devices(&self) {
        for device in &self.devices {
            let topic = format!("N/{}/{}/#", self.portal_id, device);
            match self.client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                Ok(()) => debug!("Subscribing to '{}'.", topic),
                Err(e) => warn!("Failed to queue subscription to '{}'. Error: {}", topic, e),
            }
        }
    }
}

/// Split a notification topic into device and property path.
/// `N/<portal>/battery/0/Dc/0/Power` -> (`battery/0`, `/Dc/0/Power`).
pub fn parse_topic(portal_id: &str, topic: &str) -> Option<(DeviceId, String)> {
    let rest = topic.strip_prefix("N/")?.strip_prefix(portal_id)?.strip_prefix('/')?;
    let mut parts = rest.splitn(3, '/');
    let service = parts.next().filter(|s| !s.is_empty())?;
    let instance = parts.next().filter(|s| !s.is_empty())?;
    let path = parts.next().filter(|s| !s.is_empty())?;
    Some((
        DeviceId(format!("{}/{}", service, instance)),
        format!("/{}", path),
    ))
}

/// Decode a `{"value": ...}` payload. An empty payload (the bridge's way of
/// saying the item went away) yields `Absent`.
pub fn parse_payload(payload: &[u8]) -> Result<RawValue, serde_json::Error> {
    if payload.is_empty() {
        return Ok(RawValue::Absent);
    }
    let json: serde_json::Value = serde_json::from_slice(payload)?;
    Ok(json
        .get("value")
        .map(RawValue::from)
        .unwrap_or(RawValue::Absent))
}
