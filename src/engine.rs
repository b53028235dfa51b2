use std::sync::Arc;

use thiserror::Error;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info};

use crate::{
    config::BridgeConfig,
    externals::{
        display::sink::DisplaySink,
        property_bus::{BusError, ItemsChangedHandler, PropertyBus},
        sensor_stream::MessageStream,
    },
    models::raw_value::DeviceId,
    processors::{
        battery::BatteryProcessor, climate::ClimateProcessor, solar::SolarProcessor,
        trigger::CrossFieldTrigger,
    },
    tasks::{
        clock::{task_clock_ticker, WallClock},
        sensor_stream::{task_supervise_sensor_stream, StreamSupervisor},
    },
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to fetch initial items for '{0}'. Error: {1}")]
    InitialSnapshot(DeviceId, BusError),

    #[error("Failed to register for changes of '{0}'. Error: {1}")]
    Register(DeviceId, BusError),
}

/// Connects every data source to the display.
pub struct Engine {
    sink: DisplaySink,
    bus: Arc<dyn PropertyBus>,
    stream: Arc<dyn MessageStream>,
}

impl Engine {
    pub fn new(
        sink: DisplaySink,
        bus: Arc<dyn PropertyBus>,
        stream: Arc<dyn MessageStream>,
    ) -> Self {
        Self { sink, bus, stream }
    }

    /// Start the clock and the sensor stream, then show each bus device's
    /// current state and subscribe to its changes. The spawned tasks keep
    /// running after this returns, until `token` is cancelled.
    #[tracing::instrument(skip_all)]
    pub async fn start(
        self,
        token: CancellationToken,
        tracker: &TaskTracker,
        config: &BridgeConfig,
        clock: impl WallClock + 'static,
    ) -> Result<(), EngineError> {
        let trigger = CrossFieldTrigger::new(self.sink.clone());

        tracker.spawn(task_clock_ticker(token.clone(), self.sink.clone(), clock));

        let supervisor = StreamSupervisor::new(
            self.stream.clone(),
            ClimateProcessor::new(self.sink.clone(), trigger.clone()),
            &config.sensor_topic,
            config.reconnect_interval,
        );
        tracker.spawn(task_supervise_sensor_stream(token.clone(), supervisor));

        let channels: Vec<(DeviceId, Arc<dyn ItemsChangedHandler>)> = vec![
            (
                config.battery_device.clone(),
                Arc::new(BatteryProcessor::new(self.sink.clone(), trigger)),
            ),
            (
                config.roof_device.clone(),
                Arc::new(SolarProcessor::new("Roof", self.sink.clone())),
            ),
            (
                config.ground_device.clone(),
                Arc::new(SolarProcessor::new("Ground", self.sink.clone())),
            ),
        ];
        for (device, handler) in channels {
            self.attach_channel(device, handler).await?;
        }

        info!("All channels attached.");
        Ok(())
    }

    /// Process the device's full snapshot, then hand the processor to the bus
    /// for every later change.
    async fn attach_channel(
        &self,
        device: DeviceId,
        handler: Arc<dyn ItemsChangedHandler>,
    ) -> Result<(), EngineError> {
        let snapshot = self
            .bus
            .get_items(&device)
            .await
            .map_err(|e| EngineError::InitialSnapshot(device.clone(), e))?;
        debug!("Initial snapshot of '{}' has {} items.", device, snapshot.len());
        handler.items_changed(snapshot).await;

        self.bus
            .on_items_changed(&device, handler)
            .await
            .map_err(|e| EngineError::Register(device.clone(), e))?;
        info!("Attached '{}'.", device);
        Ok(())
    }
}
