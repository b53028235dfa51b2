pub mod config;
pub mod engine;
pub mod externals;
pub mod formatters;
pub mod models;
pub mod processors;
pub mod tasks;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Result;
use config::BridgeConfig;
use engine::Engine;
use externals::{
    display::{nextion::NextionTransport, sink::DisplaySink, task::task_log_display_events},
    property_bus::{
        task::task_drive_venus_bus,
        venus::{VenusBus, VenusBusConfig},
    },
    sensor_stream::mqtt::{MqttStream, MqttStreamConfig},
};
use tasks::clock::SystemClock;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = BridgeConfig::from_env()?;
    tracing::info!("Starting with {:?}", config);

    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    let (transport, display_reader) =
        NextionTransport::open(&config.display_port, config.display_baud)?;
    let sink = DisplaySink::new(transport);

    let token_clone = token.clone();
    tracker.spawn(async move { task_log_display_events(token_clone, display_reader).await });

    let (bus, bus_driver) = VenusBus::new(VenusBusConfig {
        host: config.venus_host.clone(),
        port: config.venus_port,
        client_id: format!("victron-display-bus-{}", std::process::id()),
        portal_id: config.venus_portal_id.clone(),
        devices: vec![
            config.battery_device.clone(),
            config.roof_device.clone(),
            config.ground_device.clone(),
        ],
        settle: config.venus_settle,
    });

    let token_clone = token.clone();
    tracker.spawn(async move { task_drive_venus_bus(token_clone, bus_driver).await });

    let stream = MqttStream::new(MqttStreamConfig {
        host: config.sensor_host.clone(),
        port: config.sensor_port,
        client_id: format!("victron-display-sensors-{}", std::process::id()),
    });

    let engine = Engine::new(sink, Arc::new(bus), Arc::new(stream));

    let token_clone = token.clone();
    tokio::select! {
        _ = token_clone.cancelled() => {}
        res = signal::ctrl_c() => {
            match res {
                Ok(_) => {
                    tracing::warn!("Shutting down.");
                    token.cancel();
                },
                Err(e) => {
                    tracing::error!("Failed to listen for ctrl_c. Error: {}", e);
                    token.cancel();
                }
            };
        },
        res = engine.start(token.clone(), &tracker, &config, SystemClock) => {
            if let Err(e) = res {
                tracing::error!("Failed to start engine. Error: {}", e);
                token.cancel();
                tracker.close();
                tracker.wait().await;
                return Err(e.into());
            }
            tracing::info!("Engine running.");
            match signal::ctrl_c().await {
                Ok(_) => tracing::warn!("Shutting down."),
                Err(e) => tracing::error!("Failed to listen for ctrl_c. Error: {}", e),
            }
            token.cancel();
        },
    }

    tracker.close();
    tracker.wait().await;

    Ok(())
}
