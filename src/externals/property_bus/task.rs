use std::time::Duration;

use rumqttc::{Event, Packet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::venus::{parse_payload, parse_topic, SharedBusState, VenusBusDriver};

/// The bridge stops publishing unless it hears a keepalive at least once a minute.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Task: Pumps the Venus MQTT connection. Delivers each notification to the
/// registered handler before reading the next one, so a device's changes
/// arrive in the order they were published. The client reconnects on its
/// own after a connection error.
#[tracing::instrument(skip_all)]
pub async fn task_drive_venus_bus(token: CancellationToken, mut driver: VenusBusDriver) {
    info!("Started.");

    let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            _ = keepalive.tick() => {
                trace!("Sending keepalive.");
                driver.request_keepalive();
            },
            event = driver.eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to Venus bus.");
                    driver.mark_connected();
                    driver.subscribe_devices();
                    driver.request_keepalive();
                },
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    handle_notification(
                        &driver.portal_id,
                        &driver.state,
                        &publish.topic,
                        &publish.payload,
                    )
                    .await;
                },
                Ok(_) => {},
                Err(e) => {
                    warn!("Venus bus connection error. Error: {}", e);
                    tokio::select! {
                        _ = token.cancelled() => {
                            warn!("Cancelled.");
                            break;
                        },
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                },
            },
        }
    }
}

async fn handle_notification(
    portal_id: &str,
    state: &SharedBusState,
    topic: &str,
    payload: &[u8],
) {
    let Some((device, path)) = parse_topic(portal_id, topic) else {
        debug!("Ignoring notification on '{}'.", topic);
        return;
    };
    let value = match parse_payload(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to decode payload on '{}'. Error: {}", topic, e);
            return;
        }
    };
    trace!("{}{} = {:?}", device, path, value);
    state.dispatch(device, path, value).await;
}
