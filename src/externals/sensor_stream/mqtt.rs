use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use tracing::{debug, info, trace};

use super::{MessageStream, StreamError, StreamMessage, StreamMessages, StreamSession};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 10;

/// Broker connection settings for the sensor feed.
#[derive(Debug, Clone)]
pub struct MqttStreamConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
}

/// Opens a fresh MQTT connection per session.
#[derive(Debug, Clone)]
pub struct MqttStream {
    config: MqttStreamConfig,
}

impl MqttStream {
    pub fn new(config: MqttStreamConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MessageStream for MqttStream {
    /// Resolves once the broker has acknowledged the connection.
    #[tracing::instrument(skip_all)]
    async fn connect(&self) -> Result<Box<dyn StreamSession>, StreamError> {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(KEEP_ALIVE);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => break,
                Ok(event) => trace!("Ignoring event while connecting: {:?}", event),
                Err(e) => return Err(StreamError::Connection(e.to_string())),
            }
        }
        info!(
            "Connected to sensor broker {}:{}.",
            self.config.host, self.config.port
        );

        Ok(Box::new(MqttSession {
            client,
            eventloop: Some(eventloop),
        }))
    }
}

struct MqttSession {
    client: AsyncClient,
    eventloop: Option<EventLoop>,
}

#[async_trait]
impl StreamSession for MqttSession {
    async fn subscribe(
        &mut self,
        topic_pattern: &str,
    ) -> Result<Box<dyn StreamMessages>, StreamError> {
        let eventloop = self.eventloop.take().ok_or(StreamError::SessionConsumed)?;
        self.client
            .subscribe(topic_pattern, QoS::AtMostOnce)
            .await
            .map_err(|_| StreamError::Subscribe(topic_pattern.to_string()))?;
        debug!("Requested subscription to '{}'.", topic_pattern);

        Ok(Box::new(MqttMessages {
            client: self.client.clone(),
            eventloop,
            topic_pattern: topic_pattern.to_string(),
        }))
    }
}

struct MqttMessages {
    // The event loop stops once every client handle is dropped.
    #[allow(dead_code)]
    client: AsyncClient,
    eventloop: EventLoop,
    topic_pattern: String,
}

#[async_trait]
impl StreamMessages for MqttMessages {
    async fn next(&mut self) -> Result<StreamMessage, StreamError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(StreamMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    })
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(StreamError::Subscribe(self.topic_pattern.clone()));
                    }
                    info!("Subscribed to '{}'.", self.topic_pattern);
                }
                Ok(_) => {}
                Err(e) => return Err(StreamError::Connection(e.to_string())),
            }
        }
    }
}
