use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    externals::sensor_stream::{MessageStream, StreamMessage, StreamMessages, StreamSession},
    models::{sensor_mapping::topic_key, sensor_reading::ClimateReading},
    processors::climate::ClimateProcessor,
};

/// Lifecycle of the sensor feed subscription.
pub enum StreamState {
    /// Waiting out the reconnect interval after a fault.
    Disconnected,
    /// About to open a session.
    Connecting,
    /// Session open, not yet subscribed.
    Subscribed(Box<dyn StreamSession>),
    /// Pulling messages.
    Consuming(Box<dyn StreamMessages>),
}

impl StreamState {
    pub fn name(&self) -> &'static str {
        match self {
            StreamState::Disconnected => "Disconnected",
            StreamState::Connecting => "Connecting",
            StreamState::Subscribed(_) => "Subscribed",
            StreamState::Consuming(_) => "Consuming",
        }
    }
}

/// Keeps the temperature/humidity feed flowing into the climate processor,
/// rebuilding the session after every fault.
pub struct StreamSupervisor {
    stream: Arc<dyn MessageStream>,
    processor: ClimateProcessor,
    topic_pattern: String,
    reconnect_interval: Duration,
}

impl StreamSupervisor {
    pub fn new(
        stream: Arc<dyn MessageStream>,
        processor: ClimateProcessor,
        topic_pattern: &str,
        reconnect_interval: Duration,
    ) -> Self {
        Self {
            stream,
            processor,
            topic_pattern: topic_pattern.to_string(),
            reconnect_interval,
        }
    }

    /// Perform one transition of the state machine.
    pub async fn step(&self, state: StreamState) -> StreamState {
        match state {
            StreamState::Disconnected => {
                debug!(
                    "Waiting {:?} before reconnecting.",
                    self.reconnect_interval
                );
                tokio::time::sleep(self.reconnect_interval).await;
                StreamState::Connecting
            }
            StreamState::Connecting => match self.stream.connect().await {
                Ok(session) => StreamState::Subscribed(session),
                Err(e) => {
                    warn!("Failed to connect to sensor stream. Error: {}", e);
                    StreamState::Disconnected
                }
            },
            StreamState::Subscribed(mut session) => {
                match session.subscribe(&self.topic_pattern).await {
                    Ok(messages) => {
                        info!("Consuming '{}'.", self.topic_pattern);
                        StreamState::Consuming(messages)
                    }
                    Err(e) => {
                        warn!("Failed to subscribe to sensor stream. Error: {}", e);
                        StreamState::Disconnected
                    }
                }
            }
            StreamState::Consuming(mut messages) => match messages.next().await {
                Ok(message) => {
                    self.handle_message(message).await;
                    StreamState::Consuming(messages)
                }
                Err(e) => {
                    warn!("Sensor stream faulted. Error: {}", e);
                    StreamState::Disconnected
                }
            },
        }
    }

    /// A payload that doesn't decode is dropped; the stream carries on.
    async fn handle_message(&self, message: StreamMessage) {
        trace!("Got message on '{}'.", message.topic);
        let reading = match ClimateReading::from_payload(&message.payload) {
            Ok(reading) => reading,
            Err(e) => {
                warn!(
                    "Failed to decode sensor payload on '{}'. Error: {}",
                    message.topic, e
                );
                return;
            }
        };
        self.processor
            .process(topic_key(&message.topic), &reading)
            .await;
    }
}

/// Task: Runs the sensor stream state machine until cancelled. Starts by
/// connecting straight away and never gives up on its own.
#[tracing::instrument(skip_all)]
pub async fn task_supervise_sensor_stream(token: CancellationToken, supervisor: StreamSupervisor) {
    info!("Started.");

    let mut state = StreamState::Connecting;
    loop {
        trace!("Stream state: {}.", state.name());
        state = tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            next = supervisor.step(state) => next,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::display_value::DisplayValue,
        processors::trigger::{CrossFieldTrigger, TRIGGER_FIELDS},
        testing::{recording_sink, FieldLog, ScriptedStream, SessionScript},
    };
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_secs(5);

    fn supervisor(stream: ScriptedStream) -> (StreamSupervisor, FieldLog) {
        let (sink, log) = recording_sink();
        let processor = ClimateProcessor::new(sink.clone(), CrossFieldTrigger::new(sink));
        (
            StreamSupervisor::new(Arc::new(stream), processor, "temphum/#", INTERVAL),
            log,
        )
    }

    fn message(topic: &str, payload: &str) -> StreamMessage {
        StreamMessage {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_while_consuming_reconnects_after_interval() {
        let stream = ScriptedStream::new(vec![SessionScript::Deliver(vec![])]);
        let attempts = stream.attempts();
        let (supervisor, _log) = supervisor(stream);

        let state = supervisor.step(StreamState::Connecting).await;
        assert_eq!(state.name(), "Subscribed");
        let state = supervisor.step(state).await;
        assert_eq!(state.name(), "Consuming");
        let state = supervisor.step(state).await;
        assert_eq!(state.name(), "Disconnected");

        let before = Instant::now();
        let state = supervisor.step(state).await;
        assert_eq!(state.name(), "Connecting");
        assert_eq!(Instant::now() - before, INTERVAL);
        assert_eq!(attempts.instants().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_and_subscribe_faults_disconnect() {
        let stream = ScriptedStream::new(vec![
            SessionScript::RefuseConnect,
            SessionScript::RejectSubscribe,
        ]);
        let (supervisor, _log) = supervisor(stream);

        let state = supervisor.step(StreamState::Connecting).await;
        assert_eq!(state.name(), "Disconnected");

        let state = supervisor.step(StreamState::Connecting).await;
        assert_eq!(state.name(), "Subscribed");
        let state = supervisor.step(state).await;
        assert_eq!(state.name(), "Disconnected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_forever_at_fixed_interval() {
        let stream = ScriptedStream::new(vec![
            SessionScript::Deliver(vec![]),
            SessionScript::RejectSubscribe,
        ]);
        let attempts = stream.attempts();
        let (supervisor, _log) = supervisor(stream);
        let token = CancellationToken::new();

        let handle = tokio::spawn(task_supervise_sensor_stream(token.clone(), supervisor));
        tokio::time::sleep(Duration::from_secs(31)).await;
        token.cancel();
        handle.await.expect("supervisor panicked");

        let instants = attempts.instants();
        assert_eq!(instants.len(), 7);
        for pair in instants.windows(2) {
            assert_eq!(pair[1] - pair[0], INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_payload_does_not_stop_consuming() {
        let stream = ScriptedStream::new(vec![SessionScript::Deliver(vec![
            message("temphum/fridge", "{not json"),
            message(
                "temphum/inside",
                r#"{"temp":{"current":21.3,"min":19.0,"max":23.0},"humidity":{"current":55.2,"min":40.0,"max":60.0}}"#,
            ),
            message(
                "temphum/garage",
                r#"{"temp":{"current":10.0},"humidity":{"current":70.0}}"#,
            ),
        ])]);
        let (supervisor, log) = supervisor(stream);

        let mut state = supervisor.step(StreamState::Connecting).await;
        state = supervisor.step(state).await;

        state = supervisor.step(state).await;
        assert_eq!(state.name(), "Consuming");
        assert!(log.fields().is_empty());

        state = supervisor.step(state).await;
        assert_eq!(state.name(), "Consuming");
        assert_eq!(log.values_of("Climate.xInTemp.val"), vec![DisplayValue::Number(213)]);
        assert_eq!(log.values_of("Summary.xInHum.val"), vec![DisplayValue::Number(552)]);
        log.clear();

        state = supervisor.step(state).await;
        assert_eq!(state.name(), "Consuming");
        assert_eq!(
            log.names(),
            vec![TRIGGER_FIELDS[0].to_string(), TRIGGER_FIELDS[1].to_string()]
        );

        state = supervisor.step(state).await;
        assert_eq!(state.name(), "Disconnected");
    }
}
