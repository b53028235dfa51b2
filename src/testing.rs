//! Fakes shared by the unit tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{
    externals::{
        display::{DisplayError, DisplayTransport},
        sensor_stream::{MessageStream, StreamError, StreamMessage, StreamMessages, StreamSession},
    },
    models::display_value::DisplayValue,
};

#[derive(Debug, Clone)]
pub struct FieldWrite {
    pub name: String,
    pub value: DisplayValue,
    pub at: Instant,
}

/// Shared view of everything a [`RecordingTransport`] accepted.
#[derive(Debug, Clone, Default)]
pub struct FieldLog {
    writes: Arc<Mutex<Vec<FieldWrite>>>,
}

impl FieldLog {
    pub fn writes(&self) -> Vec<FieldWrite> {
        self.writes.lock().expect("field log poisoned").clone()
    }

    pub fn fields(&self) -> Vec<(String, DisplayValue)> {
        self.writes()
            .into_iter()
            .map(|write| (write.name, write.value))
            .collect()
    }

    /// Every value written to one field, oldest first.
    pub fn values_of(&self, name: &str) -> Vec<DisplayValue> {
        self.writes()
            .into_iter()
            .filter(|write| write.name == name)
            .map(|write| write.value)
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.writes().into_iter().map(|write| write.name).collect()
    }

    pub fn clear(&self) {
        self.writes.lock().expect("field log poisoned").clear();
    }
}

/// In-memory display that records each accepted write.
pub struct RecordingTransport {
    log: FieldLog,
    failing: Vec<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            log: FieldLog::default(),
            failing: vec![],
        }
    }

    /// A transport that rejects writes to the given fields.
    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            log: FieldLog::default(),
            failing: names.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn log(&self) -> FieldLog {
        self.log.clone()
    }
}

impl DisplayTransport for RecordingTransport {
    fn set_field(&mut self, name: &str, value: &DisplayValue) -> Result<(), DisplayError> {
        if self.failing.iter().any(|failing| failing == name) {
            return Err(DisplayError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "rejected by test transport",
            )));
        }
        self.log
            .writes
            .lock()
            .expect("field log poisoned")
            .push(FieldWrite {
                name: name.to_string(),
                value: value.clone(),
                at: Instant::now(),
            });
        Ok(())
    }
}

/// A sink backed by a fresh [`RecordingTransport`].
pub fn recording_sink() -> (crate::externals::display::sink::DisplaySink, FieldLog) {
    let transport = RecordingTransport::new();
    let log = transport.log();
    (crate::externals::display::sink::DisplaySink::new(transport), log)
}

/// What one session of a [`ScriptedStream`] does.
pub enum SessionScript {
    RefuseConnect,
    RejectSubscribe,
    /// Deliver these messages, then fault.
    Deliver(Vec<StreamMessage>),
}

/// When each connection attempt was made.
#[derive(Clone, Default)]
pub struct ConnectAttempts {
    instants: Arc<Mutex<Vec<Instant>>>,
}

impl ConnectAttempts {
    pub fn instants(&self) -> Vec<Instant> {
        self.instants.lock().expect("attempts poisoned").clone()
    }
}

/// A message stream playing back one script per connection attempt. Once
/// the scripts run out every connection is refused.
pub struct ScriptedStream {
    scripts: Mutex<VecDeque<SessionScript>>,
    attempts: ConnectAttempts,
}

impl ScriptedStream {
    pub fn new(scripts: Vec<SessionScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            attempts: ConnectAttempts::default(),
        }
    }

    pub fn attempts(&self) -> ConnectAttempts {
        self.attempts.clone()
    }
}

#[async_trait]
impl MessageStream for ScriptedStream {
    async fn connect(&self) -> Result<Box<dyn StreamSession>, StreamError> {
        self.attempts
            .instants
            .lock()
            .expect("attempts poisoned")
            .push(Instant::now());
        let script = self
            .scripts
            .lock()
            .expect("scripts poisoned")
            .pop_front()
            .unwrap_or(SessionScript::RefuseConnect);
        match script {
            SessionScript::RefuseConnect => Err(StreamError::Connection("refused".to_string())),
            script => Ok(Box::new(ScriptedSession {
                script: Some(script),
            })),
        }
    }
}

struct ScriptedSession {
    script: Option<SessionScript>,
}

#[async_trait]
impl StreamSession for ScriptedSession {
    async fn subscribe(
        &mut self,
        topic_pattern: &str,
    ) -> Result<Box<dyn StreamMessages>, StreamError> {
        match self.script.take() {
            Some(SessionScript::Deliver(messages)) => Ok(Box::new(ScriptedMessages {
                messages: messages.into(),
            })),
            Some(SessionScript::RejectSubscribe) => {
                Err(StreamError::Subscribe(topic_pattern.to_string()))
            }
            _ => Err(StreamError::SessionConsumed),
        }
    }
}

struct ScriptedMessages {
    messages: VecDeque<StreamMessage>,
}

#[async_trait]
impl StreamMessages for ScriptedMessages {
    async fn next(&mut self) -> Result<StreamMessage, StreamError> {
        self.messages
            .pop_front()
            .ok_or_else(|| StreamError::Connection("dropped".to_string()))
    }
}
