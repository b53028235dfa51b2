use async_trait::async_trait;
use thiserror::Error;

pub mod mqtt;

/// One message from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Something that can open sessions to a publish/subscribe feed.
#[async_trait]
pub trait MessageStream: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StreamSession>, StreamError>;
}

/// An open connection that hasn't subscribed yet.
#[async_trait]
pub trait StreamSession: Send {
    async fn subscribe(&mut self, topic_pattern: &str)
        -> Result<Box<dyn StreamMessages>, StreamError>;
}

/// Unbounded sequence of messages. Once it has failed it is not reused.
#[async_trait]
pub trait StreamMessages: Send {
    async fn next(&mut self) -> Result<StreamMessage, StreamError>;
}

/// Any of these means the session is gone and has to be rebuilt.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Connection to the broker failed. Error: {0}")]
    Connection(String),

    #[error("Subscription to '{0}' was rejected.")]
    Subscribe(String),

    #[error("Stream session was already used to subscribe.")]
    SessionConsumed,
}
