//! The physical pub/sub connection beneath [`PubSub`](super::PubSub).

use serde_json::{Map, Value};

use crate::error::Result;

/// Backend-specific channel configuration, passed through untouched.
pub type ChannelOptions = Map<String, Value>;

/// A message received on a channel, still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// One pub/sub connection multiplexing many channels.
///
/// All methods are non-blocking. `subscribe` and `unsubscribe` are called
/// once per channel, on the first registration and after the last one.
pub trait ChannelBackend: Send + Sync + 'static {
    fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()>;

    fn subscribe(&self, channel: &str, options: &ChannelOptions) -> Result<()>;

    fn unsubscribe(&self, channel: &str) -> Result<()>;

    /// Next pending message, or `None` if nothing is waiting.
    fn try_recv(&self) -> Result<Option<Envelope>>;
}
