//! In-process channel backend.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::backend::{ChannelBackend, ChannelOptions, Envelope};
use crate::error::Result;

#[derive(Debug, Default)]
struct Connection {
    channels: Mutex<HashSet<String>>,
    inbox: Mutex<VecDeque<Envelope>>,
}

/// An in-process broker. Every [`MemoryBackend`] obtained from
/// [`connect`](Self::connect) sees messages published by any other.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    connections: Arc<Mutex<Vec<Weak<Connection>>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection to this broker.
    pub fn connect(&self) -> MemoryBackend {
        let connection = Arc::new(Connection::default());
        self.connections.lock().push(Arc::downgrade(&connection));
        MemoryBackend {
            broker: self.clone(),
            connection,
        }
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        let mut connections = self.connections.lock();
        connections.retain(|c| c.strong_count() > 0);
        connections.len()
    }

    fn deliver(&self, channel: &str, payload: &[u8]) -> usize {
        let mut connections = self.connections.lock();
        connections.retain(|c| c.strong_count() > 0);

        let mut delivered = 0;
        for connection in connections.iter().filter_map(Weak::upgrade) {
            if connection.channels.lock().contains(channel) {
                connection.inbox.lock().push_back(Envelope {
                    channel: channel.to_string(),
                    payload: payload.to_vec(),
                });
                delivered += 1;
            }
        }
        delivered
    }
}

/// One connection to a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryBackend {
    broker: MemoryBroker,
    connection: Arc<Connection>,
}

impl MemoryBackend {
    /// A connection to a fresh private broker.
    pub fn new() -> Self {
        MemoryBroker::new().connect()
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    /// Messages received and not yet consumed.
    pub fn pending(&self) -> usize {
        self.connection.inbox.lock().len()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelBackend for MemoryBackend {
    fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        let delivered = self.broker.deliver(channel, &payload);
        tracing::trace!(channel, delivered, "memory broker publish");
        Ok(())
    }

    fn subscribe(&self, channel: &str, _options: &ChannelOptions) -> Result<()> {
        self.connection.channels.lock().insert(channel.to_string());
        Ok(())
    }

    fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.connection.channels.lock().remove(channel);
        // Drop anything queued for the channel so it is not delivered late.
        self.connection
            .inbox
            .lock()
            .retain(|envelope| envelope.channel != channel);
        Ok(())
    }

    fn try_recv(&self) -> Result<Option<Envelope>> {
        Ok(self.connection.inbox.lock().pop_front())
    }
}
