//! nng channel backend: a PUB socket for publishing and a SUB socket whose
//! topic filters track the subscribed channels.

use ::nng::options::protocol::pubsub::{Subscribe, Unsubscribe};
use ::nng::options::{Options, RecvMaxSize};
use ::nng::{Message, Protocol, Socket};

use super::backend::{ChannelBackend, ChannelOptions, Envelope};
use crate::codec;
use crate::config::NngConfig;
use crate::error::{Error, Result};

/// Channel backend over a pair of nng sockets.
pub struct NngBackend {
    /// PUB socket listening on `config.listen_url`.
    publisher: Socket,
    /// SUB socket dialed to the local publisher and every `dial_urls` entry.
    subscriber: Socket,
    config: NngConfig,
}

impl NngBackend {
    /// Listen on `config.listen_url` and dial the configured endpoints.
    pub fn new(config: NngConfig) -> Result<Self> {
        let publisher = Socket::new(Protocol::Pub0)
            .map_err(|e| Error::Transport(format!("failed to create PUB socket: {}", e)))?;
        publisher.listen(&config.listen_url).map_err(|e| {
            Error::Transport(format!("failed to listen on {}: {}", config.listen_url, e))
        })?;

        let subscriber = Socket::new(Protocol::Sub0)
            .map_err(|e| Error::Transport(format!("failed to create SUB socket: {}", e)))?;
        subscriber
            .set_opt::<RecvMaxSize>(config.recv_max_size)
            .map_err(|e| Error::Transport(format!("failed to set max message size: {}", e)))?;
        subscriber.dial(&config.listen_url).map_err(|e| {
            Error::Transport(format!("failed to dial {}: {}", config.listen_url, e))
        })?;

        // Remote publishers may come up later; let nng keep retrying.
        for url in &config.dial_urls {
            subscriber
                .dial_async(url)
                .map_err(|e| Error::Transport(format!("failed to dial {}: {}", url, e)))?;
        }

        tracing::info!(
            listen = %config.listen_url,
            remotes = config.dial_urls.len(),
            "nng channel backend ready"
        );

        Ok(Self {
            publisher,
            subscriber,
            config,
        })
    }

    /// The configuration the sockets were opened with.
    pub fn config(&self) -> &NngConfig {
        &self.config
    }
}

impl ChannelBackend for NngBackend {
    fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        let frame = codec::encode_frame(channel, &payload)?;
        self.publisher
            .send(Message::from(frame.as_slice()))
            .map_err(|(_, e)| Error::Transport(format!("failed to publish on {}: {}", channel, e)))
    }

    fn subscribe(&self, channel: &str, _options: &ChannelOptions) -> Result<()> {
        self.subscriber
            .set_opt::<Subscribe>(codec::topic(channel))
            .map_err(|e| Error::Transport(format!("failed to subscribe to {}: {}", channel, e)))
    }

    fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.subscriber
            .set_opt::<Unsubscribe>(codec::topic(channel))
            .map_err(|e| {
                Error::Transport(format!("failed to unsubscribe from {}: {}", channel, e))
            })
    }

    fn try_recv(&self) -> Result<Option<Envelope>> {
        match self.subscriber.try_recv() {
            Ok(message) => {
                let (channel, payload) = codec::decode_frame(message.as_slice())?;
                Ok(Some(Envelope {
                    channel: channel.to_string(),
                    payload: payload.to_vec(),
                }))
            }
            Err(::nng::Error::TryAgain) => Ok(None),
            Err(e) => Err(Error::Transport(format!("receive failed: {}", e))),
        }
    }
}
