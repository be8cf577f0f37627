//! Transport configuration.

use std::time::Duration;

/// Default delay between listener polls when no message is pending.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default nng listen address.
pub const DEFAULT_LISTEN_URL: &str = "inproc://graphsub";

/// Default maximum received message size (4 MB).
pub const DEFAULT_RECV_MAX_SIZE: usize = 4 * 1024 * 1024;

/// Configuration for [`PubSub`](crate::PubSub).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubConfig {
    /// How long the listener sleeps after finding no pending message.
    pub poll_interval: Duration,
}

impl PubSubConfig {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the listener poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the nng channel backend.
///
/// The backend listens with a PUB socket on `listen_url` and dials a SUB
/// socket to `listen_url` plus every entry of `dial_urls`, so several
/// processes can share one logical set of channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NngConfig {
    /// Address the PUB socket listens on.
    pub listen_url: String,

    /// Additional PUB endpoints the SUB socket dials.
    pub dial_urls: Vec<String>,

    /// Maximum size of a received message in bytes.
    pub recv_max_size: usize,
}

impl NngConfig {
    pub fn new() -> Self {
        Self {
            listen_url: DEFAULT_LISTEN_URL.to_string(),
            dial_urls: Vec::new(),
            recv_max_size: DEFAULT_RECV_MAX_SIZE,
        }
    }

    /// Set the listen address.
    pub fn with_listen_url(mut self, url: impl Into<String>) -> Self {
        self.listen_url = url.into();
        self
    }

    /// Add a remote PUB endpoint to dial.
    pub fn with_dial_url(mut self, url: impl Into<String>) -> Self {
        self.dial_urls.push(url.into());
        self
    }

    /// Set the maximum received message size.
    pub fn with_recv_max_size(mut self, size: usize) -> Self {
        self.recv_max_size = size;
        self
    }
}

impl Default for NngConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert_eq!(PubSubConfig::default().poll_interval, DEFAULT_POLL_INTERVAL);

        let nng = NngConfig::default();
        assert_eq!(nng.listen_url, DEFAULT_LISTEN_URL);
        assert!(nng.dial_urls.is_empty());
        assert_eq!(nng.recv_max_size, DEFAULT_RECV_MAX_SIZE);
    }

    #[test]
    fn test_config_builder() {
        let pubsub = PubSubConfig::new().with_poll_interval(Duration::from_millis(20));
        assert_eq!(pubsub.poll_interval, Duration::from_millis(20));

        let nng = NngConfig::new()
            .with_listen_url("tcp://127.0.0.1:7001")
            .with_dial_url("tcp://10.0.0.2:7001")
            .with_dial_url("tcp://10.0.0.3:7001")
            .with_recv_max_size(1024);
        assert_eq!(nng.listen_url, "tcp://127.0.0.1:7001");
        assert_eq!(nng.dial_urls.len(), 2);
        assert_eq!(nng.recv_max_size, 1024);
    }
}
