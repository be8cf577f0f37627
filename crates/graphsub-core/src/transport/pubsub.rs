//! Keyed publish/subscribe over named channels.
//!
//! A [`PubSub`] owns one [`ChannelBackend`] connection, a registry of message
//! handlers keyed by [`RegistrationId`], and at most one listener task. The
//! listener exists exactly while at least one registration does; it polls the
//! backend, decodes each message and awaits every handler registered on the
//! message's channel in turn. A handler that panics is logged and skipped.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

use super::backend::{ChannelBackend, ChannelOptions, Envelope};
use super::memory::MemoryBackend;
use crate::codec;
use crate::config::PubSubConfig;
use crate::error::{panic_message, Error, Result};

/// Handler invoked with each decoded message on a channel.
pub type MessageHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Identifies one handler registration on a [`PubSub`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(u64);

impl RegistrationId {
    /// Wrap a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Registration {
    channel: String,
    handler: MessageHandler,
}

struct Listener {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    /// Every live registration.
    registrations: HashMap<RegistrationId, Registration>,
    /// Registrations per channel, in subscribe order.
    channels: HashMap<String, Vec<RegistrationId>>,
    /// The current listener, present exactly while `registrations` is not empty.
    listener: Option<Listener>,
    /// A stopped listener that may still be finishing a dispatch. The next
    /// listener waits for it before polling.
    retired: Option<JoinHandle<()>>,
    /// Bumped for every listener started.
    generation: u64,
}

impl Registry {
    fn is_current(&self, generation: u64) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|l| l.generation == generation)
    }
}

/// State shared between a [`PubSub`] and its listener task.
struct Shared<B> {
    /// The single backend connection.
    backend: B,
    /// Guards registrations and every listener start/stop decision.
    registry: Mutex<Registry>,
    /// Next registration id, starting at 1.
    next_id: AtomicU64,
    config: PubSubConfig,
}

/// Publish/subscribe transport over a [`ChannelBackend`].
pub struct PubSub<B: ChannelBackend = MemoryBackend> {
    shared: Arc<Shared<B>>,
}

impl PubSub<MemoryBackend> {
    /// A transport over a private in-memory broker.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }
}

impl<B: ChannelBackend> PubSub<B> {
    /// A transport over `backend` with the default [`PubSubConfig`].
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, PubSubConfig::default())
    }

    /// A transport over `backend` polling as `config` says.
    pub fn with_config(backend: B, config: PubSubConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// The underlying channel backend.
    pub fn backend(&self) -> &B {
        &self.shared.backend
    }

    /// The configuration this transport was built with.
    pub fn config(&self) -> &PubSubConfig {
        &self.shared.config
    }

    /// Serialize `message` and broadcast it on `channel`. Succeeds whether or
    /// not anyone is listening.
    pub fn publish(&self, channel: &str, message: &Value) -> Result<()> {
        codec::validate_channel(channel)?;
        let payload = codec::encode_message(message)?;
        self.shared.backend.publish(channel, payload)?;
        tracing::trace!(channel, "published message");
        Ok(())
    }

    /// Register `handler` for messages on `channel`.
    ///
    /// The backend is subscribed on the first registration for a channel
    /// (with that registration's `options`), and the listener is started if
    /// it is not running.
    pub async fn subscribe(
        &self,
        channel: &str,
        handler: MessageHandler,
        options: ChannelOptions,
    ) -> Result<RegistrationId> {
        codec::validate_channel(channel)?;

        let mut registry = self.shared.registry.lock();
        if !registry.channels.contains_key(channel) {
            self.shared.backend.subscribe(channel, &options)?;
            tracing::debug!(channel, "subscribed channel");
        }

        let id = RegistrationId(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
        registry.registrations.insert(
            id,
            Registration {
                channel: channel.to_string(),
                handler,
            },
        );
        registry
            .channels
            .entry(channel.to_string())
            .or_default()
            .push(id);

        if registry.listener.is_none() {
            registry.generation += 1;
            let generation = registry.generation;
            let previous = registry.retired.take();
            let handle = tokio::spawn(listen(
                Arc::downgrade(&self.shared),
                generation,
                previous,
            ));
            registry.listener = Some(Listener { generation, handle });
            tracing::debug!(generation, "listener started");
        }

        tracing::debug!(registration = %id, channel, "registered handler");
        Ok(id)
    }

    /// Remove a registration.
    ///
    /// The backend is unsubscribed when the channel loses its last
    /// registration, and the listener is stopped when none remain. A handler
    /// already running for this registration is allowed to finish.
    pub fn unsubscribe(&self, id: RegistrationId) -> Result<()> {
        let mut registry = self.shared.registry.lock();
        let channel = match registry.registrations.get(&id) {
            Some(registration) => registration.channel.clone(),
            None => return Err(Error::UnknownRegistration(id)),
        };

        let last_on_channel = registry
            .channels
            .get(&channel)
            .map_or(true, |ids| ids.len() <= 1);
        if last_on_channel {
            self.shared.backend.unsubscribe(&channel)?;
            tracing::debug!(channel = %channel, "unsubscribed channel");
        }

        registry.registrations.remove(&id);
        if let Some(ids) = registry.channels.get_mut(&channel) {
            ids.retain(|r| *r != id);
            if ids.is_empty() {
                registry.channels.remove(&channel);
            }
        }
        tracing::debug!(registration = %id, channel = %channel, "removed handler");

        if registry.registrations.is_empty() {
            // The task exits after any in-flight dispatch; a successor waits on it.
            if let Some(listener) = registry.listener.take() {
                tracing::debug!(generation = listener.generation, "listener stopping");
                registry.retired = Some(listener.handle);
            }
        }
        Ok(())
    }

    /// Number of live registrations.
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.lock().registrations.len()
    }

    /// Number of channels with at least one registration.
    pub fn channel_count(&self) -> usize {
        self.shared.registry.lock().channels.len()
    }

    /// Whether the backend is subscribed to `channel`.
    pub fn is_channel_subscribed(&self, channel: &str) -> bool {
        self.shared.registry.lock().channels.contains_key(channel)
    }

    /// Channel a registration is attached to.
    pub fn registration_channel(&self, id: RegistrationId) -> Option<String> {
        self.shared
            .registry
            .lock()
            .registrations
            .get(&id)
            .map(|r| r.channel.clone())
    }

    /// Whether a listener task is currently running.
    pub fn is_listening(&self) -> bool {
        self.shared.registry.lock().listener.is_some()
    }
}

impl<B: ChannelBackend> Drop for PubSub<B> {
    fn drop(&mut self) {
        let mut registry = self.shared.registry.lock();
        if let Some(listener) = registry.listener.take() {
            listener.handle.abort();
        }
        if let Some(retired) = registry.retired.take() {
            retired.abort();
        }
    }
}

impl<B: ChannelBackend> fmt::Debug for PubSub<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.shared.registry.lock();
        f.debug_struct("PubSub")
            .field("registrations", &registry.registrations.len())
            .field("channels", &registry.channels.len())
            .field("listening", &registry.listener.is_some())
            .finish()
    }
}

async fn listen<B: ChannelBackend>(
    shared: Weak<Shared<B>>,
    generation: u64,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        // Keeps per-channel order across a stop/start.
        let _ = previous.await;
    }

    loop {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        // Checked under the same lock as receiving, so a stopped listener
        // never takes another message.
        let received = {
            let registry = shared.registry.lock();
            if !registry.is_current(generation) {
                break;
            }
            shared.backend.try_recv()
        };

        let idle = match received {
            Ok(Some(envelope)) => {
                shared.dispatch(envelope).await;
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(error = %e, "channel backend receive failed");
                true
            }
        };

        let interval = shared.config.poll_interval;
        drop(shared);
        if idle {
            tokio::time::sleep(interval).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
    tracing::debug!(generation, "listener stopped");
}

impl<B: ChannelBackend> Shared<B> {
    async fn dispatch(&self, envelope: Envelope) {
        let message = match codec::decode_message(&envelope.payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    channel = %envelope.channel,
                    error = %e,
                    "dropping undecodable message"
                );
                return;
            }
        };

        let ids = self.handlers_for(&envelope.channel);
        tracing::trace!(channel = %envelope.channel, handlers = ids.len(), "dispatching message");

        for id in ids {
            // Skip registrations removed while earlier handlers ran.
            let Some(handler) = self.handler(id) else {
                continue;
            };
            let delivery = AssertUnwindSafe(async { handler(message.clone()).await });
            if let Err(panic) = delivery.catch_unwind().await {
                tracing::warn!(
                    registration = %id,
                    channel = %envelope.channel,
                    panic = %panic_message(panic.as_ref()),
                    "message handler panicked"
                );
            }
        }
    }

    fn handlers_for(&self, channel: &str) -> Vec<RegistrationId> {
        self.registry
            .lock()
            .channels
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    fn handler(&self, id: RegistrationId) -> Option<MessageHandler> {
        self.registry
            .lock()
            .registrations
            .get(&id)
            .map(|r| r.handler.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn recording_handler(tx: mpsc::UnboundedSender<Value>) -> MessageHandler {
        Arc::new(move |message| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(message);
            }
            .boxed()
        })
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<Value>) -> Option<Value> {
        tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .ok()
            .flatten()
    }

    async fn recv_none(rx: &mut mpsc::UnboundedReceiver<Value>) -> bool {
        tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .is_err()
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let pubsub = PubSub::in_memory();
        pubsub.publish("commentAdded", &json!({ "a": 1 })).unwrap();
        assert!(!pubsub.is_listening());
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_increase() {
        let pubsub = PubSub::in_memory();
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = pubsub
            .subscribe("x", recording_handler(tx.clone()), ChannelOptions::new())
            .await
            .unwrap();
        let b = pubsub
            .subscribe("x", recording_handler(tx), ChannelOptions::new())
            .await
            .unwrap();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
    }

    #[tokio::test]
    async fn test_delivery_and_fan_out() {
        let pubsub = PubSub::in_memory();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        pubsub
            .subscribe("commentAdded", recording_handler(tx_a), ChannelOptions::new())
            .await
            .unwrap();
        pubsub
            .subscribe("commentAdded", recording_handler(tx_b), ChannelOptions::new())
            .await
            .unwrap();
        assert_eq!(pubsub.subscriber_count(), 2);
        assert_eq!(pubsub.channel_count(), 1);
        assert!(pubsub.is_listening());

        pubsub.publish("commentAdded", &json!({ "text": "hi" })).unwrap();
        assert_eq!(recv(&mut rx_a).await, Some(json!({ "text": "hi" })));
        assert_eq!(recv(&mut rx_b).await, Some(json!({ "text": "hi" })));

        pubsub.publish("postAdded", &json!(1)).unwrap();
        assert!(recv_none(&mut rx_a).await);
    }

    #[tokio::test]
    async fn test_messages_arrive_in_publish_order() {
        let pubsub = PubSub::in_memory();
        let (tx, mut rx) = mpsc::unbounded_channel();
        pubsub
            .subscribe("counter", recording_handler(tx), ChannelOptions::new())
            .await
            .unwrap();

        for i in 0..10 {
            pubsub.publish("counter", &json!(i)).unwrap();
        }
        for i in 0..10 {
            assert_eq!(recv(&mut rx).await, Some(json!(i)));
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_lifecycle() {
        let pubsub = PubSub::in_memory();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let a = pubsub
            .subscribe("x", recording_handler(tx.clone()), ChannelOptions::new())
            .await
            .unwrap();
        let b = pubsub
            .subscribe("x", recording_handler(tx), ChannelOptions::new())
            .await
            .unwrap();

        pubsub.unsubscribe(a).unwrap();
        assert!(pubsub.is_channel_subscribed("x"));
        assert!(pubsub.is_listening());

        pubsub.publish("x", &json!("one")).unwrap();
        assert_eq!(recv(&mut rx).await, Some(json!("one")));
        assert!(recv_none(&mut rx).await);

        pubsub.unsubscribe(b).unwrap();
        assert!(!pubsub.is_channel_subscribed("x"));
        assert!(!pubsub.is_listening());
        assert_eq!(pubsub.subscriber_count(), 0);

        pubsub.publish("x", &json!("two")).unwrap();
        assert!(recv_none(&mut rx).await);
    }

    #[tokio::test]
    async fn test_unknown_registration() {
        let pubsub = PubSub::in_memory();
        let err = pubsub.unsubscribe(RegistrationId::new(7)).unwrap_err();
        assert!(matches!(err, Error::UnknownRegistration(id) if id.get() == 7));
    }

    #[tokio::test]
    async fn test_listener_restarts_after_becoming_idle() {
        let pubsub = PubSub::in_memory();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = pubsub
            .subscribe("x", recording_handler(tx.clone()), ChannelOptions::new())
            .await
            .unwrap();
        pubsub.unsubscribe(id).unwrap();
        assert!(!pubsub.is_listening());

        pubsub
            .subscribe("x", recording_handler(tx), ChannelOptions::new())
            .await
            .unwrap();
        assert!(pubsub.is_listening());
        pubsub.publish("x", &json!(true)).unwrap();
        assert_eq!(recv(&mut rx).await, Some(json!(true)));
    }

    #[tokio::test]
    async fn test_undecodable_message_does_not_stop_listener() {
        let pubsub = PubSub::in_memory();
        let (tx, mut rx) = mpsc::unbounded_channel();
        pubsub
            .subscribe("x", recording_handler(tx), ChannelOptions::new())
            .await
            .unwrap();

        pubsub.backend().publish("x", b"{oops".to_vec()).unwrap();
        pubsub.publish("x", &json!("after")).unwrap();
        assert_eq!(recv(&mut rx).await, Some(json!("after")));
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_listener() {
        let pubsub = PubSub::in_memory();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let exploding: MessageHandler = Arc::new(|message: Value| {
            async move {
                if message == json!("bad") {
                    panic!("handler exploded");
                }
            }
            .boxed()
        });
        pubsub
            .subscribe("boom", exploding, ChannelOptions::new())
            .await
            .unwrap();
        pubsub
            .subscribe("postAdded", recording_handler(tx.clone()), ChannelOptions::new())
            .await
            .unwrap();
        pubsub
            .subscribe("boom", recording_handler(tx), ChannelOptions::new())
            .await
            .unwrap();

        pubsub.publish("boom", &json!("bad")).unwrap();
        pubsub.publish("postAdded", &json!("after")).unwrap();

        // Later handlers on the same message still run.
        assert_eq!(recv(&mut rx).await, Some(json!("bad")));
        assert_eq!(recv(&mut rx).await, Some(json!("after")));
        assert!(pubsub.is_listening());
    }

    #[tokio::test]
    async fn test_restarted_listener_waits_for_previous_dispatch() {
        let pubsub = PubSub::in_memory();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(tokio::sync::Notify::new());

        let slow: MessageHandler = {
            let gate = gate.clone();
            let tx = tx.clone();
            Arc::new(move |message: Value| {
                let gate = gate.clone();
                let tx = tx.clone();
                let started_tx = started_tx.clone();
                async move {
                    let _ = started_tx.send(());
                    gate.notified().await;
                    let _ = tx.send(message);
                }
                .boxed()
            })
        };

        let first = pubsub
            .subscribe("x", slow, ChannelOptions::new())
            .await
            .unwrap();
        pubsub.publish("x", &json!("first")).unwrap();
        tokio::time::timeout(Duration::from_millis(500), started_rx.recv())
            .await
            .unwrap()
            .unwrap();

        // Stop the listener mid-dispatch and start a new one.
        pubsub.unsubscribe(first).unwrap();
        pubsub
            .subscribe("x", recording_handler(tx), ChannelOptions::new())
            .await
            .unwrap();
        pubsub.publish("x", &json!("second")).unwrap();
        assert!(recv_none(&mut rx).await);

        gate.notify_one();
        assert_eq!(recv(&mut rx).await, Some(json!("first")));
        assert_eq!(recv(&mut rx).await, Some(json!("second")));
    }

    #[tokio::test]
    async fn test_handler_removed_mid_dispatch_is_skipped() {
        let pubsub = Arc::new(PubSub::in_memory());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let second = Arc::new(Mutex::new(None::<RegistrationId>));
        let remover = {
            let pubsub = Arc::downgrade(&pubsub);
            let second = second.clone();
            let tx = tx.clone();
            Arc::new(move |message: Value| {
                let pubsub = pubsub.clone();
                let second = *second.lock();
                let tx = tx.clone();
                async move {
                    if let (Some(pubsub), Some(id)) = (pubsub.upgrade(), second) {
                        pubsub.unsubscribe(id).unwrap();
                    }
                    let _ = tx.send(message);
                }
                .boxed()
            }) as MessageHandler
        };

        pubsub
            .subscribe("x", remover, ChannelOptions::new())
            .await
            .unwrap();
        let id = pubsub
            .subscribe("x", recording_handler(tx), ChannelOptions::new())
            .await
            .unwrap();
        *second.lock() = Some(id);

        pubsub.publish("x", &json!(1)).unwrap();
        assert_eq!(recv(&mut rx).await, Some(json!(1)));
        assert!(recv_none(&mut rx).await);
        assert_eq!(pubsub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_channel() {
        let pubsub = PubSub::in_memory();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            pubsub
                .subscribe("", recording_handler(tx), ChannelOptions::new())
                .await,
            Err(Error::InvalidChannel(_))
        ));
        assert!(matches!(
            pubsub.publish("a\0b", &json!(1)),
            Err(Error::InvalidChannel(_))
        ));
        assert!(!pubsub.is_listening());
    }
}
