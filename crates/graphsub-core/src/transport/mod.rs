//! Pub/sub transport: channel backends and the handler registry on top of them.

mod backend;
mod memory;
#[cfg(feature = "nng")]
mod nng;
mod pubsub;

pub use backend::{ChannelBackend, ChannelOptions, Envelope};
pub use memory::{MemoryBackend, MemoryBroker};
#[cfg(feature = "nng")]
pub use self::nng::NngBackend;
pub use pubsub::{MessageHandler, PubSub, RegistrationId};
