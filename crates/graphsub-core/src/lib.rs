//! graphsub core
//!
//! A subscription manager over a pub/sub transport. Clients register a
//! subscription query with a callback; publishers push JSON payloads onto
//! named triggers; each payload that passes a subscription's filter is run
//! through the query and the result is handed to the callback.
//!
//! ```rust,no_run
//! use graphsub_core::{PubSub, SubscriptionManager, SubscriptionRequest};
//! use graphsub_core::graphsub_lang::{Engine, FieldDef, ObjectType, Schema, TypeRef};
//! use serde_json::json;
//!
//! # async fn run() -> graphsub_core::Result<()> {
//! let schema = Schema::new()
//!     .with_object(ObjectType::new("Comment").with_field(FieldDef::new("text", TypeRef::named("String"))))
//!     .with_subscription_field(FieldDef::new("commentAdded", TypeRef::named("Comment")));
//! let manager = SubscriptionManager::new(Engine::new(schema), PubSub::in_memory());
//!
//! let id = manager
//!     .subscribe(SubscriptionRequest::new(
//!         "subscription { commentAdded { text } }",
//!         |outcome| println!("{:?}", outcome),
//!     ))
//!     .await?;
//! manager.publish("commentAdded", &json!({ "text": "hello" }))?;
//! manager.unsubscribe(id)?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod subscription;
pub mod transport;

pub use config::{NngConfig, PubSubConfig};
pub use engine::QueryEngine;
pub use error::{BoxError, Error, PipelineError, Result, Stage};
pub use subscription::{
    AcceptAll, ContextFactory, FormatError, FormatResponse, SetupContext, SetupFunction,
    SubscriptionCallback, SubscriptionContext, SubscriptionId, SubscriptionManager,
    SubscriptionRequest, Trigger, TriggerFilter, TriggerMap,
};
#[cfg(feature = "nng")]
pub use transport::NngBackend;
pub use transport::{
    ChannelBackend, ChannelOptions, Envelope, MemoryBackend, MemoryBroker, MessageHandler,
    PubSub, RegistrationId,
};

pub use graphsub_lang;
