//! Subscriptions: requests, triggers and the manager that wires them to the transport.

mod manager;
mod pipeline;
mod request;
mod trigger;

pub use manager::{SubscriptionId, SubscriptionManager};
pub use request::{
    ContextFactory, FormatError, FormatResponse, SubscriptionCallback, SubscriptionContext,
    SubscriptionRequest,
};
pub use trigger::{AcceptAll, SetupContext, SetupFunction, Trigger, TriggerFilter, TriggerMap};
