//! Triggers: the channels a subscription listens on, each with a filter.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use graphsub_lang::Variables;

use super::request::{
    FormatError, FormatResponse, SubscriptionCallback, SubscriptionContext, SubscriptionRequest,
};
use crate::error::BoxError;
use crate::transport::ChannelOptions;

/// Decides per message whether a subscriber sees it.
#[async_trait]
pub trait TriggerFilter: Send + Sync + 'static {
    async fn matches(&self, root: &Value, context: &Value) -> Result<bool, BoxError>;
}

/// The default filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl TriggerFilter for AcceptAll {
    async fn matches(&self, _root: &Value, _context: &Value) -> Result<bool, BoxError> {
        Ok(true)
    }
}

struct Predicate<F>(F);

#[async_trait]
impl<F> TriggerFilter for Predicate<F>
where
    F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
{
    async fn matches(&self, root: &Value, context: &Value) -> Result<bool, BoxError> {
        Ok((self.0)(root, context))
    }
}

/// Configuration for one trigger.
#[derive(Clone)]
pub struct Trigger {
    pub channel_options: ChannelOptions,
    pub filter: Arc<dyn TriggerFilter>,
}

impl Trigger {
    /// No channel options, accepts every message.
    pub fn new() -> Self {
        Self {
            channel_options: ChannelOptions::new(),
            filter: Arc::new(AcceptAll),
        }
    }

    pub fn with_channel_options(mut self, options: ChannelOptions) -> Self {
        self.channel_options = options;
        self
    }

    /// Filter with a synchronous predicate over `(root, context)`.
    pub fn with_filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.filter = Arc::new(Predicate(predicate));
        self
    }

    /// Filter with any [`TriggerFilter`], including async or fallible ones.
    pub fn with_trigger_filter(mut self, filter: impl TriggerFilter) -> Self {
        self.filter = Arc::new(filter);
        self
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("channel_options", &self.channel_options)
            .finish_non_exhaustive()
    }
}

/// Trigger name to trigger configuration.
#[derive(Debug, Clone, Default)]
pub struct TriggerMap(BTreeMap<String, Trigger>);

impl TriggerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default map for a field without a setup function.
    pub fn single(name: impl Into<String>) -> Self {
        Self::new().with_trigger(name, Trigger::new())
    }

    pub fn with_trigger(mut self, name: impl Into<String>, trigger: Trigger) -> Self {
        self.insert(name, trigger);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, trigger: Trigger) {
        self.0.insert(name.into(), trigger);
    }

    pub fn get(&self, name: &str) -> Option<&Trigger> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Trigger)> {
        self.0.iter().map(|(name, trigger)| (name.as_str(), trigger))
    }
}

impl<S: Into<String>> FromIterator<(S, Trigger)> for TriggerMap {
    fn from_iter<I: IntoIterator<Item = (S, Trigger)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, t)| (name.into(), t)).collect())
    }
}

/// Everything a setup function can see about the subscription being created.
pub struct SetupContext<'a> {
    pub(crate) request: &'a SubscriptionRequest,
    pub(crate) args: &'a Map<String, Value>,
    pub(crate) field_name: &'a str,
}

impl<'a> SetupContext<'a> {
    pub fn query(&self) -> &str {
        &self.request.query
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.request.operation_name.as_deref()
    }

    pub fn callback(&self) -> &SubscriptionCallback {
        &self.request.callback
    }

    pub fn variables(&self) -> &Variables {
        &self.request.variables
    }

    pub fn context(&self) -> &SubscriptionContext {
        &self.request.context
    }

    pub fn format_error(&self) -> Option<&FormatError> {
        self.request.format_error.as_ref()
    }

    pub fn format_response(&self) -> Option<&FormatResponse> {
        self.request.format_response.as_ref()
    }

    /// Root field arguments, resolved against their declared types.
    pub fn args(&self) -> &Map<String, Value> {
        self.args
    }

    /// A single resolved argument.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    pub fn field_name(&self) -> &str {
        self.field_name
    }
}

/// Builds the trigger map for one subscription field.
pub trait SetupFunction: Send + Sync + 'static {
    fn triggers(&self, ctx: &SetupContext<'_>) -> TriggerMap;
}

impl<F> SetupFunction for F
where
    F: Fn(&SetupContext<'_>) -> TriggerMap + Send + Sync + 'static,
{
    fn triggers(&self, ctx: &SetupContext<'_>) -> TriggerMap {
        self(ctx)
    }
}
