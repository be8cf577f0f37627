//! Subscription manager: turns subscription queries into transport
//! registrations and routes published messages through the pipeline.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use graphsub_lang::ast::Document;
use graphsub_lang::{Engine, Variables};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::pipeline::MessagePipeline;
use super::request::SubscriptionRequest;
use super::trigger::{SetupContext, SetupFunction, TriggerMap};
use crate::engine::QueryEngine;
use crate::error::{Error, Result};
use crate::transport::{ChannelBackend, MemoryBackend, PubSub, RegistrationId};

/// Identifies a subscription created by [`SubscriptionManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Manager for subscription queries.
///
/// Each subscription resolves its root field to a [`TriggerMap`], either via
/// a setup function registered for that field or by defaulting to a single
/// trigger named after the field, and registers one transport handler per
/// trigger.
pub struct SubscriptionManager<E: QueryEngine = Engine, B: ChannelBackend = MemoryBackend> {
    engine: Arc<E>,
    pubsub: Arc<PubSub<B>>,
    /// Trigger map builders keyed by subscription field name.
    setup_functions: HashMap<String, Arc<dyn SetupFunction>>,
    /// Transport registrations owned by each subscription.
    subscriptions: Mutex<HashMap<SubscriptionId, Vec<RegistrationId>>>,
    /// Next subscription id, starting at 1.
    next_id: AtomicU64,
}

impl<E: QueryEngine, B: ChannelBackend> SubscriptionManager<E, B> {
    /// Build a manager owning `engine` and `pubsub`.
    pub fn new(engine: E, pubsub: PubSub<B>) -> Self {
        Self::from_shared(Arc::new(engine), Arc::new(pubsub))
    }

    /// Build a manager over an engine and transport shared with other owners.
    pub fn from_shared(engine: Arc<E>, pubsub: Arc<PubSub<B>>) -> Self {
        Self {
            engine,
            pubsub,
            setup_functions: HashMap::new(),
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a setup function for subscription field `field`.
    pub fn with_setup_function<F>(self, field: impl Into<String>, setup: F) -> Self
    where
        F: Fn(&SetupContext<'_>) -> TriggerMap + Send + Sync + 'static,
    {
        self.with_setup(field, setup)
    }

    /// Register any [`SetupFunction`] implementation for `field`.
    pub fn with_setup(mut self, field: impl Into<String>, setup: impl SetupFunction) -> Self {
        self.setup_functions.insert(field.into(), Arc::new(setup));
        self
    }

    /// The query engine subscriptions are validated and executed with.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The transport triggers are registered on.
    pub fn transport(&self) -> &Arc<PubSub<B>> {
        &self.pubsub
    }

    /// Publish `payload` on trigger `trigger`.
    pub fn publish(&self, trigger: &str, payload: &Value) -> Result<()> {
        self.pubsub.publish(trigger, payload)
    }

    /// Validate `request.query`, resolve its triggers and register a handler
    /// for each. Nothing stays registered if any step fails.
    pub async fn subscribe(&self, request: SubscriptionRequest) -> Result<SubscriptionId> {
        let document = self.engine.parse(&request.query).map_err(Error::Parse)?;

        let errors = self.engine.validate(&document);
        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "subscription query failed validation");
            return Err(Error::Validation { errors });
        }

        let (field_name, args) = self.resolve_root_field(&document, &request.variables)?;

        let triggers = match self.setup_functions.get(&field_name) {
            Some(setup) => setup.triggers(&SetupContext {
                request: &request,
                args: &args,
                field_name: &field_name,
            }),
            None => TriggerMap::single(field_name.as_str()),
        };

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let document = Arc::new(document);
        let variables = Arc::new(request.variables.clone());
        let operation_name: Option<Arc<str>> = request.operation_name.as_deref().map(Arc::from);

        let outcomes = join_all(triggers.iter().map(|(name, trigger)| {
            let handler = MessagePipeline {
                engine: self.engine.clone(),
                document: document.clone(),
                variables: variables.clone(),
                operation_name: operation_name.clone(),
                context: request.context.clone(),
                filter: trigger.filter.clone(),
                callback: request.callback.clone(),
                subscription: id,
                trigger: Arc::from(name),
            }
            .into_handler();
            self.pubsub
                .subscribe(name, handler, trigger.channel_options.clone())
        }))
        .await;

        let mut registrations = Vec::with_capacity(outcomes.len());
        let mut failure = None;
        for outcome in outcomes {
            match outcome {
                Ok(registration) => registrations.push(registration),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(error) = failure {
            self.release(id, registrations);
            tracing::debug!(subscription = %id, error = %error, "subscription rolled back");
            return Err(error);
        }

        tracing::debug!(
            subscription = %id,
            field = %field_name,
            triggers = registrations.len(),
            "subscription registered"
        );
        self.subscriptions.lock().insert(id, registrations);
        Ok(id)
    }

    /// Remove a subscription and every transport registration it owns.
    ///
    /// Every registration is attempted. If any fails, the subscription stays
    /// registered with just the registrations that are still live, so the
    /// call can be retried, and the first failure is returned.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let registrations = self
            .subscriptions
            .lock()
            .remove(&id)
            .ok_or(Error::UnknownSubscription(id))?;

        let mut remaining = Vec::new();
        let mut failure = None;
        for registration in registrations {
            if let Err(e) = self.pubsub.unsubscribe(registration) {
                tracing::warn!(
                    subscription = %id,
                    registration = %registration,
                    error = %e,
                    "failed to release registration"
                );
                remaining.push(registration);
                failure.get_or_insert(e);
            }
        }

        match failure {
            Some(e) => {
                self.subscriptions.lock().insert(id, remaining);
                Err(e)
            }
            None => {
                tracing::debug!(subscription = %id, "subscription removed");
                Ok(())
            }
        }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Transport registrations owned by `id`.
    pub fn registrations(&self, id: SubscriptionId) -> Option<Vec<RegistrationId>> {
        self.subscriptions.lock().get(&id).cloned()
    }

    /// Root field name and its arguments resolved against their declarations.
    fn resolve_root_field(
        &self,
        document: &Document,
        variables: &Variables,
    ) -> Result<(String, Map<String, Value>)> {
        let field = document
            .operations()
            .next()
            .and_then(|operation| operation.root_field())
            .ok_or(Error::MissingOperation)?;
        let field_name = field.name.value.clone();

        let mut args = Map::new();
        for argument in &field.arguments {
            let name = &argument.name.value;
            let def = self
                .engine
                .subscription_argument(&field_name, name)
                .ok_or_else(|| Error::UnknownArgument {
                    field: field_name.clone(),
                    argument: name.clone(),
                })?;
            let value = self
                .engine
                .resolve_argument_value(&argument.value.value, &def.ty, variables)
                .map_err(|source| Error::ArgumentResolution {
                    argument: name.clone(),
                    source,
                })?;
            args.insert(name.clone(), value);
        }
        Ok((field_name, args))
    }

    fn release(&self, id: SubscriptionId, registrations: Vec<RegistrationId>) {
        for registration in registrations {
            if let Err(e) = self.pubsub.unsubscribe(registration) {
                tracing::warn!(
                    subscription = %id,
                    registration = %registration,
                    error = %e,
                    "rollback failed"
                );
            }
        }
    }
}

impl<E: QueryEngine, B: ChannelBackend> fmt::Debug for SubscriptionManager<E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("subscriptions", &self.subscription_count())
            .field("setup_functions", &self.setup_functions.len())
            .field("transport", &self.pubsub)
            .finish()
    }
}
