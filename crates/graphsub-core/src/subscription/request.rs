//! What a caller hands to [`SubscriptionManager::subscribe`](super::SubscriptionManager::subscribe).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use graphsub_lang::{ExecutionResult, FieldError, Variables};
use serde_json::Value;

use crate::error::{BoxError, PipelineError};

/// Receives every outcome of the per-message pipeline.
pub type SubscriptionCallback = Arc<dyn Fn(Result<ExecutionResult, PipelineError>) + Send + Sync>;

/// Caller-supplied error formatter, passed through to setup functions.
pub type FormatError = Arc<dyn Fn(&FieldError) -> Value + Send + Sync>;

/// Caller-supplied response formatter, passed through to setup functions.
pub type FormatResponse = Arc<dyn Fn(ExecutionResult) -> ExecutionResult + Send + Sync>;

/// Produces a fresh context value per message.
pub type ContextFactory = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

/// The context handed to filters and execution.
#[derive(Clone)]
pub enum SubscriptionContext {
    /// Reused for every message.
    Value(Value),
    /// Invoked once per message.
    Factory(ContextFactory),
}

impl SubscriptionContext {
    pub fn factory<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        SubscriptionContext::Factory(Arc::new(move || factory().boxed()))
    }

    pub async fn resolve(&self) -> Result<Value, BoxError> {
        match self {
            SubscriptionContext::Value(value) => Ok(value.clone()),
            SubscriptionContext::Factory(factory) => factory().await,
        }
    }
}

impl Default for SubscriptionContext {
    fn default() -> Self {
        SubscriptionContext::Value(Value::Null)
    }
}

impl From<Value> for SubscriptionContext {
    fn from(value: Value) -> Self {
        SubscriptionContext::Value(value)
    }
}

impl fmt::Debug for SubscriptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionContext::Value(value) => f.debug_tuple("Value").field(value).finish(),
            SubscriptionContext::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// A subscription query plus everything needed to serve it.
#[derive(Clone)]
pub struct SubscriptionRequest {
    pub query: String,
    pub operation_name: Option<String>,
    pub callback: SubscriptionCallback,
    pub variables: Variables,
    pub context: SubscriptionContext,
    pub format_error: Option<FormatError>,
    pub format_response: Option<FormatResponse>,
}

impl SubscriptionRequest {
    pub fn new<F>(query: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Result<ExecutionResult, PipelineError>) + Send + Sync + 'static,
    {
        Self {
            query: query.into(),
            operation_name: None,
            callback: Arc::new(callback),
            variables: Variables::new(),
            context: SubscriptionContext::default(),
            format_error: None,
            format_response: None,
        }
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Add a single variable value.
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_context(mut self, context: impl Into<SubscriptionContext>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_format_error<F>(mut self, format: F) -> Self
    where
        F: Fn(&FieldError) -> Value + Send + Sync + 'static,
    {
        self.format_error = Some(Arc::new(format));
        self
    }

    pub fn with_format_response<F>(mut self, format: F) -> Self
    where
        F: Fn(ExecutionResult) -> ExecutionResult + Send + Sync + 'static,
    {
        self.format_response = Some(Arc::new(format));
        self
    }
}

impl fmt::Debug for SubscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRequest")
            .field("query", &self.query)
            .field("operation_name", &self.operation_name)
            .field("variables", &self.variables)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_value_context_is_reused() {
        let context = SubscriptionContext::from(json!({ "user": "ana" }));
        assert_eq!(context.resolve().await.unwrap(), json!({ "user": "ana" }));
        assert_eq!(context.resolve().await.unwrap(), json!({ "user": "ana" }));
    }

    #[tokio::test]
    async fn test_factory_runs_per_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let context = SubscriptionContext::factory(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(json!(n)) }
        });

        assert_eq!(context.resolve().await.unwrap(), json!(0));
        assert_eq!(context.resolve().await.unwrap(), json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_request_builder() {
        let request = SubscriptionRequest::new("subscription { counter }", |_| {})
            .with_operation_name("Counter")
            .with_variable("step", json!(2))
            .with_context(json!({ "tenant": 1 }));

        assert_eq!(request.operation_name.as_deref(), Some("Counter"));
        assert_eq!(request.variables.get("step"), Some(&json!(2)));
        assert!(matches!(request.context, SubscriptionContext::Value(_)));
        assert!(request.format_error.is_none());
    }
}
