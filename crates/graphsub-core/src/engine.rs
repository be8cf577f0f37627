//! The query engine seam.
//!
//! The manager only needs four capabilities from a query engine; anything
//! that provides them can back a [`SubscriptionManager`](crate::SubscriptionManager).

use async_trait::async_trait;
use graphsub_lang::ast::{self, Document, TypeRef};
use graphsub_lang::{ArgumentDef, Engine, ExecutionResult, LangError, ValidationError, Variables};
use serde_json::Value;

/// Parses, validates and executes subscription documents for a
/// [`SubscriptionManager`](crate::SubscriptionManager).
#[async_trait]
pub trait QueryEngine: Send + Sync + 'static {
    /// Parse `source` into a document.
    fn parse(&self, source: &str) -> Result<Document, LangError>;

    /// Every validation error for `document`; empty when valid.
    fn validate(&self, document: &Document) -> Vec<ValidationError>;

    /// Declaration of `argument` on subscription root field `field`.
    fn subscription_argument(&self, field: &str, argument: &str) -> Option<ArgumentDef>;

    fn resolve_argument_value(
        &self,
        value: &ast::Value,
        ty: &TypeRef,
        variables: &Variables,
    ) -> Result<Value, LangError>;

    /// Run `document` against one message root.
    async fn execute(
        &self,
        document: &Document,
        root: &Value,
        context: &Value,
        variables: &Variables,
        operation_name: Option<&str>,
    ) -> Result<ExecutionResult, LangError>;
}

#[async_trait]
impl QueryEngine for Engine {
    fn parse(&self, source: &str) -> Result<Document, LangError> {
        Ok(Engine::parse(self, source)?)
    }

    fn validate(&self, document: &Document) -> Vec<ValidationError> {
        Engine::validate(self, document)
    }

    fn subscription_argument(&self, field: &str, argument: &str) -> Option<ArgumentDef> {
        Engine::subscription_argument(self, field, argument).cloned()
    }

    fn resolve_argument_value(
        &self,
        value: &ast::Value,
        ty: &TypeRef,
        variables: &Variables,
    ) -> Result<Value, LangError> {
        Ok(Engine::resolve_argument_value(self, value, ty, variables)?)
    }

    async fn execute(
        &self,
        document: &Document,
        root: &Value,
        context: &Value,
        variables: &Variables,
        operation_name: Option<&str>,
    ) -> Result<ExecutionResult, LangError> {
        Ok(Engine::execute(
            self,
            document,
            root,
            context,
            variables,
            operation_name,
        )?)
    }
}
