//! A schema-bound facade over parsing, validation, coercion and execution.

use std::sync::Arc;

use serde_json::Value;

use crate::ast::{self, Document, TypeRef};
use crate::error::{CoercionError, ExecutionError, ParseError, ValidationError};
use crate::execute::{self, ExecutionResult};
use crate::schema::{ArgumentDef, Schema};
use crate::validate;
use crate::values::{self, Variables};

/// Query engine for one schema. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Engine {
    schema: Arc<Schema>,
}

impl Engine {
    /// An engine for `schema`.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    /// The schema documents are checked against.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Parse `source`. Schema independent.
    pub fn parse(&self, source: &str) -> Result<Document, ParseError> {
        crate::parser::parse(source)
    }

    /// Every validation error for `document`; empty when valid.
    pub fn validate(&self, document: &Document) -> Vec<ValidationError> {
        validate::validate(&self.schema, document)
    }

    /// Declared argument `argument` of subscription field `field`.
    pub fn subscription_argument(&self, field: &str, argument: &str) -> Option<&ArgumentDef> {
        self.schema.subscription_field(field)?.argument(argument)
    }

    /// Resolve an argument literal, substituting variables and coercing to `ty`.
    pub fn resolve_argument_value(
        &self,
        value: &ast::Value,
        ty: &TypeRef,
        variables: &Variables,
    ) -> Result<Value, CoercionError> {
        values::coerce_literal(&self.schema, value, ty, Some(variables))
    }

    /// Execute `document` with `root` as the value of the subscription root field.
    pub fn execute(
        &self,
        document: &Document,
        root: &Value,
        context: &Value,
        variables: &Variables,
        operation_name: Option<&str>,
    ) -> Result<ExecutionResult, ExecutionError> {
        execute::execute(
            &self.schema,
            document,
            root,
            context,
            variables,
            operation_name,
        )
    }
}
