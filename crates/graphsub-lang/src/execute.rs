//! Execution of a validated subscription document against one message root.
//!
//! The root field resolves to the root value itself; nested fields are looked
//! up by name on the parent JSON object and completed according to their
//! declared type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ast::{Document, Field, OperationDefinition, OperationKind, TypeRef};
use crate::error::{CoercionError, ExecutionError};
use crate::schema::{NamedType, ObjectType, Schema, SUBSCRIPTION_TYPE};
use crate::values::{coerce_literal, coerce_value, Variables};

const TYPENAME: &str = "__typename";

/// The payload produced for one message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl ExecutionResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A field-level error; execution continues past it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub message: String,
    /// Response keys and list indices leading to the failing field.
    pub path: Vec<Value>,
}

/// Pick the operation to run.
pub fn select_operation<'d>(
    document: &'d Document,
    operation_name: Option<&str>,
) -> Result<&'d OperationDefinition, ExecutionError> {
    match operation_name {
        Some(name) => document
            .operation(name)
            .ok_or_else(|| ExecutionError::UnknownOperation(name.to_string())),
        None => {
            let mut operations = document.operations();
            match (operations.next(), operations.next()) {
                (Some(op), None) => Ok(op),
                (None, _) => Err(ExecutionError::NoOperation),
                (Some(_), Some(_)) => Err(ExecutionError::AmbiguousOperation),
            }
        }
    }
}

/// Coerce the supplied variable values against the operation's definitions,
/// applying defaults.
pub fn coerce_variable_values(
    schema: &Schema,
    operation: &OperationDefinition,
    variables: &Variables,
) -> Result<Variables, CoercionError> {
    let mut coerced = Variables::new();
    for definition in &operation.variables {
        let name = definition.name.as_str();
        let value = match (variables.get(name), &definition.default) {
            (Some(value), _) => coerce_value(schema, value, &definition.ty.value)?,
            (None, Some(default)) => {
                coerce_literal(schema, &default.value, &definition.ty.value, Some(variables))?
            }
            (None, None) if definition.ty.value.is_non_null() => {
                return Err(CoercionError::new(format!(
                    "variable ${} of required type {} was not provided",
                    name, definition.ty.value
                )))
            }
            (None, None) => continue,
        };
        coerced.insert(name.to_string(), value);
    }
    Ok(coerced)
}

/// Execute the selected subscription operation against `root`.
///
/// `context` is handed to resolvers; the default resolvers read only the
/// message root and ignore it.
pub fn execute(
    schema: &Schema,
    document: &Document,
    root: &Value,
    _context: &Value,
    variables: &Variables,
    operation_name: Option<&str>,
) -> Result<ExecutionResult, ExecutionError> {
    let operation = select_operation(document, operation_name)?;
    if operation.kind != OperationKind::Subscription {
        return Err(ExecutionError::UnsupportedOperation(operation.kind.to_string()));
    }
    coerce_variable_values(schema, operation, variables)
        .map_err(|e| ExecutionError::InvalidVariables(e.message))?;

    let mut executor = Executor {
        schema,
        errors: Vec::new(),
    };
    let mut data = Map::new();
    for field in &operation.selection_set.fields {
        let key = field.response_key().to_string();
        if field.name.value == TYPENAME {
            data.insert(key, Value::String(SUBSCRIPTION_TYPE.to_string()));
            continue;
        }
        let def = schema
            .subscription_field(&field.name.value)
            .ok_or_else(|| ExecutionError::UnknownField(field.name.value.clone()))?;
        let path = vec![Value::String(key.clone())];
        let value = executor.complete(&def.ty, field, root.clone(), &path);
        data.insert(key, value);
    }

    Ok(ExecutionResult {
        data: Some(Value::Object(data)),
        errors: executor.errors,
    })
}

struct Executor<'a> {
    schema: &'a Schema,
    errors: Vec<FieldError>,
}

impl<'a> Executor<'a> {
    fn error(&mut self, message: String, path: &[Value]) {
        self.errors.push(FieldError {
            message,
            path: path.to_vec(),
        });
    }

    fn complete(&mut self, ty: &TypeRef, field: &Field, value: Value, path: &[Value]) -> Value {
        match ty {
            TypeRef::NonNull(inner) => {
                let completed = self.complete(inner, field, value, path);
                if completed.is_null() {
                    self.error(
                        format!("cannot return null for non-nullable field '{}'", field.name.value),
                        path,
                    );
                }
                completed
            }
            TypeRef::List(inner) => match value {
                Value::Null => Value::Null,
                Value::Array(items) => Value::Array(
                    items
                        .into_iter()
                        .enumerate()
                        .map(|(index, item)| {
                            let mut item_path = path.to_vec();
                            item_path.push(Value::from(index));
                            self.complete(inner, field, item, &item_path)
                        })
                        .collect(),
                ),
                other => {
                    self.error(
                        format!("expected a list for field '{}', got {}", field.name.value, other),
                        path,
                    );
                    Value::Null
                }
            },
            TypeRef::Named(name) => {
                if value.is_null() {
                    return Value::Null;
                }
                let schema = self.schema;
                match schema.named_type(name) {
                    Some(NamedType::Object(object)) => match value {
                        Value::Object(map) => self.complete_object(object, field, &map, path),
                        other => {
                            self.error(
                                format!("expected an object of type {}, got {}", name, other),
                                path,
                            );
                            Value::Null
                        }
                    },
                    Some(NamedType::Scalar(scalar)) => match serialize_scalar(scalar, value) {
                        Ok(v) => v,
                        Err(message) => {
                            self.error(message, path);
                            Value::Null
                        }
                    },
                    Some(NamedType::Enum(e)) => match value {
                        Value::String(s) if e.values.contains(&s) => Value::String(s),
                        other => {
                            self.error(
                                format!("enum {} cannot represent value {}", e.name, other),
                                path,
                            );
                            Value::Null
                        }
                    },
                    None => value,
                }
            }
        }
    }

    fn complete_object(
        &mut self,
        object: &ObjectType,
        field: &Field,
        source: &Map<String, Value>,
        path: &[Value],
    ) -> Value {
        let mut out = Map::new();
        let Some(selection) = &field.selection_set else {
            return Value::Object(out);
        };
        for sub in &selection.fields {
            let key = sub.response_key().to_string();
            if sub.name.value == TYPENAME {
                out.insert(key, Value::String(object.name.clone()));
                continue;
            }
            let mut sub_path = path.to_vec();
            sub_path.push(Value::String(key.clone()));
            let value = match object.field(&sub.name.value) {
                Some(def) => {
                    let raw = source.get(&sub.name.value).cloned().unwrap_or(Value::Null);
                    self.complete(&def.ty, sub, raw, &sub_path)
                }
                None => {
                    self.error(
                        format!("cannot query field '{}' on type '{}'", sub.name.value, object.name),
                        &sub_path,
                    );
                    Value::Null
                }
            };
            out.insert(key, value);
        }
        Value::Object(out)
    }
}

fn serialize_scalar(scalar: &str, value: Value) -> Result<Value, String> {
    match (scalar, value) {
        ("ID", Value::String(s)) | ("String", Value::String(s)) => Ok(Value::String(s)),
        ("ID", Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
        ("String", Value::Number(n)) => Ok(Value::String(n.to_string())),
        ("String", Value::Bool(b)) => Ok(Value::String(b.to_string())),
        ("Int", Value::Number(n)) if n.as_i64().is_some_and(|i| i32::try_from(i).is_ok()) => {
            Ok(Value::Number(n))
        }
        ("Float", Value::Number(n)) => Ok(Value::Number(n)),
        ("Boolean", Value::Bool(b)) => Ok(Value::Bool(b)),
        (scalar, other) => Err(format!("{} cannot represent value {}", scalar, other)),
    }
}
