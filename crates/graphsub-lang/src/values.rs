//! Input value coercion: argument literals and variable values against
//! their declared types.

use serde_json::{Map, Number, Value};

use crate::ast::{self, TypeRef};
use crate::error::CoercionError;
use crate::schema::{NamedType, Schema};

/// Variable values supplied with a subscription request.
pub type Variables = Map<String, Value>;

/// Coerce an argument literal to `ty`.
///
/// With `variables == None` variable references are accepted unchecked and
/// coerce to null; validation uses this mode since variable values are only
/// known at subscribe time.
pub fn coerce_literal(
    schema: &Schema,
    literal: &ast::Value,
    ty: &TypeRef,
    variables: Option<&Variables>,
) -> Result<Value, CoercionError> {
    if let ast::Value::Variable(name) = literal {
        let Some(variables) = variables else {
            return Ok(Value::Null);
        };
        let value = variables.get(name).cloned().unwrap_or(Value::Null);
        return coerce_value(schema, &value, ty)
            .map_err(|e| CoercionError::new(format!("variable ${}: {}", name, e)));
    }

    match ty {
        TypeRef::NonNull(inner) => {
            if matches!(literal, ast::Value::Null) {
                return Err(CoercionError::new(format!("expected {}, got null", ty)));
            }
            coerce_literal(schema, literal, inner, variables)
        }
        TypeRef::List(inner) => match literal {
            ast::Value::Null => Ok(Value::Null),
            ast::Value::List(items) => items
                .iter()
                .map(|item| coerce_literal(schema, &item.value, inner, variables))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_literal(
                schema, single, inner, variables,
            )?])),
        },
        TypeRef::Named(name) => {
            if matches!(literal, ast::Value::Null) {
                return Ok(Value::Null);
            }
            match schema.named_type(name) {
                Some(NamedType::Enum(e)) => match literal {
                    ast::Value::Enum(v) if e.values.contains(v) => Ok(Value::String(v.clone())),
                    other => Err(CoercionError::new(format!(
                        "expected a value of enum {}, got {}",
                        e.name,
                        other.kind_name()
                    ))),
                },
                Some(NamedType::Scalar(_)) => match scalar_literal(literal) {
                    Some(json) => coerce_value(schema, &json, ty),
                    None => Err(CoercionError::new(format!(
                        "expected {}, got {}",
                        name,
                        literal.kind_name()
                    ))),
                },
                Some(NamedType::Object(object)) => match literal {
                    ast::Value::Object(fields) => {
                        let mut out = Map::new();
                        for (field_name, field_value) in fields {
                            let def = object.field(&field_name.value).ok_or_else(|| {
                                CoercionError::new(format!(
                                    "field '{}' is not defined on {}",
                                    field_name.value, object.name
                                ))
                            })?;
                            out.insert(
                                field_name.value.clone(),
                                coerce_literal(schema, &field_value.value, &def.ty, variables)?,
                            );
                        }
                        Ok(Value::Object(out))
                    }
                    other => Err(CoercionError::new(format!(
                        "expected an object of type {}, got {}",
                        object.name,
                        other.kind_name()
                    ))),
                },
                None => Err(CoercionError::new(format!("unknown type '{}'", name))),
            }
        }
    }
}

/// Coerce a runtime JSON value (a variable value) to `ty`.
pub fn coerce_value(schema: &Schema, value: &Value, ty: &TypeRef) -> Result<Value, CoercionError> {
    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                return Err(CoercionError::new(format!("expected {}, got null", ty)));
            }
            coerce_value(schema, value, inner)
        }
        TypeRef::List(inner) => match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => items
                .iter()
                .map(|item| coerce_value(schema, item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_value(schema, single, inner)?])),
        },
        TypeRef::Named(name) => {
            if value.is_null() {
                return Ok(Value::Null);
            }
            match schema.named_type(name) {
                Some(NamedType::Scalar(scalar)) => coerce_scalar(scalar, value),
                Some(NamedType::Enum(e)) => match value {
                    Value::String(s) if e.values.contains(s) => Ok(value.clone()),
                    other => Err(CoercionError::expected(&e.name, other)),
                },
                Some(NamedType::Object(object)) => match value {
                    Value::Object(map) => {
                        let mut out = Map::new();
                        for (key, item) in map {
                            let def = object.field(key).ok_or_else(|| {
                                CoercionError::new(format!(
                                    "field '{}' is not defined on {}",
                                    key, object.name
                                ))
                            })?;
                            out.insert(key.clone(), coerce_value(schema, item, &def.ty)?);
                        }
                        Ok(Value::Object(out))
                    }
                    other => Err(CoercionError::expected(&object.name, other)),
                },
                None => Err(CoercionError::new(format!("unknown type '{}'", name))),
            }
        }
    }
}

fn coerce_scalar(scalar: &str, value: &Value) -> Result<Value, CoercionError> {
    match (scalar, value) {
        ("ID", Value::String(_)) => Ok(value.clone()),
        ("ID", Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
        ("String", Value::String(_)) => Ok(value.clone()),
        ("Boolean", Value::Bool(_)) => Ok(value.clone()),
        ("Int", Value::Number(n)) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_ok() => Ok(value.clone()),
            Some(i) => Err(CoercionError::new(format!(
                "Int cannot represent non 32-bit signed integer value {}",
                i
            ))),
            None => Err(CoercionError::expected("Int", value)),
        },
        ("Float", Value::Number(n)) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| CoercionError::expected("Float", value)),
        (other, _) => Err(CoercionError::expected(other, value)),
    }
}

/// JSON form of a scalar literal, or `None` for non-scalar literals.
fn scalar_literal(literal: &ast::Value) -> Option<Value> {
    match literal {
        ast::Value::Int(i) => Some(Value::from(*i)),
        ast::Value::Float(f) => Number::from_f64(*f).map(Value::Number),
        ast::Value::String(s) => Some(Value::String(s.clone())),
        ast::Value::Boolean(b) => Some(Value::Bool(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, ObjectType};
    use crate::span::{Span, Spanned};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .with_enum("Order", &["ASC", "DESC"])
            .with_object(
                ObjectType::new("Range")
                    .with_field(FieldDef::new("from", TypeRef::named("Int")))
                    .with_field(FieldDef::new("to", TypeRef::named("Int"))),
            )
    }

    fn lit(value: ast::Value) -> Spanned<ast::Value> {
        Spanned::new(value, Span::default())
    }

    fn vars(value: Value) -> Variables {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_id_accepts_string_and_integer() {
        let schema = schema();
        let id = TypeRef::named("ID");
        assert_eq!(
            coerce_literal(&schema, &ast::Value::String("42".into()), &id, None).unwrap(),
            json!("42")
        );
        assert_eq!(
            coerce_literal(&schema, &ast::Value::Int(42), &id, None).unwrap(),
            json!("42")
        );
        assert!(coerce_literal(&schema, &ast::Value::Float(4.2), &id, None).is_err());
    }

    #[test]
    fn test_variable_lookup() {
        let schema = schema();
        let variables = vars(json!({ "repoId": "42" }));
        let value = coerce_literal(
            &schema,
            &ast::Value::Variable("repoId".into()),
            &TypeRef::named("ID"),
            Some(&variables),
        )
        .unwrap();
        assert_eq!(value, json!("42"));
    }

    #[test]
    fn test_missing_variable_for_non_null() {
        let schema = schema();
        let err = coerce_literal(
            &schema,
            &ast::Value::Variable("repoId".into()),
            &TypeRef::non_null(TypeRef::named("ID")),
            Some(&Variables::new()),
        )
        .unwrap_err();
        assert!(err.message.starts_with("variable $repoId"));
    }

    #[test]
    fn test_unchecked_variables_in_validation_mode() {
        let schema = schema();
        let value = coerce_literal(
            &schema,
            &ast::Value::Variable("x".into()),
            &TypeRef::non_null(TypeRef::named("Int")),
            None,
        )
        .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_int_range_and_float_widening() {
        let schema = schema();
        assert!(coerce_value(&schema, &json!(3_000_000_000i64), &TypeRef::named("Int")).is_err());
        assert!(coerce_value(&schema, &json!(1.5), &TypeRef::named("Int")).is_err());
        assert_eq!(
            coerce_literal(&schema, &ast::Value::Int(2), &TypeRef::named("Float"), None).unwrap(),
            json!(2.0)
        );
    }

    #[test]
    fn test_enum_literal() {
        let schema = schema();
        let order = TypeRef::named("Order");
        assert_eq!(
            coerce_literal(&schema, &ast::Value::Enum("DESC".into()), &order, None).unwrap(),
            json!("DESC")
        );
        assert!(coerce_literal(&schema, &ast::Value::String("DESC".into()), &order, None).is_err());
        assert!(coerce_literal(&schema, &ast::Value::Enum("UP".into()), &order, None).is_err());
    }

    #[test]
    fn test_list_wraps_single_value() {
        let schema = schema();
        let ty = TypeRef::list(TypeRef::named("String"));
        assert_eq!(
            coerce_literal(&schema, &ast::Value::String("a".into()), &ty, None).unwrap(),
            json!(["a"])
        );
        let list = ast::Value::List(vec![
            lit(ast::Value::String("a".into())),
            lit(ast::Value::String("b".into())),
        ]);
        assert_eq!(coerce_literal(&schema, &list, &ty, None).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_object_literal_fields() {
        let schema = schema();
        let ty = TypeRef::named("Range");
        let literal = ast::Value::Object(vec![(
            Spanned::new("from".to_string(), Span::default()),
            lit(ast::Value::Int(1)),
        )]);
        assert_eq!(
            coerce_literal(&schema, &literal, &ty, None).unwrap(),
            json!({ "from": 1 })
        );

        let bad = ast::Value::Object(vec![(
            Spanned::new("step".to_string(), Span::default()),
            lit(ast::Value::Int(1)),
        )]);
        assert!(coerce_literal(&schema, &bad, &ty, None).is_err());
    }

    #[test]
    fn test_null_for_non_null_literal() {
        let schema = schema();
        let err = coerce_literal(
            &schema,
            &ast::Value::Null,
            &TypeRef::non_null(TypeRef::named("String")),
            None,
        )
        .unwrap_err();
        assert_eq!(err.message, "expected String!, got null");
    }
}
