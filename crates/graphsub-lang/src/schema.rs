//! Schema definitions: the subscription root and the object types it returns.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::ast::TypeRef;

/// Built-in scalar type names.
pub const BUILTIN_SCALARS: &[&str] = &["ID", "String", "Int", "Float", "Boolean"];

/// Name of the subscription root type, used in diagnostics.
pub const SUBSCRIPTION_TYPE: &str = "Subscription";

/// A declared field argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDef {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Value>,
}

impl ArgumentDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Non-null without a default.
    pub fn is_required(&self) -> bool {
        self.ty.is_non_null() && self.default.is_none()
    }
}

/// A field on the subscription root or on an object type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub arguments: Vec<ArgumentDef>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: ArgumentDef) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentDef> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

/// An object type with named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub name: String,
    pub fields: BTreeMap<String, FieldDef>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }
}

/// Enum type: a closed set of names.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

/// What a named type resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NamedType<'a> {
    Scalar(&'a str),
    Enum(&'a EnumType),
    Object(&'a ObjectType),
}

/// A schema exposing a subscription root type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    subscription_fields: BTreeMap<String, FieldDef>,
    objects: BTreeMap<String, ObjectType>,
    enums: BTreeMap<String, EnumType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscription_field(mut self, field: FieldDef) -> Self {
        self.subscription_fields.insert(field.name.clone(), field);
        self
    }

    pub fn with_object(mut self, object: ObjectType) -> Self {
        self.objects.insert(object.name.clone(), object);
        self
    }

    pub fn with_enum(mut self, name: impl Into<String>, values: &[&str]) -> Self {
        let name = name.into();
        self.enums.insert(
            name.clone(),
            EnumType {
                name,
                values: values.iter().map(|v| v.to_string()).collect(),
            },
        );
        self
    }

    pub fn subscription_field(&self, name: &str) -> Option<&FieldDef> {
        self.subscription_fields.get(name)
    }

    pub fn subscription_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.subscription_fields.values()
    }

    /// Resolve a type name to its definition.
    pub fn named_type(&self, name: &str) -> Option<NamedType<'_>> {
        if let Some(scalar) = BUILTIN_SCALARS.iter().find(|s| **s == name) {
            return Some(NamedType::Scalar(*scalar));
        }
        if let Some(e) = self.enums.get(name) {
            return Some(NamedType::Enum(e));
        }
        self.objects.get(name).map(NamedType::Object)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.objects.get(name)
    }
}
