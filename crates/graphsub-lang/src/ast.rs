//! Abstract syntax tree for subscription documents.

use std::fmt;

use crate::span::{Span, Spanned};

/// A parsed query document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub definitions: Vec<OperationDefinition>,
}

impl Document {
    /// Operations in source order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.definitions.iter()
    }

    /// Find an operation by name.
    pub fn operation(&self, name: &str) -> Option<&OperationDefinition> {
        self.definitions
            .iter()
            .find(|op| op.name.as_ref().map(|n| n.as_str()) == Some(name))
    }
}

/// Operation kind keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

/// A single operation definition.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDefinition {
    pub kind: OperationKind,
    /// `None` for anonymous operations and the selection-set shorthand.
    pub name: Option<Spanned<String>>,
    pub variables: Vec<VariableDefinition>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

impl OperationDefinition {
    /// The first field of the top-level selection set.
    pub fn root_field(&self) -> Option<&Field> {
        self.selection_set.fields.first()
    }
}

/// `$name: Type = default`
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: Spanned<String>,
    pub ty: Spanned<TypeRef>,
    pub default: Option<Spanned<Value>>,
}

/// A type reference such as `ID`, `[String!]` or `Int!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn non_null(inner: TypeRef) -> Self {
        TypeRef::NonNull(Box::new(inner))
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    /// The named type at the bottom of any list/non-null wrappers.
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.base_name(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// `{ field field ... }`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionSet {
    pub fields: Vec<Field>,
    pub span: Span,
}

impl SelectionSet {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A field selection with optional alias, arguments and sub-selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: Option<Spanned<String>>,
    pub name: Spanned<String>,
    pub arguments: Vec<Argument>,
    pub selection_set: Option<SelectionSet>,
    pub span: Span,
}

impl Field {
    /// Key under which this field appears in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_ref().unwrap_or(&self.name).as_str()
    }
}

/// `name: value`
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Spanned<String>,
    pub value: Spanned<Value>,
}

/// An input value literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Spanned<Value>>),
    Object(Vec<(Spanned<String>, Spanned<Value>)>),
}

impl Value {
    /// Short description of the literal kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Variable(_) => "variable",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
            Value::Enum(_) => "enum value",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Visit every variable name referenced by this value.
    pub fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Value::Variable(name) => out.push(name),
            Value::List(items) => items.iter().for_each(|v| v.value.collect_variables(out)),
            Value::Object(fields) => fields
                .iter()
                .for_each(|(_, v)| v.value.collect_variables(out)),
            _ => {}
        }
    }
}
