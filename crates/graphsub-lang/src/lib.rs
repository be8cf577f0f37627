//! graphsub query language
//!
//! Parser, validator and executor for the subscription subset of the
//! GraphQL query language. A [`Schema`] declares the subscription root
//! fields, their arguments and the object types they return; an [`Engine`]
//! binds a schema and runs documents against one message root at a time.
//!
//! # Supported syntax
//!
//! ```text
//! subscription OnComment($repoId: ID!, $limit: Int = 10) {
//!   commentAdded(repoId: $repoId) {
//!     id
//!     body: text
//!     author { name __typename }
//!   }
//! }
//! ```
//!
//! Fragments, directives and inline fragments are rejected at parse time.
//!
//! # Usage
//!
//! ```rust
//! use graphsub_lang::{Engine, FieldDef, ObjectType, Schema, TypeRef, Variables};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .with_object(ObjectType::new("Comment").with_field(FieldDef::new("id", TypeRef::named("ID"))))
//!     .with_subscription_field(FieldDef::new("commentAdded", TypeRef::named("Comment")));
//! let engine = Engine::new(schema);
//!
//! let document = engine.parse("subscription { commentAdded { id } }").unwrap();
//! assert!(engine.validate(&document).is_empty());
//!
//! let result = engine
//!     .execute(&document, &json!({ "id": "1" }), &json!(null), &Variables::new(), None)
//!     .unwrap();
//! assert_eq!(result.data, Some(json!({ "commentAdded": { "id": "1" } })));
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod execute;
pub mod lexer;
pub mod parser;
pub mod schema;
pub mod span;
pub mod validate;
pub mod values;

pub use ast::{Document, Field, OperationDefinition, OperationKind, TypeRef};
pub use engine::Engine;
pub use error::{
    CoercionError, ExecutionError, LangError, ParseError, ValidationError, ValidationRule,
};
pub use execute::{ExecutionResult, FieldError};
pub use schema::{ArgumentDef, FieldDef, ObjectType, Schema};
pub use span::{Span, Spanned};
pub use values::Variables;

/// Parse a source string into a document.
pub fn parse(source: &str) -> Result<Document, ParseError> {
    parser::parse(source)
}

/// Tokenize a source string (for debugging/testing).
pub fn tokenize(source: &str) -> Result<Vec<lexer::SpannedToken>, ParseError> {
    lexer::tokenize(source)
}
