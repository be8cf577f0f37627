//! Recursive descent parser for subscription documents.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::span::{Span, Spanned};

/// Parser over a pre-tokenized source.
pub struct Parser<'source> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: &'source str,
}

impl<'source> Parser<'source> {
    /// Tokenize `source` and prepare a parser over it.
    pub fn new(source: &'source str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            source,
        })
    }

    /// Parse a complete document.
    pub fn parse_document(&mut self) -> Result<Document, ParseError> {
        let mut definitions = Vec::new();
        while self.peek().is_some() {
            definitions.push(self.parse_definition()?);
        }

        if definitions.is_empty() {
            return Err(ParseError::new("document contains no definitions", self.eof_span()));
        }

        Ok(Document { definitions })
    }

    fn parse_definition(&mut self) -> Result<OperationDefinition, ParseError> {
        let tok = self.peek_token()?.clone();
        match &tok.token {
            Token::LBrace => {
                let selection_set = self.parse_selection_set()?;
                Ok(OperationDefinition {
                    kind: OperationKind::Query,
                    name: None,
                    variables: Vec::new(),
                    span: selection_set.span,
                    selection_set,
                })
            }
            Token::Name(keyword) => match keyword.as_str() {
                "subscription" => self.parse_operation(OperationKind::Subscription),
                "query" => self.parse_operation(OperationKind::Query),
                "mutation" => self.parse_operation(OperationKind::Mutation),
                "fragment" => Err(ParseError::new("fragments are not supported", tok.span)
                    .with_hint("inline the fragment fields into the selection set")),
                _ => Err(ParseError::new(
                    format!("expected an operation definition, found {}", tok.token.describe()),
                    tok.span,
                )
                .with_hint("operations start with 'subscription', 'query' or 'mutation'")),
            },
            other => Err(ParseError::new(
                format!("expected an operation definition, found {}", other.describe()),
                tok.span,
            )),
        }
    }

    fn parse_operation(&mut self, kind: OperationKind) -> Result<OperationDefinition, ParseError> {
        let keyword = self.next_token()?;

        let name = if matches!(self.peek(), Some(Token::Name(_))) {
            Some(self.expect_name()?)
        } else {
            None
        };

        let variables = if self.peek() == Some(&Token::LParen) {
            self.parse_variable_definitions()?
        } else {
            Vec::new()
        };

        self.reject_directives()?;
        let selection_set = self.parse_selection_set()?;

        Ok(OperationDefinition {
            kind,
            name,
            variables,
            span: keyword.span.merge(selection_set.span),
            selection_set,
        })
    }

    fn parse_variable_definitions(&mut self) -> Result<Vec<VariableDefinition>, ParseError> {
        let open = self.expect_token(Token::LParen)?;
        let mut definitions = Vec::new();

        while self.peek() != Some(&Token::RParen) {
            let dollar = self.expect_token(Token::Dollar)?;
            let name = self.expect_name()?;
            let name = Spanned::new(name.value, dollar.span.merge(name.span));
            self.expect_token(Token::Colon)?;
            let ty = self.parse_type()?;

            let default = if self.peek() == Some(&Token::Equals) {
                self.next_token()?;
                Some(self.parse_value(true)?)
            } else {
                None
            };

            definitions.push(VariableDefinition { name, ty, default });
        }

        let close = self.expect_token(Token::RParen)?;
        if definitions.is_empty() {
            return Err(ParseError::new(
                "expected at least one variable definition",
                open.span.merge(close.span),
            ));
        }

        Ok(definitions)
    }

    fn parse_type(&mut self) -> Result<Spanned<TypeRef>, ParseError> {
        let (ty, mut span) = if self.peek() == Some(&Token::LBracket) {
            let open = self.next_token()?;
            let inner = self.parse_type()?;
            let close = self.expect_token(Token::RBracket)?;
            (TypeRef::list(inner.value), open.span.merge(close.span))
        } else {
            let name = self.expect_name()?;
            (TypeRef::Named(name.value), name.span)
        };

        if self.peek() == Some(&Token::Bang) {
            span = span.merge(self.next_token()?.span);
            return Ok(Spanned::new(TypeRef::non_null(ty), span));
        }

        Ok(Spanned::new(ty, span))
    }

    fn parse_selection_set(&mut self) -> Result<SelectionSet, ParseError> {
        let open = self.expect_token(Token::LBrace)?;
        let mut fields = Vec::new();

        while self.peek() != Some(&Token::RBrace) {
            if self.peek() == Some(&Token::Spread) {
                let spread = self.next_token()?;
                return Err(ParseError::new("fragment spreads are not supported", spread.span));
            }
            fields.push(self.parse_field()?);
        }

        let close = self.expect_token(Token::RBrace)?;
        let span = open.span.merge(close.span);
        if fields.is_empty() {
            return Err(ParseError::new("selection set must contain at least one field", span));
        }

        Ok(SelectionSet { fields, span })
    }

    fn parse_field(&mut self) -> Result<Field, ParseError> {
        let first = self.expect_name()?;
        let (alias, name) = if self.peek() == Some(&Token::Colon) {
            self.next_token()?;
            (Some(first), self.expect_name()?)
        } else {
            (None, first)
        };

        let start = alias.as_ref().map_or(name.span, |a| a.span);
        let mut end = name.span;

        let arguments = if self.peek() == Some(&Token::LParen) {
            let (arguments, span) = self.parse_arguments()?;
            end = span;
            arguments
        } else {
            Vec::new()
        };

        self.reject_directives()?;

        let selection_set = if self.peek() == Some(&Token::LBrace) {
            let set = self.parse_selection_set()?;
            end = set.span;
            Some(set)
        } else {
            None
        };

        Ok(Field {
            alias,
            name,
            arguments,
            selection_set,
            span: start.merge(end),
        })
    }

    fn parse_arguments(&mut self) -> Result<(Vec<Argument>, Span), ParseError> {
        let open = self.expect_token(Token::LParen)?;
        let mut arguments = Vec::new();

        while self.peek() != Some(&Token::RParen) {
            let name = self.expect_name()?;
            self.expect_token(Token::Colon)?;
            let value = self.parse_value(false)?;
            arguments.push(Argument { name, value });
        }

        let close = self.expect_token(Token::RParen)?;
        let span = open.span.merge(close.span);
        if arguments.is_empty() {
            return Err(ParseError::new("expected at least one argument", span));
        }

        Ok((arguments, span))
    }

    /// Parse an input value. Variables are rejected in constant position
    /// (variable defaults).
    fn parse_value(&mut self, constant: bool) -> Result<Spanned<Value>, ParseError> {
        let tok = self.next_token()?;
        let value = match tok.token {
            Token::Dollar => {
                if constant {
                    return Err(ParseError::new(
                        "variables are not allowed in default values",
                        tok.span,
                    ));
                }
                let name = self.expect_name()?;
                return Ok(Spanned::new(Value::Variable(name.value), tok.span.merge(name.span)));
            }
            Token::Int(i) => Value::Int(i),
            Token::Float(f) => Value::Float(f),
            Token::String(s) => Value::String(s),
            Token::True => Value::Boolean(true),
            Token::False => Value::Boolean(false),
            Token::Null => Value::Null,
            Token::Name(name) => Value::Enum(name),
            Token::LBracket => {
                let mut items = Vec::new();
                while self.peek() != Some(&Token::RBracket) {
                    items.push(self.parse_value(constant)?);
                }
                let close = self.expect_token(Token::RBracket)?;
                return Ok(Spanned::new(Value::List(items), tok.span.merge(close.span)));
            }
            Token::LBrace => {
                let mut fields = Vec::new();
                while self.peek() != Some(&Token::RBrace) {
                    let name = self.expect_name()?;
                    self.expect_token(Token::Colon)?;
                    fields.push((name, self.parse_value(constant)?));
                }
                let close = self.expect_token(Token::RBrace)?;
                return Ok(Spanned::new(Value::Object(fields), tok.span.merge(close.span)));
            }
            other => {
                return Err(ParseError::new(
                    format!("expected a value, found {}", other.describe()),
                    tok.span,
                ))
            }
        };

        Ok(Spanned::new(value, tok.span))
    }

    fn reject_directives(&mut self) -> Result<(), ParseError> {
        match self.tokens.get(self.pos) {
            Some(tok) if tok.token == Token::At => {
                Err(ParseError::new("directives are not supported", tok.span))
            }
            _ => Ok(()),
        }
    }

    fn expect_name(&mut self) -> Result<Spanned<String>, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::Name(name) => Ok(Spanned::new(name, tok.span)),
            other => Err(ParseError::new(
                format!("expected a name, found {}", other.describe()),
                tok.span,
            )),
        }
    }

    fn expect_token(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if std::mem::discriminant(&tok.token) == std::mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {}, found {}", expected.describe(), tok.token.describe()),
                tok.span,
            ))
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_token(&self) -> Result<&SpannedToken, ParseError> {
        self.tokens
            .get(self.pos)
            .ok_or_else(|| ParseError::new("unexpected end of input", self.eof_span()))
    }

    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        let tok = self.peek_token()?.clone();
        self.pos += 1;
        Ok(tok)
    }

    fn eof_span(&self) -> Span {
        Span::new(self.source.len(), self.source.len())
    }
}

/// Parse a source string into a document.
pub fn parse(source: &str) -> Result<Document, ParseError> {
    Parser::new(source)?.parse_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_named_subscription() {
        let doc = parse(
            r#"
            subscription OnComment($repoId: ID!) {
                commentAdded(repoId: $repoId) { id text }
            }
            "#,
        )
        .unwrap();

        assert_eq!(doc.definitions.len(), 1);
        let op = &doc.definitions[0];
        assert_eq!(op.kind, OperationKind::Subscription);
        assert_eq!(op.name.as_ref().unwrap().value, "OnComment");
        assert_eq!(op.variables.len(), 1);
        assert_eq!(op.variables[0].name.value, "repoId");
        assert_eq!(op.variables[0].ty.value, TypeRef::non_null(TypeRef::named("ID")));

        let root = op.root_field().unwrap();
        assert_eq!(root.name.value, "commentAdded");
        assert_eq!(root.arguments.len(), 1);
        assert_eq!(root.arguments[0].value.value, Value::Variable("repoId".to_string()));
        assert_eq!(root.selection_set.as_ref().unwrap().fields.len(), 2);
    }

    #[test]
    fn test_parse_anonymous_subscription() {
        let doc = parse("subscription { ping }").unwrap();
        let op = &doc.definitions[0];
        assert!(op.name.is_none());
        assert!(op.variables.is_empty());
        assert_eq!(op.root_field().unwrap().name.value, "ping");
    }

    #[test]
    fn test_parse_shorthand_is_query() {
        let doc = parse("{ ping }").unwrap();
        assert_eq!(doc.definitions[0].kind, OperationKind::Query);
    }

    #[test]
    fn test_parse_alias_and_literals() {
        let doc = parse(
            r#"subscription { c: commentAdded(limit: 3, ratio: 0.5, tag: "x", on: true, order: DESC, ids: [1 2], by: { name: null }) { text } }"#,
        )
        .unwrap();
        let field = doc.definitions[0].root_field().unwrap();
        assert_eq!(field.response_key(), "c");
        assert_eq!(field.name.value, "commentAdded");

        let values: Vec<&Value> = field.arguments.iter().map(|a| &a.value.value).collect();
        assert_eq!(values[0], &Value::Int(3));
        assert_eq!(values[1], &Value::Float(0.5));
        assert_eq!(values[2], &Value::String("x".to_string()));
        assert_eq!(values[3], &Value::Boolean(true));
        assert_eq!(values[4], &Value::Enum("DESC".to_string()));
        assert!(matches!(values[5], Value::List(items) if items.len() == 2));
        assert!(matches!(values[6], Value::Object(fields) if fields.len() == 1));
    }

    #[test]
    fn test_parse_list_type_with_default() {
        let doc = parse(r#"subscription ($tags: [String!] = ["a"]) { tagged(tags: $tags) }"#).unwrap();
        let var = &doc.definitions[0].variables[0];
        assert_eq!(var.ty.value.to_string(), "[String!]");
        assert!(var.default.is_some());
    }

    #[test]
    fn test_parse_multiple_operations() {
        let doc = parse("subscription A { a } subscription B { b }").unwrap();
        assert_eq!(doc.definitions.len(), 2);
        assert!(doc.operation("B").is_some());
        assert!(doc.operation("C").is_none());
    }

    #[test]
    fn test_variable_in_default_rejected() {
        let err = parse("subscription ($a: Int = $b) { x }").unwrap_err();
        assert!(err.message.contains("not allowed"));
    }

    #[test]
    fn test_fragments_rejected() {
        assert!(parse("fragment F on Comment { id }").is_err());
        assert!(parse("subscription { a { ...F } }").is_err());
    }

    #[test]
    fn test_directives_rejected() {
        let err = parse("subscription { a @skip(if: true) }").unwrap_err();
        assert!(err.message.contains("directives"));
    }

    #[test]
    fn test_empty_document() {
        let err = parse("   # nothing here\n").unwrap_err();
        assert!(err.message.contains("no definitions"));
    }

    #[test]
    fn test_unterminated_selection() {
        let err = parse("subscription { a ").unwrap_err();
        assert_eq!(err.message, "unexpected end of input");
    }

    #[test]
    fn test_error_formatting() {
        let source = "subscription { commentAdded(repoId 1) }";
        let err = parse(source).unwrap_err();
        let formatted = err.format_with_source(source);
        assert!(formatted.contains("line 1"));
        assert!(formatted.contains("expected ':'"));
    }
}
