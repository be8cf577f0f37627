//! Lexer for subscription queries using logos.

use crate::error::ParseError;
use crate::span::Span;
use logos::Logos;

/// Tokens of the query language.
///
/// Commas are insignificant and skipped together with whitespace and
/// `#` line comments.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\r\n,\u{FEFF}]|#[^\n]*)+")]
pub enum Token {
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"[_A-Za-z][_0-9A-Za-z]*", |lex| lex.slice().to_string())]
    Name(String),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1])
    })]
    String(String),

    #[regex(r"-?(0|[1-9][0-9]*)", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?(0|[1-9][0-9]*)(\.[0-9]+([eE][+-]?[0-9]+)?|[eE][+-]?[0-9]+)", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[token("$")]
    Dollar,
    #[token("!")]
    Bang,
    #[token("=")]
    Equals,
    #[token(":")]
    Colon,
    #[token("@")]
    At,
    #[token("...")]
    Spread,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
}

impl Token {
    /// Short human-readable description used in parse errors.
    pub fn describe(&self) -> String {
        match self {
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Null => "'null'".to_string(),
            Token::Name(name) => format!("name '{}'", name),
            Token::String(_) => "string".to_string(),
            Token::Int(i) => format!("integer {}", i),
            Token::Float(f) => format!("float {}", f),
            Token::Dollar => "'$'".to_string(),
            Token::Bang => "'!'".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Colon => "':'".to_string(),
            Token::At => "'@'".to_string(),
            Token::Spread => "'...'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
        }
    }
}

fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('b') => result.push('\u{0008}'),
            Some('f') => result.push('\u{000C}'),
            Some('/') => result.push('/'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => result.push(decoded),
                    None => {
                        result.push_str("\\u");
                        result.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize a whole source string, failing on the first unrecognised input.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span: Span = lexer.span().into();
        match result {
            Ok(token) => tokens.push(SpannedToken { token, span }),
            Err(()) => {
                return Err(ParseError::new(
                    format!("unexpected character sequence '{}'", lexer.slice()),
                    span,
                ))
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_subscription_header() {
        assert_eq!(
            kinds("subscription OnComment($repoId: ID!)"),
            vec![
                Token::Name("subscription".to_string()),
                Token::Name("OnComment".to_string()),
                Token::LParen,
                Token::Dollar,
                Token::Name("repoId".to_string()),
                Token::Colon,
                Token::Name("ID".to_string()),
                Token::Bang,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_commas_and_comments_are_skipped() {
        let tokens = kinds("{ a, b # trailing comment\n c }");
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[3], Token::Name("c".to_string()));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("0 -12 3.5 1e3 -2.5E-1"),
            vec![
                Token::Int(0),
                Token::Int(-12),
                Token::Float(3.5),
                Token::Float(1000.0),
                Token::Float(-0.25),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""line\nbreak" "quote \" here" "A""#),
            vec![
                Token::String("line\nbreak".to_string()),
                Token::String("quote \" here".to_string()),
                Token::String("A".to_string()),
            ]
        );
    }

    #[test]
    fn test_keywords_and_spread() {
        assert_eq!(
            kinds("true false null ..."),
            vec![Token::True, Token::False, Token::Null, Token::Spread]
        );
    }

    #[test]
    fn test_invalid_character_is_reported() {
        let err = tokenize("{ a % b }").unwrap_err();
        assert_eq!(err.span, Span::new(4, 5));
        assert!(err.message.contains('%'));
    }
}
