//! Byte-offset spans used by tokens, AST nodes and diagnostics.

use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)` in the query source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// A value tagged with the source range it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }
}

impl Spanned<String> {
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

/// 1-based line and column of a byte offset.
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Render a one-line diagnostic with a caret under `span`.
pub(crate) fn render_diagnostic(source: &str, label: &str, span: Span) -> String {
    let (line, col) = offset_to_line_col(source, span.start);
    let mut out = format!("{}\n  --> line {}:{}\n", label, line, col);

    if let Some(source_line) = source.lines().nth(line - 1) {
        out.push_str(&format!("   |\n{:3}| {}\n   |", line, source_line));
        out.push_str(&" ".repeat(col));
        out.push('^');
        let width = span.len().min(source_line.len().saturating_sub(col - 1));
        if width > 1 {
            out.push_str(&"~".repeat(width - 1));
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_covers_both() {
        assert_eq!(Span::new(4, 9).merge(Span::new(2, 6)), Span::new(2, 9));
    }

    #[test]
    fn test_offset_to_line_col() {
        let source = "subscription {\n  commentAdded\n}";
        assert_eq!(offset_to_line_col(source, 0), (1, 1));
        assert_eq!(offset_to_line_col(source, 15), (2, 1));
        assert_eq!(offset_to_line_col(source, 17), (2, 3));
    }

    #[test]
    fn test_render_diagnostic_points_at_span() {
        let source = "subscription { nope }";
        let rendered = render_diagnostic(source, "error: unknown field", Span::new(15, 19));
        assert!(rendered.contains("line 1:16"));
        assert!(rendered.contains("^~~~"));
    }
}
