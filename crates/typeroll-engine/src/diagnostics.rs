//! Diagnostic infrastructure for the bundling engine.
//!
//! Every warning or error the engine reports is a structured [`Diagnostic`]
//! carrying a stable code, a severity, and (when the source is known) the
//! file, line, column and a rendered source frame. Frames are captured at
//! creation time while the source text is still in memory; virtual modules
//! are backed by temp files that are gone by the time a caller renders the
//! diagnostic.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable diagnostic codes. Callers match on these to filter or rephrase.
pub mod codes {
    /// A specifier could not be resolved. Warning when the module is left
    /// external (bare specifiers), error for relative paths and entries.
    pub const UNRESOLVED_IMPORT: &str = "UNRESOLVED_IMPORT";
    /// An entry point path does not exist.
    pub const UNRESOLVED_ENTRY: &str = "UNRESOLVED_ENTRY";
    /// The module graph contains an import cycle.
    pub const CIRCULAR_DEPENDENCY: &str = "CIRCULAR_DEPENDENCY";
    /// A chunk produced no declarations.
    pub const EMPTY_BUNDLE: &str = "EMPTY_BUNDLE";
    /// The lexer could not tokenize a source file.
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    /// An exported declaration needs an explicit type annotation.
    pub const MISSING_ANNOTATION: &str = "MISSING_ANNOTATION";
    /// A named import does not exist in the target module.
    pub const MISSING_EXPORT: &str = "MISSING_EXPORT";
}

/// Byte span with the 1-based line/column of its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self { start, end, line, column }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Diagnostic severity. Errors fail the build under no-emit-on-error;
/// warnings are collected and surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A structured engine diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    /// Rendered source excerpt (offending line plus caret underline).
    pub frame: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, message)
    }

    fn new(code: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            file: None,
            line: None,
            column: None,
            frame: None,
        }
    }

    /// Attach a file path without location information.
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach a location and capture a source frame for it.
    ///
    /// `source` must be the text the span was produced from.
    pub fn with_location(mut self, file: &Path, span: Span, source: &str) -> Self {
        self.file = Some(file.to_path_buf());
        self.line = Some(span.line);
        self.column = Some(span.column);
        self.frame = render_frame(source, span);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => {
                write!(f, "{}:{}:{}: {}: {}", file.display(), line, col, self.code, self.message)
            }
            (Some(file), _, _) => write!(f, "{}: {}: {}", file.display(), self.code, self.message),
            _ => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// Render the line a span starts on with a caret underline.
fn render_frame(source: &str, span: Span) -> Option<String> {
    let line_start = source[..span.start.min(source.len())]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let line_end = source[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(source.len());
    let text = source.get(line_start..line_end)?.trim_end_matches('\r');

    let gutter = format!("{:>4} | ", span.line);
    let caret_offset = span.start - line_start;
    // Column widths rather than bytes, so tabs keep the caret aligned.
    let pad: String = text[..caret_offset.min(text.len())]
        .chars()
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect();
    let caret_len = span.len().clamp(1, line_end.saturating_sub(span.start).max(1));
    let carets = "^".repeat(caret_len);

    Some(format!(
        "{}{}\n{:>width$} | {}{}",
        gutter,
        text,
        "",
        pad,
        carets,
        width = 4
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_points_at_span() {
        let source = "const a = 1;\nconst b = oops();\n";
        let start = source.find("oops").unwrap();
        let span = Span::new(start, start + 4, 2, 11);
        let diag = Diagnostic::error(codes::MISSING_ANNOTATION, "no type")
            .with_location(Path::new("x.ts"), span, source);

        let frame = diag.frame.unwrap();
        assert!(frame.contains("const b = oops();"));
        assert!(frame.contains("^^^^"));
        assert_eq!(diag.line, Some(2));
        assert_eq!(diag.column, Some(11));
    }

    #[test]
    fn test_display_with_location() {
        let source = "let x = 1;\n";
        let span = Span::new(4, 5, 1, 5);
        let diag = Diagnostic::warning(codes::UNRESOLVED_IMPORT, "cannot resolve \"foo\"")
            .with_location(Path::new("src/a.ts"), span, source);

        let text = diag.to_string();
        assert!(text.contains("src/a.ts:1:5"));
        assert!(text.contains("UNRESOLVED_IMPORT"));
    }

    #[test]
    fn test_display_without_location() {
        let diag = Diagnostic::warning(codes::EMPTY_BUNDLE, "chunk \"index\" is empty");
        assert_eq!(diag.to_string(), "EMPTY_BUNDLE: chunk \"index\" is empty");
    }
}
