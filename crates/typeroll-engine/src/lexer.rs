//! Lexer for declaration-bearing TypeScript sources.
//!
//! Built on logos. The token set is tuned for declaration extraction:
//! keywords the scanner dispatches on are real tokens, everything else an
//! identifier; operators are single characters except `=>` and `...`
//! because statement splitting only needs bracket depth, not expression
//! structure. Comments are not skipped, since doc blocks travel with the
//! declarations they precede, but they are returned out of band so the
//! scanner never has to step around trivia.

use crate::diagnostics::Span;
use logos::Logos;

/// Internal logos token enum, converted to [`Token`] after lexing.
#[derive(Logos, Debug, Clone, PartialEq)]
enum LogosToken {
    // Whitespace (skip)
    #[regex(r"[ \t\r\n]+", logos::skip)]
    Whitespace,

    // Comments (kept, routed into the trivia list by the driver)
    #[regex(r"//[^\n]*")]
    LineComment,

    #[token("/*", lex_block_comment)]
    BlockComment,

    // Keywords the scanner dispatches on. Contextual keywords stay usable
    // as identifiers through `Token::ident_text`.
    #[token("import")]
    Import,

    #[token("export")]
    Export,

    #[token("from")]
    From,

    #[token("as")]
    As,

    #[token("default")]
    Default,

    #[token("declare")]
    Declare,

    #[token("const")]
    Const,

    #[token("let")]
    Let,

    #[token("var")]
    Var,

    #[token("function")]
    Function,

    #[token("class")]
    Class,

    #[token("interface")]
    Interface,

    #[token("type")]
    Type,

    #[token("enum")]
    Enum,

    #[token("namespace")]
    Namespace,

    #[token("module")]
    Module,

    #[token("abstract")]
    Abstract,

    #[token("async")]
    Async,

    #[token("static")]
    Static,

    #[token("readonly")]
    Readonly,

    #[token("accessor")]
    Accessor,

    #[token("public")]
    Public,

    #[token("private")]
    Private,

    #[token("protected")]
    Protected,

    #[token("extends")]
    Extends,

    #[token("implements")]
    Implements,

    #[token("new")]
    New,

    #[token("typeof")]
    Typeof,

    #[token("keyof")]
    Keyof,

    #[token("infer")]
    Infer,

    #[token("asserts")]
    Asserts,

    #[token("unique")]
    Unique,

    #[token("require")]
    Require,

    #[token("global")]
    Global,

    #[token("get")]
    Get,

    #[token("set")]
    Set,

    #[token("is")]
    Is,

    #[token("in")]
    In,

    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("null")]
    Null,

    // Identifiers (after keywords)
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Numbers, raw slices; the emitter needs the literal text, not a value
    #[regex(r"0[xX][0-9a-fA-F]+(_[0-9a-fA-F]+)*n?", |lex| lex.slice().to_string())]
    #[regex(r"0[bB][01]+(_[01]+)*n?", |lex| lex.slice().to_string())]
    #[regex(r"0[oO][0-7]+(_[0-7]+)*n?", |lex| lex.slice().to_string())]
    #[regex(r"[0-9]+(_[0-9]+)*n", |lex| lex.slice().to_string())]
    #[regex(
        r"([0-9]+(_[0-9]+)*(\.[0-9]+(_[0-9]+)*)?|\.[0-9]+(_[0-9]+)*)([eE][+-]?[0-9]+(_[0-9]+)*)?",
        |lex| lex.slice().to_string()
    )]
    Number(String),

    // Strings, cooked values (quotes removed, escapes resolved)
    #[regex(r#""([^"\\\n]|\\.)*""#, cook_string)]
    #[regex(r"'([^'\\\n]|\\.)*'", cook_string)]
    Str(String),

    // Template literal start; the driver scans the body
    #[token("`")]
    Backtick,

    // Multi-character operators the scanner cares about
    #[token("=>")]
    Arrow,

    #[token("...")]
    DotDotDot,

    // Single-character tokens. Compound operators in executable code lex
    // as character runs, which is all statement splitting needs.
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("!")]
    Bang,

    #[token("~")]
    Tilde,

    #[token("<")]
    Less,

    #[token(">")]
    Greater,

    #[token("&")]
    Amp,

    #[token("|")]
    Pipe,

    #[token("^")]
    Caret,

    #[token("=")]
    Equal,

    #[token("?")]
    Question,

    #[token("@")]
    At,

    #[token("#")]
    Hash,

    #[token(".")]
    Dot,

    #[token(":")]
    Colon,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("{")]
    LeftBrace,

    #[token("}")]
    RightBrace,

    #[token("[")]
    LeftBracket,

    #[token("]")]
    RightBracket,

    #[token(";")]
    Semicolon,

    #[token(",")]
    Comma,
}

// Consume a block comment body; "/*" is already matched.
fn lex_block_comment(lex: &mut logos::Lexer<LogosToken>) {
    let remainder = lex.remainder();
    if let Some(end) = remainder.find("*/") {
        lex.bump(end + 2);
    } else {
        // Unterminated comment, consume to end
        lex.bump(remainder.len());
    }
}

fn cook_string(lex: &mut logos::Lexer<LogosToken>) -> Option<String> {
    let s = lex.slice();
    let inner = &s[1..s.len() - 1];
    Some(unescape_string(inner))
}

fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('0') => result.push('\0'),
                Some(c) => result.push(c),
                None => break,
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Public token enum produced by [`Lexer::tokenize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Import,
    Export,
    From,
    As,
    Default,
    Declare,
    Const,
    Let,
    Var,
    Function,
    Class,
    Interface,
    Type,
    Enum,
    Namespace,
    Module,
    Abstract,
    Async,
    Static,
    Readonly,
    Accessor,
    Public,
    Private,
    Protected,
    Extends,
    Implements,
    New,
    Typeof,
    Keyof,
    Infer,
    Asserts,
    Unique,
    Require,
    Global,
    Get,
    Set,
    Is,
    In,
    True,
    False,
    Null,
    Identifier(String),
    Number(String),
    Str(String),
    /// Whole template literal; `has_subst` is true when it contains `${`.
    Template { has_subst: bool },
    /// Whole regex literal, body and flags.
    Regex,
    Arrow,
    DotDotDot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Tilde,
    Less,
    Greater,
    Amp,
    Pipe,
    Caret,
    Equal,
    Question,
    At,
    Hash,
    Dot,
    Colon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    Eof,
}

impl Token {
    /// The identifier text of this token, treating contextual keywords as
    /// ordinary names. Import/export/member positions accept these.
    pub fn ident_text(&self) -> Option<&str> {
        match self {
            Token::Identifier(name) => Some(name),
            Token::From => Some("from"),
            Token::As => Some("as"),
            Token::Default => Some("default"),
            Token::Declare => Some("declare"),
            Token::Type => Some("type"),
            Token::Namespace => Some("namespace"),
            Token::Module => Some("module"),
            Token::Abstract => Some("abstract"),
            Token::Async => Some("async"),
            Token::Static => Some("static"),
            Token::Readonly => Some("readonly"),
            Token::Accessor => Some("accessor"),
            Token::Keyof => Some("keyof"),
            Token::Infer => Some("infer"),
            Token::Asserts => Some("asserts"),
            Token::Unique => Some("unique"),
            Token::Require => Some("require"),
            Token::Global => Some("global"),
            Token::Get => Some("get"),
            Token::Set => Some("set"),
            Token::Is => Some("is"),
            _ => None,
        }
    }

    /// True when the token can end an expression, which makes a following
    /// `/` a division sign rather than a regex literal.
    fn ends_operand(&self) -> bool {
        match self {
            Token::Identifier(name) => {
                // Flow keywords lex as identifiers; an operand cannot end
                // on them (`return /re/` starts a regex).
                !matches!(
                    name.as_str(),
                    "return" | "throw" | "case" | "do" | "else" | "yield" | "await" | "delete"
                        | "void" | "instanceof" | "of"
                )
            }
            Token::Number(_)
            | Token::Str(_)
            | Token::Template { .. }
            | Token::Regex
            | Token::True
            | Token::False
            | Token::Null
            | Token::RightParen
            | Token::RightBracket
            | Token::RightBrace
            | Token::Greater => true,
            _ => false,
        }
    }
}

/// A comment kept out of the token stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub span: Span,
    /// True for `/** ... */` blocks.
    pub doc: bool,
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedCharacter { char: char, span: Span },
    UnterminatedTemplate { span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedCharacter { span, .. } => *span,
            LexError::UnterminatedTemplate { span } => *span,
        }
    }

    pub fn message(&self) -> String {
        match self {
            LexError::UnexpectedCharacter { char, .. } => {
                format!("unexpected character `{}`", char.escape_default())
            }
            LexError::UnterminatedTemplate { .. } => "unterminated template literal".to_string(),
        }
    }
}

/// Result of tokenizing one source file.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    pub tokens: Vec<(Token, Span)>,
    pub comments: Vec<Comment>,
}

/// Main lexer structure.
pub struct Lexer<'a> {
    source: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    pub fn tokenize(self) -> Result<TokenStream, Vec<LexError>> {
        let mut stream = TokenStream::default();
        let mut errors = Vec::new();
        let mut logos_lexer = LogosToken::lexer(self.source);
        let mut line = 1u32;
        let mut column = 1u32;
        let mut last_end = 0usize;

        while let Some(token_result) = logos_lexer.next() {
            let range = logos_lexer.span();

            // Update line and column across skipped text
            for c in self.source[last_end..range.start].chars() {
                if c == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }

            let mut span = Span::new(range.start, range.end, line, column);

            match token_result {
                Ok(LogosToken::LineComment) => {
                    stream.comments.push(Comment { span, doc: false });
                }
                Ok(LogosToken::BlockComment) => {
                    let text = &self.source[range.start..range.end];
                    stream.comments.push(Comment {
                        span,
                        doc: text.starts_with("/**") && !text.starts_with("/***"),
                    });
                }
                Ok(LogosToken::Backtick) => {
                    match scan_template(self.source, range.end) {
                        Some((end, has_subst)) => {
                            logos_lexer.bump(end - range.end);
                            span.end = end;
                            stream.tokens.push((Token::Template { has_subst }, span));
                        }
                        None => {
                            errors.push(LexError::UnterminatedTemplate { span });
                            logos_lexer.bump(logos_lexer.remainder().len());
                        }
                    }
                }
                Ok(LogosToken::Slash) => {
                    let regex_position = stream
                        .tokens
                        .last()
                        .map_or(true, |(t, _)| !t.ends_operand());
                    match regex_position.then(|| scan_regex(self.source, range.end)).flatten() {
                        Some(end) => {
                            logos_lexer.bump(end - range.end);
                            span.end = end;
                            stream.tokens.push((Token::Regex, span));
                        }
                        None => stream.tokens.push((Token::Slash, span)),
                    }
                }
                Ok(logos_token) => {
                    stream.tokens.push((convert_token(logos_token), span));
                }
                Err(_) => {
                    let char = self.source[range.start..].chars().next().unwrap_or('\0');
                    errors.push(LexError::UnexpectedCharacter { char, span });
                }
            }

            // Advance position over the token itself (including bumps)
            let end = span.end.max(range.end);
            for c in self.source[range.start..end].chars() {
                if c == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }

            last_end = end;
        }

        let eof_span = Span::new(self.source.len(), self.source.len(), line, column);
        stream.tokens.push((Token::Eof, eof_span));

        if errors.is_empty() {
            Ok(stream)
        } else {
            Err(errors)
        }
    }
}

/// Scan a template literal body starting just after the opening backtick.
/// Returns the end offset (past the closing backtick) and whether any
/// `${...}` substitution was seen.
fn scan_template(source: &str, mut i: usize) -> Option<(usize, bool)> {
    let bytes = source.as_bytes();
    let mut has_subst = false;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Some((i + 1, has_subst)),
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                has_subst = true;
                i = scan_braces(source, i + 2)?;
            }
            _ => i += 1,
        }
    }
    None
}

/// Scan a `${...}` substitution body; `i` points just after the `{`.
/// Returns the offset past the matching `}`.
fn scan_braces(source: &str, mut i: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 1usize;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'`' => {
                let (end, _) = scan_template(source, i + 1)?;
                i = end;
            }
            b'"' | b'\'' => i = scan_quoted(source, i)?,
            _ => i += 1,
        }
    }
    None
}

/// Skip a quoted string starting at its opening quote.
fn scan_quoted(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            b'\n' => return None,
            _ => i += 1,
        }
    }
    None
}

/// Scan a regex literal body starting just after the opening `/`. Returns
/// the end offset past the flags, or None when the text cannot be a regex.
fn scan_regex(source: &str, mut i: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut in_class = false;

    if i >= bytes.len() || bytes[i] == b'/' || bytes[i] == b'*' {
        // `//` and `/*` are comments, never an empty regex
        return None;
    }

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return Some(i);
            }
            _ => i += 1,
        }
    }
    None
}

fn convert_token(logos_token: LogosToken) -> Token {
    match logos_token {
        LogosToken::Import => Token::Import,
        LogosToken::Export => Token::Export,
        LogosToken::From => Token::From,
        LogosToken::As => Token::As,
        LogosToken::Default => Token::Default,
        LogosToken::Declare => Token::Declare,
        LogosToken::Const => Token::Const,
        LogosToken::Let => Token::Let,
        LogosToken::Var => Token::Var,
        LogosToken::Function => Token::Function,
        LogosToken::Class => Token::Class,
        LogosToken::Interface => Token::Interface,
        LogosToken::Type => Token::Type,
        LogosToken::Enum => Token::Enum,
        LogosToken::Namespace => Token::Namespace,
        LogosToken::Module => Token::Module,
        LogosToken::Abstract => Token::Abstract,
        LogosToken::Async => Token::Async,
        LogosToken::Static => Token::Static,
        LogosToken::Readonly => Token::Readonly,
        LogosToken::Accessor => Token::Accessor,
        LogosToken::Public => Token::Public,
        LogosToken::Private => Token::Private,
        LogosToken::Protected => Token::Protected,
        LogosToken::Extends => Token::Extends,
        LogosToken::Implements => Token::Implements,
        LogosToken::New => Token::New,
        LogosToken::Typeof => Token::Typeof,
        LogosToken::Keyof => Token::Keyof,
        LogosToken::Infer => Token::Infer,
        LogosToken::Asserts => Token::Asserts,
        LogosToken::Unique => Token::Unique,
        LogosToken::Require => Token::Require,
        LogosToken::Global => Token::Global,
        LogosToken::Get => Token::Get,
        LogosToken::Set => Token::Set,
        LogosToken::Is => Token::Is,
        LogosToken::In => Token::In,
        LogosToken::True => Token::True,
        LogosToken::False => Token::False,
        LogosToken::Null => Token::Null,
        LogosToken::Identifier(name) => Token::Identifier(name),
        LogosToken::Number(raw) => Token::Number(raw),
        LogosToken::Str(value) => Token::Str(value),
        LogosToken::Arrow => Token::Arrow,
        LogosToken::DotDotDot => Token::DotDotDot,
        LogosToken::Plus => Token::Plus,
        LogosToken::Minus => Token::Minus,
        LogosToken::Star => Token::Star,
        LogosToken::Slash => Token::Slash,
        LogosToken::Percent => Token::Percent,
        LogosToken::Bang => Token::Bang,
        LogosToken::Tilde => Token::Tilde,
        LogosToken::Less => Token::Less,
        LogosToken::Greater => Token::Greater,
        LogosToken::Amp => Token::Amp,
        LogosToken::Pipe => Token::Pipe,
        LogosToken::Caret => Token::Caret,
        LogosToken::Equal => Token::Equal,
        LogosToken::Question => Token::Question,
        LogosToken::At => Token::At,
        LogosToken::Hash => Token::Hash,
        LogosToken::Dot => Token::Dot,
        LogosToken::Colon => Token::Colon,
        LogosToken::LeftParen => Token::LeftParen,
        LogosToken::RightParen => Token::RightParen,
        LogosToken::LeftBrace => Token::LeftBrace,
        LogosToken::RightBrace => Token::RightBrace,
        LogosToken::LeftBracket => Token::LeftBracket,
        LogosToken::RightBracket => Token::RightBracket,
        LogosToken::Semicolon => Token::Semicolon,
        LogosToken::Comma => Token::Comma,
        LogosToken::Whitespace | LogosToken::LineComment | LogosToken::BlockComment
        | LogosToken::Backtick => {
            unreachable!("handled by the driver loop")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .tokens
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            lex("export interface Foo"),
            vec![
                Token::Export,
                Token::Interface,
                Token::Identifier("Foo".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_literals_cooked() {
        assert_eq!(
            lex(r#"import x from "./a\"b""#),
            vec![
                Token::Import,
                Token::Identifier("x".into()),
                Token::From,
                Token::Str("./a\"b".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_keep_raw_text() {
        assert_eq!(
            lex("1_000 0xFF 1.5e3 10n"),
            vec![
                Token::Number("1_000".into()),
                Token::Number("0xFF".into()),
                Token::Number("1.5e3".into()),
                Token::Number("10n".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_template_literal_spans_whole_body() {
        let stream = Lexer::new("const x = `a ${f({})} b`;").tokenize().unwrap();
        let template = stream
            .tokens
            .iter()
            .find(|(t, _)| matches!(t, Token::Template { .. }))
            .unwrap();
        assert_eq!(template.0, Token::Template { has_subst: true });
        let span = template.1;
        assert_eq!(span.start, 10);
        assert_eq!(span.end, 24);
    }

    #[test]
    fn test_regex_vs_division() {
        // Operand position: regex
        let tokens = lex("const re = /a[/;]b/g;");
        assert!(tokens.contains(&Token::Regex));
        assert_eq!(tokens.iter().filter(|t| **t == Token::Semicolon).count(), 1);

        // After an identifier: division
        let tokens = lex("a / b");
        assert!(tokens.contains(&Token::Slash));
    }

    #[test]
    fn test_comments_kept_out_of_band() {
        let stream = Lexer::new("/** doc */\n// line\nconst a = 1;").tokenize().unwrap();
        assert_eq!(stream.comments.len(), 2);
        assert!(stream.comments[0].doc);
        assert!(!stream.comments[1].doc);
        assert_eq!(stream.tokens[0].0, Token::Const);
    }

    #[test]
    fn test_line_and_column_tracking() {
        let stream = Lexer::new("const a = 1;\nconst b = 2;").tokenize().unwrap();
        let b = stream
            .tokens
            .iter()
            .find(|(t, _)| matches!(t, Token::Identifier(n) if n == "b"))
            .unwrap();
        assert_eq!(b.1.line, 2);
        assert_eq!(b.1.column, 7);
    }

    #[test]
    fn test_unterminated_template_errors() {
        let result = Lexer::new("const x = `abc").tokenize();
        assert!(matches!(
            result.unwrap_err()[0],
            LexError::UnterminatedTemplate { .. }
        ));
    }
}
