//! Statement scanner over the token stream.
//!
//! Splits a file into top-level statements (tracking bracket depth and
//! applying a conservative semicolon-insertion rule), classifies each one,
//! and extracts the import/export records the graph and the emitters need.
//! No AST is built; the emitter works on token slices plus byte edits, so
//! all the scanner records are index ranges into the token stream.

use crate::diagnostics::Span;
use crate::lexer::{Comment, Token, TokenStream};
use std::ops::Range;

/// One top-level statement.
#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    /// Token index range in the file's token stream, trivia excluded.
    pub tokens: Range<usize>,
    /// Byte span from the attached doc comment (if any) to the last token.
    pub span: Span,
    /// Attached `/** */` doc block, if any.
    pub doc: Option<Span>,
    /// The attached doc block carries an `@internal` tag.
    pub internal: bool,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Import(ImportRecord),
    /// `export { .. } from "s"` / `export * from "s"`.
    ExportFrom(ExportFrom),
    /// `export { a, b as c };` without a source.
    ExportList { names: Vec<ExportName>, type_only: bool },
    /// `export = expr;`
    ExportAssign,
    /// `export default <expr>;` where the expression is not a declaration.
    ExportDefaultExpr { ident: Option<String> },
    /// `import x = require("s")` and `export import x = A.B` aliases.
    ImportEquals(ImportEquals),
    Decl(Decl),
    Executable,
}

#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub specifier: String,
    pub specifier_span: Span,
    pub type_only: bool,
    pub default_name: Option<String>,
    pub namespace_name: Option<String>,
    pub named: Vec<ImportName>,
    /// `import "s";` with no bindings.
    pub side_effect: bool,
}

#[derive(Debug, Clone)]
pub struct ImportName {
    pub imported: String,
    pub local: String,
    pub type_only: bool,
}

#[derive(Debug, Clone)]
pub struct ExportFrom {
    pub specifier: String,
    pub specifier_span: Span,
    pub type_only: bool,
    pub star: bool,
    /// `export * as ns from "s"`.
    pub star_alias: Option<String>,
    pub named: Vec<ExportName>,
}

#[derive(Debug, Clone)]
pub struct ExportName {
    /// Name in the source module.
    pub local: String,
    /// Name it is exported as.
    pub exported: String,
    pub type_only: bool,
}

#[derive(Debug, Clone)]
pub struct ImportEquals {
    pub name: String,
    /// Present for `= require("s")`; None for entity aliases (`= A.B`).
    pub specifier: Option<String>,
    pub specifier_span: Option<Span>,
    pub exported: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Interface,
    TypeAlias,
    Class,
    Enum,
    Function,
    Var,
    Namespace,
    /// `module "name" { .. }` / `declare module "spec";`
    ModuleDecl,
    /// `declare global { .. }`
    Global,
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub kind: DeclKind,
    /// Primary name; None for anonymous defaults and global augmentations.
    pub name: Option<String>,
    /// All bound names (var statements can declare several).
    pub names: Vec<String>,
    pub exported: bool,
    pub default: bool,
    pub declared: bool,
}

impl Statement {
    pub fn import(&self) -> Option<&ImportRecord> {
        match &self.kind {
            StatementKind::Import(record) => Some(record),
            _ => None,
        }
    }

    /// The specifier this statement pulls in, if any.
    pub fn specifier(&self) -> Option<(&str, Span)> {
        match &self.kind {
            StatementKind::Import(r) => Some((&r.specifier, r.specifier_span)),
            StatementKind::ExportFrom(r) => Some((&r.specifier, r.specifier_span)),
            StatementKind::ImportEquals(r) => r
                .specifier
                .as_deref()
                .map(|s| (s, r.specifier_span.expect("span recorded with specifier"))),
            _ => None,
        }
    }
}

/// Scan a token stream into top-level statements.
pub fn scan(source: &str, stream: &TokenStream) -> Vec<Statement> {
    Scanner {
        source,
        tokens: &stream.tokens,
        comments: &stream.comments,
    }
    .scan_range(0, stream.tokens.len().saturating_sub(1))
}

/// Scan a sub-range of tokens (used recursively for namespace bodies).
pub fn scan_tokens(source: &str, stream: &TokenStream, range: Range<usize>) -> Vec<Statement> {
    Scanner {
        source,
        tokens: &stream.tokens,
        comments: &stream.comments,
    }
    .scan_range(range.start, range.end)
}

struct Scanner<'a> {
    source: &'a str,
    tokens: &'a [(Token, Span)],
    comments: &'a [Comment],
}

impl<'a> Scanner<'a> {
    fn scan_range(&self, start: usize, end: usize) -> Vec<Statement> {
        let mut statements = Vec::new();
        let mut i = start;

        while i < end {
            let stmt_start = i;
            let (kind, stmt_end) = self.classify(i, end);
            let stmt_end = stmt_end.min(end).max(stmt_start + 1);

            let first = self.tokens[stmt_start].1;
            let last = self.tokens[stmt_end - 1].1;
            let doc = self.attached_doc(first.start);
            let internal = doc
                .map(|d| self.source[d.start..d.end].contains("@internal"))
                .unwrap_or(false);
            let span_start = doc.map(|d| d.start).unwrap_or(first.start);

            statements.push(Statement {
                kind,
                tokens: stmt_start..stmt_end,
                span: Span::new(span_start, last.end, first.line, first.column),
                doc,
                internal,
            });

            i = stmt_end;
        }

        statements
    }

    fn attached_doc(&self, start: usize) -> Option<Span> {
        attached_doc(self.source, self.comments, start)
    }

    fn token(&self, i: usize) -> &Token {
        self.tokens.get(i).map(|(t, _)| t).unwrap_or(&Token::Eof)
    }

    fn span(&self, i: usize) -> Span {
        self.tokens
            .get(i)
            .map(|(_, s)| *s)
            .unwrap_or(Span::new(self.source.len(), self.source.len(), 0, 0))
    }

    /// Classify the statement starting at `i`; returns its kind and the
    /// exclusive token end.
    fn classify(&self, i: usize, limit: usize) -> (StatementKind, usize) {
        let mut j = i;

        // Decorators
        while *self.token(j) == Token::At {
            j += 1;
            while self.token(j).ident_text().is_some() {
                j += 1;
                if *self.token(j) == Token::Dot {
                    j += 1;
                    continue;
                }
                break;
            }
            if *self.token(j) == Token::LeftParen {
                j = skip_balanced(self.tokens, j, Token::LeftParen, Token::RightParen);
            }
        }

        // Modifiers
        let mut exported = false;
        let mut default = false;
        let mut declared = false;
        loop {
            match self.token(j) {
                Token::Export if !exported => {
                    exported = true;
                    j += 1;
                    // `export` followed by list/star/equals/default is not
                    // a modifier prefix for a declaration.
                    match self.token(j) {
                        Token::Star => return self.scan_export_star(i, j, false),
                        Token::LeftBrace => return self.scan_export_list(i, j, false),
                        Token::Type if *self.token(j + 1) == Token::LeftBrace => {
                            return self.scan_export_list(i, j + 1, true)
                        }
                        Token::Type if *self.token(j + 1) == Token::Star => {
                            return self.scan_export_star(i, j + 1, true)
                        }
                        Token::Equal => {
                            let end = self.scan_to_semicolon(j + 1, limit);
                            return (StatementKind::ExportAssign, end);
                        }
                        Token::Default => {
                            default = true;
                            j += 1;
                        }
                        Token::Import => return self.scan_import(i, j, true),
                        _ => {}
                    }
                }
                Token::Declare if !declared => {
                    declared = true;
                    j += 1;
                }
                Token::Abstract => j += 1,
                Token::Async if *self.token(j + 1) == Token::Function => j += 1,
                _ => break,
            }
        }

        let modifiers = Modifiers { exported, default, declared };

        match self.token(j).clone() {
            Token::Import if !exported => self.scan_import(i, j, false),
            Token::Function => self.scan_function(i, j, modifiers),
            Token::Class => self.scan_class(i, j, modifiers),
            Token::Interface => self.scan_interface(i, j, modifiers),
            Token::Enum => self.scan_enum(i, j, modifiers),
            Token::Const if *self.token(j + 1) == Token::Enum => {
                self.scan_enum(i, j + 1, modifiers)
            }
            Token::Const | Token::Let | Token::Var => self.scan_var(i, j, modifiers, limit),
            Token::Type if self.token(j + 1).ident_text().is_some() => {
                self.scan_type_alias(i, j, modifiers, limit)
            }
            Token::Namespace if self.token(j + 1).ident_text().is_some() => {
                self.scan_namespace(i, j, modifiers, DeclKind::Namespace)
            }
            Token::Module
                if self.token(j + 1).ident_text().is_some()
                    || matches!(self.token(j + 1), Token::Str(_)) =>
            {
                self.scan_namespace(i, j, modifiers, DeclKind::ModuleDecl)
            }
            Token::Global if declared && *self.token(j + 1) == Token::LeftBrace => {
                let end = skip_balanced(self.tokens, j + 1, Token::LeftBrace, Token::RightBrace);
                (
                    StatementKind::Decl(Decl {
                        kind: DeclKind::Global,
                        name: None,
                        names: Vec::new(),
                        exported,
                        default: false,
                        declared,
                    }),
                    end,
                )
            }
            _ if default => {
                // `export default <expr>;`
                let end = self.scan_to_semicolon(j, limit);
                let ident = self.single_identifier(j, end);
                (StatementKind::ExportDefaultExpr { ident }, end)
            }
            Token::LeftBrace => {
                let end = skip_balanced(self.tokens, j, Token::LeftBrace, Token::RightBrace);
                (StatementKind::Executable, end)
            }
            _ => {
                let end = self.scan_to_semicolon(j, limit);
                (StatementKind::Executable, end)
            }
        }
    }

    /// `import ...` in all clause forms, plus `import x = require("s")`.
    fn scan_import(&self, start: usize, import_idx: usize, exported: bool) -> (StatementKind, usize) {
        let mut j = import_idx + 1;

        // Dynamic `import(...)` in expression position
        if *self.token(j) == Token::LeftParen || *self.token(j) == Token::Dot {
            let end = self.scan_to_semicolon(j, self.tokens.len());
            return (StatementKind::Executable, end.max(start + 1));
        }

        if let Token::Str(spec) = self.token(j).clone() {
            // Side-effect import
            let spec_span = self.span(j);
            let end = self.terminate(j + 1);
            return (
                StatementKind::Import(ImportRecord {
                    specifier: spec,
                    specifier_span: spec_span,
                    type_only: false,
                    default_name: None,
                    namespace_name: None,
                    named: Vec::new(),
                    side_effect: true,
                }),
                end,
            );
        }

        let mut type_only = false;
        if *self.token(j) == Token::Type && *self.token(j + 1) != Token::From
            && *self.token(j + 1) != Token::Equal
            && *self.token(j + 1) != Token::Comma
        {
            type_only = true;
            j += 1;
        }

        let mut default_name = None;
        let mut namespace_name = None;
        let mut named = Vec::new();

        // `import x = require("s")` / `import x = A.B;`
        if self.token(j).ident_text().is_some() && *self.token(j + 1) == Token::Equal {
            let name = self.token(j).ident_text().unwrap_or_default().to_string();
            let mut k = j + 2;
            let mut specifier = None;
            let mut specifier_span = None;
            if *self.token(k) == Token::Require && *self.token(k + 1) == Token::LeftParen {
                if let Token::Str(spec) = self.token(k + 2).clone() {
                    specifier = Some(spec);
                    specifier_span = Some(self.span(k + 2));
                }
                k = skip_balanced(self.tokens, k + 1, Token::LeftParen, Token::RightParen);
            } else {
                while self.token(k).ident_text().is_some() {
                    k += 1;
                    if *self.token(k) == Token::Dot {
                        k += 1;
                        continue;
                    }
                    break;
                }
            }
            let end = self.terminate(k);
            return (
                StatementKind::ImportEquals(ImportEquals {
                    name,
                    specifier,
                    specifier_span,
                    exported,
                }),
                end,
            );
        }

        if let Some(name) = self.token(j).ident_text() {
            default_name = Some(name.to_string());
            j += 1;
            if *self.token(j) == Token::Comma {
                j += 1;
            }
        }
        if *self.token(j) == Token::Star {
            // `* as ns`
            if *self.token(j + 1) == Token::As {
                namespace_name = self.token(j + 2).ident_text().map(|s| s.to_string());
                j += 3;
            }
        } else if *self.token(j) == Token::LeftBrace {
            let close = skip_balanced(self.tokens, j, Token::LeftBrace, Token::RightBrace);
            named = self.scan_name_list(j + 1, close - 1, false);
            j = close;
        }

        // `from "s"`
        let mut specifier = String::new();
        let mut specifier_span = self.span(j);
        if *self.token(j) == Token::From {
            if let Token::Str(spec) = self.token(j + 1).clone() {
                specifier = spec;
                specifier_span = self.span(j + 1);
                j += 2;
            }
        }

        let end = self.terminate(j);
        (
            StatementKind::Import(ImportRecord {
                specifier,
                specifier_span,
                type_only,
                default_name,
                namespace_name,
                named,
                side_effect: false,
            }),
            end,
        )
    }

    /// `export * [as ns] from "s";`
    fn scan_export_star(&self, _start: usize, star_idx: usize, type_only: bool) -> (StatementKind, usize) {
        let mut j = star_idx + 1;
        let mut star_alias = None;
        if *self.token(j) == Token::As {
            star_alias = self.token(j + 1).ident_text().map(|s| s.to_string());
            j += 2;
        }
        let mut specifier = String::new();
        let mut specifier_span = self.span(j);
        if *self.token(j) == Token::From {
            if let Token::Str(spec) = self.token(j + 1).clone() {
                specifier = spec;
                specifier_span = self.span(j + 1);
                j += 2;
            }
        }
        let end = self.terminate(j);
        (
            StatementKind::ExportFrom(ExportFrom {
                specifier,
                specifier_span,
                type_only,
                star: true,
                star_alias,
                named: Vec::new(),
            }),
            end,
        )
    }

    /// `export { .. }` with or without `from`.
    fn scan_export_list(&self, _start: usize, brace_idx: usize, type_only: bool) -> (StatementKind, usize) {
        let close = skip_balanced(self.tokens, brace_idx, Token::LeftBrace, Token::RightBrace);
        let names = self.scan_name_list(brace_idx + 1, close - 1, true);
        let mut j = close;

        if *self.token(j) == Token::From {
            if let Token::Str(spec) = self.token(j + 1).clone() {
                let specifier_span = self.span(j + 1);
                let end = self.terminate(j + 2);
                return (
                    StatementKind::ExportFrom(ExportFrom {
                        specifier: spec,
                        specifier_span,
                        type_only,
                        star: false,
                        star_alias: None,
                        named: names
                            .into_iter()
                            .map(|n| ExportName {
                                local: n.imported,
                                exported: n.local,
                                type_only: n.type_only,
                            })
                            .collect(),
                    }),
                    end,
                );
            }
            j += 1;
        }

        let end = self.terminate(j);
        (
            StatementKind::ExportList {
                names: names
                    .into_iter()
                    .map(|n| ExportName {
                        local: n.imported,
                        exported: n.local,
                        type_only: n.type_only,
                    })
                    .collect(),
                type_only,
            },
            end,
        )
    }

    /// Parse `a, b as c, type d` between braces. In import position the
    /// pair is (imported, local); `as_export` flips the mapping so callers
    /// read (local, exported).
    fn scan_name_list(&self, mut i: usize, end: usize, _as_export: bool) -> Vec<ImportName> {
        let mut names = Vec::new();
        while i < end {
            let mut type_only = false;
            if *self.token(i) == Token::Type
                && self.token(i + 1).ident_text().is_some()
                && *self.token(i + 1) != Token::As
            {
                type_only = true;
                i += 1;
            }
            let first = match self.token(i) {
                Token::Str(s) => Some(s.clone()),
                t => t.ident_text().map(|s| s.to_string()),
            };
            let Some(first) = first else {
                i += 1;
                continue;
            };
            i += 1;
            let mut second = first.clone();
            if *self.token(i) == Token::As {
                if let Some(name) = self.token(i + 1).ident_text() {
                    second = name.to_string();
                } else if let Token::Str(s) = self.token(i + 1) {
                    second = s.clone();
                }
                i += 2;
            }
            names.push(ImportName {
                imported: first,
                local: second,
                type_only,
            });
            if *self.token(i) == Token::Comma {
                i += 1;
            }
        }
        names
    }

    fn scan_function(&self, start: usize, fn_idx: usize, m: Modifiers) -> (StatementKind, usize) {
        let mut j = fn_idx + 1;
        if *self.token(j) == Token::Star {
            j += 1;
        }
        let name = self.token(j).ident_text().map(|s| s.to_string());
        if name.is_some() {
            j += 1;
        }
        if *self.token(j) == Token::Less {
            j = skip_angles(self.tokens, j);
        }
        if *self.token(j) == Token::LeftParen {
            j = skip_balanced(self.tokens, j, Token::LeftParen, Token::RightParen);
        }
        if *self.token(j) == Token::Colon {
            j = scan_type(self.tokens, j + 1);
        }
        let end = match self.token(j) {
            Token::LeftBrace => skip_balanced(self.tokens, j, Token::LeftBrace, Token::RightBrace),
            Token::Semicolon => j + 1,
            _ => self.terminate(j),
        };
        (
            StatementKind::Decl(decl(DeclKind::Function, name, m)),
            end.max(start + 1),
        )
    }

    fn scan_class(&self, start: usize, class_idx: usize, m: Modifiers) -> (StatementKind, usize) {
        let mut j = class_idx + 1;
        let name = self.token(j).ident_text().map(|s| s.to_string());
        if name.is_some() {
            j += 1;
        }
        if *self.token(j) == Token::Less {
            j = skip_angles(self.tokens, j);
        }
        while matches!(self.token(j), Token::Extends | Token::Implements) {
            j = scan_type(self.tokens, j + 1);
            while *self.token(j) == Token::Comma {
                j = scan_type(self.tokens, j + 1);
            }
        }
        let end = if *self.token(j) == Token::LeftBrace {
            skip_balanced(self.tokens, j, Token::LeftBrace, Token::RightBrace)
        } else {
            self.terminate(j)
        };
        (
            StatementKind::Decl(decl(DeclKind::Class, name, m)),
            end.max(start + 1),
        )
    }

    fn scan_interface(&self, start: usize, if_idx: usize, m: Modifiers) -> (StatementKind, usize) {
        let mut j = if_idx + 1;
        let name = self.token(j).ident_text().map(|s| s.to_string());
        if name.is_some() {
            j += 1;
        }
        if *self.token(j) == Token::Less {
            j = skip_angles(self.tokens, j);
        }
        while *self.token(j) == Token::Extends {
            j = scan_type(self.tokens, j + 1);
            while *self.token(j) == Token::Comma {
                j = scan_type(self.tokens, j + 1);
            }
        }
        let end = if *self.token(j) == Token::LeftBrace {
            skip_balanced(self.tokens, j, Token::LeftBrace, Token::RightBrace)
        } else {
            self.terminate(j)
        };
        (
            StatementKind::Decl(decl(DeclKind::Interface, name, m)),
            end.max(start + 1),
        )
    }

    fn scan_enum(&self, start: usize, enum_idx: usize, m: Modifiers) -> (StatementKind, usize) {
        let mut j = enum_idx + 1;
        let name = self.token(j).ident_text().map(|s| s.to_string());
        if name.is_some() {
            j += 1;
        }
        let end = if *self.token(j) == Token::LeftBrace {
            skip_balanced(self.tokens, j, Token::LeftBrace, Token::RightBrace)
        } else {
            self.terminate(j)
        };
        (
            StatementKind::Decl(decl(DeclKind::Enum, name, m)),
            end.max(start + 1),
        )
    }

    fn scan_namespace(&self, start: usize, ns_idx: usize, m: Modifiers, kind: DeclKind) -> (StatementKind, usize) {
        let mut j = ns_idx + 1;
        let name = match self.token(j) {
            Token::Str(s) => Some(s.clone()),
            t => t.ident_text().map(|s| s.to_string()),
        };
        if name.is_some() {
            j += 1;
            while *self.token(j) == Token::Dot {
                j += 2;
            }
        }
        let end = match self.token(j) {
            Token::LeftBrace => skip_balanced(self.tokens, j, Token::LeftBrace, Token::RightBrace),
            // `declare module "spec";` shorthand
            Token::Semicolon => j + 1,
            _ => self.terminate(j),
        };
        (
            StatementKind::Decl(decl(kind, name, m)),
            end.max(start + 1),
        )
    }

    fn scan_type_alias(&self, start: usize, type_idx: usize, m: Modifiers, limit: usize) -> (StatementKind, usize) {
        let name = self.token(type_idx + 1).ident_text().map(|s| s.to_string());
        let end = self.scan_to_semicolon(type_idx + 1, limit);
        (
            StatementKind::Decl(decl(DeclKind::TypeAlias, name, m)),
            end.max(start + 1),
        )
    }

    fn scan_var(&self, start: usize, kw_idx: usize, m: Modifiers, limit: usize) -> (StatementKind, usize) {
        let end = self.scan_to_semicolon(kw_idx + 1, limit);
        let names = self.var_names(kw_idx + 1, end);
        let mut d = decl(DeclKind::Var, names.first().cloned(), m);
        d.names = names;
        (StatementKind::Decl(d), end.max(start + 1))
    }

    /// Collect the names a var statement binds, including shallow
    /// destructuring patterns.
    fn var_names(&self, mut i: usize, end: usize) -> Vec<String> {
        let mut names = Vec::new();
        let mut depth = 0usize;

        while i < end {
            match self.token(i) {
                Token::LeftBrace | Token::LeftBracket => {
                    depth += 1;
                    i += 1;
                }
                Token::RightBrace | Token::RightBracket => {
                    depth = depth.saturating_sub(1);
                    i += 1;
                }
                Token::Equal if depth == 0 => {
                    // Initializer: skip to the `,` separating declarators
                    let mut inner = 0usize;
                    i += 1;
                    while i < end {
                        match self.token(i) {
                            Token::LeftParen | Token::LeftBrace | Token::LeftBracket => inner += 1,
                            Token::RightParen | Token::RightBrace | Token::RightBracket => {
                                inner = inner.saturating_sub(1)
                            }
                            Token::Comma if inner == 0 => break,
                            _ => {}
                        }
                        i += 1;
                    }
                }
                Token::Colon if depth == 0 => {
                    i = scan_type(self.tokens, i + 1);
                }
                t if depth == 0 => {
                    if let Some(name) = t.ident_text() {
                        names.push(name.to_string());
                    }
                    i += 1;
                }
                t => {
                    // Inside a pattern a name binds unless it is a
                    // property key (followed by `:`).
                    if let Some(name) = t.ident_text() {
                        if !matches!(self.token(i + 1), Token::Colon) {
                            names.push(name.to_string());
                        }
                    }
                    i += 1;
                }
            }
        }
        names
    }

    /// The expression between `i` and `end` is a single identifier.
    fn single_identifier(&self, i: usize, end: usize) -> Option<String> {
        let mut names = Vec::new();
        for k in i..end {
            match self.token(k) {
                Token::Semicolon | Token::Eof => break,
                t => {
                    names.push(t.ident_text()?.to_string());
                }
            }
        }
        if names.len() == 1 {
            names.pop()
        } else {
            None
        }
    }

    /// Consume an optional trailing semicolon.
    fn terminate(&self, i: usize) -> usize {
        if *self.token(i) == Token::Semicolon {
            i + 1
        } else {
            i
        }
    }

    /// Scan to the terminating `;` at depth zero, breaking before a token
    /// that can only start a new statement (semicolon-less sources).
    fn scan_to_semicolon(&self, mut i: usize, limit: usize) -> usize {
        let mut depth = 0usize;
        let mut prev: Option<&Token> = if i > 0 { Some(self.token(i - 1)) } else { None };

        while i < limit {
            let tok = self.token(i);
            match tok {
                Token::LeftParen | Token::LeftBrace | Token::LeftBracket => depth += 1,
                Token::RightParen | Token::RightBrace | Token::RightBracket => {
                    depth = depth.saturating_sub(1)
                }
                Token::Semicolon if depth == 0 => return i + 1,
                Token::Eof => return i,
                _ if depth == 0 && self.asi_break(prev, i) => return i,
                _ => {}
            }
            prev = Some(tok);
            i += 1;
        }
        i
    }

    /// Conservative automatic-semicolon-insertion rule: break before a
    /// statement starter when the previous token could end a statement.
    fn asi_break(&self, prev: Option<&Token>, i: usize) -> bool {
        let Some(prev) = prev else { return false };
        // `as const` casts and `new X` never start a statement here
        if matches!(prev, Token::As | Token::New) {
            return false;
        }
        let prev_ends = prev.ident_text().is_some()
            || matches!(
                prev,
                Token::Identifier(_)
                    | Token::Str(_)
                    | Token::Number(_)
                    | Token::Template { .. }
                    | Token::Regex
                    | Token::True
                    | Token::False
                    | Token::Null
                    | Token::RightParen
                    | Token::RightBrace
                    | Token::RightBracket
                    | Token::Greater
                    // `x as const` ends on the keyword
                    | Token::Const
            );
        if !prev_ends {
            return false;
        }
        match self.token(i) {
            Token::Import
            | Token::Export
            | Token::Declare
            | Token::Const
            | Token::Let
            | Token::Var
            | Token::Function
            | Token::Class
            | Token::Interface
            | Token::Enum
            | Token::At => true,
            Token::Type => self.token(i + 1).ident_text().is_some(),
            Token::Namespace => self.token(i + 1).ident_text().is_some(),
            Token::Module => {
                self.token(i + 1).ident_text().is_some()
                    || matches!(self.token(i + 1), Token::Str(_))
            }
            Token::Async => *self.token(i + 1) == Token::Function,
            Token::Abstract => *self.token(i + 1) == Token::Class,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Modifiers {
    exported: bool,
    default: bool,
    declared: bool,
}

fn decl(kind: DeclKind, name: Option<String>, m: Modifiers) -> Decl {
    Decl {
        kind,
        names: name.iter().cloned().collect(),
        name,
        exported: m.exported,
        default: m.default,
        declared: m.declared,
    }
}

/// Find the doc block attached to a construct starting at byte `start`:
/// the closest preceding `/** */` separated only by whitespace with at
/// most one line break.
pub(crate) fn attached_doc(source: &str, comments: &[Comment], start: usize) -> Option<Span> {
    let idx = comments.partition_point(|c| c.span.end <= start);
    let candidate = comments[..idx].last()?;
    if !candidate.doc {
        return None;
    }
    let gap = &source[candidate.span.end..start];
    let whitespace_only = gap.chars().all(|c| c.is_whitespace());
    if whitespace_only && gap.matches('\n').count() <= 1 {
        Some(candidate.span)
    } else {
        None
    }
}

/// Skip from an opening bracket to just past its matching close, counting
/// only that bracket family. Strings and templates are single tokens, so
/// family counting cannot be fooled by literal content.
pub(crate) fn skip_balanced(
    tokens: &[(Token, Span)],
    open_idx: usize,
    open: Token,
    close: Token,
) -> usize {
    let mut depth = 0usize;
    let mut i = open_idx;
    while i < tokens.len() {
        let t = &tokens[i].0;
        if *t == open {
            depth += 1;
        } else if *t == close {
            depth -= 1;
            if depth == 0 {
                return i + 1;
            }
        } else if *t == Token::Eof {
            return i;
        }
        i += 1;
    }
    i
}

/// Skip a balanced `<...>` group starting at `<`. The arrow `=>` is its
/// own token, so it never disturbs the angle depth.
pub(crate) fn skip_angles(tokens: &[(Token, Span)], open_idx: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open_idx;
    while i < tokens.len() {
        match &tokens[i].0 {
            Token::Less => {
                depth += 1;
                i += 1;
            }
            Token::Greater => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return i;
                }
            }
            Token::LeftParen => i = skip_balanced(tokens, i, Token::LeftParen, Token::RightParen),
            Token::LeftBrace => i = skip_balanced(tokens, i, Token::LeftBrace, Token::RightBrace),
            Token::LeftBracket => {
                i = skip_balanced(tokens, i, Token::LeftBracket, Token::RightBracket)
            }
            Token::Eof => return i,
            _ => i += 1,
        }
    }
    i
}

/// Scan one type expression starting at `start`; returns the exclusive
/// token end. Handles unions, intersections, conditional types, object and
/// tuple types, function and constructor types, qualified names with type
/// arguments, literal types, predicates and `import("...")` types: enough
/// structure to find where a type ends, which is all the emitter needs.
pub(crate) fn scan_type(tokens: &[(Token, Span)], start: usize) -> usize {
    let mut i = scan_type_atom(tokens, start);
    loop {
        match tokens.get(i).map(|(t, _)| t) {
            Some(Token::Pipe) | Some(Token::Amp) => i = scan_type_atom(tokens, i + 1),
            Some(Token::Extends) => i = scan_type(tokens, i + 1),
            Some(Token::Question) => {
                // Conditional type: T extends U ? A : B
                i = scan_type(tokens, i + 1);
                if matches!(tokens.get(i).map(|(t, _)| t), Some(Token::Colon)) {
                    i = scan_type(tokens, i + 1);
                }
            }
            _ => return i,
        }
    }
}

fn scan_type_atom(tokens: &[(Token, Span)], mut i: usize) -> usize {
    // Leading `|` / `&` of a multi-line union
    while matches!(tokens.get(i).map(|(t, _)| t), Some(Token::Pipe) | Some(Token::Amp)) {
        i += 1;
    }

    let Some((tok, _)) = tokens.get(i) else { return i };

    i = match tok {
        Token::Keyof | Token::Readonly | Token::Unique | Token::Infer => {
            return scan_type_atom(tokens, i + 1)
        }
        Token::Typeof => {
            let mut j = i + 1;
            if matches!(tokens.get(j).map(|(t, _)| t), Some(Token::Import)) {
                j += 1;
                if matches!(tokens.get(j).map(|(t, _)| t), Some(Token::LeftParen)) {
                    j = skip_balanced(tokens, j, Token::LeftParen, Token::RightParen);
                }
            } else {
                j = scan_qualified(tokens, j);
            }
            j
        }
        Token::Asserts => {
            let mut j = scan_qualified(tokens, i + 1);
            if matches!(tokens.get(j).map(|(t, _)| t), Some(Token::Is)) {
                j = scan_type(tokens, j + 1);
            }
            return j;
        }
        Token::New | Token::Abstract => {
            // Constructor type: [abstract] new (..) => T
            let mut j = i + 1;
            if matches!(tokens.get(j).map(|(t, _)| t), Some(Token::New)) {
                j += 1;
            }
            if matches!(tokens.get(j).map(|(t, _)| t), Some(Token::Less)) {
                j = skip_angles(tokens, j);
            }
            if matches!(tokens.get(j).map(|(t, _)| t), Some(Token::LeftParen)) {
                j = skip_balanced(tokens, j, Token::LeftParen, Token::RightParen);
            }
            if matches!(tokens.get(j).map(|(t, _)| t), Some(Token::Arrow)) {
                j = scan_type(tokens, j + 1);
            }
            return j;
        }
        Token::Import => {
            // import("mod").Name
            let mut j = i + 1;
            if matches!(tokens.get(j).map(|(t, _)| t), Some(Token::LeftParen)) {
                j = skip_balanced(tokens, j, Token::LeftParen, Token::RightParen);
            }
            j
        }
        Token::Str(_) | Token::Number(_) | Token::Template { .. } | Token::True | Token::False
        | Token::Null => i + 1,
        Token::Minus => i + 2,
        Token::LeftBrace => skip_balanced(tokens, i, Token::LeftBrace, Token::RightBrace),
        Token::LeftBracket => skip_balanced(tokens, i, Token::LeftBracket, Token::RightBracket),
        Token::Less => {
            // Generic parameters of an inline function type
            let j = skip_angles(tokens, i);
            return scan_type_atom(tokens, j);
        }
        Token::LeftParen => {
            let mut j = skip_balanced(tokens, i, Token::LeftParen, Token::RightParen);
            if matches!(tokens.get(j).map(|(t, _)| t), Some(Token::Arrow)) {
                j = scan_type(tokens, j + 1);
            }
            j
        }
        t if t.ident_text().is_some() || matches!(t, Token::Identifier(_)) => {
            let mut j = scan_qualified(tokens, i);
            // Type predicate: `x is T`
            if matches!(tokens.get(j).map(|(t, _)| t), Some(Token::Is)) {
                j = scan_type(tokens, j + 1);
                return j;
            }
            j
        }
        _ => return i,
    };

    // Suffixes: indexed access / arrays, qualified access, heritage calls
    loop {
        match tokens.get(i).map(|(t, _)| t) {
            Some(Token::LeftBracket) => {
                i = skip_balanced(tokens, i, Token::LeftBracket, Token::RightBracket)
            }
            Some(Token::Dot) => i = scan_qualified(tokens, i + 1),
            Some(Token::LeftParen) => {
                i = skip_balanced(tokens, i, Token::LeftParen, Token::RightParen)
            }
            _ => return i,
        }
    }
}

/// Scan `A.B.C<Args>` starting at the first name token.
fn scan_qualified(tokens: &[(Token, Span)], mut i: usize) -> usize {
    while tokens
        .get(i)
        .map(|(t, _)| t.ident_text().is_some())
        .unwrap_or(false)
    {
        i += 1;
        if matches!(tokens.get(i).map(|(t, _)| t), Some(Token::Less)) {
            i = skip_angles(tokens, i);
        }
        if matches!(tokens.get(i).map(|(t, _)| t), Some(Token::Dot)) {
            i += 1;
            continue;
        }
        break;
    }
    i
}
