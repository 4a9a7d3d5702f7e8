//! Per-statement declaration emission.
//!
//! Statements are rewritten as byte-edit lists applied over the original
//! source slice, so formatting, comments and doc blocks survive untouched.
//! The transform strips bodies and initializers, forces `declare` on
//! value declarations, widens or literalizes initializer types where no
//! annotation exists, drops `@internal` members, and renames identifiers
//! per the chunk's deconfliction map. Declarations whose types cannot be
//! recovered without a checker produce `MISSING_ANNOTATION` diagnostics.

use crate::diagnostics::{codes, Diagnostic, Span};
use crate::graph::Module;
use crate::lexer::Token;
use crate::options::CompilerOptions;
use crate::scanner::{
    self, attached_doc, skip_angles, skip_balanced, Decl, DeclKind, Statement, StatementKind,
};
use rustc_hash::FxHashMap;
use std::ops::Range;

/// One byte-range rewrite. Insertions have `start == end`.
#[derive(Debug, Clone)]
pub(crate) struct Edit {
    start: usize,
    end: usize,
    text: String,
}

impl Edit {
    fn replace(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self { start, end, text: text.into() }
    }

    fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at, at, text)
    }

    fn delete(start: usize, end: usize) -> Self {
        Self::replace(start, end, "")
    }
}

/// Apply edits over `source[range]`. Edits are sorted by position; an edit
/// overlapping an earlier one (a rewrite inside a deleted member) is
/// dropped.
pub(crate) fn apply_edits(source: &str, range: Range<usize>, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut out = String::with_capacity(range.len());
    let mut cursor = range.start;
    for edit in edits {
        if edit.start < cursor || edit.end > range.end {
            continue;
        }
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.text);
        cursor = edit.end;
    }
    out.push_str(&source[cursor..range.end]);
    out
}

/// Per-statement emission settings, chosen by the chunk merger.
pub(crate) struct EmitConfig<'a> {
    /// Keep `export` / `export default` keywords (entry module).
    pub keep_export: bool,
    /// Name to give an anonymous default declaration.
    pub synthetic_name: Option<&'a str>,
    /// Identifier renames for chunk-level deconfliction.
    pub renames: &'a FxHashMap<String, String>,
}

pub(crate) struct Emitter<'m> {
    module: &'m Module,
    options: &'m CompilerOptions,
}

/// Outcome of initializer type recovery.
enum Inference {
    /// Keep `= literal` as written (valid in ambient consts).
    KeepInit,
    /// Replace the initializer with this type annotation.
    Type(String),
    /// Not recoverable without a checker.
    Unknown,
}

impl<'m> Emitter<'m> {
    pub(crate) fn new(module: &'m Module, options: &'m CompilerOptions) -> Self {
        Self { module, options }
    }

    fn tokens(&self) -> &[(Token, Span)] {
        &self.module.stream.tokens
    }

    fn span(&self, i: usize) -> Span {
        self.tokens()[i].1
    }

    fn tok(&self, i: usize) -> &Token {
        self.tokens().get(i).map(|(t, _)| t).unwrap_or(&Token::Eof)
    }

    /// Emit one top-level statement; `None` drops it.
    pub(crate) fn emit_statement(
        &self,
        stmt: &Statement,
        cfg: &EmitConfig<'_>,
        diags: &mut Vec<Diagnostic>,
    ) -> Option<String> {
        if stmt.internal && self.options.strip_internal {
            return None;
        }

        // Library declaration files are trusted as-is
        let mut scratch = Vec::new();
        let sink: &mut Vec<Diagnostic> =
            if self.module.is_dts && self.options.skip_lib_check { &mut scratch } else { diags };

        match &stmt.kind {
            StatementKind::Executable
            | StatementKind::Import(_)
            | StatementKind::ExportFrom(_)
            | StatementKind::ExportList { .. } => None,
            StatementKind::ExportAssign => {
                if !cfg.keep_export {
                    return None;
                }
                Some(self.rendered(stmt, cfg, Vec::new()))
            }
            StatementKind::ExportDefaultExpr { ident } => {
                if !cfg.keep_export {
                    return None;
                }
                if ident.is_none() {
                    sink.push(
                        Diagnostic::error(
                            codes::MISSING_ANNOTATION,
                            "default export of an expression cannot be typed; bind it to a \
                             declaration first",
                        )
                        .with_location(&self.module.path, stmt.span, &self.module.source),
                    );
                }
                Some(self.rendered(stmt, cfg, Vec::new()))
            }
            StatementKind::ImportEquals(record) => {
                if record.specifier.is_some() {
                    // Rebuilt by the chunk from the resolved link
                    return None;
                }
                let mut edits = Vec::new();
                if record.exported && !cfg.keep_export {
                    self.delete_leading_keyword(stmt, Token::Export, &mut edits);
                }
                Some(self.rendered(stmt, cfg, edits))
            }
            StatementKind::Decl(decl) => {
                let mut edits = Vec::new();
                self.decl_edits(stmt, decl, cfg, false, &mut edits, sink);
                Some(self.rendered(stmt, cfg, edits))
            }
        }
    }

    /// Apply renames plus collected edits over the statement slice.
    fn rendered(&self, stmt: &Statement, cfg: &EmitConfig<'_>, mut edits: Vec<Edit>) -> String {
        self.rename_edits(stmt.tokens.clone(), cfg.renames, &mut edits);
        apply_edits(&self.module.source, stmt.span.start..stmt.span.end, edits)
    }

    fn rename_edits(
        &self,
        range: Range<usize>,
        renames: &FxHashMap<String, String>,
        edits: &mut Vec<Edit>,
    ) {
        if renames.is_empty() {
            return;
        }
        for i in range {
            let Token::Identifier(name) = self.tok(i) else { continue };
            let Some(new_name) = renames.get(name) else { continue };
            if self.is_reference_position(i) {
                let span = self.span(i);
                edits.push(Edit::replace(span.start, span.end, new_name.clone()));
            }
        }
    }

    /// Heuristic filter keeping renames off member names, property keys and
    /// qualified-name tails.
    fn is_reference_position(&self, i: usize) -> bool {
        let prev = if i > 0 { self.tok(i - 1) } else { &Token::Eof };
        let next = self.tok(i + 1);

        if matches!(prev, Token::Dot | Token::Hash) {
            return false;
        }

        let member_lead = matches!(
            prev,
            Token::LeftBrace
                | Token::Comma
                | Token::Semicolon
                | Token::LeftParen
                | Token::Readonly
                | Token::Static
                | Token::Get
                | Token::Set
                | Token::Accessor
                | Token::Public
                | Token::Private
                | Token::Protected
                | Token::Abstract
                | Token::Async
        );
        if member_lead {
            // Member/key/param name: `foo: T`, `foo?: T`, `foo(): T`,
            // `foo<T>()`, `Foo = 1`
            if matches!(next, Token::Colon | Token::LeftParen | Token::Less | Token::Equal) {
                return false;
            }
            if *next == Token::Question
                && matches!(self.tok(i + 2), Token::Colon | Token::LeftParen | Token::Less)
            {
                return false;
            }
        }
        // Bare list members (enum variants, binding patterns)
        if matches!(prev, Token::LeftBrace | Token::Comma)
            && matches!(next, Token::Comma | Token::RightBrace)
        {
            return false;
        }
        true
    }

    fn delete_leading_keyword(&self, stmt: &Statement, keyword: Token, edits: &mut Vec<Edit>) {
        for i in stmt.tokens.clone() {
            if *self.tok(i) == keyword {
                edits.push(Edit::delete(self.span(i).start, self.span(i + 1).start));
                return;
            }
            if self.tok(i).ident_text().is_none() && !matches!(self.tok(i), Token::At) {
                return;
            }
        }
    }

    /// Collect the edits turning one declaration statement into its
    /// ambient form. `ambient` is true inside a `declare namespace` body,
    /// where `declare` is neither needed nor allowed.
    fn decl_edits(
        &self,
        stmt: &Statement,
        decl: &Decl,
        cfg: &EmitConfig<'_>,
        ambient: bool,
        edits: &mut Vec<Edit>,
        diags: &mut Vec<Diagnostic>,
    ) {
        let tokens = self.tokens();
        let mut i = stmt.tokens.start;

        // Decorators never survive in declarations
        while *self.tok(i) == Token::At {
            let start = self.span(i).start;
            i += 1;
            while self.tok(i).ident_text().is_some() {
                i += 1;
                if *self.tok(i) == Token::Dot {
                    i += 1;
                    continue;
                }
                break;
            }
            if *self.tok(i) == Token::LeftParen {
                i = skip_balanced(tokens, i, Token::LeftParen, Token::RightParen);
            }
            edits.push(Edit::delete(start, self.span(i).start));
        }

        // Modifiers
        let mut export_idx = None;
        let mut default_idx = None;
        let mut declare_idx = None;
        let mut async_idx = None;
        loop {
            match self.tok(i) {
                Token::Export if export_idx.is_none() => {
                    export_idx = Some(i);
                    i += 1;
                    if *self.tok(i) == Token::Default {
                        default_idx = Some(i);
                        i += 1;
                    }
                }
                Token::Declare if declare_idx.is_none() => {
                    declare_idx = Some(i);
                    i += 1;
                }
                Token::Abstract => i += 1,
                Token::Async if *self.tok(i + 1) == Token::Function => {
                    async_idx = Some(i);
                    i += 1;
                }
                _ => break,
            }
        }
        let header = i;

        if !cfg.keep_export {
            if let Some(exp) = export_idx {
                let end = default_idx.map(|d| d + 1).unwrap_or(exp + 1);
                edits.push(Edit::delete(self.span(exp).start, self.span(end).start));
            }
        }
        if let Some(declare) = declare_idx {
            if ambient {
                // Already-ambient context rejects the modifier
                edits.push(Edit::delete(self.span(declare).start, self.span(declare + 1).start));
            }
        } else if !ambient
            && decl.kind.needs_declare()
            && !(decl.default && cfg.keep_export)
        {
            // `export default class` stands alone; everything else needs
            // `declare` once bodies are gone
            edits.push(Edit::insert(self.span(header).start, "declare "));
        }
        if let Some(async_kw) = async_idx {
            edits.push(Edit::delete(self.span(async_kw).start, self.span(async_kw + 1).start));
        }

        match decl.kind {
            DeclKind::TypeAlias => {}
            DeclKind::Interface => {
                if let Some(open) = self.find_body_brace(header, stmt.tokens.end) {
                    let close = skip_balanced(tokens, open, Token::LeftBrace, Token::RightBrace);
                    self.strip_internal_members(open, close - 1, edits);
                }
            }
            DeclKind::Enum => {
                if let Some(open) = self.find_body_brace(header, stmt.tokens.end) {
                    let close = skip_balanced(tokens, open, Token::LeftBrace, Token::RightBrace);
                    self.strip_internal_members(open, close - 1, edits);
                }
            }
            DeclKind::Function => self.function_edits(stmt, decl, cfg, header, edits, diags),
            DeclKind::Class => self.class_edits(stmt, decl, cfg, header, edits, diags),
            DeclKind::Var => self.var_edits(stmt, header, edits, diags),
            DeclKind::Namespace => self.namespace_edits(stmt, cfg, header, edits, diags),
            DeclKind::ModuleDecl | DeclKind::Global => {}
        }
    }

    /// First `{` at nesting depth zero after the header.
    fn find_body_brace(&self, mut i: usize, end: usize) -> Option<usize> {
        let tokens = self.tokens();
        while i < end {
            match self.tok(i) {
                Token::LeftBrace => return Some(i),
                Token::LeftParen => {
                    i = skip_balanced(tokens, i, Token::LeftParen, Token::RightParen)
                }
                Token::LeftBracket => {
                    i = skip_balanced(tokens, i, Token::LeftBracket, Token::RightBracket)
                }
                Token::Less => i = skip_angles(tokens, i),
                _ => i += 1,
            }
        }
        None
    }

    // ---- functions ------------------------------------------------------

    fn function_edits(
        &self,
        stmt: &Statement,
        _decl: &Decl,
        cfg: &EmitConfig<'_>,
        header: usize,
        edits: &mut Vec<Edit>,
        diags: &mut Vec<Diagnostic>,
    ) {
        let tokens = self.tokens();
        let mut i = header; // at `function`
        i += 1;
        if *self.tok(i) == Token::Star {
            // Generators are plain functions in a declaration
            edits.push(Edit::delete(self.span(i).start, self.span(i + 1).start));
            i += 1;
        }
        if self.tok(i).ident_text().is_some() {
            i += 1;
        } else if let Some(name) = cfg.synthetic_name {
            // Swallow the gap so `function (` becomes `function _default(`
            edits.push(Edit::replace(
                self.span(header).end,
                self.span(i).start,
                format!(" {name}"),
            ));
        }
        if *self.tok(i) == Token::Less {
            i = skip_angles(tokens, i);
        }
        if *self.tok(i) == Token::LeftParen {
            let close = skip_balanced(tokens, i, Token::LeftParen, Token::RightParen);
            self.param_edits(i, close - 1, edits, diags);
            i = close;
        }
        if *self.tok(i) == Token::Colon {
            i = scanner::scan_type(tokens, i + 1);
        } else if *self.tok(i) == Token::LeftBrace {
            diags.push(self.missing_annotation(
                stmt.span,
                "function needs a return type annotation",
            ));
        }
        if *self.tok(i) == Token::LeftBrace {
            let close = skip_balanced(tokens, i, Token::LeftBrace, Token::RightBrace);
            edits.push(Edit::replace(
                rewind_whitespace(&self.module.source, self.span(i).start),
                self.span(close - 1).end,
                ";",
            ));
        }
    }

    /// Normalize parameters between parens: defaults become `?`, missing
    /// annotations become `any`.
    fn param_edits(
        &self,
        open: usize,
        close: usize,
        edits: &mut Vec<Edit>,
        diags: &mut Vec<Diagnostic>,
    ) {
        let tokens = self.tokens();
        let mut i = open + 1;

        while i < close {
            // One parameter
            let mut rest = false;
            if *self.tok(i) == Token::DotDotDot {
                rest = true;
                i += 1;
            }
            // Modifier strip belongs to constructor handling; plain
            // functions have none
            let name_end;
            match self.tok(i) {
                Token::LeftBrace => {
                    i = skip_balanced(tokens, i, Token::LeftBrace, Token::RightBrace);
                    name_end = i - 1;
                }
                Token::LeftBracket => {
                    i = skip_balanced(tokens, i, Token::LeftBracket, Token::RightBracket);
                    name_end = i - 1;
                }
                t if t.ident_text().is_some() => {
                    name_end = i;
                    i += 1;
                }
                _ => {
                    i += 1;
                    continue;
                }
            }
            let mut optional = false;
            if *self.tok(i) == Token::Question {
                optional = true;
                i += 1;
            }
            let mut annotated = false;
            if *self.tok(i) == Token::Colon {
                annotated = true;
                i = scanner::scan_type(tokens, i + 1);
            }
            if *self.tok(i) == Token::Equal {
                // Default value: drop it, mark the parameter optional
                let init_start = i + 1;
                i = self.scan_expr_end(init_start, close);
                let from = rewind_whitespace(&self.module.source, self.span(init_start - 1).start);
                edits.push(Edit::delete(from, self.span(i - 1).end));
                if !optional && !rest {
                    let mark = if annotated {
                        "?".to_string()
                    } else {
                        format!("?: {}", self.widened_default(init_start, i))
                    };
                    edits.push(Edit::insert(self.span(name_end).end, mark));
                }
            } else if !annotated {
                let any = if rest { ": any[]" } else { ": any" };
                let at = if optional { self.span(name_end + 1).end } else { self.span(name_end).end };
                edits.push(Edit::insert(at, any));
            }
            // Skip to the next parameter
            while i < close && *self.tok(i) != Token::Comma {
                match self.tok(i) {
                    Token::LeftParen => {
                        i = skip_balanced(tokens, i, Token::LeftParen, Token::RightParen)
                    }
                    Token::LeftBrace => {
                        i = skip_balanced(tokens, i, Token::LeftBrace, Token::RightBrace)
                    }
                    Token::LeftBracket => {
                        i = skip_balanced(tokens, i, Token::LeftBracket, Token::RightBracket)
                    }
                    Token::Less => i = skip_angles(tokens, i).min(close),
                    _ => i += 1,
                }
            }
            i += 1; // past the comma
        }
    }

    /// Widened type of a default-value expression, `any` when it is not a
    /// literal.
    fn widened_default(&self, start: usize, end: usize) -> &'static str {
        if end == start + 1 || (end == start + 2 && *self.tok(start) == Token::Minus) {
            let tok = if end == start + 1 { self.tok(start) } else { self.tok(start + 1) };
            return match tok {
                Token::Str(_) => "string",
                Token::Number(raw) if raw.ends_with('n') => "bigint",
                Token::Number(_) => "number",
                Token::True | Token::False => "boolean",
                Token::Template { .. } => "string",
                _ => "any",
            };
        }
        "any"
    }

    // ---- variables ------------------------------------------------------

    fn var_edits(
        &self,
        stmt: &Statement,
        header: usize,
        edits: &mut Vec<Edit>,
        diags: &mut Vec<Diagnostic>,
    ) {
        let tokens = self.tokens();
        let is_const = *self.tok(header) == Token::Const;
        let mut i = header + 1;
        let end = stmt.tokens.end;

        while i < end {
            // Declarator name
            match self.tok(i) {
                Token::LeftBrace | Token::LeftBracket => {
                    diags.push(self.missing_annotation(
                        stmt.span,
                        "destructuring declarations cannot be emitted; declare each binding \
                         separately",
                    ));
                    return;
                }
                Token::Semicolon | Token::Eof => return,
                t if t.ident_text().is_some() => {}
                _ => return,
            }
            let name_idx = i;
            i += 1;
            if *self.tok(i) == Token::Bang {
                // Definite-assignment marker has no ambient meaning
                edits.push(Edit::delete(self.span(i).start, self.span(i).end));
                i += 1;
            }
            let mut annotated = false;
            if *self.tok(i) == Token::Colon {
                annotated = true;
                i = scanner::scan_type(tokens, i + 1);
            }
            if *self.tok(i) == Token::Equal {
                let init_start = i + 1;
                let init_end = self.scan_expr_end(init_start, end);
                let from = rewind_whitespace(&self.module.source, self.span(i).start);
                let to = self.span(init_end - 1).end;

                if annotated {
                    edits.push(Edit::delete(from, to));
                } else {
                    match self.infer_initializer(init_start..init_end, is_const) {
                        Inference::KeepInit => {}
                        Inference::Type(ty) => {
                            edits.push(Edit::replace(from, to, format!(": {ty}")));
                        }
                        Inference::Unknown => {
                            diags.push(self.missing_annotation(
                                self.span(name_idx),
                                &format!(
                                    "`{}` needs an explicit type annotation",
                                    self.tok(name_idx).ident_text().unwrap_or_default()
                                ),
                            ));
                            edits.push(Edit::delete(from, to));
                        }
                    }
                }
                i = init_end;
            }
            if *self.tok(i) == Token::Comma {
                i += 1;
                continue;
            }
            return;
        }
    }

    /// End (exclusive) of an expression: the `,` or `;` at depth zero
    /// before `limit`. Angle groups closing within the limit are skipped so
    /// type-argument commas do not terminate the scan; an unmatched `<` is
    /// a comparison and scans normally.
    fn scan_expr_end(&self, mut i: usize, limit: usize) -> usize {
        let tokens = self.tokens();
        let mut depth = 0usize;
        while i < limit {
            match self.tok(i) {
                Token::LeftParen | Token::LeftBrace | Token::LeftBracket => depth += 1,
                Token::RightParen | Token::RightBrace | Token::RightBracket => {
                    depth = depth.saturating_sub(1)
                }
                Token::Comma | Token::Semicolon if depth == 0 => return i,
                Token::Less if depth == 0 => {
                    let skipped = skip_angles(tokens, i);
                    if skipped <= limit {
                        i = skipped;
                        continue;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        limit
    }

    fn infer_initializer(&self, init: Range<usize>, is_const: bool) -> Inference {
        let len = init.end - init.start;
        if len == 0 {
            return Inference::Unknown;
        }

        // Trailing `as T` / `as const` wins over everything before it
        if let Some(as_idx) = self.find_top_level_as(init.clone()) {
            if *self.tok(as_idx + 1) == Token::Const {
                return match self.literal_type(init.start..as_idx) {
                    Some(ty) => Inference::Type(ty),
                    None => Inference::Unknown,
                };
            }
            let ty_start = self.span(as_idx + 1).start;
            let ty_end = self.span(init.end - 1).end;
            return Inference::Type(self.module.source[ty_start..ty_end].to_string());
        }

        if let Some(ty) = self.function_type(init.clone()) {
            return Inference::Type(ty);
        }

        if is_const {
            match self.tok(init.start) {
                Token::Str(_) | Token::Number(_) if len == 1 => {
                    if let Token::Number(raw) = self.tok(init.start) {
                        if raw.ends_with('n') {
                            return Inference::Type(raw.clone());
                        }
                    }
                    return Inference::KeepInit;
                }
                Token::Minus if len == 2 && matches!(self.tok(init.start + 1), Token::Number(_)) => {
                    return Inference::KeepInit;
                }
                _ => {}
            }
            if let Some(ty) = self.literal_type(init.clone()) {
                return Inference::Type(ty);
            }
            return Inference::Unknown;
        }

        // let / var widen
        if len == 1 || (len == 2 && *self.tok(init.start) == Token::Minus) {
            let tok = self.tok(init.end - 1);
            return match tok {
                Token::Str(_) => Inference::Type("string".into()),
                Token::Number(raw) if raw.ends_with('n') => Inference::Type("bigint".into()),
                Token::Number(_) => Inference::Type("number".into()),
                Token::True | Token::False => Inference::Type("boolean".into()),
                Token::Template { .. } => Inference::Type("string".into()),
                Token::Null => Inference::Type("any".into()),
                _ => Inference::Unknown,
            };
        }
        Inference::Unknown
    }

    /// The literal type of a single-token literal, rendered as annotation
    /// text.
    fn literal_type(&self, range: Range<usize>) -> Option<String> {
        let len = range.end - range.start;
        if len == 2 && *self.tok(range.start) == Token::Minus {
            if let Token::Number(raw) = self.tok(range.start + 1) {
                return Some(format!("-{raw}"));
            }
            return None;
        }
        if len != 1 {
            return None;
        }
        match self.tok(range.start) {
            Token::Str(_) | Token::Number(_) | Token::True | Token::False | Token::Null => {
                let span = self.span(range.start);
                Some(self.module.source[span.start..span.end].to_string())
            }
            Token::Template { has_subst: false } => {
                let span = self.span(range.start);
                let raw = &self.module.source[span.start + 1..span.end - 1];
                Some(format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\"")))
            }
            _ => None,
        }
    }

    /// Synthesize a function type from a fully annotated arrow or function
    /// expression initializer.
    fn function_type(&self, init: Range<usize>) -> Option<String> {
        let tokens = self.tokens();
        let mut i = init.start;
        if *self.tok(i) == Token::Async {
            i += 1;
        }
        if *self.tok(i) == Token::Function {
            i += 1;
            if *self.tok(i) == Token::Star {
                i += 1;
            }
            if self.tok(i).ident_text().is_some() {
                i += 1;
            }
        }
        let generics = if *self.tok(i) == Token::Less {
            let end = skip_angles(tokens, i);
            let text = &self.module.source[self.span(i).start..self.span(end - 1).end];
            i = end;
            text.to_string()
        } else {
            String::new()
        };
        if *self.tok(i) != Token::LeftParen {
            return None;
        }
        let open = i;
        let close = skip_balanced(tokens, open, Token::LeftParen, Token::RightParen);

        // Every parameter must carry an annotation; defaults are folded
        // into optional markers
        let mut param_edits = Vec::new();
        let mut scratch = Vec::new();
        self.param_edits(open, close - 1, &mut param_edits, &mut scratch);
        if param_edits.iter().any(|e| e.text == ": any" || e.text == "?: any") {
            // A parameter without annotation or literal default cannot be
            // trusted in a synthesized type
            return None;
        }
        let params = apply_edits(
            &self.module.source,
            self.span(open).start..self.span(close - 1).end,
            param_edits,
        );

        if *self.tok(close) != Token::Colon {
            return None;
        }
        let ret_end = scanner::scan_type(tokens, close + 1);
        if *self.tok(ret_end) != Token::Arrow && *self.tok(ret_end) != Token::LeftBrace {
            return None;
        }
        let ret = &self.module.source[self.span(close + 1).start..self.span(ret_end - 1).end];
        Some(format!("{generics}{params} => {ret}"))
    }

    /// Index of a top-level `as` inside an initializer, scanning from the
    /// end.
    fn find_top_level_as(&self, range: Range<usize>) -> Option<usize> {
        let mut depth = 0usize;
        let mut found = None;
        for i in range {
            match self.tok(i) {
                Token::LeftParen | Token::LeftBrace | Token::LeftBracket => depth += 1,
                Token::RightParen | Token::RightBrace | Token::RightBracket => {
                    depth = depth.saturating_sub(1)
                }
                Token::As if depth == 0 => found = Some(i),
                _ => {}
            }
        }
        found
    }

    // ---- classes --------------------------------------------------------

    fn class_edits(
        &self,
        stmt: &Statement,
        decl: &Decl,
        cfg: &EmitConfig<'_>,
        header: usize,
        edits: &mut Vec<Edit>,
        diags: &mut Vec<Diagnostic>,
    ) {
        let tokens = self.tokens();
        // Anonymous default class gets its synthetic name
        if decl.name.is_none() {
            if let Some(name) = cfg.synthetic_name {
                let class_kw = (header..stmt.tokens.end)
                    .find(|&i| *self.tok(i) == Token::Class)
                    .unwrap_or(header);
                edits.push(Edit::replace(
                    self.span(class_kw).end,
                    self.span(class_kw + 1).start,
                    format!(" {name} "),
                ));
            }
        }
        let Some(open) = self.find_body_brace(header, stmt.tokens.end) else { return };
        let close = skip_balanced(tokens, open, Token::LeftBrace, Token::RightBrace) - 1;

        let mut i = open + 1;
        let mut hoisted: Vec<String> = Vec::new();
        let mut ctor_insert_at: Option<usize> = None;

        while i < close {
            let member_start = i;
            let doc = attached_doc(
                &self.module.source,
                &self.module.stream.comments,
                self.span(i).start,
            );
            let internal = doc
                .map(|d| self.module.source[d.start..d.end].contains("@internal"))
                .unwrap_or(false);

            // Member decorators
            while *self.tok(i) == Token::At {
                let start = self.span(i).start;
                i += 1;
                while self.tok(i).ident_text().is_some() {
                    i += 1;
                    if *self.tok(i) == Token::Dot {
                        i += 1;
                        continue;
                    }
                    break;
                }
                if *self.tok(i) == Token::LeftParen {
                    i = skip_balanced(tokens, i, Token::LeftParen, Token::RightParen);
                }
                edits.push(Edit::delete(start, self.span(i).start));
            }

            // Modifiers
            let mut is_private = false;
            let mut is_readonly = false;
            let mut is_static = false;
            let mut accessor_kind = None; // get / set
            loop {
                match self.tok(i) {
                    Token::Static => {
                        is_static = true;
                        i += 1;
                    }
                    Token::Readonly if *self.tok(i + 1) != Token::Colon => {
                        is_readonly = true;
                        i += 1;
                    }
                    Token::Public | Token::Protected | Token::Accessor => i += 1,
                    Token::Private => {
                        is_private = true;
                        i += 1;
                    }
                    Token::Abstract => i += 1,
                    Token::Declare => {
                        // `declare` on a member disappears with the
                        // initializer rules it relaxed
                        edits.push(Edit::delete(self.span(i).start, self.span(i + 1).start));
                        i += 1;
                    }
                    Token::Async if !matches!(self.tok(i + 1), Token::LeftParen | Token::Less | Token::Colon | Token::Equal | Token::Question) => {
                        edits.push(Edit::delete(self.span(i).start, self.span(i + 1).start));
                        i += 1;
                    }
                    Token::Get | Token::Set
                        if !matches!(
                            self.tok(i + 1),
                            Token::LeftParen | Token::Less | Token::Colon | Token::Equal
                                | Token::Question | Token::Semicolon
                        ) =>
                    {
                        accessor_kind = Some(self.tok(i).clone());
                        i += 1;
                    }
                    _ => break,
                }
            }

            // Static initialization block
            if is_static && *self.tok(i) == Token::LeftBrace {
                let block_close = skip_balanced(tokens, i, Token::LeftBrace, Token::RightBrace);
                let (from, to) = expand_to_lines(
                    &self.module.source,
                    doc.map(|d| d.start).unwrap_or(self.span(member_start).start),
                    self.span(block_close - 1).end,
                );
                edits.push(Edit::delete(from, to));
                i = block_close;
                continue;
            }

            // Member name
            let mut is_constructor = false;
            let mut is_hash_private = false;
            match self.tok(i) {
                Token::Hash => {
                    is_hash_private = true;
                    i += 2;
                }
                Token::LeftBracket => {
                    // Index signature or computed name
                    i = skip_balanced(tokens, i, Token::LeftBracket, Token::RightBracket);
                }
                Token::Str(_) | Token::Number(_) => i += 1,
                t if t.ident_text().is_some() => {
                    if t.ident_text() == Some("constructor") {
                        is_constructor = true;
                    }
                    i += 1;
                }
                _ => {
                    i += 1;
                    continue;
                }
            }
            let name_end = i - 1;
            if *self.tok(i) == Token::Question {
                i += 1;
            }
            if *self.tok(i) == Token::Bang {
                edits.push(Edit::delete(self.span(i).start, self.span(i).end));
                i += 1;
            }
            if *self.tok(i) == Token::Less {
                i = skip_angles(tokens, i);
            }

            let member_end;
            if *self.tok(i) == Token::LeftParen {
                // Method, accessor or constructor
                let popen = i;
                let pclose = skip_balanced(tokens, popen, Token::LeftParen, Token::RightParen);
                if is_constructor {
                    if ctor_insert_at.is_none() {
                        ctor_insert_at =
                            Some(doc.map(|d| d.start).unwrap_or(self.span(member_start).start));
                    }
                    self.ctor_param_edits(popen, pclose - 1, &mut hoisted, edits);
                } else {
                    self.param_edits(popen, pclose - 1, edits, diags);
                }
                let mut j = pclose;
                if *self.tok(j) == Token::Colon {
                    j = scanner::scan_type(tokens, j + 1);
                } else if *self.tok(j) == Token::LeftBrace
                    && !is_constructor
                    && !is_private
                    && !is_hash_private
                    && accessor_kind != Some(Token::Set)
                {
                    diags.push(self.missing_annotation(
                        self.span(name_end),
                        "method needs a return type annotation",
                    ));
                }
                if *self.tok(j) == Token::LeftBrace {
                    let bclose = skip_balanced(tokens, j, Token::LeftBrace, Token::RightBrace);
                    edits.push(Edit::replace(
                        rewind_whitespace(&self.module.source, self.span(j).start),
                        self.span(bclose - 1).end,
                        ";",
                    ));
                    member_end = bclose;
                } else if *self.tok(j) == Token::Semicolon {
                    member_end = j + 1;
                } else {
                    member_end = j;
                }
            } else {
                // Property
                let mut annotated = false;
                let mut j = i;
                if *self.tok(j) == Token::Colon {
                    annotated = true;
                    j = scanner::scan_type(tokens, j + 1);
                }
                if *self.tok(j) == Token::Equal {
                    let init_start = j + 1;
                    let init_end = self.scan_member_end(init_start, close);
                    let value_end = if *self.tok(init_end - 1) == Token::Semicolon {
                        init_end - 1
                    } else {
                        init_end
                    };
                    let from = rewind_whitespace(&self.module.source, self.span(j).start);
                    let to = self.span(value_end - 1).end;
                    if annotated || is_private || is_hash_private {
                        edits.push(Edit::delete(from, to));
                    } else {
                        match self.infer_initializer(init_start..value_end, is_readonly) {
                            Inference::KeepInit => {
                                // Class bodies cannot keep initializers;
                                // a readonly literal becomes its literal
                                // type instead
                                let ty = self
                                    .literal_type(init_start..value_end)
                                    .unwrap_or_else(|| "any".into());
                                edits.push(Edit::replace(from, to, format!(": {ty}")));
                            }
                            Inference::Type(ty) => {
                                edits.push(Edit::replace(from, to, format!(": {ty}")));
                            }
                            Inference::Unknown => {
                                diags.push(self.missing_annotation(
                                    self.span(name_end),
                                    "property needs an explicit type annotation",
                                ));
                                edits.push(Edit::delete(from, to));
                            }
                        }
                    }
                    member_end = init_end;
                } else {
                    member_end = self.scan_member_end(j, close);
                }
            }

            if internal && self.options.strip_internal {
                let (from, to) = expand_to_lines(
                    &self.module.source,
                    doc.map(|d| d.start).unwrap_or(self.span(member_start).start),
                    self.span(member_end.saturating_sub(1).max(member_start)).end,
                );
                edits.push(Edit::delete(from, to));
            }

            i = member_end.max(member_start + 1);
        }

        if !hoisted.is_empty() {
            if let Some(at) = ctor_insert_at {
                let line_start = line_start(&self.module.source, at);
                let indent: String = self.module.source[line_start..at]
                    .chars()
                    .take_while(|c| c.is_whitespace())
                    .collect();
                let text = hoisted
                    .iter()
                    .map(|m| format!("{m}\n{indent}"))
                    .collect::<String>();
                edits.push(Edit::insert(at, text));
            }
        }
    }

    /// Constructor parameters: parameter properties hoist to members and
    /// lose their modifiers in the signature.
    fn ctor_param_edits(
        &self,
        open: usize,
        close: usize,
        hoisted: &mut Vec<String>,
        edits: &mut Vec<Edit>,
    ) {
        let tokens = self.tokens();
        let mut i = open + 1;

        while i < close {
            let mods_start = i;
            let mut is_property = false;
            let mut kept_mods = String::new();
            loop {
                match self.tok(i) {
                    Token::Public => {
                        is_property = true;
                        i += 1;
                    }
                    Token::Private => {
                        is_property = true;
                        kept_mods.push_str("private ");
                        i += 1;
                    }
                    Token::Protected => {
                        is_property = true;
                        kept_mods.push_str("protected ");
                        i += 1;
                    }
                    Token::Readonly => {
                        is_property = true;
                        kept_mods.push_str("readonly ");
                        i += 1;
                    }
                    _ => break,
                }
            }
            if is_property {
                edits.push(Edit::delete(self.span(mods_start).start, self.span(i).start));
            }

            // Rest and binding-pattern parameters can never be properties
            let mut rest = false;
            if *self.tok(i) == Token::DotDotDot {
                rest = true;
                i += 1;
            }
            let name;
            let name_end;
            match self.tok(i) {
                Token::LeftBrace => {
                    i = skip_balanced(tokens, i, Token::LeftBrace, Token::RightBrace);
                    name_end = i - 1;
                    name = String::new();
                }
                Token::LeftBracket => {
                    i = skip_balanced(tokens, i, Token::LeftBracket, Token::RightBracket);
                    name_end = i - 1;
                    name = String::new();
                }
                t if t.ident_text().is_some() => {
                    name = t.ident_text().unwrap_or_default().to_string();
                    name_end = i;
                    i += 1;
                }
                _ => {
                    i += 1;
                    continue;
                }
            }
            let mut optional = false;
            if *self.tok(i) == Token::Question {
                optional = true;
                i += 1;
            }
            let mut annotation = None;
            if *self.tok(i) == Token::Colon {
                let ty_end = scanner::scan_type(tokens, i + 1);
                annotation = Some(
                    self.module.source[self.span(i + 1).start..self.span(ty_end - 1).end]
                        .to_string(),
                );
                i = ty_end;
            }
            let mut default_widened = None;
            if *self.tok(i) == Token::Equal {
                let init_start = i + 1;
                i = self.scan_expr_end(init_start, close);
                default_widened = Some(self.widened_default(init_start, i));
                let from =
                    rewind_whitespace(&self.module.source, self.span(init_start - 1).start);
                edits.push(Edit::delete(from, self.span(i - 1).end));
                if !optional && !rest {
                    let mark = if annotation.is_some() {
                        "?".to_string()
                    } else {
                        format!("?: {}", default_widened.unwrap_or("any"))
                    };
                    edits.push(Edit::insert(self.span(name_end).end, mark));
                    optional = true;
                }
            } else if annotation.is_none() {
                let any = if rest { ": any[]" } else { ": any" };
                edits.push(Edit::insert(self.span(name_end).end, any));
            }

            if is_property && !name.is_empty() {
                let ty = annotation
                    .clone()
                    .or_else(|| default_widened.map(str::to_string))
                    .unwrap_or_else(|| "any".to_string());
                let opt = if optional { "?" } else { "" };
                hoisted.push(format!("{kept_mods}{name}{opt}: {ty};"));
            }

            while i < close && *self.tok(i) != Token::Comma {
                match self.tok(i) {
                    Token::LeftParen => {
                        i = skip_balanced(tokens, i, Token::LeftParen, Token::RightParen)
                    }
                    Token::LeftBrace => {
                        i = skip_balanced(tokens, i, Token::LeftBrace, Token::RightBrace)
                    }
                    Token::LeftBracket => {
                        i = skip_balanced(tokens, i, Token::LeftBracket, Token::RightBracket)
                    }
                    Token::Less => i = skip_angles(tokens, i).min(close),
                    _ => i += 1,
                }
            }
            i += 1;
        }
    }

    /// End (exclusive) of a member starting at `i`: past the `;` at member
    /// depth, or before a token that starts a new member on a later line.
    fn scan_member_end(&self, mut i: usize, close: usize) -> usize {
        let mut depth = 0usize;
        let mut prev_line = self.span(i).line;
        let mut prev_ends = false;

        while i < close {
            let (tok, span) = &self.tokens()[i];
            match tok {
                Token::LeftParen | Token::LeftBrace | Token::LeftBracket => depth += 1,
                Token::RightParen | Token::RightBrace | Token::RightBracket => {
                    depth = depth.saturating_sub(1)
                }
                Token::Semicolon | Token::Comma if depth == 0 => return i + 1,
                Token::Less if depth == 0 => {
                    let skipped = skip_angles(self.tokens(), i);
                    if skipped <= close {
                        prev_line = self.span(skipped - 1).line;
                        prev_ends = true;
                        i = skipped;
                        continue;
                    }
                }
                _ => {}
            }
            if depth == 0 && span.line > prev_line && prev_ends && member_starter(tok) {
                return i;
            }
            prev_line = span.line;
            prev_ends = tok.ident_text().is_some()
                || matches!(
                    tok,
                    Token::Str(_)
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
                        | Token::Question
                        | Token::Bang
                );
            i += 1;
        }
        close
    }

    /// Drop `@internal`-tagged members from an interface or enum body.
    fn strip_internal_members(&self, open: usize, close: usize, edits: &mut Vec<Edit>) {
        if !self.options.strip_internal {
            return;
        }
        let mut i = open + 1;
        while i < close {
            let doc = attached_doc(
                &self.module.source,
                &self.module.stream.comments,
                self.span(i).start,
            );
            let internal = doc
                .map(|d| self.module.source[d.start..d.end].contains("@internal"))
                .unwrap_or(false);
            let end = self.scan_member_end(i, close);
            if internal {
                let last = end.saturating_sub(1).max(i);
                let (from, to) = expand_to_lines(
                    &self.module.source,
                    doc.map(|d| d.start).unwrap_or(self.span(i).start),
                    self.span(last).end,
                );
                edits.push(Edit::delete(from, to));
            }
            i = end.max(i + 1);
        }
    }

    // ---- namespaces -----------------------------------------------------

    fn namespace_edits(
        &self,
        stmt: &Statement,
        cfg: &EmitConfig<'_>,
        header: usize,
        edits: &mut Vec<Edit>,
        diags: &mut Vec<Diagnostic>,
    ) {
        let tokens = self.tokens();
        let Some(open) = self.find_body_brace(header, stmt.tokens.end) else { return };
        let close = skip_balanced(tokens, open, Token::LeftBrace, Token::RightBrace) - 1;

        let inner = scanner::scan_tokens(&self.module.source, &self.module.stream, open + 1..close);
        for sub in &inner {
            if sub.internal && self.options.strip_internal {
                let (from, to) = expand_to_lines(&self.module.source, sub.span.start, sub.span.end);
                edits.push(Edit::delete(from, to));
                continue;
            }
            match &sub.kind {
                StatementKind::Executable => {
                    let (from, to) =
                        expand_to_lines(&self.module.source, sub.span.start, sub.span.end);
                    edits.push(Edit::delete(from, to));
                }
                StatementKind::Decl(d) => {
                    let sub_cfg = EmitConfig {
                        keep_export: true,
                        synthetic_name: None,
                        renames: cfg.renames,
                    };
                    self.decl_edits(sub, d, &sub_cfg, true, edits, diags);
                }
                _ => {}
            }
        }
    }

    fn missing_annotation(&self, span: Span, message: &str) -> Diagnostic {
        Diagnostic::error(codes::MISSING_ANNOTATION, message).with_location(
            &self.module.path,
            span,
            &self.module.source,
        )
    }
}

impl DeclKind {
    /// Kinds that take a `declare` modifier at the top level of a
    /// declaration file.
    fn needs_declare(self) -> bool {
        matches!(
            self,
            DeclKind::Var
                | DeclKind::Function
                | DeclKind::Class
                | DeclKind::Enum
                | DeclKind::Namespace
                | DeclKind::ModuleDecl
        )
    }
}

fn member_starter(tok: &Token) -> bool {
    tok.ident_text().is_some()
        || matches!(
            tok,
            Token::Str(_)
                | Token::Number(_)
                | Token::LeftBracket
                | Token::LeftParen
                | Token::Less
                | Token::Hash
                | Token::At
                | Token::Public
                | Token::Private
                | Token::Protected
                | Token::New
        )
}

/// Walk back over spaces and tabs (never newlines).
fn rewind_whitespace(source: &str, mut pos: usize) -> usize {
    let bytes = source.as_bytes();
    while pos > 0 && matches!(bytes[pos - 1], b' ' | b'\t') {
        pos -= 1;
    }
    pos
}

fn line_start(source: &str, pos: usize) -> usize {
    source[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Expand a deletion to whole lines: back through leading indentation and
/// forward past one trailing newline.
fn expand_to_lines(source: &str, start: usize, end: usize) -> (usize, usize) {
    let ls = line_start(source, start);
    let from = if source[ls..start].chars().all(|c| c.is_whitespace()) {
        ls
    } else {
        start
    };
    let bytes = source.as_bytes();
    let mut to = end;
    while to < bytes.len() && matches!(bytes[to], b' ' | b'\t') {
        to += 1;
    }
    if to < bytes.len() && bytes[to] == b'\r' {
        to += 1;
    }
    if to < bytes.len() && bytes[to] == b'\n' {
        to += 1;
    }
    (from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ModuleId;
    use crate::lexer::Lexer;
    use std::path::PathBuf;

    fn module_from(source: &str) -> Module {
        let stream = Lexer::new(source).tokenize().unwrap();
        let statements = scanner::scan(source, &stream);
        Module {
            id: ModuleId(0),
            path: PathBuf::from("test.ts"),
            is_virtual: false,
            is_dts: false,
            source: source.to_string(),
            stream,
            statements,
            links: FxHashMap::default(),
        }
    }

    fn emit_all(source: &str, keep_export: bool) -> (String, Vec<Diagnostic>) {
        let module = module_from(source);
        let options = CompilerOptions::default();
        let emitter = Emitter::new(&module, &options);
        let renames = FxHashMap::default();
        let cfg = EmitConfig {
            keep_export,
            synthetic_name: None,
            renames: &renames,
        };
        let mut diags = Vec::new();
        let parts: Vec<String> = module
            .statements
            .iter()
            .filter_map(|s| emitter.emit_statement(s, &cfg, &mut diags))
            .collect();
        (parts.join("\n"), diags)
    }

    fn emit(source: &str) -> String {
        let (text, diags) = emit_all(source, true);
        assert!(diags.is_empty(), "{diags:?}");
        text
    }

    #[test]
    fn test_function_body_becomes_signature() {
        let out = emit("export function go(a: number): void {\n  run(a);\n}\n");
        assert_eq!(out, "export declare function go(a: number): void;");
    }

    #[test]
    fn test_async_and_generator_markers_dropped() {
        let out = emit(
            "export async function* stream(): AsyncGenerator<number> {\n  yield 1;\n}\n",
        );
        assert_eq!(out, "export declare function stream(): AsyncGenerator<number>;");
    }

    #[test]
    fn test_parameter_defaults_become_optional() {
        let out = emit(
            "export function pad(text: string, width = 4, flags?: Flags): string {\n  return text;\n}\n",
        );
        assert_eq!(
            out,
            "export declare function pad(text: string, width?: number, flags?: Flags): string;"
        );
    }

    #[test]
    fn test_untyped_parameters_widen_to_any() {
        let out = emit("export function log(msg, ...rest): void {}\n");
        assert_eq!(out, "export declare function log(msg: any, ...rest: any[]): void;");
    }

    #[test]
    fn test_missing_return_type_diagnosed() {
        let (out, diags) = emit_all("export function f(a: number) {\n  return a;\n}\n", true);
        assert_eq!(out, "export declare function f(a: number);");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::MISSING_ANNOTATION);
    }

    #[test]
    fn test_overload_signatures_survive() {
        let out = emit(
            "export function f(a: string): void;\nexport function f(a: number): void;\nexport function f(a: string | number): void {\n}\n",
        );
        assert_eq!(
            out,
            "export declare function f(a: string): void;\n\
             export declare function f(a: number): void;\n\
             export declare function f(a: string | number): void;"
        );
    }

    #[test]
    fn test_const_literals_keep_initializers() {
        let out = emit(
            "export const LIMIT = 100;\nexport const NAME = \"typeroll\";\nexport const NEG = -1;\n",
        );
        assert_eq!(
            out,
            "export declare const LIMIT = 100;\n\
             export declare const NAME = \"typeroll\";\n\
             export declare const NEG = -1;"
        );
    }

    #[test]
    fn test_bigint_const_gets_literal_type() {
        let out = emit("export const big = 10n;\n");
        assert_eq!(out, "export declare const big: 10n;");
    }

    #[test]
    fn test_let_initializers_widen() {
        let out = emit(
            "export let mode = \"fast\";\nexport let count = 3;\nexport var flag = null;\n",
        );
        assert_eq!(
            out,
            "export declare let mode: string;\n\
             export declare let count: number;\n\
             export declare var flag: any;"
        );
    }

    #[test]
    fn test_as_assertion_becomes_annotation() {
        let out = emit("export const cfg = load() as Config;\nexport const tag = \"x\" as const;\n");
        assert_eq!(
            out,
            "export declare const cfg: Config;\nexport declare const tag: \"x\";"
        );
    }

    #[test]
    fn test_annotated_initializer_dropped() {
        let out = emit("export const db: Database = connect();\n");
        assert_eq!(out, "export declare const db: Database;");
    }

    #[test]
    fn test_unknowable_initializer_diagnosed() {
        let (out, diags) = emit_all("export const options = { deep: true };\n", true);
        assert_eq!(out, "export declare const options;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::MISSING_ANNOTATION);
        assert!(diags[0].message.contains("options"));
    }

    #[test]
    fn test_arrow_initializer_synthesizes_function_type() {
        let out = emit("export const handler = (e: Event): void => {\n  dispatch(e);\n};\n");
        assert_eq!(out, "export declare const handler: (e: Event) => void;");
    }

    #[test]
    fn test_untyped_arrow_is_not_trusted() {
        let (out, diags) = emit_all("export const bad = (e) => e;\n", true);
        assert_eq!(out, "export declare const bad;");
        assert!(diags.iter().any(|d| d.code == codes::MISSING_ANNOTATION));
    }

    #[test]
    fn test_class_surface() {
        let out = emit(
            "export abstract class Base<T> {\n  abstract run(input: T): void;\n  #secret = 1;\n  ready!: boolean;\n  static create(): Base<string> {\n    return make();\n  }\n}\n",
        );
        assert!(out.starts_with("export declare abstract class Base<T> {"));
        assert!(out.contains("abstract run(input: T): void;"));
        assert!(out.contains("#secret;"));
        assert!(out.contains("ready: boolean;"));
        assert!(out.contains("static create(): Base<string>;"));
        assert!(!out.contains("make()"));
    }

    #[test]
    fn test_class_property_initializers() {
        let out = emit(
            "export class Conf {\n  readonly tag = \"v2\";\n  limit = 10;\n  private cache = new Map<string, number>();\n}\n",
        );
        assert!(out.contains("readonly tag: \"v2\";"));
        assert!(out.contains("limit: number;"));
        assert!(out.contains("private cache;"));
        assert!(!out.contains("new Map"));
    }

    #[test]
    fn test_constructor_properties_hoisted() {
        let out = emit(
            "export class Box {\n  constructor(private size: number, label: string) {}\n}\n",
        );
        assert!(out.contains("private size: number;"));
        assert!(out.contains("constructor(size: number, label: string);"));
    }

    #[test]
    fn test_static_blocks_removed() {
        let out = emit(
            "export class Reg {\n  static entries: string[] = [];\n  static {\n    Reg.entries.push(\"a\");\n  }\n}\n",
        );
        assert!(out.contains("static entries: string[];"));
        assert!(!out.contains("push"));
    }

    #[test]
    fn test_members_without_semicolons_keep_boundaries() {
        let out = emit(
            "export class P {\n  x: number\n  y: number\n  dist(): number {\n    return 0;\n  }\n}\n",
        );
        assert!(out.contains("x: number\n"));
        assert!(out.contains("y: number\n"));
        assert!(out.contains("dist(): number;"));
    }

    #[test]
    fn test_interface_internal_members_stripped() {
        let out = emit(
            "export interface Conn {\n  url: string;\n  /** @internal */\n  raw: unknown;\n}\n",
        );
        assert!(out.contains("url: string;"));
        assert!(!out.contains("raw"));
    }

    #[test]
    fn test_internal_statement_dropped() {
        let (out, diags) = emit_all(
            "/** @internal */\nexport const hidden = 1;\nexport const shown = 2;\n",
            true,
        );
        assert!(diags.is_empty());
        assert_eq!(out, "export declare const shown = 2;");
    }

    #[test]
    fn test_namespace_bodies_pruned() {
        let out = emit(
            "export namespace api {\n  export const base = \"/v1\";\n  export function call(): void {\n    fire();\n  }\n  boot();\n}\n",
        );
        assert!(out.starts_with("export declare namespace api {"));
        assert!(out.contains("export const base = \"/v1\";"));
        assert!(out.contains("export function call(): void;"));
        assert!(!out.contains("fire()"));
        assert!(!out.contains("boot()"));
    }

    #[test]
    fn test_namespace_inner_declare_removed() {
        let out = emit("export namespace api {\n  export declare const x: number;\n}\n");
        assert!(out.contains("export const x: number;"));
        assert!(!out.contains("declare const"));
    }

    #[test]
    fn test_export_default_class_keeps_form_in_entry() {
        let (out, diags) = emit_all("export default class App {\n  run(): void {}\n}\n", true);
        assert!(diags.is_empty());
        assert_eq!(out, "export default class App {\n  run(): void;\n}");
    }

    #[test]
    fn test_export_default_stripped_outside_entry() {
        let (out, diags) = emit_all("export default class App {\n  run(): void {}\n}\n", false);
        assert!(diags.is_empty());
        assert_eq!(out, "declare class App {\n  run(): void;\n}");
    }

    #[test]
    fn test_synthetic_name_for_anonymous_default() {
        let module = module_from("export default function (): number {\n  return 1;\n}\n");
        let options = CompilerOptions::default();
        let emitter = Emitter::new(&module, &options);
        let renames = FxHashMap::default();
        let cfg = EmitConfig {
            keep_export: false,
            synthetic_name: Some("_default"),
            renames: &renames,
        };
        let mut diags = Vec::new();
        let out = emitter
            .emit_statement(&module.statements[0], &cfg, &mut diags)
            .unwrap();
        assert_eq!(out, "declare function _default(): number;");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_executables_and_import_syntax_dropped() {
        let (out, diags) = emit_all(
            "import { x } from \"./dep\";\nconsole.log(x);\nexport const y: number = x;\n",
            true,
        );
        assert!(diags.is_empty());
        assert_eq!(out, "export declare const y: number;");
    }

    #[test]
    fn test_import_equals_entity_alias() {
        let (kept, _) = emit_all("export import Call = api.call;\n", true);
        assert_eq!(kept, "export import Call = api.call;");
        let (stripped, _) = emit_all("export import Call = api.call;\n", false);
        assert_eq!(stripped, "import Call = api.call;");
    }

    #[test]
    fn test_renames_apply_to_references_not_members() {
        let module = module_from(
            "export interface Config {\n  limit: number;\n}\nexport function use(c: Config): Config {\n  return c;\n}\n",
        );
        let options = CompilerOptions::default();
        let emitter = Emitter::new(&module, &options);
        let mut renames = FxHashMap::default();
        renames.insert("Config".to_string(), "Config$1".to_string());
        let cfg = EmitConfig {
            keep_export: false,
            synthetic_name: None,
            renames: &renames,
        };
        let mut diags = Vec::new();
        let parts: Vec<String> = module
            .statements
            .iter()
            .filter_map(|s| emitter.emit_statement(s, &cfg, &mut diags))
            .collect();
        let out = parts.join("\n");
        assert!(out.contains("interface Config$1 {"));
        assert!(out.contains("(c: Config$1): Config$1;"));
        assert!(out.contains("limit: number;"));
    }

    #[test]
    fn test_destructuring_declaration_rejected() {
        let (_, diags) = emit_all("export const { a, b } = pair();\n", true);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::MISSING_ANNOTATION);
    }

    #[test]
    fn test_edits_inside_deleted_ranges_are_dropped() {
        let source = "abcdef";
        let edits = vec![
            Edit::delete(1, 4),
            Edit::replace(2, 3, "X"),
            Edit::insert(5, "!"),
        ];
        assert_eq!(apply_edits(source, 0..source.len(), edits), "ae!f");
    }
}
