//! Chunk merging: one declaration file per entry point.
//!
//! A chunk inlines every module reachable from its entry, dependency
//! first. Top-level names are deconflicted across modules: the entry's
//! names never change and later claims of a taken name get a `$N` suffix.
//! Imported bindings rename to the final name of the export they resolve
//! to, external imports hoist to a merged block at the top, namespace
//! imports of internal modules materialize as `declare namespace` blocks,
//! and the entry's export surface is rebuilt at the bottom of the chunk.

use crate::diagnostics::{codes, Diagnostic};
use crate::emit::{EmitConfig, Emitter};
use crate::graph::{ExportOrigin, Link, Module, ModuleGraph, ModuleId};
use crate::lexer::Token;
use crate::options::{CompilerOptions, EmitBackend};
use crate::scanner::StatementKind;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

/// One rendered declaration file.
#[derive(Debug, Clone)]
pub struct OutputChunk {
    /// Entry name the chunk was built for.
    pub name: String,
    /// File name under the output directory.
    pub file_name: String,
    pub code: String,
}

pub(crate) fn render_chunk(
    graph: &ModuleGraph,
    options: &CompilerOptions,
    name: &str,
    entry: ModuleId,
    diagnostics: &mut Vec<Diagnostic>,
) -> OutputChunk {
    let mut merger = Merger::new(graph, options, entry);
    let code = merger.render();
    diagnostics.append(&mut merger.diagnostics);
    OutputChunk {
        name: name.to_string(),
        file_name: format!("{name}.d.ts"),
        code,
    }
}

/// Where a reference lands after merging.
#[derive(Debug, Clone)]
enum Resolved {
    /// A top-level name in this chunk.
    Final(String),
    /// An export of an external module; "*" means the whole namespace.
    External { specifier: String, source_name: String },
    /// Unresolvable; already reported where reporting applies.
    Missing,
}

/// Hoisted bindings from one external specifier.
#[derive(Debug, Default)]
struct ExternalImport {
    default: Option<String>,
    namespace: Option<String>,
    /// Imported name -> final local.
    named: IndexMap<String, String>,
}

struct Merger<'g> {
    graph: &'g ModuleGraph,
    options: &'g CompilerOptions,
    entry: ModuleId,
    /// Reachable modules, dependencies first, entry last.
    order: Vec<ModuleId>,
    used: FxHashSet<String>,
    /// (module, top-level local) -> final chunk name.
    finals: FxHashMap<(ModuleId, String), String>,
    /// Synthetic names given to anonymous default declarations.
    default_names: FxHashMap<ModuleId, String>,
    export_memo: FxHashMap<(ModuleId, String), Resolved>,
    /// Target module -> name of its synthesized namespace.
    namespaces: IndexMap<ModuleId, String>,
    imports: IndexMap<String, ExternalImport>,
    /// `import x = require("spec")` bindings, one per specifier.
    requires: IndexMap<String, String>,
    bare_imports: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'g> Merger<'g> {
    fn new(graph: &'g ModuleGraph, options: &'g CompilerOptions, entry: ModuleId) -> Self {
        Self {
            graph,
            options,
            entry,
            order: graph.post_order(entry),
            used: FxHashSet::default(),
            finals: FxHashMap::default(),
            default_names: FxHashMap::default(),
            export_memo: FxHashMap::default(),
            namespaces: IndexMap::new(),
            imports: IndexMap::new(),
            requires: IndexMap::new(),
            bare_imports: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn render(&mut self) -> String {
        self.claim_decls();
        let maps = self.build_maps();

        // Module bodies, dependencies first
        let mut body: Vec<String> = Vec::new();
        let empty = FxHashMap::default();
        let order = self.order.clone();
        for id in order {
            let module = self.graph.module(id);
            let emitter = Emitter::new(module, self.options);
            let renames = maps.get(&id).unwrap_or(&empty);
            let synthetic = self.default_names.get(&id).cloned();
            for stmt in &module.statements {
                let synthetic_name = match &stmt.kind {
                    StatementKind::Decl(d) if d.default && d.name.is_none() => {
                        synthetic.as_deref()
                    }
                    _ => None,
                };
                let cfg = EmitConfig {
                    keep_export: id == self.entry,
                    synthetic_name,
                    renames,
                };
                if let Some(text) = emitter.emit_statement(stmt, &cfg, &mut self.diagnostics) {
                    if !text.trim().is_empty() {
                        body.push(text);
                    }
                }
            }
        }

        // Entry export surface
        let graph = self.graph;
        let entry_module = graph.module(self.entry);
        let exported = graph.exported_names(self.entry);
        let mut list_entries: Vec<String> = Vec::new();
        let mut reexports: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut star_aliases: Vec<(String, String)> = Vec::new();
        for (name, origin) in &exported {
            if let ExportOrigin::Local { stmt, .. } = origin {
                let inline = match &entry_module.statements[*stmt].kind {
                    StatementKind::Decl(_)
                    | StatementKind::ExportDefaultExpr { .. }
                    | StatementKind::ExportAssign => true,
                    StatementKind::ImportEquals(r) => r.specifier.is_none(),
                    _ => false,
                };
                if inline {
                    // The kept statement still carries its export keyword
                    continue;
                }
            }
            match self.export_final(self.entry, name) {
                Resolved::Final(f) => list_entries.push(export_entry(&f, name)),
                Resolved::External { specifier, source_name } => {
                    if source_name == "*" {
                        star_aliases.push((specifier, name.clone()));
                    } else {
                        reexports
                            .entry(specifier)
                            .or_default()
                            .push(export_entry(&source_name, name));
                    }
                }
                Resolved::Missing => {}
            }
        }

        // Namespace blocks; resolving their contents can synthesize more
        let mut ns_blocks: Vec<String> = Vec::new();
        let mut i = 0;
        while i < self.namespaces.len() {
            let (target, ns_name) = {
                let (t, n) = self.namespaces.get_index(i).expect("index in range");
                (*t, n.clone())
            };
            i += 1;
            ns_blocks.push(self.render_namespace(target, &ns_name));
        }

        let import_lines = self.render_imports();
        let mut export_lines: Vec<String> = Vec::new();
        for spec in graph.transitive_external_stars(self.entry) {
            export_lines.push(format!("export * from \"{spec}\";"));
        }
        for (spec, alias) in &star_aliases {
            export_lines.push(format!("export * as {alias} from \"{spec}\";"));
        }
        for (spec, entries) in &reexports {
            export_lines.push(format!("export {{ {} }} from \"{spec}\";", entries.join(", ")));
        }
        if !list_entries.is_empty() {
            export_lines.push(format!("export {{ {} }};", list_entries.join(", ")));
        }

        if body.is_empty() && ns_blocks.is_empty() && export_lines.is_empty() && import_lines.is_empty()
        {
            self.diagnostics.push(
                Diagnostic::warning(
                    codes::EMPTY_BUNDLE,
                    format!(
                        "`{}` produced an empty bundle",
                        entry_module.path.display()
                    ),
                )
                .with_file(entry_module.path.clone()),
            );
            return "export {};\n".to_string();
        }

        // A chunk with no import/export syntax would be a script; pin it
        // to module scope
        if exported.is_empty() && export_lines.is_empty() && import_lines.is_empty() {
            export_lines.push("export {};".to_string());
        }

        let mut out = String::new();
        for line in &import_lines {
            out.push_str(line);
            out.push('\n');
        }
        if !import_lines.is_empty() && !(body.is_empty() && ns_blocks.is_empty()) {
            out.push('\n');
        }
        for stmt in &body {
            out.push_str(stmt);
            out.push('\n');
        }
        for block in &ns_blocks {
            out.push_str(block);
            out.push('\n');
        }
        if !export_lines.is_empty() && !(body.is_empty() && ns_blocks.is_empty()) {
            out.push('\n');
        }
        for line in &export_lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    // ---- naming ----------------------------------------------------------

    fn claim(&mut self, preferred: &str) -> String {
        let stem = if is_valid_identifier(preferred) {
            preferred.to_string()
        } else {
            "_export".to_string()
        };
        if self.used.insert(stem.clone()) {
            return stem;
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{stem}${n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Fix the final name of every top-level declaration, entry first so
    /// its names survive verbatim.
    fn claim_decls(&mut self) {
        let mut ids: Vec<ModuleId> = vec![self.entry];
        ids.extend(self.order.iter().copied().filter(|m| *m != self.entry));
        for id in ids {
            let module = self.graph.module(id);
            for stmt in &module.statements {
                match &stmt.kind {
                    StatementKind::Decl(d) => {
                        for name in &d.names {
                            let key = (id, name.clone());
                            if self.finals.contains_key(&key) {
                                // Overloads and merged declarations share
                                // one binding
                                continue;
                            }
                            let final_name = self.claim(name);
                            self.finals.insert(key, final_name);
                        }
                    }
                    StatementKind::ImportEquals(r) if r.specifier.is_none() => {
                        let key = (id, r.name.clone());
                        if !self.finals.contains_key(&key) {
                            let final_name = self.claim(&r.name);
                            self.finals.insert(key, final_name);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Build per-module rename maps, resolving imported bindings through
    /// the graph. Entry first so its locals also win hoisted-import names.
    fn build_maps(&mut self) -> FxHashMap<ModuleId, FxHashMap<String, String>> {
        let mut maps = FxHashMap::default();
        let mut ids: Vec<ModuleId> = vec![self.entry];
        ids.extend(self.order.iter().copied().filter(|m| *m != self.entry));
        for id in ids {
            let map = self.module_map(id);
            maps.insert(id, map);
        }
        maps
    }

    fn module_map(&mut self, id: ModuleId) -> FxHashMap<String, String> {
        let graph = self.graph;
        let module = graph.module(id);
        let mut map = FxHashMap::default();

        for (idx, stmt) in module.statements.iter().enumerate() {
            match &stmt.kind {
                StatementKind::Decl(d) => {
                    if d.default && d.name.is_none() && id != self.entry {
                        // Anonymous default declarations need a binding
                        // once they leave their module
                        self.anon_default_name(id);
                    }
                    for name in &d.names {
                        if let Some(f) = self.finals.get(&(id, name.clone())) {
                            if f != name {
                                map.insert(name.clone(), f.clone());
                            }
                        }
                    }
                }
                StatementKind::Import(r) => {
                    let Some(link) = module.link(idx) else { continue };
                    match link {
                        Link::Internal(dep) => {
                            let dep = *dep;
                            if let Some(local) = &r.default_name {
                                let resolved = self.export_final(dep, "default");
                                self.bind(&mut map, local, resolved);
                            }
                            for n in &r.named {
                                let resolved = self.export_final(dep, &n.imported);
                                self.bind(&mut map, &n.local, resolved);
                            }
                            if let Some(local) = &r.namespace_name {
                                let f = self.ensure_namespace(dep, local);
                                if f != *local {
                                    map.insert(local.clone(), f);
                                }
                            }
                        }
                        Link::External { specifier } => {
                            if r.side_effect && !self.bare_imports.contains(specifier) {
                                self.bare_imports.push(specifier.clone());
                            }
                            if let Some(local) = &r.default_name {
                                let f = self.ensure_import_default(specifier, local);
                                if f != *local {
                                    map.insert(local.clone(), f);
                                }
                            }
                            for n in &r.named {
                                let f = self.ensure_import_named(specifier, &n.imported, &n.local);
                                if f != n.local {
                                    map.insert(n.local.clone(), f);
                                }
                            }
                            if let Some(local) = &r.namespace_name {
                                let f = self.ensure_import_namespace(specifier, local);
                                if f != *local {
                                    map.insert(local.clone(), f);
                                }
                            }
                        }
                    }
                }
                StatementKind::ImportEquals(r) => match (&r.specifier, module.link(idx)) {
                    (Some(_), Some(Link::External { specifier })) => {
                        let f = self.ensure_require(specifier, &r.name);
                        if f != r.name {
                            map.insert(r.name.clone(), f);
                        }
                    }
                    (Some(_), Some(Link::Internal(dep))) => {
                        // CommonJS interop: the required value is the
                        // module's export-assignment when it has one
                        let dep = *dep;
                        let f = match self.export_final(dep, "default") {
                            Resolved::Final(f) => f,
                            _ => self.ensure_namespace(dep, &r.name),
                        };
                        if f != r.name {
                            map.insert(r.name.clone(), f);
                        }
                    }
                    (None, _) => {
                        if let Some(f) = self.finals.get(&(id, r.name.clone())) {
                            if *f != r.name {
                                map.insert(r.name.clone(), f.clone());
                            }
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        map
    }

    // ---- resolution ------------------------------------------------------

    /// Final chunk name of `name` as exported by module `id`.
    fn export_final(&mut self, id: ModuleId, name: &str) -> Resolved {
        let key = (id, name.to_string());
        if let Some(r) = self.export_memo.get(&key) {
            return r.clone();
        }
        // The in-progress marker doubles as the re-export cycle guard
        self.export_memo.insert(key.clone(), Resolved::Missing);
        let resolved = self.resolve_origin(id, name);
        self.export_memo.insert(key, resolved.clone());
        resolved
    }

    fn resolve_origin(&mut self, id: ModuleId, name: &str) -> Resolved {
        let graph = self.graph;
        match graph.resolve_export(id, name) {
            None => {
                self.report_missing(id, name);
                Resolved::Missing
            }
            Some(ExportOrigin::Local { stmt, local_name }) => {
                if local_name.is_empty() {
                    let module = graph.module(id);
                    match &module.statements[stmt].kind {
                        StatementKind::Decl(_) => Resolved::Final(self.anon_default_name(id)),
                        StatementKind::ExportAssign => match export_assign_ident(module, stmt) {
                            Some(ident) => self.local_final(id, &ident),
                            None => {
                                self.report_missing(id, name);
                                Resolved::Missing
                            }
                        },
                        _ => {
                            self.report_missing(id, name);
                            Resolved::Missing
                        }
                    }
                } else {
                    self.local_final(id, &local_name)
                }
            }
            Some(ExportOrigin::Internal { module, source_name }) => {
                if source_name == "*" {
                    Resolved::Final(self.ensure_namespace(module, name))
                } else {
                    self.export_final(module, &source_name)
                }
            }
            Some(ExportOrigin::External { specifier, source_name }) => {
                Resolved::External { specifier, source_name }
            }
        }
    }

    /// Final chunk name of a local binding: an own declaration or an
    /// imported one.
    fn local_final(&mut self, id: ModuleId, local: &str) -> Resolved {
        if let Some(f) = self.finals.get(&(id, local.to_string())) {
            return Resolved::Final(f.clone());
        }
        let graph = self.graph;
        let module = graph.module(id);
        for (idx, stmt) in module.statements.iter().enumerate() {
            match &stmt.kind {
                StatementKind::Import(r) => {
                    let Some(link) = module.link(idx) else { continue };
                    if r.default_name.as_deref() == Some(local) {
                        return match link {
                            Link::Internal(dep) => self.export_final(*dep, "default"),
                            Link::External { specifier } => {
                                Resolved::Final(self.ensure_import_default(specifier, local))
                            }
                        };
                    }
                    if let Some(n) = r.named.iter().find(|n| n.local == local) {
                        return match link {
                            Link::Internal(dep) => self.export_final(*dep, &n.imported),
                            Link::External { specifier } => Resolved::Final(
                                self.ensure_import_named(specifier, &n.imported, local),
                            ),
                        };
                    }
                    if r.namespace_name.as_deref() == Some(local) {
                        return match link {
                            Link::Internal(dep) => {
                                Resolved::Final(self.ensure_namespace(*dep, local))
                            }
                            Link::External { specifier } => {
                                Resolved::Final(self.ensure_import_namespace(specifier, local))
                            }
                        };
                    }
                }
                StatementKind::ImportEquals(r) if r.name == local && r.specifier.is_some() => {
                    return match module.link(idx) {
                        Some(Link::External { specifier }) => {
                            Resolved::Final(self.ensure_require(specifier, local))
                        }
                        Some(Link::Internal(dep)) => {
                            let dep = *dep;
                            match self.export_final(dep, "default") {
                                Resolved::Final(f) => Resolved::Final(f),
                                _ => Resolved::Final(self.ensure_namespace(dep, local)),
                            }
                        }
                        None => Resolved::Missing,
                    };
                }
                _ => {}
            }
        }
        self.report_missing_local(id, local);
        Resolved::Missing
    }

    fn bind(&mut self, map: &mut FxHashMap<String, String>, local: &str, resolved: Resolved) {
        match resolved {
            Resolved::Final(f) => {
                if f != local {
                    map.insert(local.to_string(), f);
                }
            }
            Resolved::External { specifier, source_name } => {
                let f = if source_name == "*" {
                    self.ensure_import_namespace(&specifier, local)
                } else {
                    self.ensure_import_named(&specifier, &source_name, local)
                };
                if f != local {
                    map.insert(local.to_string(), f);
                }
            }
            Resolved::Missing => {}
        }
    }

    fn anon_default_name(&mut self, id: ModuleId) -> String {
        if let Some(n) = self.default_names.get(&id) {
            return n.clone();
        }
        let n = self.claim("_default");
        self.default_names.insert(id, n.clone());
        n
    }

    // ---- hoisting --------------------------------------------------------

    fn ensure_import_default(&mut self, specifier: &str, preferred: &str) -> String {
        if let Some(f) = self.imports.get(specifier).and_then(|i| i.default.clone()) {
            return f;
        }
        let f = self.claim(preferred);
        self.imports
            .entry(specifier.to_string())
            .or_default()
            .default = Some(f.clone());
        f
    }

    fn ensure_import_namespace(&mut self, specifier: &str, preferred: &str) -> String {
        if let Some(f) = self.imports.get(specifier).and_then(|i| i.namespace.clone()) {
            return f;
        }
        let f = self.claim(preferred);
        self.imports
            .entry(specifier.to_string())
            .or_default()
            .namespace = Some(f.clone());
        f
    }

    fn ensure_import_named(&mut self, specifier: &str, imported: &str, preferred: &str) -> String {
        if imported == "default" {
            return self.ensure_import_default(specifier, preferred);
        }
        if let Some(f) = self
            .imports
            .get(specifier)
            .and_then(|i| i.named.get(imported).cloned())
        {
            return f;
        }
        let f = self.claim(preferred);
        self.imports
            .entry(specifier.to_string())
            .or_default()
            .named
            .insert(imported.to_string(), f.clone());
        f
    }

    fn ensure_require(&mut self, specifier: &str, preferred: &str) -> String {
        if let Some(f) = self.requires.get(specifier) {
            return f.clone();
        }
        let f = self.claim(preferred);
        self.requires.insert(specifier.to_string(), f.clone());
        f
    }

    fn ensure_namespace(&mut self, target: ModuleId, preferred: &str) -> String {
        if let Some(f) = self.namespaces.get(&target) {
            return f.clone();
        }
        let f = self.claim(preferred);
        self.namespaces.insert(target, f.clone());
        f
    }

    // ---- rendering -------------------------------------------------------

    fn render_namespace(&mut self, target: ModuleId, name: &str) -> String {
        let exported = self.graph.exported_names(target);
        let mut entries: Vec<String> = Vec::new();
        for export_name in exported.keys() {
            if export_name == "default" {
                // Namespaces have no default member
                continue;
            }
            match self.export_final(target, export_name) {
                Resolved::Final(f) => entries.push(export_entry(&f, export_name)),
                Resolved::External { specifier, source_name } => {
                    let f = if source_name == "*" {
                        self.ensure_import_namespace(&specifier, export_name)
                    } else {
                        self.ensure_import_named(&specifier, &source_name, export_name)
                    };
                    entries.push(export_entry(&f, export_name));
                }
                Resolved::Missing => {}
            }
        }
        if entries.is_empty() {
            format!("declare namespace {name} {{}}")
        } else {
            format!(
                "declare namespace {name} {{\n  export {{ {} }};\n}}",
                entries.join(", ")
            )
        }
    }

    fn render_imports(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for spec in &self.bare_imports {
            if !self.imports.contains_key(spec) && !self.requires.contains_key(spec) {
                lines.push(format!("import \"{spec}\";"));
            }
        }
        for (spec, import) in &self.imports {
            let named = named_list(&import.named);
            match (&import.default, &import.namespace) {
                (Some(d), Some(ns)) if import.named.is_empty() => {
                    lines.push(format!("import {d}, * as {ns} from \"{spec}\";"));
                }
                (Some(d), Some(ns)) => {
                    lines.push(format!("import {d}, {{ {named} }} from \"{spec}\";"));
                    lines.push(format!("import * as {ns} from \"{spec}\";"));
                }
                (Some(d), None) if import.named.is_empty() => {
                    lines.push(format!("import {d} from \"{spec}\";"));
                }
                (Some(d), None) => {
                    lines.push(format!("import {d}, {{ {named} }} from \"{spec}\";"));
                }
                (None, Some(ns)) => {
                    if !import.named.is_empty() {
                        lines.push(format!("import {{ {named} }} from \"{spec}\";"));
                    }
                    lines.push(format!("import * as {ns} from \"{spec}\";"));
                }
                (None, None) => {
                    if !import.named.is_empty() {
                        lines.push(format!("import {{ {named} }} from \"{spec}\";"));
                    }
                }
            }
        }
        for (spec, local) in &self.requires {
            lines.push(format!("import {local} = require(\"{spec}\");"));
        }
        lines
    }

    // ---- diagnostics -----------------------------------------------------

    fn report_missing(&mut self, id: ModuleId, name: &str) {
        if self.options.backend() == EmitBackend::Isolated {
            return;
        }
        if self.graph.has_unknowable_exports(id) {
            // The name may come through an external star re-export the
            // chunk preserves
            return;
        }
        let path = self.graph.module(id).path.clone();
        self.diagnostics.push(
            Diagnostic::error(
                codes::MISSING_EXPORT,
                format!("`{name}` is not exported from `{}`", path.display()),
            )
            .with_file(path),
        );
    }

    fn report_missing_local(&mut self, id: ModuleId, local: &str) {
        if self.options.backend() == EmitBackend::Isolated {
            return;
        }
        let path = self.graph.module(id).path.clone();
        self.diagnostics.push(
            Diagnostic::error(
                codes::MISSING_EXPORT,
                format!("`{local}` is not declared in `{}`", path.display()),
            )
            .with_file(path),
        );
    }
}

/// The identifier of a plain `export = name;`, if that is the statement's
/// whole shape.
fn export_assign_ident(module: &Module, stmt_idx: usize) -> Option<String> {
    let stmt = &module.statements[stmt_idx];
    let tokens: Vec<&Token> = module.stream.tokens[stmt.tokens.clone()]
        .iter()
        .map(|(t, _)| t)
        .filter(|t| **t != Token::Semicolon)
        .collect();
    match tokens.as_slice() {
        [Token::Export, Token::Equal, Token::Identifier(name)] => Some(name.clone()),
        _ => None,
    }
}

fn export_entry(final_name: &str, exported: &str) -> String {
    if final_name == exported {
        exported.to_string()
    } else if is_valid_identifier(exported) {
        format!("{final_name} as {exported}")
    } else {
        format!("{final_name} as \"{}\"", exported.escape_default())
    }
}

fn named_list(named: &IndexMap<String, String>) -> String {
    named
        .iter()
        .map(|(imported, local)| {
            if imported == local {
                imported.clone()
            } else {
                format!("{imported} as {local}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with",
];

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return false;
    }
    !RESERVED.contains(&name)
}
