//! Module graph construction.
//!
//! Starting from the entry points, every reachable module is read through
//! the source reader, lexed, scanned, and linked: each statement carrying a
//! specifier resolves to either an internal module edge or an external
//! reference. Resolution consults the plugin chain first, then the external
//! patterns, then the default resolver. The graph also owns cycle
//! detection and the per-module export tables the chunk merger reads.

use crate::diagnostics::{codes, Diagnostic, Span};
use crate::lexer::Lexer;
use crate::plugin::{Plugin, ResolveCtx, Resolution, SourceReader};
use crate::resolver::{self, ExternalPattern};
use crate::scanner::{self, Statement, StatementKind};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Index of a module in the graph, stable for the graph's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

/// Where a statement's specifier leads.
#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    Internal(ModuleId),
    /// Kept as an import in the output. The specifier may differ from the
    /// one written in the source when a plugin redirected it.
    External { specifier: String },
}

/// One loaded module.
#[derive(Debug)]
pub struct Module {
    pub id: ModuleId,
    /// On-disk path, or the virtual id for plugin-loaded modules.
    pub path: PathBuf,
    pub is_virtual: bool,
    /// Already-declaration sources pass through the emitter verbatim.
    pub is_dts: bool,
    pub source: String,
    pub stream: crate::lexer::TokenStream,
    pub statements: Vec<Statement>,
    /// Statement index -> resolved link, for statements with a specifier.
    pub links: FxHashMap<usize, Link>,
}

impl Module {
    pub fn link(&self, stmt: usize) -> Option<&Link> {
        self.links.get(&stmt)
    }

    /// Text of a statement, attached doc comment included.
    pub fn statement_text(&self, stmt: &Statement) -> &str {
        &self.source[stmt.span.start..stmt.span.end]
    }
}

/// Where an exported name originates.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOrigin {
    /// Declared in the module itself. `stmt` is the declaring statement.
    Local { stmt: usize, local_name: String },
    /// Re-exported from an internal dependency; `source_name` is the name
    /// there ("*" for `export * as ns`).
    Internal { module: ModuleId, source_name: String },
    /// Re-exported from an external module.
    External { specifier: String, source_name: String },
}

#[derive(Debug, Default)]
struct ExportTable {
    names: IndexMap<String, ExportOrigin>,
    /// Internal dependencies re-exported with a bare `export *`.
    stars: Vec<ModuleId>,
    /// External specifiers re-exported with a bare `export *`; names
    /// reachable through them are unknowable here.
    external_stars: Vec<String>,
}

#[derive(Debug)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    entries: Vec<(String, ModuleId)>,
    tables: Vec<ExportTable>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ModuleGraph {
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Entry chunks in insertion order.
    pub fn entries(&self) -> &[(String, ModuleId)] {
        &self.entries
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }

    /// Internal dependencies of a module, statement order, duplicates kept.
    fn internal_deps(&self, id: ModuleId) -> Vec<ModuleId> {
        let module = &self.modules[id.0];
        (0..module.statements.len())
            .filter_map(|i| match module.links.get(&i) {
                Some(Link::Internal(dep)) => Some(*dep),
                _ => None,
            })
            .collect()
    }

    /// Modules reachable from `entry` in dependency-first order, the entry
    /// last.
    pub fn post_order(&self, entry: ModuleId) -> Vec<ModuleId> {
        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        // (node, child cursor) pairs; explicit stack, graphs can be deep
        let mut stack = vec![(entry, 0usize)];
        visited.insert(entry);

        while let Some(&(id, cursor)) = stack.last() {
            let deps = self.internal_deps(id);
            match deps.get(cursor) {
                Some(&dep) => {
                    stack.last_mut().expect("stack is non-empty").1 += 1;
                    if visited.insert(dep) {
                        stack.push((dep, 0));
                    }
                }
                None => {
                    order.push(id);
                    stack.pop();
                }
            }
        }
        order
    }

    /// Names exported by a module, star re-exports expanded. Explicit
    /// exports shadow star-provided ones; later stars do not override
    /// earlier names.
    pub fn exported_names(&self, id: ModuleId) -> IndexMap<String, ExportOrigin> {
        let mut out = IndexMap::new();
        let mut seen = FxHashSet::default();
        self.collect_exports(id, &mut out, &mut seen, true);
        out
    }

    fn collect_exports(
        &self,
        id: ModuleId,
        out: &mut IndexMap<String, ExportOrigin>,
        seen: &mut FxHashSet<ModuleId>,
        top: bool,
    ) {
        if !seen.insert(id) {
            return;
        }
        let table = &self.tables[id.0];
        for (name, origin) in &table.names {
            // Star re-export chains never propagate a default
            if !top && name == "default" {
                continue;
            }
            if !out.contains_key(name) {
                let origin = if top {
                    origin.clone()
                } else {
                    // Reached through a star: the chunk fetches it from the
                    // module that actually declares it
                    ExportOrigin::Internal {
                        module: id,
                        source_name: name.clone(),
                    }
                };
                out.insert(name.clone(), origin);
            }
        }
        for dep in &table.stars {
            self.collect_exports(*dep, out, seen, false);
        }
    }

    /// Resolve one exported name, chasing star re-exports.
    pub fn resolve_export(&self, id: ModuleId, name: &str) -> Option<ExportOrigin> {
        let mut seen = FxHashSet::default();
        self.resolve_export_inner(id, name, &mut seen, true)
    }

    fn resolve_export_inner(
        &self,
        id: ModuleId,
        name: &str,
        seen: &mut FxHashSet<ModuleId>,
        top: bool,
    ) -> Option<ExportOrigin> {
        if !seen.insert(id) {
            return None;
        }
        let table = &self.tables[id.0];
        if let Some(origin) = table.names.get(name) {
            return Some(origin.clone());
        }
        if name == "default" && !top {
            return None;
        }
        for dep in &table.stars {
            if let Some(_origin) = self.resolve_export_inner(*dep, name, seen, false) {
                return Some(ExportOrigin::Internal {
                    module: *dep,
                    source_name: name.to_string(),
                });
            }
        }
        None
    }

    /// True when the module's exports cannot be fully enumerated because an
    /// `export *` (transitively) points at an external module.
    pub fn has_unknowable_exports(&self, id: ModuleId) -> bool {
        let mut seen = FxHashSet::default();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let table = &self.tables[id.0];
            if !table.external_stars.is_empty() {
                return true;
            }
            stack.extend(table.stars.iter().copied());
        }
        false
    }

    /// External star re-export specifiers of one module, for chunks that
    /// must preserve `export * from "spec"`.
    pub fn external_stars(&self, id: ModuleId) -> &[String] {
        &self.tables[id.0].external_stars
    }

    /// External star specifiers visible through a module's star re-export
    /// chain, nearest first, deduplicated.
    pub fn transitive_external_stars(&self, id: ModuleId) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut out: Vec<String> = Vec::new();
        let mut stack = vec![id];
        while let Some(m) = stack.pop() {
            if !seen.insert(m) {
                continue;
            }
            let table = &self.tables[m.0];
            for spec in &table.external_stars {
                if !out.contains(spec) {
                    out.push(spec.clone());
                }
            }
            stack.extend(table.stars.iter().copied());
        }
        out
    }

    /// Report dependency cycles as warnings, one per back edge.
    fn detect_cycles(&mut self) {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut color = vec![Color::White; self.modules.len()];
        let mut parent: Vec<Option<ModuleId>> = vec![None; self.modules.len()];
        let mut warnings = Vec::new();

        for start in 0..self.modules.len() {
            if color[start] != Color::White {
                continue;
            }
            let mut stack = vec![(ModuleId(start), 0usize)];
            color[start] = Color::Gray;

            while let Some(&(id, cursor)) = stack.last() {
                let deps = self.internal_deps(id);
                match deps.get(cursor) {
                    Some(&dep) => {
                        stack.last_mut().expect("stack is non-empty").1 += 1;
                        match color[dep.0] {
                            Color::White => {
                                color[dep.0] = Color::Gray;
                                parent[dep.0] = Some(id);
                                stack.push((dep, 0));
                            }
                            Color::Gray => {
                                // Back edge: walk parents to format the cycle
                                let mut names = vec![self.display_name(dep)];
                                let mut node = id;
                                loop {
                                    names.push(self.display_name(node));
                                    if node == dep {
                                        break;
                                    }
                                    match parent[node.0] {
                                        Some(p) => node = p,
                                        None => break,
                                    }
                                }
                                names.reverse();
                                warnings.push(
                                    Diagnostic::warning(
                                        codes::CIRCULAR_DEPENDENCY,
                                        format!("circular dependency: {}", names.join(" -> ")),
                                    )
                                    .with_file(self.modules[dep.0].path.clone()),
                                );
                            }
                            Color::Black => {}
                        }
                    }
                    None => {
                        color[id.0] = Color::Black;
                        stack.pop();
                    }
                }
            }
        }
        self.diagnostics.extend(warnings);
    }

    fn display_name(&self, id: ModuleId) -> String {
        let path = &self.modules[id.0].path;
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    }

    /// Build the per-module export tables once every module is loaded.
    fn build_export_tables(&mut self) {
        let mut tables = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            let mut table = ExportTable::default();
            for (idx, stmt) in module.statements.iter().enumerate() {
                match &stmt.kind {
                    StatementKind::Decl(d) if d.exported => {
                        if d.default {
                            let local = d.name.clone().unwrap_or_default();
                            table.names.insert(
                                "default".to_string(),
                                ExportOrigin::Local {
                                    stmt: idx,
                                    local_name: local,
                                },
                            );
                        } else {
                            for name in &d.names {
                                table.names.insert(
                                    name.clone(),
                                    ExportOrigin::Local {
                                        stmt: idx,
                                        local_name: name.clone(),
                                    },
                                );
                            }
                        }
                    }
                    StatementKind::ExportDefaultExpr { ident } => {
                        table.names.insert(
                            "default".to_string(),
                            ExportOrigin::Local {
                                stmt: idx,
                                local_name: ident.clone().unwrap_or_default(),
                            },
                        );
                    }
                    StatementKind::ExportAssign => {
                        table.names.insert(
                            "default".to_string(),
                            ExportOrigin::Local {
                                stmt: idx,
                                local_name: String::new(),
                            },
                        );
                    }
                    StatementKind::ExportList { names, .. } => {
                        for n in names {
                            table.names.insert(
                                n.exported.clone(),
                                ExportOrigin::Local {
                                    stmt: idx,
                                    local_name: n.local.clone(),
                                },
                            );
                        }
                    }
                    StatementKind::ExportFrom(e) => match module.links.get(&idx) {
                        Some(Link::Internal(dep)) => {
                            if e.star {
                                match &e.star_alias {
                                    Some(alias) => {
                                        table.names.insert(
                                            alias.clone(),
                                            ExportOrigin::Internal {
                                                module: *dep,
                                                source_name: "*".to_string(),
                                            },
                                        );
                                    }
                                    None => table.stars.push(*dep),
                                }
                            } else {
                                for n in &e.named {
                                    table.names.insert(
                                        n.exported.clone(),
                                        ExportOrigin::Internal {
                                            module: *dep,
                                            source_name: n.local.clone(),
                                        },
                                    );
                                }
                            }
                        }
                        Some(Link::External { specifier }) => {
                            if e.star {
                                match &e.star_alias {
                                    Some(alias) => {
                                        table.names.insert(
                                            alias.clone(),
                                            ExportOrigin::External {
                                                specifier: specifier.clone(),
                                                source_name: "*".to_string(),
                                            },
                                        );
                                    }
                                    None => table.external_stars.push(specifier.clone()),
                                }
                            } else {
                                for n in &e.named {
                                    table.names.insert(
                                        n.exported.clone(),
                                        ExportOrigin::External {
                                            specifier: specifier.clone(),
                                            source_name: n.local.clone(),
                                        },
                                    );
                                }
                            }
                        }
                        None => {}
                    },
                    StatementKind::ImportEquals(r) if r.exported => {
                        table.names.insert(
                            r.name.clone(),
                            ExportOrigin::Local {
                                stmt: idx,
                                local_name: r.name.clone(),
                            },
                        );
                    }
                    _ => {}
                }
            }
            tables.push(table);
        }
        self.tables = tables;
    }
}

/// Builds the graph for one bundling pass.
pub(crate) struct GraphBuilder<'a> {
    reader: &'a dyn SourceReader,
    plugins: &'a [Box<dyn Plugin>],
    externals: &'a [ExternalPattern],
    graph: ModuleGraph,
    by_path: FxHashMap<PathBuf, ModuleId>,
    resolutions: FxHashMap<(String, PathBuf), Link>,
    /// Inserted modules whose statements are not linked yet.
    pending: VecDeque<ModuleId>,
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn new(
        reader: &'a dyn SourceReader,
        plugins: &'a [Box<dyn Plugin>],
        externals: &'a [ExternalPattern],
    ) -> Self {
        Self {
            reader,
            plugins,
            externals,
            graph: ModuleGraph {
                modules: Vec::new(),
                entries: Vec::new(),
                tables: Vec::new(),
                diagnostics: Vec::new(),
            },
            by_path: FxHashMap::default(),
            resolutions: FxHashMap::default(),
            pending: VecDeque::new(),
        }
    }

    /// Load the whole graph from the entry map.
    pub(crate) fn build(mut self, entry_points: &IndexMap<String, PathBuf>) -> ModuleGraph {
        for (name, path) in entry_points {
            match self.resolve_entry(name, path) {
                Some(id) => self.graph.entries.push((name.clone(), id)),
                None => {
                    self.graph.diagnostics.push(Diagnostic::error(
                        codes::UNRESOLVED_ENTRY,
                        format!("cannot resolve entry point `{}`", path.display()),
                    ));
                }
            }
        }

        while let Some(id) = self.pending.pop_front() {
            self.link_module(id);
        }

        self.graph.build_export_tables();
        self.graph.detect_cycles();
        self.graph
    }

    fn resolve_entry(&mut self, _name: &str, path: &Path) -> Option<ModuleId> {
        let ctx_path = path.to_path_buf();
        let ctx = ResolveCtx {
            importer: &ctx_path,
            is_entry: true,
        };
        let specifier = path.to_string_lossy();
        for plugin in self.plugins {
            match plugin.resolve(&specifier, &ctx) {
                Some(Resolution::File(file)) => return self.load_file(&file),
                Some(Resolution::Virtual(id)) => return self.load_virtual(&id),
                Some(Resolution::External) | Some(Resolution::Redirect(_)) => return None,
                None => {}
            }
        }
        let resolved = resolver::resolve_entry(path)?;
        self.load_file(&resolved)
    }

    /// Resolve and link every specifier-bearing statement of a module.
    /// Newly loaded dependencies join the pending queue via
    /// `insert_module`.
    fn link_module(&mut self, id: ModuleId) {
        let importer = self.graph.modules[id.0].path.clone();
        let is_virtual = self.graph.modules[id.0].is_virtual;
        let importer_dir = if is_virtual {
            // Virtual modules import nothing in practice; resolve against
            // the current directory if they ever do
            PathBuf::from(".")
        } else {
            importer.parent().map(Path::to_path_buf).unwrap_or_default()
        };

        let specifiers: Vec<(usize, String, Span)> = self.graph.modules[id.0]
            .statements
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.specifier()
                    .filter(|(spec, _)| !spec.is_empty())
                    .map(|(spec, span)| (i, spec.to_string(), span))
            })
            .collect();

        for (stmt_idx, specifier, span) in specifiers {
            let link = self.resolve_specifier(&specifier, &importer, &importer_dir, span);
            if let Some(link) = link {
                self.graph.modules[id.0].links.insert(stmt_idx, link);
            }
        }
    }

    fn resolve_specifier(
        &mut self,
        specifier: &str,
        importer: &Path,
        importer_dir: &Path,
        span: Span,
    ) -> Option<Link> {
        let cache_key = (specifier.to_string(), importer_dir.to_path_buf());
        if let Some(link) = self.resolutions.get(&cache_key) {
            return Some(link.clone());
        }

        let link = self.resolve_uncached(specifier, importer, importer_dir, span)?;
        self.resolutions.insert(cache_key, link.clone());
        Some(link)
    }

    fn resolve_uncached(
        &mut self,
        specifier: &str,
        importer: &Path,
        importer_dir: &Path,
        span: Span,
    ) -> Option<Link> {
        let mut current = specifier.to_string();

        // A redirect restarts the chain; bound the hops so two plugins
        // cannot ping-pong forever
        for _ in 0..8 {
            let ctx = ResolveCtx {
                importer,
                is_entry: false,
            };
            let mut redirected = false;
            for plugin in self.plugins {
                match plugin.resolve(&current, &ctx) {
                    Some(Resolution::File(path)) => {
                        return self.load_file(&path).map(Link::Internal);
                    }
                    Some(Resolution::Virtual(id)) => {
                        return self.load_virtual(&id).map(Link::Internal);
                    }
                    Some(Resolution::External) => {
                        return Some(Link::External { specifier: current });
                    }
                    Some(Resolution::Redirect(next)) => {
                        current = next;
                        redirected = true;
                        break;
                    }
                    None => {}
                }
            }
            if redirected {
                continue;
            }

            if self.externals.iter().any(|p| p.matches(&current)) {
                return Some(Link::External { specifier: current });
            }

            let relative = current.starts_with('.') || Path::new(&current).is_absolute();
            if relative {
                return match resolver::resolve_relative(&current, importer_dir) {
                    Some(path) => self.load_file(&path).map(Link::Internal),
                    None => {
                        self.graph.diagnostics.push(self.unresolved(
                            &current, importer, span, true,
                        ));
                        None
                    }
                };
            }
            return match resolver::resolve_bare(&current, importer_dir) {
                Some(path) => self.load_file(&path).map(Link::Internal),
                None => {
                    self.graph
                        .diagnostics
                        .push(self.unresolved(&current, importer, span, false));
                    Some(Link::External { specifier: current })
                }
            };
        }

        self.graph.diagnostics.push(
            Diagnostic::error(
                codes::UNRESOLVED_IMPORT,
                format!("plugin redirect loop while resolving `{specifier}`"),
            )
            .with_file(importer.to_path_buf()),
        );
        None
    }

    fn unresolved(&self, specifier: &str, importer: &Path, span: Span, fatal: bool) -> Diagnostic {
        let message = format!("cannot resolve `{specifier}`");
        let source = self
            .by_path
            .get(importer)
            .map(|id| self.graph.modules[id.0].source.as_str());
        let diag = if fatal {
            Diagnostic::error(codes::UNRESOLVED_IMPORT, message)
        } else {
            Diagnostic::warning(codes::UNRESOLVED_IMPORT, message)
        };
        match source {
            Some(source) => diag.with_location(importer, span, source),
            None => diag.with_file(importer.to_path_buf()),
        }
    }

    fn load_file(&mut self, path: &Path) -> Option<ModuleId> {
        let key = resolver::normalize_path(path);
        if let Some(id) = self.by_path.get(&key) {
            return Some(*id);
        }
        let source = match self.reader.read(&key) {
            Ok(source) => source,
            Err(err) => {
                self.graph.diagnostics.push(
                    Diagnostic::error(
                        codes::UNRESOLVED_IMPORT,
                        format!("cannot read `{}`: {err}", key.display()),
                    )
                    .with_file(key.clone()),
                );
                return None;
            }
        };
        let is_dts = key
            .to_string_lossy()
            .ends_with(".d.ts");
        Some(self.insert_module(key, source, false, is_dts))
    }

    fn load_virtual(&mut self, id: &str) -> Option<ModuleId> {
        let key = PathBuf::from(id);
        if let Some(existing) = self.by_path.get(&key) {
            return Some(*existing);
        }
        let source = self.plugins.iter().find_map(|p| p.load(id));
        match source {
            Some(source) => Some(self.insert_module(key, source, true, false)),
            None => {
                self.graph.diagnostics.push(Diagnostic::error(
                    codes::UNRESOLVED_IMPORT,
                    format!("no plugin supplied content for virtual module `{id}`"),
                ));
                None
            }
        }
    }

    fn insert_module(&mut self, path: PathBuf, source: String, is_virtual: bool, is_dts: bool) -> ModuleId {
        let id = ModuleId(self.graph.modules.len());
        self.pending.push_back(id);

        let stream = match Lexer::new(&source).tokenize() {
            Ok(stream) => stream,
            Err(errors) => {
                for err in errors {
                    self.graph.diagnostics.push(
                        Diagnostic::error(codes::PARSE_ERROR, err.message()).with_location(
                            &path,
                            err.span(),
                            &source,
                        ),
                    );
                }
                Default::default()
            }
        };
        let statements = scanner::scan(&source, &stream);

        self.by_path.insert(path.clone(), id);
        self.graph.modules.push(Module {
            id,
            path,
            is_virtual,
            is_dts,
            source,
            stream,
            statements,
            links: FxHashMap::default(),
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::FsReader;
    use std::fs;

    fn create_temp_project() -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("src")).unwrap();
        (temp, root)
    }

    fn build_graph(root: &Path, entry: &str) -> ModuleGraph {
        let plugins: Vec<Box<dyn Plugin>> = Vec::new();
        let externals: Vec<ExternalPattern> = Vec::new();
        let builder = GraphBuilder::new(&FsReader, &plugins, &externals);
        let mut entries = IndexMap::new();
        entries.insert("index".to_string(), root.join(entry));
        builder.build(&entries)
    }

    #[test]
    fn test_graph_loads_reachable_modules() {
        let (_temp, root) = create_temp_project();
        fs::write(
            root.join("src/index.ts"),
            "import { helper } from \"./util\";\nexport const a = helper;\n",
        )
        .unwrap();
        fs::write(root.join("src/util.ts"), "export const helper = 1;\n").unwrap();

        let graph = build_graph(&root, "src/index.ts");
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.entries().len(), 1);
        assert!(!graph.has_errors());
    }

    #[test]
    fn test_post_order_puts_dependency_first() {
        let (_temp, root) = create_temp_project();
        fs::write(
            root.join("src/index.ts"),
            "export { helper } from \"./util\";\n",
        )
        .unwrap();
        fs::write(root.join("src/util.ts"), "export const helper = 1;\n").unwrap();

        let graph = build_graph(&root, "src/index.ts");
        let entry = graph.entries()[0].1;
        let order = graph.post_order(entry);
        assert_eq!(order.len(), 2);
        assert_eq!(order.last(), Some(&entry));
        assert!(graph.module(order[0]).path.ends_with("util.ts"));
    }

    #[test]
    fn test_unresolved_relative_import_is_error() {
        let (_temp, root) = create_temp_project();
        fs::write(root.join("src/index.ts"), "import { x } from \"./missing\";\n").unwrap();

        let graph = build_graph(&root, "src/index.ts");
        assert!(graph.has_errors());
        let diag = graph
            .diagnostics
            .iter()
            .find(|d| d.code == codes::UNRESOLVED_IMPORT)
            .unwrap();
        assert!(diag.is_error());
        assert!(diag.frame.is_some());
    }

    #[test]
    fn test_unresolved_bare_import_is_warning_and_external() {
        let (_temp, root) = create_temp_project();
        fs::write(
            root.join("src/index.ts"),
            "import { x } from \"not-installed\";\nexport const a: typeof x = null as any;\n",
        )
        .unwrap();

        let graph = build_graph(&root, "src/index.ts");
        assert!(!graph.has_errors());
        let entry = graph.entries()[0].1;
        assert_eq!(
            graph.module(entry).link(0),
            Some(&Link::External {
                specifier: "not-installed".to_string()
            })
        );
        assert!(graph
            .diagnostics
            .iter()
            .any(|d| d.code == codes::UNRESOLVED_IMPORT && !d.is_error()));
    }

    #[test]
    fn test_external_pattern_wins_over_resolution() {
        let (_temp, root) = create_temp_project();
        let pkg = root.join("node_modules/somelib");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("index.d.ts"), "export declare const x: number;\n").unwrap();
        fs::write(
            root.join("src/index.ts"),
            "import { x } from \"somelib\";\nexport const a = x;\n",
        )
        .unwrap();

        let plugins: Vec<Box<dyn Plugin>> = Vec::new();
        let externals = vec![ExternalPattern::new("somelib")];
        let builder = GraphBuilder::new(&FsReader, &plugins, &externals);
        let mut entries = IndexMap::new();
        entries.insert("index".to_string(), root.join("src/index.ts"));
        let graph = builder.build(&entries);

        assert_eq!(graph.len(), 1);
        let entry = graph.entries()[0].1;
        assert!(matches!(
            graph.module(entry).link(0),
            Some(Link::External { specifier }) if specifier == "somelib"
        ));
    }

    #[test]
    fn test_cycle_reported_as_warning() {
        let (_temp, root) = create_temp_project();
        fs::write(
            root.join("src/a.ts"),
            "import { b } from \"./b\";\nexport const a = 1;\n",
        )
        .unwrap();
        fs::write(
            root.join("src/b.ts"),
            "import { a } from \"./a\";\nexport const b = 2;\n",
        )
        .unwrap();

        let graph = build_graph(&root, "src/a.ts");
        let cycle = graph
            .diagnostics
            .iter()
            .find(|d| d.code == codes::CIRCULAR_DEPENDENCY)
            .unwrap();
        assert!(!cycle.is_error());
        assert!(cycle.message.contains("a.ts"));
        assert!(cycle.message.contains("b.ts"));
    }

    #[test]
    fn test_export_table_star_expansion() {
        let (_temp, root) = create_temp_project();
        fs::write(root.join("src/index.ts"), "export * from \"./lib\";\nexport const own = 1;\n")
            .unwrap();
        fs::write(
            root.join("src/lib.ts"),
            "export const shared = 2;\nexport default 3;\n",
        )
        .unwrap();

        let graph = build_graph(&root, "src/index.ts");
        let entry = graph.entries()[0].1;
        let names = graph.exported_names(entry);
        assert!(names.contains_key("own"));
        assert!(names.contains_key("shared"));
        // A star never forwards the dependency's default
        assert!(!names.contains_key("default"));
    }

    #[test]
    fn test_virtual_module_loaded_from_plugin() {
        struct CssPlugin;
        impl Plugin for CssPlugin {
            fn name(&self) -> &str {
                "css"
            }
            fn resolve(&self, specifier: &str, ctx: &ResolveCtx<'_>) -> Option<Resolution> {
                (!ctx.is_entry && specifier.ends_with(".css"))
                    .then(|| Resolution::Virtual(format!("css:{specifier}")))
            }
            fn load(&self, id: &str) -> Option<String> {
                id.starts_with("css:").then(|| "export {};\n".to_string())
            }
        }

        let (_temp, root) = create_temp_project();
        fs::write(
            root.join("src/index.ts"),
            "import \"./style.css\";\nexport const a = 1;\n",
        )
        .unwrap();

        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(CssPlugin)];
        let externals: Vec<ExternalPattern> = Vec::new();
        let builder = GraphBuilder::new(&FsReader, &plugins, &externals);
        let mut entries = IndexMap::new();
        entries.insert("index".to_string(), root.join("src/index.ts"));
        let graph = builder.build(&entries);

        assert_eq!(graph.len(), 2);
        assert!(graph.modules().any(|m| m.is_virtual));
        assert!(!graph.has_errors());
    }
}
