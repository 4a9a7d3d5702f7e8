//! Engine assembly and the two bundling passes: graph construction plus
//! emission in `bundle()`, then a single write pass in `Bundle::write`.

use crate::chunk::{self, OutputChunk};
use crate::diagnostics::Diagnostic;
use crate::graph::GraphBuilder;
use crate::options::CompilerOptions;
use crate::plugin::{ChunkInfo, FsReader, OutputPlugin, Plugin, SourceReader};
use crate::resolver::ExternalPattern;
use indexmap::IndexMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bundling produced error diagnostics; nothing was written.
    #[error("declaration bundling failed with {} error(s)", .0.iter().filter(|d| d.is_error()).count())]
    Bundle(Vec<Diagnostic>),
    #[error("failed to write `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl EngineError {
    /// Diagnostics behind a bundling failure.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            EngineError::Bundle(diagnostics) => diagnostics,
            EngineError::Write { .. } => &[],
        }
    }
}

/// Configures an [`Engine`]. Entry points keep their insertion order,
/// which fixes chunk order in the output.
pub struct EngineBuilder {
    entries: IndexMap<String, PathBuf>,
    options: CompilerOptions,
    externals: Vec<ExternalPattern>,
    plugins: Vec<Box<dyn Plugin>>,
    reader: Box<dyn SourceReader>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            options: CompilerOptions::default(),
            externals: Vec::new(),
            plugins: Vec::new(),
            reader: Box::new(FsReader),
        }
    }

    /// Add one named entry point; its chunk is written as `<name>.d.ts`.
    pub fn entry(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.entries.insert(name.into(), path.into());
        self
    }

    pub fn compiler_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Treat specifiers matching `pattern` as external.
    pub fn external(mut self, pattern: ExternalPattern) -> Self {
        self.externals.push(pattern);
        self
    }

    pub fn externals(mut self, patterns: impl IntoIterator<Item = ExternalPattern>) -> Self {
        self.externals.extend(patterns);
        self
    }

    /// Append a resolution plugin. Plugins run in registration order and
    /// the first claim wins.
    pub fn plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Replace the source reader every on-disk module passes through.
    pub fn source_reader(mut self, reader: Box<dyn SourceReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            entries: self.entries,
            options: self.options,
            externals: self.externals,
            plugins: self.plugins,
            reader: self.reader,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured declaration bundler. One `bundle()` call runs graph
/// construction and emission for every entry point.
pub struct Engine {
    entries: IndexMap<String, PathBuf>,
    options: CompilerOptions,
    externals: Vec<ExternalPattern>,
    plugins: Vec<Box<dyn Plugin>>,
    reader: Box<dyn SourceReader>,
}

impl Engine {
    pub fn bundle(&self) -> Result<Bundle, EngineError> {
        let graph = GraphBuilder::new(self.reader.as_ref(), &self.plugins, &self.externals)
            .build(&self.entries);
        let mut diagnostics = graph.diagnostics.clone();
        if self.options.no_emit_on_error && graph.has_errors() {
            return Err(EngineError::Bundle(diagnostics));
        }

        let mut chunks = Vec::new();
        for (name, entry) in graph.entries() {
            chunks.push(chunk::render_chunk(
                &graph,
                &self.options,
                name,
                *entry,
                &mut diagnostics,
            ));
        }
        if self.options.no_emit_on_error && diagnostics.iter().any(|d| d.is_error()) {
            return Err(EngineError::Bundle(diagnostics));
        }
        Ok(Bundle { chunks, diagnostics })
    }
}

/// Rendered chunks plus every diagnostic the passes produced, awaiting the
/// write phase.
#[derive(Debug)]
pub struct Bundle {
    pub chunks: Vec<OutputChunk>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Bundle {
    /// Run output plugins over each chunk and write the results under
    /// `outdir`, creating it if needed. Returns the chunks as written.
    pub fn write(
        mut self,
        outdir: &Path,
        output_plugins: &[Box<dyn OutputPlugin>],
    ) -> Result<Vec<OutputChunk>, EngineError> {
        fs::create_dir_all(outdir).map_err(|source| EngineError::Write {
            path: outdir.to_path_buf(),
            source,
        })?;
        for chunk in &mut self.chunks {
            for plugin in output_plugins {
                let info = ChunkInfo {
                    name: &chunk.name,
                    file_name: &chunk.file_name,
                };
                if let Some(code) = plugin.render_chunk(&chunk.code, &info) {
                    chunk.code = code;
                }
            }
            let path = outdir.join(&chunk.file_name);
            fs::write(&path, &chunk.code).map_err(|source| EngineError::Write { path, source })?;
        }
        Ok(self.chunks)
    }
}
