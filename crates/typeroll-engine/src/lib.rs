//! typeroll declaration bundling engine
//!
//! Bundles TypeScript sources into one `.d.ts` file per entry point:
//! - Lexing and statement-level scanning of declaration-bearing syntax
//! - Module graph construction with pluggable resolution
//! - Statement transforms into ambient declaration form
//! - Per-entry chunk merging with cross-module name deconfliction
//! - Structured diagnostics with stable codes and source frames
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use typeroll_engine::EngineBuilder;
//!
//! # fn main() -> Result<(), typeroll_engine::EngineError> {
//! let engine = EngineBuilder::new()
//!     .entry("index", "src/index.ts")
//!     .build();
//! engine.bundle()?.write(Path::new("dist"), &[])?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod chunk;
pub mod diagnostics;
mod emit;
pub mod graph;
pub mod lexer;
pub mod options;
pub mod plugin;
pub mod resolver;
pub mod scanner;

pub use builder::{Bundle, Engine, EngineBuilder, EngineError};
pub use chunk::OutputChunk;
pub use diagnostics::{codes, Diagnostic, Severity, Span};
pub use options::{CompilerOptions, EmitBackend};
pub use plugin::{
    ChunkInfo, FsReader, OutputPlugin, Plugin, Resolution, ResolveCtx, SourceReader,
};
pub use resolver::ExternalPattern;
