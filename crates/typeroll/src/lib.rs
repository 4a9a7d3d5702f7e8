//! Typeroll Build Pipeline
//!
//! This crate wraps the declaration bundling engine in a batteries-included
//! build, providing:
//! - External-module classification from package.json dependencies
//! - Virtual modules for stylesheet, media, JSON and `?inline` imports
//! - Alias mapping and bundler-oracle specifier resolution
//! - Triple-slash comment folding so `///` docs survive extraction
//! - An output cache for skipping repeat builds of unchanged requests
//! - A CommonJS `export =` rewrite for lone default exports
//!
//! ```no_run
//! use typeroll::{build, BuildOptions};
//!
//! let result = build(BuildOptions {
//!     entry_points: "src/index.ts".into(),
//!     ..BuildOptions::default()
//! })?;
//! for chunk in &result.output {
//!     println!("{} ({} bytes)", chunk.file_name, chunk.code.len());
//! }
//! # Ok::<(), typeroll::BuildError>(())
//! ```

pub(crate) mod assets;
pub mod build;
pub(crate) mod cache;
pub(crate) mod classifier;
pub mod cjs;
pub mod comments;
pub mod error;
pub mod options;
pub(crate) mod oracle;

pub use build::{build, BuildResult};
pub use cjs::CjsDefaultExportPlugin;
pub use comments::{fold_triple_slash, FoldingReader};
pub use error::BuildError;
pub use options::{BuildOptions, CompilerOverrides, EntryPoints};
pub use typeroll_engine::{codes, CompilerOptions, Diagnostic, OutputChunk, Severity};
