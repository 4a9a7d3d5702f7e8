//! Build options and the compiler-option override merge.

use crate::error::BuildError;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use typeroll_engine::CompilerOptions;

/// Entry points for one build: a single file, a list, or named chunks.
///
/// Chunk names derive from file stems unless given explicitly; insertion
/// order fixes the order of emitted chunks.
#[derive(Debug, Clone)]
pub enum EntryPoints {
    One(PathBuf),
    Many(Vec<PathBuf>),
    Named(IndexMap<String, PathBuf>),
}

impl Default for EntryPoints {
    fn default() -> Self {
        EntryPoints::One(PathBuf::from("src/index.ts"))
    }
}

impl From<&str> for EntryPoints {
    fn from(path: &str) -> Self {
        EntryPoints::One(PathBuf::from(path))
    }
}

impl From<PathBuf> for EntryPoints {
    fn from(path: PathBuf) -> Self {
        EntryPoints::One(path)
    }
}

impl From<Vec<PathBuf>> for EntryPoints {
    fn from(paths: Vec<PathBuf>) -> Self {
        EntryPoints::Many(paths)
    }
}

impl From<IndexMap<String, PathBuf>> for EntryPoints {
    fn from(named: IndexMap<String, PathBuf>) -> Self {
        EntryPoints::Named(named)
    }
}

impl EntryPoints {
    /// Chunk-name to source map. Fails when no entry is given or two
    /// entries derive the same name.
    pub(crate) fn into_named(self) -> Result<IndexMap<String, PathBuf>, BuildError> {
        let mut named = IndexMap::new();
        match self {
            EntryPoints::One(path) => {
                named.insert(stem_of(&path)?, path);
            }
            EntryPoints::Many(paths) => {
                for path in paths {
                    let name = stem_of(&path)?;
                    if named.contains_key(&name) {
                        return Err(BuildError::Configuration(format!(
                            "two entry points derive the chunk name `{name}`; use named entries"
                        )));
                    }
                    named.insert(name, path);
                }
            }
            EntryPoints::Named(entries) => named = entries,
        }
        if named.is_empty() {
            return Err(BuildError::Configuration("no entry points given".to_string()));
        }
        Ok(named)
    }
}

fn stem_of(path: &Path) -> Result<String, BuildError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            BuildError::Configuration(format!(
                "cannot derive a chunk name from `{}`",
                path.display()
            ))
        })
}

/// Caller overrides merged over the fixed baseline; `None` keeps the
/// baseline value.
#[derive(Debug, Clone, Default)]
pub struct CompilerOverrides {
    pub declaration: Option<bool>,
    pub emit_declaration_only: Option<bool>,
    pub no_emit_on_error: Option<bool>,
    pub skip_lib_check: Option<bool>,
    pub strip_internal: Option<bool>,
    /// Selects the fast per-file emission backend.
    pub isolated_declarations: Option<bool>,
}

impl CompilerOverrides {
    /// Baseline merged with these overrides; overrides win.
    pub fn apply(&self, base: CompilerOptions) -> CompilerOptions {
        CompilerOptions {
            declaration: self.declaration.unwrap_or(base.declaration),
            emit_declaration_only: self
                .emit_declaration_only
                .unwrap_or(base.emit_declaration_only),
            no_emit_on_error: self.no_emit_on_error.unwrap_or(base.no_emit_on_error),
            skip_lib_check: self.skip_lib_check.unwrap_or(base.skip_lib_check),
            strip_internal: self.strip_internal.unwrap_or(base.strip_internal),
            isolated_declarations: self
                .isolated_declarations
                .unwrap_or(base.isolated_declarations),
        }
    }
}

/// Options for one [`build`](crate::build::build) call.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub entry_points: EntryPoints,
    /// Output directory for emitted chunks.
    pub outdir: PathBuf,
    /// Module names bundled even when the manifest lists them as
    /// dependencies.
    pub include: Vec<String>,
    /// Module names kept external even when they would be bundled.
    pub exclude: Vec<String>,
    /// Module names resolved to an empty module.
    pub empty: Vec<String>,
    /// Specifier renames; the replacement is always left external.
    pub alias: IndexMap<String, String>,
    /// Rewrite a default-export alias into the `export =` form.
    pub cjs: bool,
    /// Restore the previous build's output when the cache has it. The
    /// cache never checks whether inputs changed.
    pub reuse_last_output: bool,
    pub compiler_options: CompilerOverrides,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            entry_points: EntryPoints::default(),
            outdir: PathBuf::from("dist"),
            include: Vec::new(),
            exclude: Vec::new(),
            empty: Vec::new(),
            alias: IndexMap::new(),
            cjs: false,
            reuse_last_output: false,
            compiler_options: CompilerOverrides::default(),
        }
    }
}

impl BuildOptions {
    /// `include` and `exclude` must be disjoint; checked before any I/O.
    pub(crate) fn validate(&self) -> Result<(), BuildError> {
        for name in &self.include {
            if self.exclude.contains(name) {
                return Err(BuildError::Configuration(format!(
                    "`{name}` is both included and excluded"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BuildOptions::default();
        assert_eq!(options.outdir, PathBuf::from("dist"));
        assert!(!options.cjs);
        assert!(!options.reuse_last_output);
        assert!(matches!(options.entry_points, EntryPoints::One(ref p) if p == Path::new("src/index.ts")));
    }

    #[test]
    fn test_include_exclude_overlap_rejected() {
        let options = BuildOptions {
            include: vec!["react".to_string()],
            exclude: vec!["react".to_string()],
            ..BuildOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("react"));
    }

    #[test]
    fn test_disjoint_include_exclude_passes() {
        let options = BuildOptions {
            include: vec!["react".to_string()],
            exclude: vec!["vue".to_string()],
            ..BuildOptions::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_names_derive_from_stems() {
        let entries = EntryPoints::Many(vec![
            PathBuf::from("src/index.ts"),
            PathBuf::from("src/worker.ts"),
        ]);
        let named = entries.into_named().unwrap();
        assert_eq!(named.get_index(0).unwrap().0, "index");
        assert_eq!(named.get_index(1).unwrap().0, "worker");
    }

    #[test]
    fn test_duplicate_stems_rejected() {
        let entries = EntryPoints::Many(vec![
            PathBuf::from("src/index.ts"),
            PathBuf::from("lib/index.ts"),
        ]);
        assert!(entries.into_named().is_err());
    }

    #[test]
    fn test_empty_entries_rejected() {
        assert!(EntryPoints::Many(Vec::new()).into_named().is_err());
        assert!(EntryPoints::Named(IndexMap::new()).into_named().is_err());
    }

    #[test]
    fn test_overrides_win_over_baseline() {
        let overrides = CompilerOverrides {
            strip_internal: Some(false),
            isolated_declarations: Some(true),
            ..CompilerOverrides::default()
        };
        let merged = overrides.apply(CompilerOptions::default());
        assert!(!merged.strip_internal);
        assert!(merged.isolated_declarations);
        assert!(merged.no_emit_on_error);
    }
}
