//! Build failure taxonomy.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use typeroll_engine::{Diagnostic, EngineError};

/// Everything [`build`](crate::build::build) can fail with.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Contradictory caller input; reported before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A dependency manifest exists but cannot be parsed.
    #[error("invalid manifest `{path}`: {message}")]
    Manifest { path: PathBuf, message: String },

    /// Extraction produced error diagnostics; nothing was written.
    #[error("declaration bundling failed with {} error(s)", .0.iter().filter(|d| d.is_error()).count())]
    Engine(Vec<Diagnostic>),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BuildError {
    /// Diagnostics behind a bundling failure.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            BuildError::Engine(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

impl From<EngineError> for BuildError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Bundle(diagnostics) => BuildError::Engine(diagnostics),
            EngineError::Write { path, source } => BuildError::Io(io::Error::new(
                source.kind(),
                format!("failed to write `{}`: {source}", path.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typeroll_engine::codes;

    #[test]
    fn test_engine_error_counts_errors_only() {
        let diagnostics = vec![
            Diagnostic::error(codes::MISSING_ANNOTATION, "missing type"),
            Diagnostic::warning(codes::CIRCULAR_DEPENDENCY, "cycle"),
            Diagnostic::error(codes::UNRESOLVED_IMPORT, "not found"),
        ];
        let err = BuildError::Engine(diagnostics);
        assert_eq!(err.to_string(), "declaration bundling failed with 2 error(s)");
        assert_eq!(err.diagnostics().len(), 3);
    }

    #[test]
    fn test_configuration_display() {
        let err = BuildError::Configuration("`react` is both included and excluded".to_string());
        assert!(err.to_string().starts_with("configuration error:"));
        assert!(err.diagnostics().is_empty());
    }

    #[test]
    fn test_engine_bundle_error_converts() {
        let engine = EngineError::Bundle(vec![Diagnostic::error(
            codes::MISSING_ANNOTATION,
            "missing type",
        )]);
        let err = BuildError::from(engine);
        assert!(matches!(err, BuildError::Engine(ref d) if d.len() == 1));
    }
}
