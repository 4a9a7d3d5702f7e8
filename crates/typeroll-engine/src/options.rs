//! Engine configuration.

/// Compiler options consumed by the engine.
///
/// The defaults are the fixed baseline for declaration bundling:
/// declaration-only emission, no emit on error, skip library checking and
/// strip `@internal`-tagged declarations. Callers merge their overrides on
/// top; the engine extracts types, it does not verify them, so there are no
/// strictness switches here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Emit declarations. Always true for this engine; kept so caller
    /// overrides round-trip unchanged.
    pub declaration: bool,
    /// Emit nothing but declarations. Same note as `declaration`.
    pub emit_declaration_only: bool,
    /// Fail the bundle when any error-severity diagnostic was produced.
    pub no_emit_on_error: bool,
    /// Pass `.d.ts` sources through without annotation checking.
    pub skip_lib_check: bool,
    /// Drop declarations whose doc comment carries an `@internal` tag.
    pub strip_internal: bool,
    /// Emit every file in isolation instead of building a program first.
    pub isolated_declarations: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            declaration: true,
            emit_declaration_only: true,
            no_emit_on_error: true,
            skip_lib_check: true,
            strip_internal: true,
            isolated_declarations: false,
        }
    }
}

impl CompilerOptions {
    /// The emission backend these options select.
    pub fn backend(&self) -> EmitBackend {
        if self.isolated_declarations {
            EmitBackend::Isolated
        } else {
            EmitBackend::Program
        }
    }
}

/// How declarations are extracted from the module graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitBackend {
    /// Build the whole module table eagerly and validate cross-module
    /// imports before emitting.
    #[default]
    Program,
    /// Emit file by file; the eager program build is skipped entirely.
    Isolated,
}
