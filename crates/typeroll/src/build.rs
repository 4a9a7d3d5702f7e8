//! The build pipeline: classify externals, assemble the plugin chain,
//! run the engine, write or restore output.

use crate::assets::{AliasPlugin, AssetPlugin, EmptyPlugin, InlinePlugin, JsonPlugin, Spill};
use crate::cache;
use crate::cjs::CjsDefaultExportPlugin;
use crate::classifier;
use crate::comments::FoldingReader;
use crate::error::BuildError;
use crate::options::BuildOptions;
use crate::oracle::OraclePlugin;
use std::rc::Rc;
use std::time::{Duration, Instant};
use typeroll_engine::{
    codes, CompilerOptions, Diagnostic, EngineBuilder, ExternalPattern, OutputChunk, OutputPlugin,
};

/// Warning codes swallowed by default. Declaration graphs routinely
/// import things only the runtime bundler can see, so these would fire
/// on almost every real project. Error-severity diagnostics with the
/// same codes still fail the build.
const SUPPRESSED_WARNINGS: [&str; 3] = [
    codes::UNRESOLVED_IMPORT,
    codes::CIRCULAR_DEPENDENCY,
    codes::EMPTY_BUNDLE,
];

/// Outcome of a [`build`] call.
#[derive(Debug)]
pub struct BuildResult {
    /// Emitted chunks in entry order, post output plugins.
    pub output: Vec<OutputChunk>,
    pub elapsed: Duration,
    /// True when the output came from the cache instead of the engine.
    pub reused: bool,
    /// Warnings that survived suppression; empty on a reused build.
    pub warnings: Vec<Diagnostic>,
}

/// Bundle the entry points' declarations into `outdir`.
pub fn build(options: BuildOptions) -> Result<BuildResult, BuildError> {
    options.validate()?;

    if options.reuse_last_output {
        let start = Instant::now();
        if let Some(output) = cache::restore(&options.outdir) {
            return Ok(BuildResult {
                output,
                elapsed: start.elapsed(),
                reused: true,
                warnings: Vec::new(),
            });
        }
    }

    let start = Instant::now();
    let entries = options.entry_points.clone().into_named()?;
    let mut externals = match entries.first() {
        Some((_, path)) => classifier::external_set(path, &options.include)?,
        None => Vec::new(),
    };
    externals.extend(options.exclude.iter().map(ExternalPattern::new));

    let spill = Rc::new(Spill::new()?);
    let mut builder = EngineBuilder::new()
        .compiler_options(options.compiler_options.apply(CompilerOptions::default()))
        .externals(externals.iter().cloned())
        .source_reader(Box::new(FoldingReader));
    for (name, path) in &entries {
        builder = builder.entry(name.clone(), path.clone());
    }
    if !options.alias.is_empty() {
        builder = builder.plugin(Box::new(AliasPlugin::new(options.alias.clone())));
    }
    if !options.empty.is_empty() {
        builder = builder.plugin(Box::new(EmptyPlugin::new(&options.empty, spill.clone())));
    }
    let engine = builder
        .plugin(Box::new(JsonPlugin::new(spill.clone())))
        .plugin(Box::new(AssetPlugin::new(spill.clone())))
        .plugin(Box::new(InlinePlugin::new(spill)))
        .plugin(Box::new(OraclePlugin::new(externals)))
        .build();

    let bundle = engine.bundle()?;
    // Write consumes the bundle; pull the surviving warnings out first.
    let warnings = surviving_warnings(&bundle.diagnostics);

    let output_plugins: Vec<Box<dyn OutputPlugin>> = if options.cjs {
        vec![Box::new(CjsDefaultExportPlugin)]
    } else {
        Vec::new()
    };
    let output = bundle.write(&options.outdir, &output_plugins)?;

    if options.reuse_last_output {
        cache::save(&options.outdir, &output)?;
    } else {
        // A fresh write makes any cached entry for this directory stale.
        cache::invalidate(&options.outdir)?;
    }

    Ok(BuildResult {
        output,
        elapsed: start.elapsed(),
        reused: false,
        warnings,
    })
}

fn surviving_warnings(diagnostics: &[Diagnostic]) -> Vec<Diagnostic> {
    diagnostics
        .iter()
        .filter(|d| !d.is_error() && !SUPPRESSED_WARNINGS.contains(&d.code))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routine_warning_codes_suppressed() {
        let diagnostics = vec![
            Diagnostic::warning(codes::UNRESOLVED_IMPORT, "cannot resolve `./style.css`"),
            Diagnostic::warning(codes::CIRCULAR_DEPENDENCY, "a -> b -> a"),
            Diagnostic::warning(codes::EMPTY_BUNDLE, "no exports"),
            Diagnostic::warning(codes::MISSING_EXPORT, "`helper` is not exported"),
        ];
        let surviving = surviving_warnings(&diagnostics);
        assert_eq!(surviving.len(), 1);
        assert_eq!(surviving[0].code, codes::MISSING_EXPORT);
    }

    #[test]
    fn test_errors_never_enter_the_warning_stream() {
        let diagnostics = vec![Diagnostic::error(codes::PARSE_ERROR, "unexpected token")];
        assert!(surviving_warnings(&diagnostics).is_empty());
    }
}
