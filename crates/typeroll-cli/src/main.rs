//! Typeroll command-line tool
//!
//! Bundles a TypeScript project's declarations into one `.d.ts` file
//! per entry point. Runs from the package root; when no entry is
//! given it guesses the conventional locations.

use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use std::path::PathBuf;
use typeroll::{BuildOptions, BuildResult, CompilerOverrides, EntryPoints};

mod output;

#[derive(Parser)]
#[command(name = "typeroll")]
#[command(about = "Bundle TypeScript declarations into a single .d.ts per entry", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    build: BuildArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle declaration files (the default when no subcommand is given)
    Build(BuildArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Entry files; chunk names derive from their file stems
    entries: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "dist")]
    outdir: PathBuf,

    /// Bundle these package dependencies instead of keeping them external
    #[arg(short, long)]
    include: Vec<String>,

    /// Keep these modules external even when imported
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Resolve these import specifiers to an empty module
    #[arg(long)]
    empty: Vec<String>,

    /// Rewrite import specifiers, given as FROM=TO; the replacement stays external
    #[arg(long)]
    alias: Vec<String>,

    /// Rewrite a lone default export into `export =` form
    #[arg(long)]
    cjs: bool,

    /// Restore the previous output for this directory instead of rebuilding
    #[arg(long)]
    reuse_last_output: bool,

    /// Require every export to carry an explicit type annotation
    #[arg(long)]
    isolated_declarations: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let args = match cli.command {
        Some(Commands::Build(args)) => args,
        None => cli.build,
    };

    let options = build_options(args)?;
    match typeroll::build(options) {
        Ok(result) => {
            report(&result);
            Ok(())
        }
        Err(e) => {
            output::render_error(&e);
            std::process::exit(1);
        }
    }
}

/// Translate parsed arguments into library options.
fn build_options(args: BuildArgs) -> anyhow::Result<BuildOptions> {
    let entry_points = if args.entries.is_empty() {
        EntryPoints::One(guess_entry()?)
    } else {
        EntryPoints::Many(args.entries)
    };
    Ok(BuildOptions {
        entry_points,
        outdir: args.outdir,
        include: args.include,
        exclude: args.exclude,
        empty: args.empty,
        alias: parse_alias(&args.alias)?,
        cjs: args.cjs,
        reuse_last_output: args.reuse_last_output,
        compiler_options: CompilerOverrides {
            isolated_declarations: args.isolated_declarations.then_some(true),
            ..CompilerOverrides::default()
        },
    })
}

/// Conventional entry locations, tried in order.
fn guess_entry() -> anyhow::Result<PathBuf> {
    for candidate in ["index.ts", "src/index.ts", "src/index.tsx"] {
        let path = PathBuf::from(candidate);
        if path.is_file() {
            return Ok(path);
        }
    }
    anyhow::bail!("no entry point given and none of index.ts, src/index.ts, src/index.tsx exists")
}

fn parse_alias(pairs: &[String]) -> anyhow::Result<IndexMap<String, String>> {
    let mut alias = IndexMap::new();
    for pair in pairs {
        let Some((from, to)) = pair.split_once('=') else {
            anyhow::bail!("alias `{pair}` is not of the form FROM=TO");
        };
        alias.insert(from.to_string(), to.to_string());
    }
    Ok(alias)
}

fn report(result: &BuildResult) {
    for warning in &result.warnings {
        output::render_diagnostic(warning);
    }
    let files: Vec<&str> = result
        .output
        .iter()
        .map(|chunk| chunk.file_name.as_str())
        .collect();
    println!(
        "Built {} in {}ms",
        files.join(", "),
        result.elapsed.as_millis()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cli: Cli) -> BuildArgs {
        match cli.command {
            Some(Commands::Build(args)) => args,
            None => cli.build,
        }
    }

    #[test]
    fn test_alias_splits_on_first_equals() {
        let alias = parse_alias(&["old=new".to_string(), "a=b=c".to_string()]).unwrap();
        assert_eq!(alias.get("old").map(String::as_str), Some("new"));
        assert_eq!(alias.get("a").map(String::as_str), Some("b=c"));
    }

    #[test]
    fn test_alias_without_equals_is_rejected() {
        assert!(parse_alias(&["broken".to_string()]).is_err());
    }

    #[test]
    fn test_bare_invocation_parses_like_build_subcommand() {
        let explicit =
            args_of(Cli::try_parse_from(["typeroll", "build", "src/a.ts", "--cjs"]).unwrap());
        let bare = args_of(Cli::try_parse_from(["typeroll", "src/a.ts", "--cjs"]).unwrap());
        assert_eq!(explicit.entries, bare.entries);
        assert_eq!(explicit.entries, vec![PathBuf::from("src/a.ts")]);
        assert!(explicit.cjs);
        assert!(bare.cjs);
    }

    #[test]
    fn test_outdir_defaults_to_dist() {
        let args = args_of(Cli::try_parse_from(["typeroll"]).unwrap());
        assert_eq!(args.outdir, PathBuf::from("dist"));
        assert!(args.entries.is_empty());
        assert!(!args.reuse_last_output);
    }

    #[test]
    fn test_repeated_flags_accumulate() {
        let args = args_of(
            Cli::try_parse_from([
                "typeroll",
                "--include",
                "react",
                "--include",
                "vue",
                "--empty",
                "fs",
            ])
            .unwrap(),
        );
        assert_eq!(args.include, vec!["react", "vue"]);
        assert_eq!(args.empty, vec!["fs"]);
    }
}
