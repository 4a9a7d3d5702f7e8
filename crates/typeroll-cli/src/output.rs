//! Colored diagnostic rendering for the terminal.
//!
//! Uses `termcolor` for cross-platform colored output and respects
//! the `NO_COLOR` environment variable.

use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use typeroll::{BuildError, Diagnostic, Severity};

/// Resolve `ColorChoice` from the environment.
fn resolve_color_choice() -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

/// Print one diagnostic to stderr.
pub fn render_diagnostic(diagnostic: &Diagnostic) {
    let mut stderr = StandardStream::stderr(resolve_color_choice());
    let _ = write_diagnostic(&mut stderr, diagnostic);
}

/// Print a build failure to stderr.
///
/// Engine failures carry structured diagnostics and render one line
/// per diagnostic plus a summary. Everything else renders its
/// `Display` form.
pub fn render_error(error: &BuildError) {
    let mut stderr = StandardStream::stderr(resolve_color_choice());
    let _ = write_error(&mut stderr, error);
}

fn write_error(out: &mut StandardStream, error: &BuildError) -> io::Result<()> {
    for diagnostic in error.diagnostics() {
        write_diagnostic(out, diagnostic)?;
    }
    out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(out, "error")?;
    out.reset()?;
    writeln!(out, ": {}", error)
}

fn write_diagnostic(out: &mut StandardStream, diagnostic: &Diagnostic) -> io::Result<()> {
    if let (Some(file), Some(line), Some(column)) =
        (&diagnostic.file, diagnostic.line, diagnostic.column)
    {
        out.set_color(ColorSpec::new().set_bold(true))?;
        write!(out, "{}:{}:{}: ", file.display(), line, column)?;
        out.reset()?;
    } else if let Some(file) = &diagnostic.file {
        out.set_color(ColorSpec::new().set_bold(true))?;
        write!(out, "{}: ", file.display())?;
        out.reset()?;
    }

    let (label, color) = match diagnostic.severity {
        Severity::Error => ("error", Color::Red),
        Severity::Warning => ("warning", Color::Yellow),
    };
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{}[{}]", label, diagnostic.code)?;
    out.reset()?;
    writeln!(out, ": {}", diagnostic.message)?;

    if let Some(frame) = &diagnostic.frame {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        writeln!(out, "{}", frame)?;
        out.reset()?;
    }
    Ok(())
}
