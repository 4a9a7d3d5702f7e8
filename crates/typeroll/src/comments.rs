//! Triple-slash comment folding.
//!
//! Declaration emitters keep `/** ... */` doc comments attached to the
//! statements that follow them but treat `///` lines as plain trivia and
//! drop them. Folding rewrites each run of `///` lines into one block
//! comment before the scanner sees the source, so those docs survive
//! into the bundle.

use std::fs;
use std::io;
use std::path::Path;
use typeroll_engine::SourceReader;

/// Rewrites every run of consecutive `///` lines into a `/** ... */`
/// block. A run is a maximal group of adjacent lines whose indentation
/// is byte-identical; lines with other indentation start a new run.
/// Everything else passes through unchanged.
pub fn fold_triple_slash(source: &str) -> String {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < lines.len() {
        let Some(indent) = doc_indent(lines[i]) else {
            out.push_str(lines[i]);
            i += 1;
            continue;
        };
        let mut j = i + 1;
        while j < lines.len() && doc_indent(lines[j]) == Some(indent) {
            j += 1;
        }
        let texts: Vec<String> = lines[i..j]
            .iter()
            .map(|line| marker_text(line, indent))
            .collect();
        if texts.len() == 1 {
            out.push_str(indent);
            out.push_str("/** ");
            out.push_str(texts[0].trim_end());
            out.push_str(" */\n");
        } else {
            out.push_str(indent);
            out.push_str("/**\n");
            for text in &texts {
                out.push_str(indent);
                out.push_str(" * ");
                out.push_str(text);
                out.push('\n');
            }
            out.push_str(indent);
            out.push_str(" */\n");
        }
        i = j;
    }
    out
}

/// Indentation of a foldable line. A final line without a newline stays
/// as-is; folding it would extend the comment past the original text.
fn doc_indent(line: &str) -> Option<&str> {
    if !line.ends_with('\n') {
        return None;
    }
    let trimmed = line.trim_start_matches([' ', '\t']);
    if !trimmed.starts_with("///") {
        return None;
    }
    Some(&line[..line.len() - trimmed.len()])
}

/// Text after the `///` marker, minus one leading space and the line
/// terminator. A literal `*/` in the text would close the folded block
/// early, so a zero-width space splits it.
fn marker_text(line: &str, indent: &str) -> String {
    let rest = &line[indent.len() + 3..];
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    let rest = rest.strip_suffix('\n').unwrap_or(rest);
    let rest = rest.strip_suffix('\r').unwrap_or(rest);
    rest.replace("*/", "*\u{200B}/")
}

/// Source reader that folds `///` runs on the way in. Files under a
/// `node_modules` directory pass through untouched; dependency sources
/// are not ours to rewrite.
#[derive(Debug, Default)]
pub struct FoldingReader;

impl SourceReader for FoldingReader {
    fn read(&self, path: &Path) -> io::Result<String> {
        let source = fs::read_to_string(path)?;
        if path.components().any(|c| c.as_os_str() == "node_modules") {
            return Ok(source);
        }
        Ok(fold_triple_slash(&source))
    }
}
