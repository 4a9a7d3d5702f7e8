//! Bundler-oracle resolution for specifiers the asset plugins declined.
//!
//! Projects lean on bundler config the declaration engine cannot see:
//! tsconfig `paths` mappings, a `baseUrl` root, packages whose types sit
//! next to their sources. This plugin answers the question "where would a
//! bundler load this from?", claims the result when it is a declaration
//! or TypeScript source, and declines compiled script output so default
//! resolution can look for the types instead. Every failure is silent;
//! the oracle is a best-effort layer on top of default resolution.

use std::fs;
use std::path::{Path, PathBuf};
use typeroll_engine::resolver::normalize_path;
use typeroll_engine::{ExternalPattern, Plugin, Resolution, ResolveCtx};

/// Extension probe order, matching what bundlers try for an import
/// written without an extension.
const PROBE_EXTENSIONS: [&str; 6] = [".ts", ".tsx", ".d.ts", ".js", ".mjs", ".cjs"];

pub(crate) struct OraclePlugin {
    externals: Vec<ExternalPattern>,
}

impl OraclePlugin {
    /// External specifiers are never offered to the oracle; resolving
    /// them into `node_modules` would bundle what must stay an import.
    pub(crate) fn new(externals: Vec<ExternalPattern>) -> Self {
        Self { externals }
    }

    fn resolve_like_bundler(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        let base = importer.parent().unwrap_or(Path::new("."));
        if Path::new(specifier).is_absolute() {
            return probe(Path::new(specifier));
        }
        if specifier.starts_with("./") || specifier.starts_with("../") {
            return probe(&normalize_path(&base.join(specifier)));
        }
        if let Some((dir, config)) = find_tsconfig(base) {
            if let Some(found) = resolve_with_tsconfig(specifier, &dir, &config) {
                return Some(found);
            }
        }
        for dir in base.ancestors() {
            let package_root = dir.join("node_modules").join(specifier);
            if let Some(found) = resolve_package(&package_root) {
                return Some(found);
            }
        }
        None
    }
}

impl Plugin for OraclePlugin {
    fn name(&self) -> &str {
        "oracle"
    }

    fn resolve(&self, specifier: &str, ctx: &ResolveCtx<'_>) -> Option<Resolution> {
        if ctx.is_entry || specifier.starts_with('\0') {
            return None;
        }
        if self.externals.iter().any(|p| p.matches(specifier)) {
            return None;
        }
        let found = self.resolve_like_bundler(specifier, ctx.importer)?;
        let as_text = found.to_string_lossy();
        if as_text.ends_with(".js") || as_text.ends_with(".mjs") || as_text.ends_with(".cjs") {
            return None;
        }
        Some(Resolution::File(found))
    }
}

/// Probe a path the way a bundler does: as written, then with appended
/// extensions, then as a directory with an index file.
fn probe(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    let raw = base.as_os_str().to_string_lossy();
    for ext in PROBE_EXTENSIONS {
        let candidate = PathBuf::from(format!("{raw}{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    for ext in PROBE_EXTENSIONS {
        let candidate = base.join(format!("index{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Nearest tsconfig above `base`, parsed leniently. An unreadable or
/// unparsable file ends the search; config this close is the one the
/// project meant.
fn find_tsconfig(base: &Path) -> Option<(PathBuf, serde_json::Value)> {
    for dir in base.ancestors() {
        let candidate = dir.join("tsconfig.json");
        if candidate.is_file() {
            let text = fs::read_to_string(&candidate).ok()?;
            return parse_jsonc(&text).map(|config| (dir.to_path_buf(), config));
        }
    }
    None
}

fn resolve_with_tsconfig(
    specifier: &str,
    dir: &Path,
    config: &serde_json::Value,
) -> Option<PathBuf> {
    let options = config.get("compilerOptions")?;
    let base_url = options.get("baseUrl").and_then(|v| v.as_str());
    let root = dir.join(base_url.unwrap_or("."));
    if let Some(paths) = options.get("paths").and_then(|v| v.as_object()) {
        for (pattern, targets) in paths {
            let Some(captured) = match_paths_pattern(pattern, specifier) else {
                continue;
            };
            let Some(targets) = targets.as_array() else {
                continue;
            };
            for target in targets.iter().filter_map(|t| t.as_str()) {
                let substituted = target.replacen('*', captured, 1);
                if let Some(found) = probe(&normalize_path(&root.join(substituted))) {
                    return Some(found);
                }
            }
        }
    }
    if base_url.is_some() {
        if let Some(found) = probe(&normalize_path(&root.join(specifier))) {
            return Some(found);
        }
    }
    None
}

/// Captured text for a `paths` pattern, where `*` spans any run. A
/// starless pattern must match exactly and captures nothing.
fn match_paths_pattern<'a>(pattern: &str, specifier: &'a str) -> Option<&'a str> {
    match pattern.split_once('*') {
        None => (pattern == specifier).then_some(""),
        Some((prefix, suffix)) => specifier
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix)),
    }
}

/// Resolve inside a `node_modules/<specifier>` root: a direct file hit,
/// the manifest's entry fields, then an index probe.
fn resolve_package(root: &Path) -> Option<PathBuf> {
    if root.is_file() {
        return Some(root.to_path_buf());
    }
    if let Ok(text) = fs::read_to_string(root.join("package.json")) {
        if let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&text) {
            for field in ["module", "main"] {
                if let Some(rel) = manifest.get(field).and_then(|v| v.as_str()) {
                    if let Some(found) = probe(&normalize_path(&root.join(rel))) {
                        return Some(found);
                    }
                }
            }
        }
    }
    probe(root)
}

/// tsconfig files allow comments and trailing commas; strip both and
/// hand the rest to the JSON parser.
fn parse_jsonc(text: &str) -> Option<serde_json::Value> {
    serde_json::from_str(&strip_trailing_commas(&strip_comments(text))).ok()
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                while let Some(s) = chars.next() {
                    out.push(s);
                    match s {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '/' => match chars.peek() {
                Some('/') => {
                    while let Some(&next) = chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        chars.next();
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    while let Some(next) = chars.next() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        prev = next;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out
}

fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            out.push(c);
            while let Some(s) = chars.next() {
                out.push(s);
                match s {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => {}
                }
            }
            continue;
        }
        if c == ',' {
            let mut lookahead = chars.clone();
            while lookahead.peek().is_some_and(|next| next.is_whitespace()) {
                lookahead.next();
            }
            if matches!(lookahead.peek(), Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
