//! Default module resolution.
//!
//! Relative specifiers resolve with extension probing the way a
//! declaration-aware compiler does; bare specifiers walk ancestor
//! `node_modules` directories honoring the package `types`/`typings`
//! manifest field, with an `@types/*` fallback. Plugins run before any of
//! this and external patterns short-circuit it entirely.

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Extensions a resolved module may carry. Anything else is not a
/// declaration source and is left unresolved.
const SOURCE_EXTENSIONS: [&str; 3] = ["ts", "tsx", "d.ts"];

/// Script-output extensions rewritten back to their source during probing
/// (ESM-style sources import `./mod.js` while shipping `mod.ts`).
const SCRIPT_EXTENSIONS: [&str; 3] = [".js", ".mjs", ".cjs"];

/// A module name treated as external. A pattern for `name` matches exactly
/// `name`, `name/...` and `name\...`, never `namefoo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalPattern {
    name: String,
}

impl ExternalPattern {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, specifier: &str) -> bool {
        match specifier.strip_prefix(self.name.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('/') || rest.starts_with('\\'),
            None => false,
        }
    }
}

/// Minimal slice of a package manifest: the fields that point at types.
#[derive(Debug, Deserialize, Default)]
struct PackageManifest {
    types: Option<String>,
    typings: Option<String>,
    main: Option<String>,
}

/// Resolve a relative or absolute specifier against the importing file's
/// directory. Returns `None` when nothing declaration-bearing exists.
pub fn resolve_relative(specifier: &str, importer_dir: &Path) -> Option<PathBuf> {
    let joined = normalize_path(&importer_dir.join(specifier));
    probe(&joined)
}

/// Resolve an entry-point path with the same probing as a relative import.
pub fn resolve_entry(path: &Path) -> Option<PathBuf> {
    probe(&normalize_path(path))
}

/// Resolve a bare specifier through ancestor `node_modules` directories.
pub fn resolve_bare(specifier: &str, importer_dir: &Path) -> Option<PathBuf> {
    let (package, subpath) = split_package_specifier(specifier);

    for ancestor in importer_dir.ancestors() {
        let modules = ancestor.join("node_modules");
        if !modules.is_dir() {
            continue;
        }
        if let Some(found) = resolve_in_package(&modules.join(package), subpath) {
            return Some(found);
        }
        // DefinitelyTyped fallback: @types/name, scopes flattened
        let types_name = if let Some(scoped) = package.strip_prefix('@') {
            scoped.replace('/', "__")
        } else {
            package.to_string()
        };
        let types_dir = modules.join("@types").join(types_name);
        if let Some(found) = resolve_in_package(&types_dir, subpath) {
            return Some(found);
        }
    }
    None
}

/// Resolve inside one package directory: subpath probing, or the manifest
/// `types`/`typings` field, or `index.d.ts`.
fn resolve_in_package(package_dir: &Path, subpath: Option<&str>) -> Option<PathBuf> {
    if !package_dir.is_dir() {
        return None;
    }

    if let Some(sub) = subpath {
        return probe(&normalize_path(&package_dir.join(sub)));
    }

    let manifest_path = package_dir.join("package.json");
    if let Ok(text) = std::fs::read_to_string(&manifest_path) {
        if let Ok(manifest) = serde_json::from_str::<PackageManifest>(&text) {
            let declared = manifest.types.or(manifest.typings).or_else(|| {
                // No types field: the main entry often sits next to a
                // same-named .d.ts
                manifest
                    .main
                    .map(|m| SCRIPT_EXTENSIONS.iter().fold(m, |m, ext| {
                        m.strip_suffix(ext).map(|s| format!("{s}.d.ts")).unwrap_or(m)
                    }))
            });
            if let Some(types) = declared {
                if let Some(found) = probe(&normalize_path(&package_dir.join(types))) {
                    return Some(found);
                }
            }
        }
    }

    probe(&normalize_path(&package_dir.join("index")))
}

/// Probe a normalized base path for a declaration source: extension
/// additions first, the exact path if it already carries a source
/// extension, then a directory `index.*`.
fn probe(base: &Path) -> Option<PathBuf> {
    let text = base.to_string_lossy();

    // `./mod.js` written in an ESM-style source maps back to `mod.ts`
    for script in SCRIPT_EXTENSIONS {
        if let Some(stem) = text.strip_suffix(script) {
            for ext in SOURCE_EXTENSIONS {
                let candidate = PathBuf::from(format!("{stem}.{ext}"));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }

    for ext in SOURCE_EXTENSIONS {
        let candidate = PathBuf::from(format!("{text}.{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    if base.is_file() && has_source_extension(&text) {
        return Some(base.to_path_buf());
    }

    if base.is_dir() {
        for ext in SOURCE_EXTENSIONS {
            let candidate = base.join(format!("index.{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    None
}

pub(crate) fn has_source_extension(path: &str) -> bool {
    SOURCE_EXTENSIONS.iter().any(|ext| {
        path.strip_suffix(ext)
            .map(|stem| stem.ends_with('.'))
            .unwrap_or(false)
    })
}

/// Split a bare specifier into package name and optional subpath,
/// honoring `@scope/name` forms.
fn split_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    let segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut index = 0;
    for _ in 0..segments {
        match specifier[index..].find('/') {
            Some(pos) => index += pos + 1,
            None => return (specifier, None),
        }
    }
    (&specifier[..index - 1], Some(&specifier[index..]))
}

/// Logical normalization: resolve `.` and `..` components without
/// touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            Component::CurDir => {}
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_temp_project() -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("src")).unwrap();
        (temp, root)
    }

    #[test]
    fn test_external_pattern_boundaries() {
        let pattern = ExternalPattern::new("react");
        assert!(pattern.matches("react"));
        assert!(pattern.matches("react/jsx-runtime"));
        assert!(pattern.matches("react\\jsx-runtime"));
        assert!(!pattern.matches("react-dom"));
        assert!(!pattern.matches("preact"));
    }

    #[test]
    fn test_relative_extension_probing() {
        let (_temp, root) = create_temp_project();
        let src = root.join("src");
        fs::write(src.join("util.ts"), "export const u = 1;\n").unwrap();

        let resolved = resolve_relative("./util", &src).unwrap();
        assert_eq!(resolved, src.join("util.ts"));

        // Explicit extension resolves to the exact file
        let resolved = resolve_relative("./util.ts", &src).unwrap();
        assert_eq!(resolved, src.join("util.ts"));
    }

    #[test]
    fn test_relative_prefers_ts_over_dts() {
        let (_temp, root) = create_temp_project();
        let src = root.join("src");
        fs::write(src.join("both.ts"), "export const a = 1;\n").unwrap();
        fs::write(src.join("both.d.ts"), "export declare const a: number;\n").unwrap();

        let resolved = resolve_relative("./both", &src).unwrap();
        assert_eq!(resolved, src.join("both.ts"));
    }

    #[test]
    fn test_relative_directory_index() {
        let (_temp, root) = create_temp_project();
        let dir = root.join("src").join("nested");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.ts"), "export const n = 1;\n").unwrap();

        let resolved = resolve_relative("./nested", &root.join("src")).unwrap();
        assert_eq!(resolved, dir.join("index.ts"));
    }

    #[test]
    fn test_script_extension_rewritten_to_source() {
        let (_temp, root) = create_temp_project();
        let src = root.join("src");
        fs::write(src.join("esm.ts"), "export const e = 1;\n").unwrap();

        let resolved = resolve_relative("./esm.js", &src).unwrap();
        assert_eq!(resolved, src.join("esm.ts"));
    }

    #[test]
    fn test_non_declaration_file_not_resolved() {
        let (_temp, root) = create_temp_project();
        let src = root.join("src");
        fs::write(src.join("style.css"), ".a { color: red }\n").unwrap();

        assert!(resolve_relative("./style.css", &src).is_none());
    }

    #[test]
    fn test_bare_specifier_types_field() {
        let (_temp, root) = create_temp_project();
        let pkg = root.join("node_modules").join("somelib");
        fs::create_dir_all(pkg.join("dist")).unwrap();
        fs::write(
            pkg.join("package.json"),
            r#"{"name":"somelib","types":"dist/main.d.ts"}"#,
        )
        .unwrap();
        fs::write(pkg.join("dist").join("main.d.ts"), "export declare const x: number;\n")
            .unwrap();

        let resolved = resolve_bare("somelib", &root.join("src")).unwrap();
        assert_eq!(resolved, pkg.join("dist").join("main.d.ts"));
    }

    #[test]
    fn test_bare_specifier_index_fallback_and_subpath() {
        let (_temp, root) = create_temp_project();
        let pkg = root.join("node_modules").join("@scope").join("lib");
        fs::create_dir_all(pkg.join("sub")).unwrap();
        fs::write(pkg.join("index.d.ts"), "export {};\n").unwrap();
        fs::write(pkg.join("sub").join("extra.d.ts"), "export {};\n").unwrap();

        let resolved = resolve_bare("@scope/lib", &root.join("src")).unwrap();
        assert_eq!(resolved, pkg.join("index.d.ts"));

        let resolved = resolve_bare("@scope/lib/sub/extra", &root.join("src")).unwrap();
        assert_eq!(resolved, pkg.join("sub").join("extra.d.ts"));
    }

    #[test]
    fn test_bare_specifier_at_types_fallback() {
        let (_temp, root) = create_temp_project();
        let types = root.join("node_modules").join("@types").join("plain");
        fs::create_dir_all(&types).unwrap();
        fs::write(types.join("index.d.ts"), "export declare const t: string;\n").unwrap();

        let resolved = resolve_bare("plain", &root.join("src")).unwrap();
        assert_eq!(resolved, types.join("index.d.ts"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize_path(Path::new("./x/y/..")), PathBuf::from("x"));
    }

    #[test]
    fn test_split_package_specifier() {
        assert_eq!(split_package_specifier("react"), ("react", None));
        assert_eq!(
            split_package_specifier("react/jsx-runtime"),
            ("react", Some("jsx-runtime"))
        );
        assert_eq!(split_package_specifier("@types/node"), ("@types/node", None));
        assert_eq!(
            split_package_specifier("@scope/lib/sub/extra"),
            ("@scope/lib", Some("sub/extra"))
        );
    }
}
