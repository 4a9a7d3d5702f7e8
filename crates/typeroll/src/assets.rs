//! Specifier interception ahead of default resolution: alias rewrites,
//! emptied modules, JSON imports, stylesheets and media assets, and
//! `?inline` text imports.
//!
//! Interception order is fixed and first match wins: alias, empty
//! patterns, JSON, stylesheet/media, inline. Generated module content is
//! materialized into a build-scoped temp directory because the engine
//! reads every module by path through its source reader.

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use typeroll_engine::resolver::normalize_path;
use typeroll_engine::{ExternalPattern, Plugin, Resolution, ResolveCtx};

/// Stylesheet extensions, with or without a query suffix.
static CSS_LANGS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.(css|less|sass|scss|styl|stylus|pcss|postcss|sss)(?:$|\?)").unwrap()
});

/// Image, media, font and document extensions, optional query suffix.
static ASSETS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\.(apng|png|jpe?g|jfif|pjpeg|pjp|gif|svg|ico|webp|avif|mp4|webm|ogg|mp3|wav|flac|aac|opus|mov|m4a|vtt|woff2?|eot|ttf|otf|webmanifest|pdf|txt)(\?.*)?$",
    )
    .unwrap()
});

const INLINE_PLACEHOLDER: &str = "declare const __inline: string;\nexport default __inline;\n";

/// Build-scoped directory holding materialized virtual modules. One temp
/// file per distinct key; the directory and everything in it is removed
/// when the last handle drops, whether the build succeeded or not.
#[derive(Debug)]
pub(crate) struct Spill {
    dir: tempfile::TempDir,
    files: RefCell<FxHashMap<String, PathBuf>>,
}

impl Spill {
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::TempDir::with_prefix("typeroll-")?,
            files: RefCell::new(FxHashMap::default()),
        })
    }

    /// Path of the temp file holding `content`. Repeat keys return the
    /// first path, so every import of one source maps to one module.
    fn materialize(&self, key: &str, content: &str) -> io::Result<PathBuf> {
        if let Some(path) = self.files.borrow().get(key) {
            return Ok(path.clone());
        }
        // Index prefix keeps distinct keys distinct after sanitizing.
        let name = format!("{}-{}.ts", self.files.borrow().len(), sanitize(key));
        let path = self.dir.path().join(name);
        fs::write(&path, content)?;
        self.files.borrow_mut().insert(key.to_string(), path.clone());
        Ok(path)
    }
}

fn sanitize(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '+'
            }
        })
        .collect();
    name.truncate(64);
    name
}

/// Rewrites import specifiers through the alias map. The replacement is
/// re-offered to the chain starting from this plugin, which reclaims it
/// and pins it external; an identity mapping is shorthand for external.
#[derive(Debug)]
pub(crate) struct AliasPlugin {
    map: IndexMap<String, String>,
    pending: RefCell<FxHashSet<String>>,
}

impl AliasPlugin {
    pub(crate) fn new(map: IndexMap<String, String>) -> Self {
        Self {
            map,
            pending: RefCell::new(FxHashSet::default()),
        }
    }
}

impl Plugin for AliasPlugin {
    fn name(&self) -> &str {
        "alias"
    }

    fn resolve(&self, specifier: &str, ctx: &ResolveCtx<'_>) -> Option<Resolution> {
        if ctx.is_entry {
            return None;
        }
        if self.pending.borrow_mut().remove(specifier) {
            return Some(Resolution::External);
        }
        let replacement = self.map.get(specifier)?;
        if replacement == specifier {
            return Some(Resolution::External);
        }
        self.pending.borrow_mut().insert(replacement.clone());
        Some(Resolution::Redirect(replacement.clone()))
    }
}

/// Resolves configured module name patterns to an empty module.
#[derive(Debug)]
pub(crate) struct EmptyPlugin {
    patterns: Vec<ExternalPattern>,
    spill: Rc<Spill>,
}

impl EmptyPlugin {
    pub(crate) fn new(names: &[String], spill: Rc<Spill>) -> Self {
        Self {
            patterns: names.iter().map(ExternalPattern::new).collect(),
            spill,
        }
    }
}

impl Plugin for EmptyPlugin {
    fn name(&self) -> &str {
        "empty"
    }

    fn resolve(&self, specifier: &str, ctx: &ResolveCtx<'_>) -> Option<Resolution> {
        if ctx.is_entry || !self.patterns.iter().any(|p| p.matches(specifier)) {
            return None;
        }
        self.spill.materialize("empty", "").ok().map(Resolution::File)
    }
}

/// Resolves relative and absolute `.json` imports to a declaration module
/// shaped by the JSON value. Bare specifiers stay with default resolution,
/// and unreadable files decline so the unresolved-import path reports them.
#[derive(Debug)]
pub(crate) struct JsonPlugin {
    spill: Rc<Spill>,
}

impl JsonPlugin {
    pub(crate) fn new(spill: Rc<Spill>) -> Self {
        Self { spill }
    }
}

impl Plugin for JsonPlugin {
    fn name(&self) -> &str {
        "json"
    }

    fn resolve(&self, specifier: &str, ctx: &ResolveCtx<'_>) -> Option<Resolution> {
        if ctx.is_entry || !specifier.ends_with(".json") {
            return None;
        }
        let path = if Path::new(specifier).is_absolute() {
            PathBuf::from(specifier)
        } else if specifier.starts_with("./") || specifier.starts_with("../") {
            ctx.importer.parent()?.join(specifier)
        } else {
            return None;
        };
        let path = normalize_path(&path);
        let text = fs::read_to_string(&path).ok()?;
        // Malformed JSON still claims the import; an empty module keeps
        // the build going without inventing a shape.
        let declaration = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => json_declaration(&value),
            Err(_) => String::new(),
        };
        self.spill
            .materialize(&path.to_string_lossy(), &declaration)
            .ok()
            .map(Resolution::File)
    }
}

fn json_declaration(value: &serde_json::Value) -> String {
    format!(
        "declare const data: {};\nexport default data;\n",
        json_type(value)
    )
}

/// Widened TypeScript type of a JSON value. Array element types collapse
/// into a deduplicated union; object shapes keep every key.
fn json_type(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => {
            let element_types: IndexSet<String> = items.iter().map(json_type).collect();
            match element_types.len() {
                0 => "unknown[]".to_string(),
                1 => format!("{}[]", element_types[0]),
                _ => {
                    let union = element_types
                        .iter()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(" | ");
                    format!("({union})[]")
                }
            }
        }
        Value::Object(fields) => {
            if fields.is_empty() {
                return "{}".to_string();
            }
            let rendered: Vec<String> = fields
                .iter()
                .map(|(key, field)| format!("{}: {}", render_key(key), json_type(field)))
                .collect();
            format!("{{ {} }}", rendered.join("; "))
        }
    }
}

/// Object key as a bare identifier where possible, else a quoted string.
fn render_key(key: &str) -> String {
    let mut chars = key.chars();
    let is_ident = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if is_ident {
        return key.to_string();
    }
    let mut quoted = String::from("\"");
    for c in key.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Resolves stylesheet and media imports to an empty module. Runs before
/// the inline plugin, so an asset extension wins over an `?inline` query.
#[derive(Debug)]
pub(crate) struct AssetPlugin {
    spill: Rc<Spill>,
}

impl AssetPlugin {
    pub(crate) fn new(spill: Rc<Spill>) -> Self {
        Self { spill }
    }
}

impl Plugin for AssetPlugin {
    fn name(&self) -> &str {
        "assets"
    }

    fn resolve(&self, specifier: &str, ctx: &ResolveCtx<'_>) -> Option<Resolution> {
        if ctx.is_entry {
            return None;
        }
        if !CSS_LANGS_RE.is_match(specifier) && !ASSETS_RE.is_match(specifier) {
            return None;
        }
        self.spill.materialize("empty", "").ok().map(Resolution::File)
    }
}

/// Resolves `?inline` imports to an ambient string constant; the runtime
/// value is the file's text, so the declared type is always `string`.
#[derive(Debug)]
pub(crate) struct InlinePlugin {
    spill: Rc<Spill>,
}

impl InlinePlugin {
    pub(crate) fn new(spill: Rc<Spill>) -> Self {
        Self { spill }
    }
}

impl Plugin for InlinePlugin {
    fn name(&self) -> &str {
        "inline"
    }

    fn resolve(&self, specifier: &str, ctx: &ResolveCtx<'_>) -> Option<Resolution> {
        if ctx.is_entry || !specifier.ends_with("?inline") {
            return None;
        }
        self.spill
            .materialize("inline", INLINE_PLACEHOLDER)
            .ok()
            .map(Resolution::File)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(importer: &Path) -> ResolveCtx<'_> {
        ResolveCtx {
            importer,
            is_entry: false,
        }
    }

    fn entry_ctx(importer: &Path) -> ResolveCtx<'_> {
        ResolveCtx {
            importer,
            is_entry: true,
        }
    }

    fn spill() -> Rc<Spill> {
        Rc::new(Spill::new().unwrap())
    }

    #[test]
    fn test_json_type_shapes() {
        assert_eq!(json_type(&json!(null)), "null");
        assert_eq!(json_type(&json!(true)), "boolean");
        assert_eq!(json_type(&json!(3.5)), "number");
        assert_eq!(json_type(&json!("hi")), "string");
        assert_eq!(json_type(&json!([])), "unknown[]");
        assert_eq!(json_type(&json!([1, 2, 3])), "number[]");
        assert_eq!(json_type(&json!([1, "a"])), "(number | string)[]");
        assert_eq!(json_type(&json!({})), "{}");
        assert_eq!(
            json_type(&json!({"name": "x", "version": "1.0"})),
            "{ name: string; version: string }"
        );
        assert_eq!(
            json_type(&json!({"nested": {"flag": false}})),
            "{ nested: { flag: boolean } }"
        );
    }

    #[test]
    fn test_json_keys_quoted_when_not_identifiers() {
        assert_eq!(
            json_type(&json!({"foo-bar": 1, "with \"quote": 2})),
            r#"{ "foo-bar": number; "with \"quote": number }"#
        );
        assert_eq!(json_type(&json!({"$ok": 1, "_fine": 2})), "{ $ok: number; _fine: number }");
    }

    #[test]
    fn test_spill_materialize_memoizes() {
        let spill = spill();
        let first = spill.materialize("key", "content").unwrap();
        let second = spill.materialize("key", "ignored").unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "content");
    }

    #[test]
    fn test_spill_distinct_keys_get_distinct_files() {
        let spill = spill();
        let a = spill.materialize("./a/b.css", "").unwrap();
        let b = spill.materialize("./a+b.css", "").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_spill_directory_removed_on_drop() {
        let spill = Spill::new().unwrap();
        let path = spill.materialize("key", "content").unwrap();
        drop(spill);
        assert!(!path.exists());
    }

    #[test]
    fn test_stylesheet_pattern() {
        assert!(CSS_LANGS_RE.is_match("./theme.css"));
        assert!(CSS_LANGS_RE.is_match("./theme.scss?used"));
        assert!(CSS_LANGS_RE.is_match("component.module.less"));
        assert!(!CSS_LANGS_RE.is_match("./component.tsx"));
        assert!(!CSS_LANGS_RE.is_match("./style.csst"));
    }

    #[test]
    fn test_asset_pattern() {
        assert!(ASSETS_RE.is_match("./logo.png"));
        assert!(ASSETS_RE.is_match("./logo.png?url"));
        assert!(ASSETS_RE.is_match("font.woff2"));
        assert!(ASSETS_RE.is_match("./notes.txt"));
        assert!(!ASSETS_RE.is_match("./module.ts"));
        assert!(!ASSETS_RE.is_match("data.json"));
    }

    #[test]
    fn test_alias_redirects_then_pins_external() {
        let mut map = IndexMap::new();
        map.insert("old-pkg".to_string(), "new-pkg".to_string());
        let plugin = AliasPlugin::new(map);
        let importer = Path::new("src/index.ts");

        assert_eq!(
            plugin.resolve("old-pkg", &ctx(importer)),
            Some(Resolution::Redirect("new-pkg".to_string()))
        );
        // The redirected specifier comes back through the chain and this
        // plugin claims it.
        assert_eq!(
            plugin.resolve("new-pkg", &ctx(importer)),
            Some(Resolution::External)
        );
        // Without a pending redirect the replacement is not aliased.
        assert_eq!(plugin.resolve("new-pkg", &ctx(importer)), None);
    }

    #[test]
    fn test_alias_identity_mapping_is_external() {
        let mut map = IndexMap::new();
        map.insert("react".to_string(), "react".to_string());
        let plugin = AliasPlugin::new(map);
        assert_eq!(
            plugin.resolve("react", &ctx(Path::new("src/index.ts"))),
            Some(Resolution::External)
        );
    }

    #[test]
    fn test_empty_plugin_prefix_boundary() {
        let plugin = EmptyPlugin::new(&["lodash".to_string()], spill());
        let importer = Path::new("src/index.ts");
        assert!(matches!(
            plugin.resolve("lodash", &ctx(importer)),
            Some(Resolution::File(_))
        ));
        assert!(matches!(
            plugin.resolve("lodash/fp", &ctx(importer)),
            Some(Resolution::File(_))
        ));
        assert_eq!(plugin.resolve("lodash-es", &ctx(importer)), None);
    }

    #[test]
    fn test_json_plugin_shapes_relative_import() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let importer = src.join("index.ts");
        fs::write(src.join("data.json"), r#"{"name": "pkg", "count": 2}"#).unwrap();

        let plugin = JsonPlugin::new(spill());
        let resolution = plugin.resolve("./data.json", &ctx(&importer)).unwrap();
        let Resolution::File(path) = resolution else {
            panic!("expected a file resolution");
        };
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "declare const data: { count: number; name: string };\nexport default data;\n"
        );
    }

    #[test]
    fn test_json_plugin_declines_bare_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let importer = dir.path().join("index.ts");
        let plugin = JsonPlugin::new(spill());
        assert_eq!(plugin.resolve("pkg/data.json", &ctx(&importer)), None);
        assert_eq!(plugin.resolve("./missing.json", &ctx(&importer)), None);
    }

    #[test]
    fn test_json_plugin_malformed_file_becomes_empty_module() {
        let dir = tempfile::tempdir().unwrap();
        let importer = dir.path().join("index.ts");
        fs::write(dir.path().join("broken.json"), "{nope").unwrap();

        let plugin = JsonPlugin::new(spill());
        let resolution = plugin.resolve("./broken.json", &ctx(&importer)).unwrap();
        let Resolution::File(path) = resolution else {
            panic!("expected a file resolution");
        };
        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn test_json_plugin_same_file_same_module() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("data.json"), "1").unwrap();

        let plugin = JsonPlugin::new(spill());
        let from_root = plugin
            .resolve("./data.json", &ctx(&dir.path().join("index.ts")))
            .unwrap();
        let from_nested = plugin
            .resolve("../data.json", &ctx(&dir.path().join("a/mod.ts")))
            .unwrap();
        assert_eq!(from_root, from_nested);
    }

    #[test]
    fn test_asset_plugin_claims_both_pattern_classes() {
        let plugin = AssetPlugin::new(spill());
        let importer = Path::new("src/index.ts");
        assert!(matches!(
            plugin.resolve("./theme.css", &ctx(importer)),
            Some(Resolution::File(_))
        ));
        assert!(matches!(
            plugin.resolve("./logo.svg?component", &ctx(importer)),
            Some(Resolution::File(_))
        ));
        assert_eq!(plugin.resolve("./mod.ts", &ctx(importer)), None);
    }

    #[test]
    fn test_inline_placeholder_content() {
        let plugin = InlinePlugin::new(spill());
        let resolution = plugin
            .resolve("./shader.glsl?inline", &ctx(Path::new("src/index.ts")))
            .unwrap();
        let Resolution::File(path) = resolution else {
            panic!("expected a file resolution");
        };
        assert_eq!(fs::read_to_string(path).unwrap(), INLINE_PLACEHOLDER);
        assert_eq!(
            plugin.resolve("./shader.glsl", &ctx(Path::new("src/index.ts"))),
            None
        );
    }

    #[test]
    fn test_plugins_never_claim_entries() {
        let importer = Path::new("src/index.ts");
        let spill = spill();
        let mut alias_map = IndexMap::new();
        alias_map.insert("a".to_string(), "b".to_string());

        assert_eq!(
            AliasPlugin::new(alias_map).resolve("a", &entry_ctx(importer)),
            None
        );
        assert_eq!(
            EmptyPlugin::new(&["a".to_string()], spill.clone())
                .resolve("a", &entry_ctx(importer)),
            None
        );
        assert_eq!(
            AssetPlugin::new(spill.clone()).resolve("a.css", &entry_ctx(importer)),
            None
        );
        assert_eq!(
            InlinePlugin::new(spill).resolve("a?inline", &entry_ctx(importer)),
            None
        );
    }
}
