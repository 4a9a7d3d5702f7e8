//! CommonJS default-export rewrite.
//!
//! A package compiled to CJS with a lone default export is consumed as
//! `module.exports`, and its declaration must say `export =` for the
//! types to line up. The rewrite only fires on a whole-line default
//! alias or expression export; anything richer (named exports alongside
//! a default, namespace members) is left alone.

use once_cell::sync::Lazy;
use regex::Regex;
use typeroll_engine::{ChunkInfo, OutputPlugin};

static ALIAS_DEFAULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^export \{ ([A-Za-z_$][A-Za-z0-9_$]*) as default \};$").unwrap()
});

static EXPR_DEFAULT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^export default ([A-Za-z_$][A-Za-z0-9_$]*);$").unwrap());

/// Output plugin rewriting a sole default export into `export =` form.
#[derive(Debug, Default)]
pub struct CjsDefaultExportPlugin;

impl OutputPlugin for CjsDefaultExportPlugin {
    fn name(&self) -> &str {
        "cjs"
    }

    fn render_chunk(&self, content: &str, _chunk: &ChunkInfo<'_>) -> Option<String> {
        let pass = ALIAS_DEFAULT_RE.replace(content, "export = ${1};");
        let pass = EXPR_DEFAULT_RE.replace(&pass, "export = ${1};");
        (pass != content).then(|| pass.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(content: &str) -> Option<String> {
        let info = ChunkInfo {
            name: "index",
            file_name: "index.d.ts",
        };
        CjsDefaultExportPlugin.render_chunk(content, &info)
    }

    #[test]
    fn test_alias_default_rewritten() {
        let content = "declare function cli(): void;\nexport { cli as default };\n";
        assert_eq!(
            render(content).as_deref(),
            Some("declare function cli(): void;\nexport = cli;\n")
        );
    }

    #[test]
    fn test_expression_default_rewritten() {
        let content = "declare const api: {\n    run(): void;\n};\nexport default api;\n";
        assert_eq!(
            render(content).as_deref(),
            Some("declare const api: {\n    run(): void;\n};\nexport = api;\n")
        );
    }

    #[test]
    fn test_named_exports_untouched() {
        assert_eq!(render("export declare const a: number;\n"), None);
        assert_eq!(render("export { a, b };\n"), None);
    }

    #[test]
    fn test_default_inside_export_list_untouched() {
        // The default shares the list with named exports; `export =`
        // would drop them.
        assert_eq!(render("export { a, cli as default };\n"), None);
    }

    #[test]
    fn test_indented_lines_untouched() {
        assert_eq!(render("    export default inner;\n"), None);
    }
}
