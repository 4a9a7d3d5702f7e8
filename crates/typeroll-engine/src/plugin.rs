//! Extension points: resolution plugins, write-phase output plugins, and
//! the source reader every module body enters the engine through.

use std::io;
use std::path::{Path, PathBuf};

/// Outcome of a plugin's resolve hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Bundle the module at this on-disk path.
    File(PathBuf),
    /// A virtual module; its source comes from a plugin `load` hook.
    Virtual(String),
    /// Keep the import as written.
    External,
    /// Restart resolution with a different specifier.
    Redirect(String),
}

/// Context handed to resolve hooks.
#[derive(Debug, Clone, Copy)]
pub struct ResolveCtx<'a> {
    /// File the import appears in.
    pub importer: &'a Path,
    /// True when resolving a build entry point rather than an import.
    pub is_entry: bool,
}

/// A resolution plugin. Plugins are consulted in chain order; the first
/// one returning `Some` claims the specifier and later plugins never see
/// it.
pub trait Plugin {
    fn name(&self) -> &str;

    /// Claim a specifier, or `None` to pass it along the chain.
    fn resolve(&self, specifier: &str, ctx: &ResolveCtx<'_>) -> Option<Resolution>;

    /// Supply the source of a virtual module id this plugin produced.
    /// `None` defers to the next plugin.
    fn load(&self, _id: &str) -> Option<String> {
        None
    }
}

/// Chunk metadata handed to output plugins.
#[derive(Debug, Clone, Copy)]
pub struct ChunkInfo<'a> {
    /// Entry name the chunk was built for.
    pub name: &'a str,
    /// File name the chunk will be written as.
    pub file_name: &'a str,
}

/// A write-phase transform applied to each rendered chunk, in order,
/// before anything touches disk.
pub trait OutputPlugin {
    fn name(&self) -> &str;

    /// Return the replacement text, or `None` to leave the chunk as is.
    fn render_chunk(&self, content: &str, chunk: &ChunkInfo<'_>) -> Option<String>;
}

/// Reads module sources. Every on-disk file the engine consumes passes
/// through this hook, which is how callers rewrite source text (comment
/// folding) without the engine knowing.
pub trait SourceReader {
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// Default reader: a plain filesystem read.
#[derive(Debug, Default)]
pub struct FsReader;

impl SourceReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl Plugin for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn resolve(&self, specifier: &str, _ctx: &ResolveCtx<'_>) -> Option<Resolution> {
            (specifier == self.0).then(|| Resolution::Virtual(format!("virtual:{specifier}")))
        }

        fn load(&self, id: &str) -> Option<String> {
            id.strip_prefix("virtual:").map(|rest| format!("// {rest}"))
        }
    }

    #[test]
    fn test_plugin_claims_and_loads() {
        let plugin = Fixed("./style.css");
        let ctx = ResolveCtx {
            importer: Path::new("/src/index.ts"),
            is_entry: false,
        };
        assert_eq!(
            plugin.resolve("./style.css", &ctx),
            Some(Resolution::Virtual("virtual:./style.css".into()))
        );
        assert_eq!(plugin.resolve("./other.ts", &ctx), None);
        assert_eq!(
            plugin.load("virtual:./style.css").as_deref(),
            Some("// ./style.css")
        );
    }

    #[test]
    fn test_fs_reader_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mod.ts");
        std::fs::write(&file, "export const a = 1;\n").unwrap();
        assert_eq!(FsReader.read(&file).unwrap(), "export const a = 1;\n");
        assert!(FsReader.read(&dir.path().join("missing.ts")).is_err());
    }
}
