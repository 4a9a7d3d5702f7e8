//! Output cache keyed by the output directory.
//!
//! `save` snapshots a build's emitted files plus a manifest; `restore`
//! copies them back and reconstructs the chunk list without touching the
//! bundler. The cache key is a hash of the absolute output path, so two
//! projects never share an entry. Restoration deliberately ignores input
//! staleness; callers opt in per build and get exactly the previous
//! output, changed sources or not.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use typeroll_engine::OutputChunk;

const MANIFEST: &str = "manifest.json";

#[derive(Debug, Serialize, Deserialize)]
struct ManifestEntry {
    name: String,
    file_name: String,
}

/// Snapshot `chunks` as the cache entry for `outdir`, replacing any
/// previous entry wholesale.
pub(crate) fn save(outdir: &Path, chunks: &[OutputChunk]) -> io::Result<()> {
    let cache = cache_dir(outdir);
    if cache.exists() {
        fs::remove_dir_all(&cache)?;
    }
    fs::create_dir_all(&cache)?;

    let mut manifest = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let source = outdir.join(&chunk.file_name);
        if source.is_file() {
            fs::copy(&source, cache.join(&chunk.file_name))?;
        }
        manifest.push(ManifestEntry {
            name: chunk.name.clone(),
            file_name: chunk.file_name.clone(),
        });
    }
    let rendered = serde_json::to_string_pretty(&manifest).map_err(io::Error::other)?;
    fs::write(cache.join(MANIFEST), rendered)
}

/// Drop the entry for `outdir`, if any. A fresh write to the directory
/// makes whatever was cached for it stale.
pub(crate) fn invalidate(outdir: &Path) -> io::Result<()> {
    let cache = cache_dir(outdir);
    if cache.exists() {
        fs::remove_dir_all(&cache)?;
    }
    Ok(())
}

/// Materialize the cached entry for `outdir` back into it and return the
/// chunk list, or `None` when there is no entry, the manifest does not
/// parse, or any listed file is gone.
pub(crate) fn restore(outdir: &Path) -> Option<Vec<OutputChunk>> {
    let cache = cache_dir(outdir);
    let manifest_text = fs::read_to_string(cache.join(MANIFEST)).ok()?;
    let manifest: Vec<ManifestEntry> = serde_json::from_str(&manifest_text).ok()?;
    fs::create_dir_all(outdir).ok()?;

    let mut chunks = Vec::with_capacity(manifest.len());
    for entry in manifest {
        let cached = cache.join(&entry.file_name);
        let code = fs::read_to_string(&cached).ok()?;
        fs::copy(&cached, outdir.join(&entry.file_name)).ok()?;
        chunks.push(OutputChunk {
            name: entry.name,
            file_name: entry.file_name,
            code,
        });
    }
    Some(chunks)
}

/// Cache location for an output directory: `node_modules/.cache` of the
/// enclosing package when one exists, the system temp directory
/// otherwise. The key hashes the lexical absolute path; no symlink
/// resolution, so the directory does not have to exist yet.
fn cache_dir(outdir: &Path) -> PathBuf {
    let absolute = if outdir.is_absolute() {
        outdir.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(outdir))
            .unwrap_or_else(|_| outdir.to_path_buf())
    };
    let digest = Sha256::digest(absolute.to_string_lossy().as_bytes());
    let leaf = format!("typeroll-{}", hex::encode(digest));
    for dir in absolute.ancestors() {
        if dir.join("package.json").is_file() {
            return dir.join("node_modules").join(".cache").join(leaf);
        }
    }
    env::temp_dir().join(leaf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(name: &str, file_name: &str, code: &str) -> OutputChunk {
        OutputChunk {
            name: name.to_string(),
            file_name: file_name.to_string(),
            code: code.to_string(),
        }
    }

    /// Project root with a package.json so the cache lands inside the
    /// temp dir instead of the shared system location.
    fn rooted_project() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        let outdir = dir.path().join("dist");
        (dir, outdir)
    }

    fn write_output(outdir: &Path, chunks: &[OutputChunk]) {
        fs::create_dir_all(outdir).unwrap();
        for chunk in chunks {
            fs::write(outdir.join(&chunk.file_name), &chunk.code).unwrap();
        }
    }

    #[test]
    fn test_save_restore_roundtrip() {
        let (_dir, outdir) = rooted_project();
        let chunks = vec![
            chunk("index", "index.d.ts", "export declare const a: number;\n"),
            chunk("worker", "worker.d.ts", "export declare function run(): void;\n"),
        ];
        write_output(&outdir, &chunks);
        save(&outdir, &chunks).unwrap();

        // Wipe the output; restore must bring the files back.
        fs::remove_dir_all(&outdir).unwrap();
        let restored = restore(&outdir).unwrap();

        assert_eq!(restored.len(), 2);
        for (restored, original) in restored.iter().zip(&chunks) {
            assert_eq!(restored.name, original.name);
            assert_eq!(restored.file_name, original.file_name);
            assert_eq!(restored.code, original.code);
        }
        assert_eq!(
            fs::read_to_string(outdir.join("index.d.ts")).unwrap(),
            chunks[0].code
        );
    }

    #[test]
    fn test_restore_without_entry_is_none() {
        let (_dir, outdir) = rooted_project();
        assert!(restore(&outdir).is_none());
    }

    #[test]
    fn test_corrupt_manifest_is_none() {
        let (_dir, outdir) = rooted_project();
        let chunks = vec![chunk("index", "index.d.ts", "declare const x: 1;\n")];
        write_output(&outdir, &chunks);
        save(&outdir, &chunks).unwrap();

        fs::write(cache_dir(&outdir).join(MANIFEST), "not json").unwrap();
        assert!(restore(&outdir).is_none());
    }

    #[test]
    fn test_missing_listed_file_is_none() {
        let (_dir, outdir) = rooted_project();
        let chunks = vec![chunk("index", "index.d.ts", "declare const x: 1;\n")];
        write_output(&outdir, &chunks);
        save(&outdir, &chunks).unwrap();

        fs::remove_file(cache_dir(&outdir).join("index.d.ts")).unwrap();
        assert!(restore(&outdir).is_none());
    }

    #[test]
    fn test_resave_replaces_previous_entry() {
        let (_dir, outdir) = rooted_project();
        let first = vec![chunk("index", "index.d.ts", "declare const a: 1;\n")];
        write_output(&outdir, &first);
        save(&outdir, &first).unwrap();

        fs::remove_dir_all(&outdir).unwrap();
        let second = vec![chunk("main", "main.d.ts", "declare const b: 2;\n")];
        write_output(&outdir, &second);
        save(&outdir, &second).unwrap();

        let cache = cache_dir(&outdir);
        assert!(!cache.join("index.d.ts").exists());
        let restored = restore(&outdir).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].file_name, "main.d.ts");
    }

    #[test]
    fn test_invalidate_drops_entry() {
        let (_dir, outdir) = rooted_project();
        // Nothing cached yet; invalidation is a no-op.
        invalidate(&outdir).unwrap();

        let chunks = vec![chunk("index", "index.d.ts", "declare const x: 1;\n")];
        write_output(&outdir, &chunks);
        save(&outdir, &chunks).unwrap();
        assert!(restore(&outdir).is_some());

        invalidate(&outdir).unwrap();
        assert!(restore(&outdir).is_none());
    }

    #[test]
    fn test_cache_rooted_in_package_node_modules() {
        let (dir, outdir) = rooted_project();
        let cache = cache_dir(&outdir);
        assert!(cache.starts_with(dir.path().join("node_modules/.cache")));
        assert!(cache
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("typeroll-"));
    }

    #[test]
    fn test_cache_falls_back_to_system_temp() {
        let dir = tempfile::tempdir().unwrap();
        let outdir = dir.path().join("dist");
        let cache = cache_dir(&outdir);
        assert!(cache.starts_with(env::temp_dir()));
    }

    #[test]
    fn test_distinct_outdirs_get_distinct_entries() {
        let (dir, outdir) = rooted_project();
        let sibling = dir.path().join("build");
        assert_ne!(cache_dir(&outdir), cache_dir(&sibling));
    }
}
