//! External-module classification from the package manifest.
//!
//! Packages named under `dependencies` or `peerDependencies` stay
//! external: their types ship with them, so inlining would only
//! duplicate declarations and pin versions. `devDependencies` are
//! absent from the published package and get bundled.

use crate::error::BuildError;
use indexmap::IndexSet;
use std::fs;
use std::path::{Path, PathBuf};
use typeroll_engine::ExternalPattern;

/// External patterns for the project containing `entry`. Walks up from
/// the entry file to the nearest `package.json`; a project without one
/// has no declared dependencies and nothing is external by default.
/// Names listed in `include` are bundled despite the manifest.
pub fn external_set(
    entry: &Path,
    include: &[String],
) -> Result<Vec<ExternalPattern>, BuildError> {
    let Some(manifest_path) = find_manifest(entry) else {
        return Ok(Vec::new());
    };
    let text = fs::read_to_string(&manifest_path)?;
    let manifest: serde_json::Value =
        serde_json::from_str(&text).map_err(|err| BuildError::Manifest {
            path: manifest_path.clone(),
            message: err.to_string(),
        })?;

    let mut names = IndexSet::new();
    for section in ["dependencies", "peerDependencies"] {
        if let Some(deps) = manifest.get(section).and_then(|v| v.as_object()) {
            for name in deps.keys() {
                names.insert(name.clone());
            }
        }
    }

    Ok(names
        .into_iter()
        .filter(|name| !include.iter().any(|kept| kept == name))
        .map(ExternalPattern::new)
        .collect())
}

fn find_manifest(entry: &Path) -> Option<PathBuf> {
    let mut dir = entry.parent();
    while let Some(d) = dir {
        let candidate = d.join("package.json");
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}
