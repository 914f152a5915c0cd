use anyhow::{Context, Result};
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Directories that never contain contract sources.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "artifacts",
    "cache",
    "out",
    "build",
    "typechain",
    "typechain-types",
    ".git",
];

/// Recursively collect `.sol` files under `root`, sorted by path.
///
/// The walk is sequential: discovery order feeds first-match-wins rules
/// downstream, so it must be deterministic.
pub fn walk_source_files(root: &Path) -> Result<Vec<PathBuf>> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .sort_by_file_path(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !SKIP_DIRS.contains(&name.as_ref())
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "sol") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Forward-slash form used as a stable map key across platforms.
pub fn to_unix_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
