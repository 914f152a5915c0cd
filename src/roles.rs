//! Role and resolver-key constant table scanning.
//!
//! Files matching the configured patterns are scanned for `bytes32 constant`
//! declarations. `*_ROLE` names feed the role table, `*_RESOLVER_KEY` names
//! feed the resolver-key table. First occurrence wins on collision; the walk
//! is sorted, so "first" is deterministic.

use anyhow::Result;
use std::path::Path;

use crate::config::build_glob_set;
use crate::fsutil::{read_to_string, walk_source_files};
use crate::metadata::ConstantTables;
use crate::solidity::extract_constants;

/// Scan `root` for constant declarations in files matching `patterns` and
/// merge them into `tables`. Returns the number of constants inspected.
pub fn scan_constant_tables(
    root: &Path,
    patterns: &[String],
    tables: &mut ConstantTables,
) -> Result<usize> {
    if patterns.is_empty() {
        return Ok(0);
    }
    let matcher = build_glob_set(patterns)?;
    let mut inspected = 0usize;

    for path in walk_source_files(root)? {
        let rel = path.strip_prefix(root).unwrap_or(&path);
        if !matcher.is_match(rel) {
            continue;
        }
        let Ok(source) = read_to_string(&path) else {
            continue;
        };
        for (name, value) in extract_constants(&source) {
            inspected += 1;
            if name.ends_with("_RESOLVER_KEY") {
                tables.resolver_keys.entry(name).or_insert(value);
            } else if name.ends_with("_ROLE") {
                tables.roles.entry(name).or_insert(value);
            }
        }
    }

    Ok(inspected)
}
