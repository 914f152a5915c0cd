use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

/// Everything one invocation needs: roots, patterns, and toggles.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub source_root: PathBuf,
    pub artifact_root: PathBuf,
    pub output_path: PathBuf,
    pub cache_root: PathBuf,
    /// Include patterns over source-root-relative paths; empty means all.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Files scanned for role/resolver-key constant tables (stage 5).
    pub constant_patterns: Vec<String>,
    /// Standalone role-declaration files merged late (stage 7).
    pub role_file_patterns: Vec<String>,
    pub pair_variants: bool,
    pub include_storage_wrappers: bool,
    pub include_mocks: bool,
    pub use_cache: bool,
    pub facets_only: bool,
    pub dry_run: bool,
    /// External formatter command; first element is the program.
    pub formatter_command: Option<Vec<String>>,
}

impl GeneratorConfig {
    pub fn new(source_root: PathBuf, artifact_root: PathBuf, output_path: PathBuf) -> Self {
        let cache_root = source_root.clone();
        Self {
            source_root,
            artifact_root,
            output_path,
            cache_root,
            include: Vec::new(),
            exclude: Vec::new(),
            constant_patterns: vec![
                "**/constants/**/*.sol".to_string(),
                "**/Keys.sol".to_string(),
            ],
            role_file_patterns: vec!["**/roles/**/*.sol".to_string(), "**/Roles.sol".to_string()],
            pair_variants: true,
            include_storage_wrappers: true,
            include_mocks: false,
            use_cache: false,
            facets_only: false,
            dry_run: false,
            formatter_command: None,
        }
    }

    /// Canonicalize both roots up front; failure here is fatal (§7c).
    pub fn resolve_roots(&mut self) -> Result<()> {
        self.source_root = self
            .source_root
            .canonicalize()
            .with_context(|| format!("Failed to resolve source root: {}", self.source_root.display()))?;
        self.artifact_root = self
            .artifact_root
            .canonicalize()
            .with_context(|| {
                format!("Failed to resolve artifact root: {}", self.artifact_root.display())
            })?;
        Ok(())
    }

    pub fn path_filter(&self) -> Result<PathFilter> {
        PathFilter::new(&self.include, &self.exclude)
    }
}

/// Include/exclude matching with `**` (any segment run) and `*` (any run of
/// non-separator characters).
#[derive(Debug)]
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_glob_set(include)?)
        };
        Ok(Self {
            include,
            exclude: build_glob_set(exclude)?,
        })
    }

    pub fn matches(&self, rel_path: &Path) -> bool {
        if self.exclude.is_match(rel_path) {
            return false;
        }
        match &self.include {
            Some(set) => set.is_match(rel_path),
            None => true,
        }
    }
}

/// `literal_separator` keeps `*` within one path segment; only `**` crosses
/// segment boundaries.
pub fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid path pattern: {pattern}"))?;
        builder.add(glob);
    }
    builder.build().context("Failed to build path pattern set")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_include_matches_everything_except_excluded() -> Result<()> {
        let filter = PathFilter::new(&[], &["**/mocks/**".to_string()])?;
        assert!(filter.matches(Path::new("contracts/facets/StakingFacet.sol")));
        assert!(!filter.matches(Path::new("contracts/mocks/MockToken.sol")));
        Ok(())
    }

    #[test]
    fn include_patterns_restrict_matches() -> Result<()> {
        let filter = PathFilter::new(&["contracts/facets/*.sol".to_string()], &[])?;
        assert!(filter.matches(Path::new("contracts/facets/StakingFacet.sol")));
        assert!(!filter.matches(Path::new("contracts/libraries/Math.sol")));
        // `*` does not cross path separators.
        assert!(!filter.matches(Path::new("contracts/facets/nested/Deep.sol")));
        Ok(())
    }

    #[test]
    fn double_star_crosses_segments() -> Result<()> {
        let filter = PathFilter::new(&["**/Keys.sol".to_string()], &[])?;
        assert!(filter.matches(Path::new("contracts/constants/Keys.sol")));
        assert!(filter.matches(Path::new("Keys.sol")));
        Ok(())
    }
}
