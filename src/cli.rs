use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "facetgen")]
#[command(about = "Generate a facet registry from Solidity sources and compiled ABI artifacts")]
pub struct Cli {
    /// Root of the contract source tree.
    #[arg(long, value_name = "DIR", default_value = "contracts")]
    pub source: PathBuf,

    /// Root of the compiled artifact tree mirroring the source layout.
    #[arg(long, value_name = "DIR", default_value = "artifacts/contracts")]
    pub artifacts: PathBuf,

    /// Where the generated registry is written.
    #[arg(short = 'o', long, value_name = "FILE", default_value = "generated/registry.ts")]
    pub output: PathBuf,

    /// Cache root; the cache file lives in a hidden subdirectory of it.
    /// Defaults to the source root.
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Run everything except the final write.
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Extract modules only, skipping infrastructure, storage wrappers, and mocks.
    #[arg(long)]
    pub facets_only: bool,

    /// Serve unchanged contracts from the metadata cache.
    #[arg(long, alias = "cache")]
    pub use_cache: bool,

    /// Clear the metadata cache and exit without generating.
    #[arg(long)]
    pub clear_cache: bool,

    /// Disable time-travel variant pairing.
    #[arg(long)]
    pub no_variants: bool,

    /// Also extract mock contracts.
    #[arg(long)]
    pub include_mocks: bool,

    /// Skip storage-wrapper contracts.
    #[arg(long)]
    pub no_storage_wrappers: bool,

    /// External formatter command; generated text is piped through its
    /// stdin. Repeat the flag to add arguments, one token per occurrence:
    /// `--format-cmd prettier --format-cmd --parser --format-cmd typescript`.
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    pub format_cmd: Vec<String>,

    /// Include pattern over source-relative paths; repeatable.
    #[arg(long, value_name = "GLOB")]
    pub include: Vec<String>,

    /// Exclude pattern over source-relative paths; repeatable.
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_alias_maps_to_use_cache() {
        let cli = Cli::parse_from(["facetgen", "--cache"]);
        assert!(cli.use_cache);
    }

    #[test]
    fn format_cmd_occurrences_map_to_argv_tokens() {
        let cli = Cli::parse_from([
            "facetgen",
            "--format-cmd",
            "npx",
            "--format-cmd",
            "--stdin-filepath",
            "--format-cmd",
            "registry with space.ts",
        ]);
        assert_eq!(
            cli.format_cmd,
            vec!["npx", "--stdin-filepath", "registry with space.ts"]
        );
    }

    #[test]
    fn defaults_are_sensible() {
        let cli = Cli::parse_from(["facetgen"]);
        assert_eq!(cli.source, PathBuf::from("contracts"));
        assert!(!cli.dry_run);
        assert!(!cli.clear_cache);
        assert!(cli.include.is_empty());
    }
}
