//! Pipeline orchestration: discovery through idempotent write.
//!
//! Ten sequential stages, each logged with running counts. Stages never call
//! back upstream and never run concurrently; first-match-wins rules depend
//! on deterministic ordering.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use crate::cache::MetadataCache;
use crate::config::GeneratorConfig;
use crate::generate::{Formatter, GeneratorInput, RegistryGenerator, TIMESTAMP_PREFIX};
use crate::logger::Logger;
use crate::metadata::{self, ConstantTables, ContractMetadata};
use crate::roles::scan_constant_tables;
use crate::scan::{
    CategorizedContracts, ContractFile, categorize_contracts, find_all_contracts,
    pair_time_travel_variants,
};

/// Missing-variant warnings are suppressed above this count: early in a
/// project's life most modules have no variant yet and the noise helps
/// nobody.
const MISSING_VARIANT_WARN_LIMIT: usize = 3;

#[derive(Debug, Default, Serialize)]
pub struct GenerationStats {
    pub discovered: usize,
    pub modules: usize,
    pub variants: usize,
    pub infrastructure: usize,
    pub mocks: usize,
    pub interfaces: usize,
    pub libraries: usize,
    pub other: usize,
    pub extracted: usize,
    pub per_layer: BTreeMap<u8, usize>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub wrote_output: bool,
    pub duration_ms: u64,
}

#[derive(Debug)]
pub struct PipelineResult {
    pub code: String,
    pub stats: GenerationStats,
    pub output_path: PathBuf,
    pub warnings: Vec<String>,
}

/// Run the whole pipeline once.
pub fn run(
    mut config: GeneratorConfig,
    generator: &dyn RegistryGenerator,
    formatter: &dyn Formatter,
    logger: &Logger,
) -> Result<PipelineResult> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let mut stats = GenerationStats::default();

    logger.stage(1, "Resolving source and artifact roots");
    config.resolve_roots()?;

    logger.stage(2, "Discovering contract files");
    let filter = config.path_filter()?;
    let discovered: Vec<ContractFile> =
        find_all_contracts(&config.source_root, &config.artifact_root)?
            .into_iter()
            .filter(|f| filter.matches(&f.rel_path))
            .collect();
    stats.discovered = discovered.len();
    logger.info(&format!("Discovered {} contracts", discovered.len()));

    // Name map for inheritance walking; sorted discovery order makes the
    // lexicographically first path win on shadowed names.
    let mut files_by_name: BTreeMap<String, ContractFile> = BTreeMap::new();
    for file in &discovered {
        files_by_name
            .entry(file.name.clone())
            .or_insert_with(|| file.clone());
    }

    logger.stage(3, "Categorizing contracts");
    let categorized = categorize_contracts(discovered);
    record_category_counts(&mut stats, &categorized);
    logger.detail(&format!(
        "modules={} variants={} infrastructure={} mocks={} interfaces={} libraries={} other={}",
        stats.modules,
        stats.variants,
        stats.infrastructure,
        stats.mocks,
        stats.interfaces,
        stats.libraries,
        stats.other
    ));

    logger.stage(4, "Pairing time-travel variants");
    let pairing = if config.pair_variants {
        pair_time_travel_variants(&categorized.modules, &categorized.variants)
    } else {
        BTreeMap::new()
    };
    if config.pair_variants {
        let missing: Vec<&String> = pairing
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k)
            .collect();
        if !missing.is_empty() && missing.len() <= MISSING_VARIANT_WARN_LIMIT {
            for name in missing {
                warnings.push(format!("Module {name} has no time-travel variant"));
            }
        }
    }

    logger.stage(5, "Scanning constant tables");
    let mut tables = ConstantTables::default();
    let inspected =
        scan_constant_tables(&config.source_root, &config.constant_patterns, &mut tables)?;
    logger.detail(&format!(
        "Inspected {inspected} constants: {} roles, {} resolver keys",
        tables.roles.len(),
        tables.resolver_keys.len()
    ));

    logger.stage(6, "Extracting contract metadata");
    let mut cache = config.use_cache.then(|| MetadataCache::load(&config.cache_root));
    let mut contracts: Vec<ContractMetadata> = Vec::new();

    let mut extraction_set: Vec<&ContractFile> = categorized.modules.iter().collect();
    if !config.facets_only {
        extraction_set.extend(categorized.infrastructure.iter());
        if config.include_storage_wrappers {
            extraction_set.extend(
                categorized
                    .libraries
                    .iter()
                    .chain(categorized.other.iter())
                    .filter(|f| metadata::is_storage_wrapper(&f.name)),
            );
        }
        if config.include_mocks {
            extraction_set.extend(categorized.mocks.iter());
        }
    }

    for file in extraction_set {
        let has_variant = matches!(pairing.get(&file.name), Some(Some(_)));
        let (meta, served_from_cache) =
            extract_one(file, has_variant, &tables, &files_by_name, cache.as_mut());
        match served_from_cache {
            Some(true) => stats.cache_hits += 1,
            Some(false) => stats.cache_misses += 1,
            None => {}
        }
        collect_extraction_warnings(file, &meta, &tables, &mut warnings);
        *stats.per_layer.entry(meta.layer).or_insert(0) += 1;
        contracts.push(meta);
    }
    stats.extracted = contracts.len();
    logger.info(&format!(
        "Extracted {} contracts ({} cache hits, {} misses)",
        stats.extracted, stats.cache_hits, stats.cache_misses
    ));

    logger.stage(7, "Merging standalone role declarations");
    scan_constant_tables(&config.source_root, &config.role_file_patterns, &mut tables)?;

    logger.stage(8, "Generating registry source");
    contracts.sort_by(|a, b| a.name.cmp(&b.name));
    let input = GeneratorInput {
        contracts,
        roles: tables.roles,
        resolver_keys: tables.resolver_keys,
        variants: pairing
            .iter()
            .map(|(base, variant)| (base.clone(), variant.as_ref().map(|v| v.name.clone())))
            .collect(),
    };
    let generated = generator.generate(&input)?;

    logger.stage(9, "Formatting generated source");
    let code = match formatter.format(&generated) {
        Ok(formatted) => formatted,
        Err(err) => {
            warnings.push(format!("Formatter failed, using unformatted output: {err:#}"));
            generated
        }
    };

    logger.stage(10, "Writing output");
    if config.dry_run {
        logger.info("Dry run: skipping write");
    } else {
        stats.wrote_output = write_if_changed(&config.output_path, &code)?;
        if stats.wrote_output {
            logger.info(&format!("Wrote {}", config.output_path.display()));
        } else {
            logger.info("Output unchanged, write skipped");
        }
    }

    if let Some(cache) = cache.as_mut() {
        let pruned = cache.prune();
        if pruned > 0 {
            logger.detail(&format!("Pruned {pruned} stale cache entries"));
        }
        if let Err(err) = cache.save() {
            warnings.push(format!("Failed to save metadata cache: {err:#}"));
        }
    }

    for warning in &warnings {
        logger.warn(warning);
    }
    stats.duration_ms = start.elapsed().as_millis() as u64;

    Ok(PipelineResult {
        code,
        stats,
        output_path: config.output_path,
        warnings,
    })
}

/// Serve one contract from the cache when its content hash still matches,
/// otherwise extract fresh and store. The second value reports what actually
/// happened: `Some(true)` served from cache, `Some(false)` re-extracted,
/// `None` no cache in play. A cached record naming a different contract
/// (several contracts sharing one file share one cache slot) counts as a
/// miss.
///
/// The cached has-variant flag is never trusted: variant availability can
/// change between runs without touching the file, so the freshly computed
/// pairing result always wins.
fn extract_one(
    file: &ContractFile,
    has_variant: bool,
    tables: &ConstantTables,
    files_by_name: &BTreeMap<String, ContractFile>,
    cache: Option<&mut MetadataCache>,
) -> (ContractMetadata, Option<bool>) {
    if let Some(cache) = cache {
        if !cache.should_reprocess(&file.path)
            && let Some(cached) = cache.get_cached(&file.path)
            && cached.name == file.name
        {
            let mut meta = cached.clone();
            meta.has_variant = has_variant;
            return (meta, Some(true));
        }
        let meta = metadata::extract_metadata(file, has_variant, tables, files_by_name);
        cache.set(&file.path, meta.clone());
        return (meta, Some(false));
    }
    let meta = metadata::extract_metadata(file, has_variant, tables, files_by_name);
    (meta, None)
}

fn collect_extraction_warnings(
    file: &ContractFile,
    meta: &ContractMetadata,
    tables: &ConstantTables,
    warnings: &mut Vec<String>,
) {
    use crate::scan::{Bucket, classify};
    match classify(file) {
        Bucket::Module => {
            if meta.resolver_key.is_none() {
                warnings.push(format!("Module {} has no resolver key", meta.name));
            }
        }
        Bucket::MockOrTest => {
            // Mocks that reference a resolver-key symbol the table cannot
            // supply are worth flagging; everything else about mocks is not.
            for symbol in crate::solidity::extract_imported_symbols(&file.source) {
                if symbol.ends_with("_RESOLVER_KEY") && !tables.resolver_keys.contains_key(&symbol)
                {
                    warnings.push(format!(
                        "Mock {} references unknown resolver key {symbol}",
                        meta.name
                    ));
                }
            }
        }
        _ => {}
    }
}

fn record_category_counts(stats: &mut GenerationStats, categorized: &CategorizedContracts) {
    stats.modules = categorized.modules.len();
    stats.variants = categorized.variants.len();
    stats.infrastructure = categorized.infrastructure.len();
    stats.mocks = categorized.mocks.len();
    stats.interfaces = categorized.interfaces.len();
    stats.libraries = categorized.libraries.len();
    stats.other = categorized.other.len();
}

/// Timestamp-insensitive comparison of generated text.
fn normalize_generated(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with(TIMESTAMP_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write only when the normalized content differs from the existing file,
/// preserving the existing file's timestamp otherwise. Returns whether a
/// write happened.
fn write_if_changed(path: &std::path::Path, code: &str) -> Result<bool> {
    if let Ok(existing) = std::fs::read_to_string(path)
        && normalize_generated(&existing) == normalize_generated(code)
    {
        return Ok(false);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    std::fs::write(path, code)
        .with_context(|| format!("Failed to write output: {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "facetgen-pipeline-{}-{}-{name}",
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&p).unwrap();
        p
    }

    #[test]
    fn normalization_ignores_only_the_timestamp_line() {
        let a = format!("// header\n{TIMESTAMP_PREFIX} 1\nbody\n");
        let b = format!("// header\n{TIMESTAMP_PREFIX} 2\nbody\n");
        let c = format!("// header\n{TIMESTAMP_PREFIX} 2\nother body\n");
        assert_eq!(normalize_generated(&a), normalize_generated(&b));
        assert_ne!(normalize_generated(&a), normalize_generated(&c));
    }

    #[test]
    fn write_if_changed_skips_identical_content() -> Result<()> {
        let dir = temp_dir("write");
        let path = dir.join("registry.ts");

        let first = format!("{TIMESTAMP_PREFIX} 100\nexport const x = 1;\n");
        assert!(write_if_changed(&path, &first)?);

        // Same payload, new timestamp: no write, old content preserved.
        let second = format!("{TIMESTAMP_PREFIX} 200\nexport const x = 1;\n");
        assert!(!write_if_changed(&path, &second)?);
        assert_eq!(fs::read_to_string(&path)?, first);

        // Changed payload: written.
        let third = format!("{TIMESTAMP_PREFIX} 300\nexport const x = 2;\n");
        assert!(write_if_changed(&path, &third)?);
        assert_eq!(fs::read_to_string(&path)?, third);

        let _ = fs::remove_dir_all(dir);
        Ok(())
    }
}
