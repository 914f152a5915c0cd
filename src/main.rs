use anyhow::Result;
use clap::Parser;
use facetgen::cache::MetadataCache;
use facetgen::cli::Cli;
use facetgen::config::GeneratorConfig;
use facetgen::generate::{ExternalFormatter, Formatter, NoopFormatter, TsRegistryGenerator};
use facetgen::logger::Logger;
use facetgen::pipeline;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let verbose = cli.verbose;

    if let Err(err) = run(cli) {
        if verbose {
            eprintln!("Error: {err:?}");
        } else {
            eprintln!("Error: {err:#}");
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let logger = Logger::new(cli.verbose);

    if cli.clear_cache {
        let cache_root = cli.cache_dir.clone().unwrap_or_else(|| cli.source.clone());
        let mut cache = MetadataCache::load(&cache_root);
        cache.clear()?;
        logger.info("Metadata cache cleared");
        return Ok(());
    }

    let mut config = GeneratorConfig::new(cli.source.clone(), cli.artifacts, cli.output);
    config.cache_root = cli.cache_dir.unwrap_or(cli.source);
    config.include = cli.include;
    config.exclude = cli.exclude;
    config.pair_variants = !cli.no_variants;
    config.include_storage_wrappers = !cli.no_storage_wrappers;
    config.include_mocks = cli.include_mocks;
    config.use_cache = cli.use_cache;
    config.facets_only = cli.facets_only;
    config.dry_run = cli.dry_run;
    config.formatter_command = (!cli.format_cmd.is_empty()).then_some(cli.format_cmd);

    let generator = TsRegistryGenerator;
    let formatter: Box<dyn Formatter> = match &config.formatter_command {
        Some(command) => Box::new(ExternalFormatter::new(command.clone())),
        None => Box::new(NoopFormatter),
    };

    let result = pipeline::run(config, &generator, formatter.as_ref(), &logger)?;
    println!("{}", serde_json::to_string_pretty(&result.stats)?);
    Ok(())
}
