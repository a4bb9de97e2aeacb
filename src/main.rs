//! groq-extract - extract, rewrite and cache GROQ queries from site sources.

use anyhow::{Result, bail};
use clap::Parser;
use groq_extract::{
    cache::lookup::use_static_query,
    cli::{Cli, Commands},
    config::ProjectConfig,
    controller::{Controller, ControllerSettings},
    engine::{CommandEngine, Dataset},
    log,
    pages::ManifestRegistry,
    watch::watch_for_changes_blocking,
};
use std::path::Path;

type SiteController = Controller<CommandEngine, ManifestRegistry>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Build { .. } => build_all(&config).map(|_| ()),
        Commands::Watch { .. } => {
            let mut controller = build_all(&config)?;
            watch_for_changes_blocking(&config, &mut controller)
        }
        Commands::Lookup { query, .. } => lookup(&config, query),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<ProjectConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() {
        ProjectConfig::from_path(&config_path)?
    } else {
        ProjectConfig::default()
    };
    config.update_with_cli(cli);

    // Lookup only reads the cache
    if !cli.is_lookup() {
        config.validate()?;
    }

    Ok(config)
}

/// Reset the cache, extract every query and apply page queries to registered pages.
fn build_all(config: &ProjectConfig) -> Result<SiteController> {
    let engine = CommandEngine::new(config.query.engine.clone())?.with_root(config.get_root());
    let dataset = Dataset::load(&config.query.dataset)?;
    let registry = ManifestRegistry::load(&config.pages.manifest, config.get_root())?;
    log!("query"; "{} nodes from `{}`", dataset.len(), config.query.dataset.display());

    let mut controller = Controller::new(
        ControllerSettings::from_config(config),
        engine,
        dataset,
        registry,
    );
    controller.prepare()?;

    let report = controller.extract_all()?;
    let updated = controller.apply_page_queries();
    log!("pages"; "{updated} pages updated");

    if report.failed > 0 {
        log!("warn"; "{} files failed, see errors above", report.failed);
    }
    Ok(controller)
}

/// Print the cached result for a static query as written at its call site.
fn lookup(config: &ProjectConfig, query: &str) -> Result<()> {
    let Some(result) = use_static_query(config.cache_root(), query) else {
        bail!("no cached result in `{}`", config.cache_root().display());
    };
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
