//! qtree-harness - integration fixtures for image2qtree
//!
//! Generates sample rasters, runs the image2qtree converter on each one,
//! and stitches the per-image KML descriptors into a master KML document
//! for visual inspection.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any failure (tool exit status, bad input name, I/O, config)

mod cli;
mod config;
mod error;
mod harness;
mod kml;
mod models;
mod runner;
mod scanner;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use harness::{Harness, HarnessConfig};
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so the config can ask for verbosity
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(&args, &config);

    info!("qtree-harness v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    if let Err(e) = run_harness(args, config).await {
        error!("Harness failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .qtree-harness.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to point at your generator and image2qtree build.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the harness workflow.
async fn run_harness(args: Args, config: Config) -> Result<()> {
    let mut harness_config =
        HarnessConfig::from_config(&config).context("Failed to resolve working directory")?;
    harness_config.skip_generate = args.skip_generate;
    harness_config.skip_convert = args.skip_convert;
    harness_config.verify_links = args.verify_links;
    harness_config.show_progress = !args.quiet;

    let harness = Harness::new(harness_config);

    if args.dry_run {
        return handle_dry_run(&harness);
    }

    println!(
        "🗂️  Working directory: {}",
        harness.config().working_dir.display()
    );
    if !args.skip_generate {
        println!("🛰️  Generator: {}", harness.config().generator.command_line(&[]));
    }
    if !args.skip_convert {
        println!("🧩 Converter: {}", harness.config().converter.command_line(&[]));
    }

    let summary = harness.run().await?;

    if let Some(ref summary_path) = args.summary {
        harness::write_json_summary(&summary, summary_path).with_context(|| {
            format!("Failed to write summary to {}", summary_path.display())
        })?;
        info!("Summary written to {}", summary_path.display());
    }

    println!("\n📊 Run Summary:");
    println!("   Inputs: {}", summary.entries.len());
    println!("   Converted: {}", summary.converted);
    println!("   Duration: {:.1}s", summary.duration_seconds);
    if let Some(ref master) = summary.master_path {
        println!("\n✅ Master KML written to: {}", master.display());
    }

    Ok(())
}

/// Handle --dry-run: list inputs and planned links, run nothing.
fn handle_dry_run(harness: &Harness) -> Result<()> {
    println!("\n🔍 Dry run: discovering inputs (no tools are run)...\n");

    let entries = harness.plan()?;

    if entries.is_empty() {
        println!("   No input files found.");
    } else {
        println!("   {} inputs would be linked:\n", entries.len());
        for entry in &entries {
            println!("     📄 {} -> {}", entry.label, entry.href());
        }
    }

    println!(
        "\n✅ Dry run complete. {} was not written.",
        harness.config().master_path().display()
    );
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
