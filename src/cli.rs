//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Values left unset fall back to the config file.

use crate::config::StemRuleKind;
use clap::Parser;
use std::path::PathBuf;

/// qtree-harness - integration fixtures for image2qtree
///
/// Generates sample rasters, tiles each one with image2qtree, and stitches
/// the per-image KML descriptors into one master KML for visual inspection.
///
/// Examples:
///   qtree-harness --tool ./vw/tools/image2qtree --generator ./geotif-generate
///   qtree-harness --working-dir image2qtree.out --skip-generate --skip-convert
///   qtree-harness --dry-run --skip-generate
///   qtree-harness --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory the tools run in and the master document is written to
    ///
    /// Created if missing. Default: from config or `image2qtree.out`.
    #[arg(short, long, value_name = "DIR", env = "QTREE_WORKING_DIR")]
    pub working_dir: Option<PathBuf>,

    /// Path to the image2qtree converter
    #[arg(short, long, value_name = "PATH", env = "QTREE_TOOL")]
    pub tool: Option<PathBuf>,

    /// Path to the raster generator
    #[arg(short, long, value_name = "PATH", env = "QTREE_GENERATOR")]
    pub generator: Option<PathBuf>,

    /// Converter output mode, passed as `-m <MODE>`
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// File name of the master KML inside the working directory
    #[arg(short = 'o', long, value_name = "NAME")]
    pub master: Option<String>,

    /// How link stems are derived from input file names
    #[arg(long, value_name = "RULE")]
    pub stem_rule: Option<StemRuleArg>,

    /// Extension length for the fixed stem rule
    #[arg(long, value_name = "N")]
    pub extension_length: Option<usize>,

    /// Do not run the generator; use files already in the working directory
    #[arg(long)]
    pub skip_generate: bool,

    /// Do not run the converter; only (re)build the master document
    #[arg(long)]
    pub skip_convert: bool,

    /// Fail if a linked `<stem>/<stem>.kml` descriptor does not exist
    #[arg(long)]
    pub verify_links: bool,

    /// Dry run: list inputs and planned links without running tools or writing files
    #[arg(long)]
    pub dry_run: bool,

    /// Write a JSON run summary to this file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .qtree-harness.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .qtree-harness.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Stem rule for --stem-rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StemRuleArg {
    /// Strip a dot plus a fixed-length extension
    Fixed,
    /// Strip everything from the last dot
    LastDot,
}

impl From<StemRuleArg> for StemRuleKind {
    fn from(arg: StemRuleArg) -> Self {
        match arg {
            StemRuleArg::Fixed => StemRuleKind::Fixed,
            StemRuleArg::LastDot => StemRuleKind::LastDot,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.extension_length == Some(0) {
            return Err("Extension length must be at least 1".to_string());
        }

        if let Some(ref master) = self.master {
            if master.is_empty() || master.contains(['/', '\\']) {
                return Err(format!(
                    "Master document name must be a plain file name: {:?}",
                    master
                ));
            }
        }

        if let Some(ref mode) = self.mode {
            if mode.trim().is_empty() {
                return Err("Converter mode must not be empty".to_string());
            }
        }

        if let Some(ref dir) = self.working_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(format!(
                    "Working directory is not a directory: {}",
                    dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
