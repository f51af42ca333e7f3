//! Harness pipeline.
//!
//! Runs the generator, tiles every discovered raster with the converter,
//! and writes the master KML. Steps run strictly one after another and the
//! first failure aborts the run.

use crate::config::Config;
use crate::error::{HarnessError, HarnessResult};
use crate::kml::{generate_master_document, KmlOptions};
use crate::models::{entries_from_names, AggregationEntry, EntryRecord, RunSummary};
use crate::runner::{run_tool, ToolSpec};
use crate::scanner::{discover_inputs, ScanConfig};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything one harness run needs.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory the tools run in; holds inputs, tiles and the master document.
    pub working_dir: PathBuf,
    /// Raster generator.
    pub generator: ToolSpec,
    /// Image-to-quadtree converter.
    pub converter: ToolSpec,
    /// Passed to the converter as `-m <mode>`.
    pub converter_mode: String,
    /// File name of the master document.
    pub master_name: String,
    /// Master document options.
    pub kml: KmlOptions,
    /// Use files already in the working directory instead of running the generator.
    pub skip_generate: bool,
    /// Only rebuild the master document; never run the converter.
    pub skip_convert: bool,
    /// Require every linked descriptor to exist after conversion.
    pub verify_links: bool,
    /// Show a progress bar over conversions.
    pub show_progress: bool,
}

impl HarnessConfig {
    /// Build from a loaded configuration, resolving relative tool paths
    /// against the current directory since tools run elsewhere.
    pub fn from_config(config: &Config) -> io::Result<Self> {
        let cwd = std::env::current_dir()?;

        let mut generator = config.tools.generator_tool();
        generator.program = resolve_program(&cwd, &generator.program);
        let mut converter = config.tools.converter_tool();
        converter.program = resolve_program(&cwd, &converter.program);

        Ok(Self {
            working_dir: cwd.join(&config.general.working_dir),
            generator,
            converter,
            converter_mode: config.tools.converter_mode.clone(),
            master_name: config.general.master_name.clone(),
            kml: config.kml.options(),
            skip_generate: false,
            skip_convert: false,
            verify_links: false,
            show_progress: true,
        })
    }

    /// Path of the master document.
    pub fn master_path(&self) -> PathBuf {
        self.working_dir.join(&self.master_name)
    }
}

/// Bare names are left for `PATH` lookup; paths with directories are anchored.
fn resolve_program(cwd: &Path, program: &Path) -> PathBuf {
    if program.is_relative() && program.components().count() > 1 {
        cwd.join(program)
    } else {
        program.to_path_buf()
    }
}

/// Runs the pipeline described by a [`HarnessConfig`].
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    /// Create a new harness.
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Access the configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            excludes: vec![self.config.master_name.clone()],
        }
    }

    /// Discover and validate inputs without running anything or writing files.
    pub fn plan(&self) -> HarnessResult<Vec<AggregationEntry>> {
        let dir = &self.config.working_dir;
        if !dir.exists() {
            warn!("Working directory does not exist yet: {}", dir.display());
            return Ok(Vec::new());
        }

        let names = discover_inputs(dir, &self.scan_config())?;
        entries_from_names(&names, self.config.kml.stem_rule)
    }

    /// Run the whole pipeline.
    pub async fn run(&self) -> HarnessResult<RunSummary> {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let dir = &self.config.working_dir;

        if !dir.exists() {
            info!("Creating working directory: {}", dir.display());
            fs::create_dir_all(dir)?;
        }

        // Step 1: populate the working directory
        let generated = if self.config.skip_generate {
            debug!("Skipping generator");
            false
        } else {
            run_tool(&self.config.generator, &[], dir).await?;
            true
        };

        // Step 2: discover and validate every input before converting any
        let names = discover_inputs(dir, &self.scan_config())?;
        if names.is_empty() {
            warn!("No input files found in {}", dir.display());
        } else {
            info!("Found {} input files", names.len());
        }
        debug!("Deriving stems with rule: {}", self.config.kml.stem_rule);
        // A bad name fails here, before any conversion work
        entries_from_names(&names, self.config.kml.stem_rule)?;

        // Step 3: tile each input
        let converted = if self.config.skip_convert {
            debug!("Skipping converter");
            0
        } else {
            self.convert_all(&names).await?
        };

        // Step 4: stitch the master document
        let master_path = self.config.master_path();
        let entries = generate_master_document(&names, &master_path, &self.config.kml)?;
        info!(
            "Wrote master document with {} links: {}",
            entries.len(),
            master_path.display()
        );

        if self.config.verify_links {
            verify_links(dir, &entries)?;
        }

        Ok(RunSummary {
            working_dir: dir.clone(),
            master_path: Some(master_path),
            started_at,
            duration_seconds: start_time.elapsed().as_secs_f64(),
            generated,
            converted,
            entries: entries.iter().map(EntryRecord::from).collect(),
        })
    }

    /// Run the converter once per input, in order.
    async fn convert_all(&self, names: &[String]) -> HarnessResult<usize> {
        let progress_bar = if self.config.show_progress {
            let pb = ProgressBar::new(names.len() as u64);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        for name in names {
            progress_bar.set_message(name.clone());
            let args = [
                "-m".to_string(),
                self.config.converter_mode.clone(),
                name.clone(),
            ];
            run_tool(&self.config.converter, &args, &self.config.working_dir).await?;
            progress_bar.inc(1);
        }

        progress_bar.finish_with_message("Conversion complete");
        Ok(names.len())
    }
}

/// Check that every linked descriptor exists under `dir`.
pub fn verify_links(dir: &Path, entries: &[AggregationEntry]) -> HarnessResult<()> {
    for entry in entries {
        let href = entry.href();
        if !dir.join(&href).is_file() {
            return Err(HarnessError::MissingDescriptor { href });
        }
    }

    debug!("All {} descriptors present", entries.len());
    Ok(())
}
