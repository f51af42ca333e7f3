//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.qtree-harness.toml` files.

use crate::kml::KmlOptions;
use crate::models::{StemRule, DEFAULT_EXTENSION_LEN};
use crate::runner::ToolSpec;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".qtree-harness.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// External tool settings.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Master document settings.
    #[serde(default)]
    pub kml: KmlConfig,
}

/// General harness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory the generator and converter run in.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// File name of the master document inside the working directory.
    #[serde(default = "default_master_name")]
    pub master_name: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            master_name: default_master_name(),
            verbose: false,
        }
    }
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("image2qtree.out")
}

fn default_master_name() -> String {
    "master.kml".to_string()
}

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Raster generator executable.
    #[serde(default = "default_generator")]
    pub generator: PathBuf,

    /// Leading arguments for the generator.
    #[serde(default)]
    pub generator_args: Vec<String>,

    /// Image-to-quadtree converter executable.
    #[serde(default = "default_converter")]
    pub converter: PathBuf,

    /// Arguments placed before `-m <mode> <file>`.
    #[serde(default)]
    pub converter_args: Vec<String>,

    /// Output mode passed as `-m <mode>`.
    #[serde(default = "default_converter_mode")]
    pub converter_mode: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            generator: default_generator(),
            generator_args: Vec::new(),
            converter: default_converter(),
            converter_args: Vec::new(),
            converter_mode: default_converter_mode(),
        }
    }
}

fn default_generator() -> PathBuf {
    PathBuf::from("geotif-generate")
}

fn default_converter() -> PathBuf {
    PathBuf::from("image2qtree")
}

fn default_converter_mode() -> String {
    "kml".to_string()
}

impl ToolsConfig {
    /// The generator as a runnable tool.
    pub fn generator_tool(&self) -> ToolSpec {
        ToolSpec::new(&self.generator).with_args(self.generator_args.clone())
    }

    /// The converter as a runnable tool.
    pub fn converter_tool(&self) -> ToolSpec {
        ToolSpec::new(&self.converter).with_args(self.converter_args.clone())
    }
}

/// How stems are cut from input names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StemRuleKind {
    /// Fixed-length extension (`extension_length` characters after a dot).
    #[default]
    Fixed,
    /// Everything after the final dot.
    LastDot,
}

/// Master document settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmlConfig {
    /// `<Document>` name; empty to omit.
    #[serde(default = "default_document_name")]
    pub document_name: String,

    /// `<Folder>` name.
    #[serde(default = "default_folder_name")]
    pub folder_name: String,

    /// Folder list style.
    #[serde(default = "default_list_item_type")]
    pub list_item_type: String,

    /// Stem derivation rule.
    #[serde(default)]
    pub stem_rule: StemRuleKind,

    /// Extension length for the fixed rule.
    #[serde(default = "default_extension_length")]
    pub extension_length: usize,
}

impl Default for KmlConfig {
    fn default() -> Self {
        Self {
            document_name: default_document_name(),
            folder_name: default_folder_name(),
            list_item_type: default_list_item_type(),
            stem_rule: StemRuleKind::default(),
            extension_length: default_extension_length(),
        }
    }
}

fn default_document_name() -> String {
    KmlOptions::default().document_name
}

fn default_folder_name() -> String {
    KmlOptions::default().folder_name
}

fn default_list_item_type() -> String {
    KmlOptions::default().list_item_type
}

fn default_extension_length() -> usize {
    DEFAULT_EXTENSION_LEN
}

impl KmlConfig {
    /// The effective stem rule.
    pub fn stem_rule(&self) -> StemRule {
        match self.stem_rule {
            StemRuleKind::Fixed => StemRule::Fixed {
                extension_len: self.extension_length,
            },
            StemRuleKind::LastDot => StemRule::LastDot,
        }
    }

    /// Options for the master document generator.
    pub fn options(&self) -> KmlOptions {
        KmlOptions {
            document_name: self.document_name.clone(),
            folder_name: self.folder_name.clone(),
            list_item_type: self.list_item_type.clone(),
            stem_rule: self.stem_rule(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via env) override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.working_dir {
            self.general.working_dir = dir.clone();
        }
        if let Some(ref master) = args.master {
            self.general.master_name = master.clone();
        }

        if let Some(ref generator) = args.generator {
            self.tools.generator = generator.clone();
            self.tools.generator_args.clear();
        }
        if let Some(ref tool) = args.tool {
            self.tools.converter = tool.clone();
            self.tools.converter_args.clear();
        }
        if let Some(ref mode) = args.mode {
            self.tools.converter_mode = mode.clone();
        }

        if let Some(rule) = args.stem_rule {
            self.kml.stem_rule = rule.into();
        }
        if let Some(len) = args.extension_length {
            self.kml.extension_length = len;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Validate the merged configuration.
    ///
    /// Runs after `merge_with_args` so file values get the same checks as flags.
    pub fn validate(&self) -> Result<(), String> {
        if self.kml.stem_rule == StemRuleKind::Fixed && self.kml.extension_length == 0 {
            return Err("Extension length must be at least 1".to_string());
        }

        if self.general.master_name.is_empty() || self.general.master_name.contains(['/', '\\']) {
            return Err(format!(
                "Master document name must be a plain file name: {:?}",
                self.general.master_name
            ));
        }

        if self.tools.converter_mode.trim().is_empty() {
            return Err("Converter mode must not be empty".to_string());
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
