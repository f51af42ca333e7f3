//! Input discovery for the working directory.
//!
//! After the generator runs, every regular file directly inside the working
//! directory is an input for the converter.

use crate::error::HarnessResult;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Configuration for input discovery.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File names that are harness outputs, never inputs (e.g. `master.kml`).
    pub excludes: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            excludes: vec!["master.kml".to_string()],
        }
    }
}

impl ScanConfig {
    /// Check if a name should be skipped.
    fn is_excluded(&self, name: &str) -> bool {
        // Hidden files
        if name.starts_with('.') {
            return true;
        }

        self.excludes.iter().any(|pattern| name == pattern)
    }
}

/// Base names of the input files in `dir`, sorted by name.
pub fn discover_inputs(dir: &Path, config: &ScanConfig) -> HarnessResult<Vec<String>> {
    let mut inputs = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();

        if !entry.file_type().is_file() {
            debug!("Skipping non-file entry: {}", name);
            continue;
        }

        if config.is_excluded(&name) {
            debug!("Skipping excluded file: {}", name);
            continue;
        }

        inputs.push(name);
    }

    debug!("Discovered {} input files in {}", inputs.len(), dir.display());
    Ok(inputs)
}
