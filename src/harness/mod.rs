//! The generate / convert / aggregate pipeline.

pub mod pipeline;
pub mod summary;

pub use pipeline::{Harness, HarnessConfig};
pub use summary::write_json_summary;
