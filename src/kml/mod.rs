//! Master KML document generation.

pub mod generator;

pub use generator::{generate_master_document, KmlOptions};
