//! Amenity input file
//!
//! A TOML list of stays and their amenity labels:
//!
//! ```toml
//! [[stay]]
//! name = "봉은사"
//! amenities = "주차 가능, 1인실"
//! ```

use crate::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// One stay's amenity labels, keyed by parent name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AmenityEntry {
    pub name: String,

    /// Comma-separated labels
    #[serde(default)]
    pub amenities: String,
}

#[derive(Debug, Deserialize)]
struct AmenityFile {
    #[serde(default)]
    stay: Vec<AmenityEntry>,
}

/// Loads every `[[stay]]` entry from `path`
pub fn load_amenities(path: &Path) -> Result<Vec<AmenityEntry>, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_amenities(&contents)
}

/// Parses amenity entries from TOML text
pub fn parse_amenities(contents: &str) -> Result<Vec<AmenityEntry>, ConfigError> {
    let file: AmenityFile = toml::from_str(contents)?;
    Ok(file.stay)
}
