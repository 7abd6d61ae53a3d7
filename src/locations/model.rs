//! Prefecture/city reference data.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Seed rows shipped with the binary.
pub const LOCATIONS_CSV: &str = include_str!("../../data/locations.csv");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub prefecture: String,
    pub city: String,
}

/// A row parsed from the seed CSV, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationSeed {
    pub prefecture: String,
    pub city: String,
}

/// Parse `prefecture,city` rows. The first line is a header; blank lines are
/// skipped. A BOM on the first line is tolerated.
pub fn parse_locations_csv(input: &str) -> Result<Vec<LocationSeed>, ConfigError> {
    let mut rows = Vec::new();
    for (lineno, line) in input.lines().enumerate().skip(1) {
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }
        let mut cols = line.split(',').map(str::trim);
        match (cols.next(), cols.next(), cols.next()) {
            (Some(prefecture), Some(city), None) if !prefecture.is_empty() && !city.is_empty() => {
                rows.push(LocationSeed {
                    prefecture: prefecture.to_string(),
                    city: city.to_string(),
                });
            }
            _ => {
                return Err(ConfigError::Seed(format!(
                    "locations.csv line {}: expected `prefecture,city`, got {line:?}",
                    lineno + 1
                )));
            }
        }
    }
    Ok(rows)
}
