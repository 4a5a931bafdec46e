//! Checker configuration with documented defaults
//!
//! Every field can be overridden from a TOML file; anything missing keeps
//! the default below.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::Result;

/// Configuration for a checking run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// EPSG code of the frame every loaded layer is reprojected to
    ///
    /// WGS84 (4326) matches what web map widgets expect.
    pub target_epsg: u32,

    /// Gap components with an area at or below this value are ignored
    ///
    /// Expressed in squared target-frame units. Zero keeps every gap,
    /// including floating point slivers left by the union.
    pub min_gap_area: f64,

    /// Where the cleaned merged layer is written when export is requested
    pub output: PathBuf,

    pub overlap: OverlapConfig,

    pub map: MapConfig,
}

/// How candidate pairs are produced for the within-layer overlap check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapIndex {
    /// Every unordered pair is tested
    #[default]
    Naive,
    /// Bounding boxes are bucketed in a sparse grid first
    Grid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapConfig {
    pub index: OverlapIndex,

    /// Size of a grid cell in target-frame units
    ///
    /// Only used with `index = "grid"`. Should be close to the typical
    /// feature extent: much smaller cells register each feature many
    /// times, much larger cells degrade to the naive scan.
    pub cell_size: f64,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            index: OverlapIndex::Naive,
            cell_size: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Map center as [lat, lon] when the data gives no extent
    pub center: [f64; 2],

    pub zoom: u8,

    /// Per-rule color overrides keyed by rule name ("invalid", "gaps", ...)
    pub colors: BTreeMap<String, String>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: [9.0820, 8.6753],
            zoom: 6,
            colors: BTreeMap::new(),
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            target_epsg: 4326,
            min_gap_area: 0.0,
            output: PathBuf::from(crate::present::DEFAULT_OUTPUT),
            overlap: OverlapConfig::default(),
            map: MapConfig::default(),
        }
    }
}

impl CheckConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file on disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.overlap.index == OverlapIndex::Grid && self.overlap.cell_size <= 0.0 {
            return Err(format!(
                "overlap.cell_size ({}) must be positive when using the grid index",
                self.overlap.cell_size
            ));
        }

        if self.min_gap_area < 0.0 || !self.min_gap_area.is_finite() {
            return Err(format!(
                "min_gap_area ({}) must be a finite, non-negative number",
                self.min_gap_area
            ));
        }

        for (rule, color) in &self.map.colors {
            if crate::present::Color::from_hex(color).is_none() {
                return Err(format!("map.colors.{rule}: '{color}' is not a #rrggbb color"));
            }
        }

        Ok(())
    }
}
