//! Geometric quality rules for polygon layers
//!
//! Each rule is a stateless function of the layer(s) it receives. The
//! typed findings of every rule are folded into a [`RuleResult`] for the
//! presenter.

mod candidates;
mod duplicates;
mod gaps;
mod overlaps;
mod overlay;
mod repair;
mod validity;

pub use candidates::{AllPairs, CandidatePairs, GridPairs};
pub use duplicates::{find_duplicates, Duplicate};
pub use gaps::find_gaps;
pub use overlaps::{cross_overlaps, find_overlaps, interiors_intersect, CrossOverlap, OverlapPair};
pub use repair::{make_valid, repair};
pub use validity::{check_validity, geometry_issues, is_valid, InvalidFeature, ValidityIssue};

use geo_types::MultiPolygon;
use serde::{Serialize, Serializer};

use crate::core::config::{OverlapConfig, OverlapIndex};
use crate::layer::Layer;

/// The quality rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Invalid,
    Duplicates,
    Gaps,
    Overlaps,
    CrossOverlaps,
}

impl Rule {
    pub const ALL: [Rule; 5] = [
        Rule::Invalid,
        Rule::Duplicates,
        Rule::Gaps,
        Rule::Overlaps,
        Rule::CrossOverlaps,
    ];

    /// Stable key used in configuration and JSON output
    pub fn key(self) -> &'static str {
        match self {
            Rule::Invalid => "invalid",
            Rule::Duplicates => "duplicates",
            Rule::Gaps => "gaps",
            Rule::Overlaps => "overlaps",
            Rule::CrossOverlaps => "cross_overlaps",
        }
    }

    /// Human readable name, also the map overlay title
    pub fn label(self) -> &'static str {
        match self {
            Rule::Invalid => "Invalid Geometries",
            Rule::Duplicates => "Duplicate Geometries",
            Rule::Gaps => "Gaps",
            Rule::Overlaps => "Overlaps",
            Rule::CrossOverlaps => "Cross-layer Overlaps",
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One offending item of a rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Indices of the features involved; empty for gaps
    pub features: Vec<usize>,
    /// Geometry to overlay on the map
    #[serde(serialize_with = "serialize_geometry")]
    pub geometry: MultiPolygon<f64>,
    pub detail: String,
}

/// Outcome of one rule on one layer, or on a pair of layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleResult {
    pub rule: Rule,
    pub layer: String,
    pub passed: bool,
    pub findings: Vec<Finding>,
}

impl RuleResult {
    pub fn new(rule: Rule, layer: impl Into<String>, findings: Vec<Finding>) -> Self {
        Self {
            rule,
            layer: layer.into(),
            passed: findings.is_empty(),
            findings,
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }
}

/// Candidate pair strategy selected by configuration
pub fn candidate_pairs(config: &OverlapConfig) -> Box<dyn CandidatePairs> {
    match config.index {
        OverlapIndex::Naive => Box::new(AllPairs),
        OverlapIndex::Grid => Box::new(GridPairs::new(config.cell_size)),
    }
}

/// Validity rule over a layer
pub fn validity_result(layer: &Layer) -> RuleResult {
    let findings = check_validity(layer)
        .into_iter()
        .map(|invalid| Finding {
            features: vec![invalid.index],
            geometry: layer.features[invalid.index].geometry.clone(),
            detail: invalid
                .issues
                .iter()
                .map(ValidityIssue::describe)
                .collect::<Vec<_>>()
                .join("; "),
        })
        .collect();
    RuleResult::new(Rule::Invalid, &layer.name, findings)
}

pub fn duplicates_result(layer: &Layer) -> RuleResult {
    let findings = find_duplicates(layer)
        .into_iter()
        .map(|d| Finding {
            features: vec![d.index],
            geometry: layer.features[d.index].geometry.clone(),
            detail: format!("feature {} duplicates feature {}", d.index, d.original),
        })
        .collect();
    RuleResult::new(Rule::Duplicates, &layer.name, findings)
}

pub fn gaps_result(layer: &Layer, min_gap_area: f64) -> RuleResult {
    use geo::Area;

    let findings = find_gaps(layer, min_gap_area)
        .0
        .into_iter()
        .map(|gap| Finding {
            features: Vec::new(),
            detail: format!("uncovered area of {:.6}", gap.unsigned_area()),
            geometry: MultiPolygon::new(vec![gap]),
        })
        .collect();
    RuleResult::new(Rule::Gaps, &layer.name, findings)
}

pub fn overlaps_result(layer: &Layer, pairs: &dyn CandidatePairs) -> RuleResult {
    let findings = find_overlaps(layer, pairs)
        .into_iter()
        .map(|p| Finding {
            features: vec![p.first, p.second],
            detail: format!("features {} and {} overlap", p.first, p.second),
            geometry: p.shared,
        })
        .collect();
    RuleResult::new(Rule::Overlaps, &layer.name, findings)
}

pub fn cross_overlaps_result(left: &Layer, right: &Layer) -> RuleResult {
    let findings = cross_overlaps(left, right)
        .into_iter()
        .map(|c| Finding {
            features: vec![c.left, c.right],
            detail: format!(
                "{} feature {} intersects {} feature {}",
                left.name, c.left, right.name, c.right
            ),
            geometry: c.shared,
        })
        .collect();
    RuleResult::new(Rule::CrossOverlaps, format!("{} x {}", left.name, right.name), findings)
}

fn serialize_geometry<S: Serializer>(geometry: &MultiPolygon<f64>, s: S) -> Result<S::Ok, S::Error> {
    geojson::Geometry::new(geojson::Value::from(geometry)).serialize(s)
}
