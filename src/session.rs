//! A checking session: loaded layers, the merged working layer and the
//! results computed on them
//!
//! A session is created once the files are loaded and dropped when the run
//! ends. Nothing outlives it except what the presenter writes out.

use std::borrow::Cow;
use std::path::PathBuf;

use serde::Serialize;

use crate::checks::{self, Rule, RuleResult};
use crate::core::config::CheckConfig;
use crate::core::error::Result;
use crate::crs::Crs;
use crate::layer::{merge, Layer};
use crate::loader::DatasetLoader;

/// Name of the merged layer when more than one file is loaded
pub const MERGED_LAYER: &str = "merged";

#[derive(Debug, Clone)]
pub struct Session {
    config: CheckConfig,
    layers: Vec<Layer>,
    merged: Layer,
    repaired: usize,
}

impl Session {
    pub fn new(layers: Vec<Layer>, config: CheckConfig) -> Self {
        let merged = merged_layer(&layers);
        Self {
            config,
            layers,
            merged,
            repaired: 0,
        }
    }

    /// Load every file into the configured target frame
    pub fn open(paths: &[PathBuf], config: CheckConfig) -> Result<Self> {
        let loader = DatasetLoader::new(Crs::from_epsg(config.target_epsg)?);
        let layers = loader.load_all(paths)?;
        tracing::info!(
            "Session opened with {} layers, {} features in {}",
            layers.len(),
            layers.iter().map(Layer::len).sum::<usize>(),
            loader.target()
        );
        Ok(Self::new(layers, config))
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Layers as loaded, one per file
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The working collection every single-layer rule runs on
    pub fn merged(&self) -> &Layer {
        &self.merged
    }

    /// Replace every layer by its repaired version
    ///
    /// Returns the number of features of the merged layer that changed.
    pub fn fix(&mut self) -> usize {
        self.layers = self.layers.iter().map(checks::repair).collect();
        let fixed = merged_layer(&self.layers);

        let changed = self
            .merged
            .features
            .iter()
            .zip(&fixed.features)
            .filter(|(before, after)| before.geometry != after.geometry)
            .count();
        self.merged = fixed;
        self.repaired += changed;
        tracing::info!("Fixed {} invalid geometries", changed);
        changed
    }

    /// Run every rule on the merged layer, and the cross-layer rule on
    /// every pair of loaded layers when `cross` is set
    ///
    /// Gaps and overlaps are measured on a repaired copy of any layer that
    /// has invalid features; the session's layers are left as they are.
    pub fn run(&self, cross: bool) -> Report {
        let layer = &self.merged;
        let pairs = checks::candidate_pairs(&self.config.overlap);

        let validity = checks::validity_result(layer);
        let checked = if validity.passed() {
            Cow::Borrowed(layer)
        } else {
            Cow::Owned(checks::repair(layer))
        };

        let mut results = vec![
            validity,
            checks::duplicates_result(layer),
            checks::gaps_result(&checked, self.config.min_gap_area),
            checks::overlaps_result(&checked, pairs.as_ref()),
        ];

        if cross {
            let layers: Vec<Cow<'_, Layer>> = self.layers.iter().map(repaired_copy).collect();
            for (i, left) in layers.iter().enumerate() {
                for right in &layers[i + 1..] {
                    results.push(checks::cross_overlaps_result(left, right));
                }
            }
        }

        for result in &results {
            if result.passed() {
                tracing::info!("{} on {}: passed", result.rule, result.layer);
            } else {
                tracing::info!(
                    "{} on {}: {} findings",
                    result.rule,
                    result.layer,
                    result.findings.len()
                );
            }
        }

        Report {
            layer: layer.name.clone(),
            crs: layer.crs.to_string(),
            feature_count: layer.len(),
            repaired: self.repaired,
            results,
        }
    }
}

fn repaired_copy(layer: &Layer) -> Cow<'_, Layer> {
    if checks::check_validity(layer).is_empty() {
        Cow::Borrowed(layer)
    } else {
        Cow::Owned(checks::repair(layer))
    }
}

fn merged_layer(layers: &[Layer]) -> Layer {
    match layers {
        [single] => single.clone(),
        _ => merge(MERGED_LAYER, layers),
    }
}

/// Everything a session found, ready for presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub layer: String,
    pub crs: String,
    pub feature_count: usize,
    /// Features changed by the repair action so far
    pub repaired: usize,
    pub results: Vec<RuleResult>,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.results.iter().all(RuleResult::passed)
    }

    /// Results of one rule; the cross-layer rule may have several
    pub fn results_for(&self, rule: Rule) -> impl Iterator<Item = &RuleResult> + '_ {
        self.results.iter().filter(move |r| r.rule == rule)
    }

    pub fn result(&self, rule: Rule) -> Option<&RuleResult> {
        self.results_for(rule).next()
    }
}
