use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use streetgeom::BufferStyle;

/// Order in which streets are partitioned and their footprints committed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreetOrder {
    /// Longest street first over the whole network.
    #[default]
    Global,
    /// Connected components by total length, longest street first within each.
    PerComponent,
}

/// What to do with a primary footprint that collides with a committed one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Drop the candidate; its demands go to repair.
    #[default]
    Reject,
    /// Commit the candidate minus the colliding footprints.
    Subtract,
}

/// Attribute names read from the input layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub street_id: String,
    pub demand_id: String,
    pub weight: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            street_id: "StreetCode".into(),
            demand_id: "id_demanda".into(),
            weight: "market-index".into(),
        }
    }
}

/// Pipeline parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum cumulative weight of a primary box.
    pub threshold: f64,
    /// Added to the street's maximum member distance to get the buffer radius.
    pub margin: f64,
    pub mitre_limit: f64,
    /// Demands farther than this from every reference point stay unassociated.
    pub association_radius: Option<f64>,
    /// Search radius for the footprint that absorbs an orphan.
    pub orphan_radius: f64,
    /// Neighborhood subtracted from secondary footprints.
    pub secondary_search_radius: f64,
    /// Overshoot added when a cut is extended toward an orphan.
    pub extension_epsilon: f64,
    /// Boxes heavier than `threshold + split_tolerance` are bisected.
    pub split_tolerance: f64,
    /// Cuts shorter than this produce no footprint.
    pub min_centerline_length: f64,
    /// Demands within this distance of a footprint count as covered.
    pub coverage_tolerance: f64,
    /// Shared area below this is boundary contact, not overlap.
    pub overlap_area_tolerance: f64,
    pub max_passes: usize,
    pub street_order: StreetOrder,
    pub primary_overlap: OverlapPolicy,
    pub fields: FieldNames,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: 8.0,
            margin: 1.5,
            mitre_limit: 2.0,
            association_radius: None,
            orphan_radius: 20.0,
            secondary_search_radius: 30.0,
            extension_epsilon: 0.2,
            split_tolerance: 8.0,
            min_centerline_length: 0.01,
            coverage_tolerance: 1e-6,
            overlap_area_tolerance: 1e-6,
            max_passes: 4,
            street_order: StreetOrder::default(),
            primary_overlap: OverlapPolicy::default(),
            fields: FieldNames::default(),
        }
    }
}

impl Config {
    /// Load a JSON config; missing keys take their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.threshold.is_finite() && self.threshold > 0.0,
            "threshold must be positive, got {}", self.threshold);
        ensure!(self.margin.is_finite() && self.margin > 0.0,
            "margin must be positive, got {}", self.margin);
        for (name, value) in [
            ("orphan_radius", self.orphan_radius),
            ("secondary_search_radius", self.secondary_search_radius),
            ("extension_epsilon", self.extension_epsilon),
            ("split_tolerance", self.split_tolerance),
            ("min_centerline_length", self.min_centerline_length),
            ("coverage_tolerance", self.coverage_tolerance),
            ("overlap_area_tolerance", self.overlap_area_tolerance),
        ] {
            ensure!(value.is_finite() && value >= 0.0, "{name} must be non-negative, got {value}");
        }
        if let Some(radius) = self.association_radius {
            ensure!(radius.is_finite() && radius >= 0.0,
                "association_radius must be non-negative, got {radius}");
        }
        ensure!(self.mitre_limit >= 1.0, "mitre_limit must be at least 1, got {}", self.mitre_limit);
        ensure!(self.max_passes >= 1, "max_passes must be at least 1");
        Ok(())
    }

    #[inline] pub fn buffer_style(&self) -> BufferStyle { BufferStyle::flat_mitre(self.mitre_limit) }

    /// Weight above which a box is split.
    #[inline] pub fn split_limit(&self) -> f64 { self.threshold + self.split_tolerance }
}
