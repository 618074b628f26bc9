use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use super::geojson::Feature;

/// Feature count, geometry-type mix and first-feature attributes of a layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSummary {
    pub count: usize,
    pub geometry_mix: BTreeMap<&'static str, usize>,
    pub columns: Vec<(String, Value)>,
}

impl LayerSummary {
    pub fn new(features: &[Feature]) -> Self {
        let mut geometry_mix = BTreeMap::new();
        for feature in features {
            *geometry_mix.entry(feature.geometry_type()).or_default() += 1;
        }
        let columns = features.first()
            .map(|f| f.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Self { count: features.len(), geometry_mix, columns }
    }
}

impl fmt::Display for LayerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of records: {}", self.count)?;
        writeln!(f, "Geometry mix:")?;
        for (kind, n) in &self.geometry_mix {
            writeln!(f, "  - {kind}: {n}")?;
        }
        if !self.columns.is_empty() {
            writeln!(f, "Attribute columns:")?;
            for (field, value) in &self.columns {
                writeln!(f, "  - {field} ({value})")?;
            }
        }
        Ok(())
    }
}
