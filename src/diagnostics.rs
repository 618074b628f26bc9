use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::model::{BoxId, DemandId, StreetId};

/// A non-fatal problem found while building boxes and footprints.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("demand {demand} has no reference point in range and was excluded")]
    UnassociatedDemand { demand: DemandId },

    #[error("street {street} got no footprint: every candidate collided")]
    UnservedStreet { street: StreetId },

    #[error("box {box_id} has a degenerate centerline of length {length}")]
    DegenerateCenterline { box_id: BoxId, length: f64 },

    #[error("demand {demand} on street {street} has no footprint within {radius}")]
    UnresolvedOrphan { demand: DemandId, street: StreetId, radius: f64 },

    #[error("box {box_id} cut has a zero-length end segment; extension skipped")]
    DegenerateDirection { box_id: BoxId },
}

impl Diagnostic {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnassociatedDemand { .. } => "unassociated_demand",
            Self::UnservedStreet { .. } => "unserved_street",
            Self::DegenerateCenterline { .. } => "degenerate_centerline",
            Self::UnresolvedOrphan { .. } => "unresolved_orphan",
            Self::DegenerateDirection { .. } => "degenerate_direction",
        }
    }
}

/// Diagnostics accumulated over a run, in the order they were raised.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Record and log a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!(kind = diagnostic.kind(), "{diagnostic}");
        self.entries.push(diagnostic);
    }

    /// Record a diagnostic unless an identical one was already raised.
    pub fn push_unique(&mut self, diagnostic: Diagnostic) {
        if !self.entries.contains(&diagnostic) {
            self.push(diagnostic);
        }
    }

    #[inline] pub fn len(&self) -> usize { self.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    #[inline] pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> { self.entries.iter() }

    pub fn unserved_streets(&self) -> Vec<StreetId> {
        self.entries.iter().filter_map(|d| match d {
            Diagnostic::UnservedStreet { street } => Some(*street),
            _ => None,
        }).collect()
    }

    pub fn unresolved_orphans(&self) -> Vec<DemandId> {
        self.entries.iter().filter_map(|d| match d {
            Diagnostic::UnresolvedOrphan { demand, .. } => Some(*demand),
            _ => None,
        }).collect()
    }

    pub fn unassociated(&self) -> Vec<DemandId> {
        self.entries.iter().filter_map(|d| match d {
            Diagnostic::UnassociatedDemand { demand } => Some(*demand),
            _ => None,
        }).collect()
    }

    /// Number of entries per kind.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.entries {
            *counts.entry(d.kind()).or_default() += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_by_kind() {
        let mut diags = Diagnostics::default();
        diags.push(Diagnostic::UnservedStreet { street: StreetId(2) });
        diags.push(Diagnostic::UnresolvedOrphan { demand: DemandId(7), street: StreetId(2), radius: 20.0 });
        diags.push(Diagnostic::UnresolvedOrphan { demand: DemandId(8), street: StreetId(2), radius: 20.0 });

        assert_eq!(diags.unserved_streets(), vec![StreetId(2)]);
        assert_eq!(diags.unresolved_orphans(), vec![DemandId(7), DemandId(8)]);
        assert_eq!(diags.counts().get("unresolved_orphan"), Some(&2));
        assert!(diags.unassociated().is_empty());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let d = Diagnostic::DegenerateDirection { box_id: BoxId::primary(StreetId(1), 2) };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "degenerate_direction");
        assert_eq!(json["box_id"], "1.2");
        assert_eq!(d.to_string(), "box 1.2 cut has a zero-length end segment; extension skipped");
    }
}
