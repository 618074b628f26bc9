use std::collections::BTreeMap;

use geo::Rect;
use streetgeom::GeometryEngine;

use crate::model::{BoxId, DemandId};
use crate::store::SpatialStore;

/// Coverage state of one demand.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageEntry {
    pub demand: DemandId,
    pub covered: bool,
    /// Box whose footprint counts the demand; `None` when uncovered.
    pub owner: Option<BoxId>,
}

/// Coverage of every ordered demand plus the contained weight per footprint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coverage {
    pub entries: Vec<CoverageEntry>,
    pub contained: BTreeMap<BoxId, f64>,
}

impl Coverage {
    pub fn uncovered(&self) -> usize {
        self.entries.iter().filter(|e| !e.covered).count()
    }
}

/// Decide which footprint, if any, covers each demand.
///
/// A demand is covered when it lies within `tolerance` of a footprint. Among
/// several covering footprints its current box wins, otherwise the first in
/// box order, so each demand is counted once.
pub fn compute<E: GeometryEngine>(engine: &E, store: &SpatialStore, tolerance: f64) -> Coverage {
    let footprints = store.footprints();
    let mut coverage = Coverage::default();
    for f in footprints.iter() {
        coverage.contained.insert(f.box_id.clone(), 0.0);
    }

    for d in store.ordered().iter() {
        let probe = Rect::new(d.geometry.0, d.geometry.0);
        let covering: Vec<&BoxId> = footprints.query(probe, tolerance).into_iter()
            .filter(|f| engine.distance_to_polygon(&d.geometry, &f.polygon) <= tolerance)
            .map(|f| &f.box_id)
            .collect();

        let owner = d.box_id.as_ref()
            .filter(|current| covering.contains(current))
            .or_else(|| covering.first().copied())
            .cloned();
        if let Some(id) = &owner {
            *coverage.contained.entry(id.clone()).or_default() += d.weight;
        }
        coverage.entries.push(CoverageEntry { demand: d.demand_id, covered: owner.is_some(), owner });
    }
    coverage
}

/// Apply a coverage snapshot: flags, membership and weights.
///
/// Covered demands move into the box that counts them; uncovered demands keep
/// their last box. Boxes left with neither members nor a footprint are dropped.
pub fn apply(store: &mut SpatialStore, coverage: &Coverage) {
    for entry in &coverage.entries {
        store.set_covered(entry.demand, entry.covered);
        if let Some(owner) = &entry.owner {
            store.move_demand(entry.demand, owner);
        }
    }
    for (id, weight) in &coverage.contained {
        store.set_contained_weight(id, *weight);
    }
    store.drop_empty_boxes();
}

/// Recompute and apply coverage; returns the number of uncovered demands.
pub fn refresh<E: GeometryEngine>(engine: &E, store: &mut SpatialStore, tolerance: f64) -> usize {
    let coverage = compute(engine, store, tolerance);
    apply(store, &coverage);
    coverage.uncovered()
}
