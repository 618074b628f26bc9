use ahash::AHashMap;
use geo::Point;
use serde::Serialize;

use super::ids::{BoxId, DemandId, StreetId};

/// A weighted demand location, optionally attached to a street.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandPoint {
    pub demand_id: DemandId,
    /// Non-negative load ("market index").
    pub weight: f64,
    pub street_id: Option<StreetId>,
    pub geometry: Point<f64>,
}

impl DemandPoint {
    pub fn new(demand_id: DemandId, weight: f64, geometry: Point<f64>) -> Self {
        Self { demand_id, weight, street_id: None, geometry }
    }

    pub fn with_street(mut self, street_id: StreetId) -> Self {
        self.street_id = Some(street_id);
        self
    }
}

/// A demand after sequencing along its street.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderedDemand {
    pub demand_id: DemandId,
    pub street_id: StreetId,
    /// 1-based, unique across the run, increasing along each street.
    pub sequence_index: u32,
    /// Arc length from the street start to the projection of the demand.
    pub station: f64,
    /// Normalized position of the projection, in `[0, 1]`.
    pub fraction: f64,
    /// Perpendicular distance from the demand to the street centerline.
    pub projection_distance: f64,
    pub weight: f64,
    #[serde(skip)]
    pub geometry: Point<f64>,
    pub box_id: Option<BoxId>,
    pub covered: bool,
}

/// Ordered demands of a run, in sequence order, with lookup by id.
#[derive(Debug, Clone, Default)]
pub struct OrderedDemands {
    items: Vec<OrderedDemand>,
    index: AHashMap<DemandId, usize>,
}

impl OrderedDemands {
    /// Append demands of one street; they must come after everything already held.
    pub fn extend(&mut self, demands: impl IntoIterator<Item = OrderedDemand>) {
        for d in demands {
            debug_assert!(self.items.last().is_none_or(|last| last.sequence_index < d.sequence_index));
            self.index.insert(d.demand_id, self.items.len());
            self.items.push(d);
        }
    }

    #[inline] pub fn len(&self) -> usize { self.items.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.items.is_empty() }

    #[inline] pub fn iter(&self) -> impl Iterator<Item = &OrderedDemand> { self.items.iter() }

    pub fn get(&self, id: DemandId) -> Option<&OrderedDemand> {
        self.index.get(&id).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, id: DemandId) -> Option<&mut OrderedDemand> {
        self.index.get(&id).map(|&i| &mut self.items[i])
    }

    /// Demands not lying on any footprint, in sequence order.
    pub fn uncovered(&self) -> impl Iterator<Item = &OrderedDemand> {
        self.items.iter().filter(|d| !d.covered)
    }

    pub fn uncovered_count(&self) -> usize { self.uncovered().count() }

    pub fn into_vec(self) -> Vec<OrderedDemand> { self.items }
}
