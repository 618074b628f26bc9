use std::collections::BTreeMap;

use geo::{BoundingRect, MultiPolygon, Rect};
use rstar::{RTree, RTreeObject, AABB};

use super::boxes::OrderRank;
use super::ids::{BoxId, StreetId};

/// Polygon served by one box.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub box_id: BoxId,
    pub street_id: StreetId,
    pub order_rank: OrderRank,
    pub polygon: MultiPolygon<f64>,
    /// Buffer radius minus the margin: the member distance the footprint was sized for.
    pub offset_basis: f64,
    /// Weight of the demands counted inside this footprint.
    pub contained_weight: f64,
}

impl Footprint {
    pub fn new(box_id: BoxId, order_rank: OrderRank, polygon: MultiPolygon<f64>, offset_basis: f64) -> Self {
        Self {
            street_id: box_id.street(),
            box_id,
            order_rank,
            polygon,
            offset_basis,
            contained_weight: 0.0,
        }
    }
}

/// A footprint's bounding box in the R-tree, keyed by box id.
#[derive(Debug, Clone, PartialEq)]
struct BoundingBox {
    key: BoxId,
    bbox: Rect<f64>,
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Committed footprints, at most one per box, with a bounding-box index.
#[derive(Debug, Clone, Default)]
pub struct FootprintLayer {
    items: BTreeMap<BoxId, Footprint>,
    rtree: RTree<BoundingBox>,
}

impl FootprintLayer {
    #[inline] pub fn len(&self) -> usize { self.items.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Footprints in box-id order.
    #[inline] pub fn iter(&self) -> impl Iterator<Item = &Footprint> { self.items.values() }

    #[inline] pub fn get(&self, id: &BoxId) -> Option<&Footprint> { self.items.get(id) }

    #[inline] pub fn contains_key(&self, id: &BoxId) -> bool { self.items.contains_key(id) }

    pub fn get_mut(&mut self, id: &BoxId) -> Option<&mut Footprint> { self.items.get_mut(id) }

    /// Insert or replace the footprint of `footprint.box_id`.
    pub fn insert(&mut self, footprint: Footprint) {
        self.remove(&footprint.box_id);
        if let Some(bbox) = footprint.polygon.bounding_rect() {
            self.rtree.insert(BoundingBox { key: footprint.box_id.clone(), bbox });
        }
        self.items.insert(footprint.box_id.clone(), footprint);
    }

    pub fn remove(&mut self, id: &BoxId) -> Option<Footprint> {
        let old = self.items.remove(id)?;
        if let Some(bbox) = old.polygon.bounding_rect() {
            self.rtree.remove(&BoundingBox { key: id.clone(), bbox });
        }
        Some(old)
    }

    /// Footprints whose bounding box intersects `rect` grown by `radius`, in box-id order.
    pub fn query(&self, rect: Rect<f64>, radius: f64) -> Vec<&Footprint> {
        let envelope = AABB::from_corners(
            [rect.min().x - radius, rect.min().y - radius],
            [rect.max().x + radius, rect.max().y + radius],
        );
        let mut keys: Vec<&BoxId> = self.rtree.locate_in_envelope_intersecting(&envelope)
            .map(|bb| &bb.key)
            .collect();
        keys.sort();
        keys.into_iter().filter_map(|k| self.items.get(k)).collect()
    }
}
