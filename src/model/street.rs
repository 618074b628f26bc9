use ahash::AHashMap;
use anyhow::{ensure, Result};
use geo::LineString;

use streetgeom::line;

use super::ids::StreetId;

/// A street centerline with its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct StreetSegment {
    pub street_id: StreetId,
    pub geometry: LineString<f64>,
}

impl StreetSegment {
    pub fn new(street_id: StreetId, geometry: LineString<f64>) -> Self {
        Self { street_id, geometry }
    }

    #[inline] pub fn length(&self) -> f64 { line::length(&self.geometry) }
}

/// Immutable street layer, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct StreetLayer {
    segments: Vec<StreetSegment>,
    index: AHashMap<StreetId, usize>,
    lengths: Vec<f64>,
}

impl StreetLayer {
    /// Build the layer, rejecting duplicate ids and polylines with fewer than two vertices.
    pub fn new(segments: Vec<StreetSegment>) -> Result<Self> {
        let mut index = AHashMap::with_capacity(segments.len());
        for (i, seg) in segments.iter().enumerate() {
            ensure!(seg.geometry.0.len() >= 2,
                "street {} has {} vertices, expected at least 2", seg.street_id, seg.geometry.0.len());
            ensure!(index.insert(seg.street_id, i).is_none(),
                "duplicate street id {}", seg.street_id);
        }
        let lengths = segments.iter().map(StreetSegment::length).collect();
        Ok(Self { segments, index, lengths })
    }

    #[inline] pub fn len(&self) -> usize { self.segments.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.segments.is_empty() }

    #[inline] pub fn iter(&self) -> impl Iterator<Item = &StreetSegment> { self.segments.iter() }

    pub fn get(&self, id: StreetId) -> Option<&StreetSegment> {
        self.index.get(&id).map(|&i| &self.segments[i])
    }

    pub fn length_of(&self, id: StreetId) -> Option<f64> {
        self.index.get(&id).map(|&i| self.lengths[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn rejects_duplicate_ids() {
        let a = StreetSegment::new(StreetId(1), line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]);
        let b = StreetSegment::new(StreetId(1), line_string![(x: 0.0, y: 1.0), (x: 1.0, y: 1.0)]);
        assert!(StreetLayer::new(vec![a, b]).is_err());
    }

    #[test]
    fn rejects_single_vertex_street() {
        let a = StreetSegment::new(StreetId(1), line_string![(x: 0.0, y: 0.0)]);
        assert!(StreetLayer::new(vec![a]).is_err());
    }

    #[test]
    fn lookup_by_id() {
        let layer = StreetLayer::new(vec![
            StreetSegment::new(StreetId(4), line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0)]),
        ]).unwrap();
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.length_of(StreetId(4)), Some(5.0));
        assert!(layer.get(StreetId(5)).is_none());
    }
}
