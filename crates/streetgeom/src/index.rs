use geo::{LineString, Point};
use rstar::primitives::{GeomWithData, Line};
use rstar::{PointDistance, RTree};

/// Nearest-neighbor lookup over tagged points.
#[derive(Debug, Clone)]
pub struct PointIndex<T> {
    tree: RTree<GeomWithData<[f64; 2], T>>,
}

impl<T> PointIndex<T> {
    /// Bulk-load an index from `(point, tag)` pairs.
    pub fn new(points: impl IntoIterator<Item = (Point<f64>, T)>) -> Self {
        Self {
            tree: RTree::bulk_load(points.into_iter()
                .map(|(p, tag)| GeomWithData::new([p.x(), p.y()], tag))
                .collect()),
        }
    }

    #[inline] pub fn len(&self) -> usize { self.tree.size() }

    #[inline] pub fn is_empty(&self) -> bool { self.tree.size() == 0 }

    /// Closest tagged point to `point`, with its Euclidean distance.
    pub fn nearest(&self, point: &Point<f64>) -> Option<(&T, f64)> {
        let query = [point.x(), point.y()];
        self.tree.nearest_neighbor(&query)
            .map(|hit| (&hit.data, hit.distance_2(&query).sqrt()))
    }
}

/// Nearest-segment lookup over tagged polylines.
///
/// Every segment of every polyline is indexed separately, so queries return
/// the exact closest polyline rather than the closest bounding box.
#[derive(Debug, Clone)]
pub struct SegmentIndex<T> {
    tree: RTree<GeomWithData<Line<[f64; 2]>, T>>,
}

impl<T: Clone> SegmentIndex<T> {
    pub fn new<'a>(lines: impl IntoIterator<Item = (&'a LineString<f64>, T)>) -> Self {
        let mut segments = Vec::new();
        for (line, tag) in lines {
            for seg in line.lines() {
                segments.push(GeomWithData::new(
                    Line::new([seg.start.x, seg.start.y], [seg.end.x, seg.end.y]),
                    tag.clone(),
                ));
            }
        }
        Self { tree: RTree::bulk_load(segments) }
    }

    #[inline] pub fn is_empty(&self) -> bool { self.tree.size() == 0 }

    /// Tag of the polyline closest to `point`, with the distance to it.
    pub fn nearest(&self, point: &Point<f64>) -> Option<(&T, f64)> {
        let query = [point.x(), point.y()];
        self.tree.nearest_neighbor(&query)
            .map(|hit| (&hit.data, hit.distance_2(&query).sqrt()))
    }
}
