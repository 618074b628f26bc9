use geo::{LineString, Point};
use streetgeom::SegmentIndex;

use crate::model::{StreetId, StreetLayer};

/// Reference points from building alignments: the midpoint of every edge,
/// tagged with the nearest street.
pub fn midpoints(alignments: &[LineString<f64>], streets: &StreetLayer) -> Vec<(Point<f64>, StreetId)> {
    let index = SegmentIndex::new(streets.iter().map(|s| (&s.geometry, s.street_id)));
    if index.is_empty() {
        return Vec::new();
    }
    alignments.iter()
        .flat_map(|line| line.lines())
        .filter_map(|edge| {
            let mid = Point::new((edge.start.x + edge.end.x) / 2.0, (edge.start.y + edge.end.y) / 2.0);
            index.nearest(&mid).map(|(&street, _)| (mid, street))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;
    use crate::model::StreetSegment;

    #[test]
    fn every_edge_yields_a_tagged_midpoint() {
        let streets = StreetLayer::new(vec![
            StreetSegment::new(StreetId(1), line_string![(x: 0.0, y: 0.0), (x: 20.0, y: 0.0)]),
            StreetSegment::new(StreetId(2), line_string![(x: 0.0, y: 20.0), (x: 20.0, y: 20.0)]),
        ]).unwrap();
        let alignment = line_string![(x: 0.0, y: 4.0), (x: 10.0, y: 4.0), (x: 10.0, y: 18.0)];

        let points = midpoints(&[alignment], &streets);
        assert_eq!(points, vec![
            (Point::new(5.0, 4.0), StreetId(1)),
            (Point::new(10.0, 11.0), StreetId(2)),
        ]);
    }

    #[test]
    fn no_streets_no_points() {
        let streets = StreetLayer::new(vec![]).unwrap();
        let alignment = line_string![(x: 0.0, y: 4.0), (x: 10.0, y: 4.0)];
        assert!(midpoints(&[alignment], &streets).is_empty());
    }
}
