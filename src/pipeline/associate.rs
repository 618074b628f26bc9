use std::collections::BTreeSet;

use geo::Point;
use streetgeom::{PointIndex, SegmentIndex};

use crate::model::{DemandId, DemandPoint, StreetId, StreetLayer};

/// Nearest-street lookup used to attach demands to streets.
pub trait StreetLocator {
    /// Street tagged on the closest reference feature, with the distance to it.
    fn nearest_street(&self, point: &Point<f64>) -> Option<(StreetId, f64)>;
}

impl StreetLocator for PointIndex<StreetId> {
    fn nearest_street(&self, point: &Point<f64>) -> Option<(StreetId, f64)> {
        self.nearest(point).map(|(&id, dist)| (id, dist))
    }
}

impl StreetLocator for SegmentIndex<StreetId> {
    fn nearest_street(&self, point: &Point<f64>) -> Option<(StreetId, f64)> {
        self.nearest(point).map(|(&id, dist)| (id, dist))
    }
}

/// Result of attaching demands to streets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    /// Street of every associated demand, in input order.
    pub assignments: Vec<(DemandId, StreetId)>,
    /// Distinct streets that received at least one demand.
    pub streets: BTreeSet<StreetId>,
    /// Demands left without a street.
    pub unassociated: Vec<DemandId>,
}

/// Attach each demand to the street of its nearest reference feature.
///
/// Demands that already carry a street keep it. A demand is left unassociated
/// when the locator has nothing in range, or when the street it resolves to
/// is not part of `streets`.
pub fn associate(
    demands: &[DemandPoint],
    locator: &dyn StreetLocator,
    streets: &StreetLayer,
    radius: Option<f64>,
) -> Association {
    let mut out = Association::default();
    for demand in demands {
        let street = demand.street_id.or_else(|| {
            locator.nearest_street(&demand.geometry)
                .filter(|&(_, dist)| radius.is_none_or(|r| dist <= r))
                .map(|(id, _)| id)
        });
        match street.filter(|&id| streets.get(id).is_some()) {
            Some(id) => {
                out.assignments.push((demand.demand_id, id));
                out.streets.insert(id);
            }
            None => out.unassociated.push(demand.demand_id),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;
    use crate::model::StreetSegment;

    fn layer() -> StreetLayer {
        StreetLayer::new(vec![
            StreetSegment::new(StreetId(1), line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]),
            StreetSegment::new(StreetId(2), line_string![(x: 0.0, y: 10.0), (x: 10.0, y: 10.0)]),
        ]).unwrap()
    }

    #[test]
    fn nearest_reference_point_wins() {
        let reference = PointIndex::new(vec![
            (Point::new(5.0, 1.0), StreetId(1)),
            (Point::new(5.0, 9.0), StreetId(2)),
        ]);
        let demands = vec![
            DemandPoint::new(DemandId(1), 1.0, Point::new(4.0, 2.0)),
            DemandPoint::new(DemandId(2), 1.0, Point::new(6.0, 8.0)),
        ];
        let assoc = associate(&demands, &reference, &layer(), None);
        assert_eq!(assoc.assignments, vec![(DemandId(1), StreetId(1)), (DemandId(2), StreetId(2))]);
        assert_eq!(assoc.streets.len(), 2);
        assert!(assoc.unassociated.is_empty());
    }

    #[test]
    fn radius_and_unknown_streets_exclude_demands() {
        let reference = PointIndex::new(vec![
            (Point::new(0.0, 0.0), StreetId(1)),
            (Point::new(50.0, 50.0), StreetId(9)),
        ]);
        let demands = vec![
            DemandPoint::new(DemandId(1), 1.0, Point::new(3.0, 4.0)),
            DemandPoint::new(DemandId(2), 1.0, Point::new(50.0, 51.0)),
            DemandPoint::new(DemandId(3), 1.0, Point::new(30.0, 0.0)),
        ];
        let assoc = associate(&demands, &reference, &layer(), Some(5.0));
        assert_eq!(assoc.assignments, vec![(DemandId(1), StreetId(1))]);
        assert_eq!(assoc.unassociated, vec![DemandId(2), DemandId(3)]);
    }

    #[test]
    fn empty_reference_leaves_everything_unassociated() {
        let reference: PointIndex<StreetId> = PointIndex::new(vec![]);
        let demands = vec![DemandPoint::new(DemandId(1), 1.0, Point::new(0.0, 0.0))];
        let assoc = associate(&demands, &reference, &layer(), None);
        assert_eq!(assoc.unassociated, vec![DemandId(1)]);
        assert!(assoc.streets.is_empty());
    }

    #[test]
    fn preassigned_street_is_kept_and_segments_can_locate() {
        let streets = layer();
        let locator = SegmentIndex::new(streets.iter().map(|s| (&s.geometry, s.street_id)));
        let demands = vec![
            DemandPoint::new(DemandId(1), 1.0, Point::new(5.0, 1.0)).with_street(StreetId(2)),
            DemandPoint::new(DemandId(2), 1.0, Point::new(5.0, 7.0)),
        ];
        let assoc = associate(&demands, &locator, &streets, None);
        assert_eq!(assoc.assignments, vec![(DemandId(1), StreetId(2)), (DemandId(2), StreetId(2))]);
    }
}
