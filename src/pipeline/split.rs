use geo::LineString;
use streetgeom::GeometryEngine;

use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::model::{BoxId, CapacityBox, DemandId, Footprint, OrderRank};
use crate::store::SpatialStore;

use super::synthesize::{place_primary, shape_between, Placement};

/// One half of a split box.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitHalf {
    pub box_id: BoxId,
    pub members: Vec<DemandId>,
    /// Committed footprint and its cut; `None` when synthesis failed or was rejected.
    pub footprint: Option<(Footprint, LineString<f64>)>,
}

/// Replacement of an oversize box by two successors.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub original: BoxId,
    pub rank: OrderRank,
    pub halves: Vec<SplitHalf>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Bisect members by weight: a member goes to the first half while the
/// running weight stays at or below half the total. Both halves are
/// non-empty when there are at least two members.
pub fn bisect(members: &[(DemandId, f64)]) -> (Vec<DemandId>, Vec<DemandId>) {
    let total: f64 = members.iter().map(|&(_, w)| w).sum();
    let mut acc = 0.0;
    let (mut first, mut second) = (Vec::new(), Vec::new());
    for &(id, w) in members {
        acc += w;
        if acc <= total / 2.0 { first.push(id) } else { second.push(id) }
    }
    if first.is_empty() && second.len() > 1 {
        first.push(second.remove(0));
    } else if second.is_empty() && first.len() > 1 {
        second.extend(first.pop());
    }
    (first, second)
}

/// Split box `id` into two fresh children `<id>.<n>` and `<id>.<n+1>` and
/// synthesize a footprint for each half. Children already made by repair keep their ids.
///
/// Halves are synthesized against the footprints that remain once the
/// original is discarded, with the primary overlap policy.
pub fn split_box<E: GeometryEngine>(engine: &E, store: &SpatialStore, id: &BoxId, config: &Config) -> Option<Split> {
    let original = store.boxes().get(id)?;
    let street = store.streets().get(id.street())?;
    let members: Vec<(DemandId, f64)> = original.members.iter()
        .filter_map(|&m| store.ordered().get(m).map(|d| (m, d.weight)))
        .collect();
    if members.len() < 2 {
        return None;
    }
    let (first, second) = bisect(&members);

    let mut layer = store.footprints().clone();
    layer.remove(id);
    let basis = store.offset_basis(id.street()).max(original.max_member_distance);

    let mut split = Split { original: id.clone(), rank: original.order_rank, halves: Vec::new(), diagnostics: Vec::new() };
    let n = store.next_child(id);
    for (box_id, half) in [(id.child(n), first), (id.child(n + 1), second)] {
        let fractions: Vec<f64> = half.iter()
            .filter_map(|&m| store.ordered().get(m))
            .filter_map(|d| engine.project(&d.geometry, &street.geometry))
            .map(|p| p.fraction)
            .collect();
        let start = fractions.iter().copied().fold(f64::INFINITY, f64::min);
        let end = fractions.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let footprint = match shape_between(engine, &street.geometry, start, end, basis, config) {
            Err(length) => {
                split.diagnostics.push(Diagnostic::DegenerateCenterline { box_id: box_id.clone(), length });
                None
            }
            Ok(shape) => match place_primary(engine, &layer, &box_id, &shape, original.order_rank, config.primary_overlap, config) {
                Placement::Committed(fp) => {
                    layer.insert(fp.clone());
                    Some((fp, shape.cut))
                }
                Placement::Rejected { .. } => None,
            },
        };
        split.halves.push(SplitHalf { box_id, members: half, footprint });
    }
    Some(split)
}

/// Discard the original box and install its halves.
pub fn apply(store: &mut SpatialStore, split: Split) -> Vec<Diagnostic> {
    store.remove_box(&split.original);
    for half in split.halves {
        store.insert_box(CapacityBox::new(half.box_id.clone(), split.rank));
        if let Some((footprint, cut)) = half.footprint {
            store.commit_footprint(footprint, cut);
        }
        for demand in half.members {
            store.move_demand(demand, &half.box_id);
        }
    }
    split.diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, Point};
    use streetgeom::PlanarEngine;
    use crate::model::{DemandPoint, StreetId, StreetLayer, StreetSegment};
    use crate::pipeline::sequence::partition_street;

    /// One street with a single box of four demands weighing 5, 5, 6, 6.
    fn oversize_store(engine: &PlanarEngine) -> SpatialStore {
        let street = StreetSegment::new(StreetId(1), line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)]);
        let demands: Vec<DemandPoint> = [(10.0, 5.0), (20.0, 5.0), (60.0, 6.0), (70.0, 6.0)].iter().enumerate()
            .map(|(i, &(x, w))| DemandPoint::new(DemandId(i as i64 + 1), w, Point::new(x, 1.0)).with_street(StreetId(1)))
            .collect();
        let refs: Vec<&DemandPoint> = demands.iter().collect();
        let partition = partition_street(engine, &street, &refs, 100.0, 1);
        let mut store = SpatialStore::new(StreetLayer::new(vec![street]).unwrap(), demands.clone());
        store.insert_street_partition(StreetId(1), partition.ordered, partition.boxes, partition.max_distance);
        store
    }

    #[test]
    fn oversize_box_is_replaced_by_two_footprinted_halves() {
        let engine = PlanarEngine::default();
        let config = Config::default();
        let mut store = oversize_store(&engine);
        let original = BoxId::primary(StreetId(1), 1);
        assert_eq!(store.oversize_boxes(config.split_limit()), vec![original.clone()]);

        let split = split_box(&engine, &store, &original, &config).unwrap();
        assert!(apply(&mut store, split).is_empty());

        let (first, second) = (original.child(1), original.child(2));
        assert!(!store.boxes().contains_key(&original));
        assert_eq!(store.boxes()[&first].members, vec![DemandId(1), DemandId(2)]);
        assert_eq!(store.boxes()[&second].members, vec![DemandId(3), DemandId(4)]);
        assert_eq!(store.boxes()[&first].aggregate_weight(), 10.0);
        assert_eq!(store.boxes()[&second].aggregate_weight(), 12.0);
        assert_eq!(store.ordered().get(DemandId(3)).unwrap().box_id, Some(second.clone()));

        let a = &store.footprints().get(&first).unwrap().polygon;
        let b = &store.footprints().get(&second).unwrap().polygon;
        assert!(!engine.overlaps(a, b));
        assert!(store.oversize_boxes(config.split_limit()).is_empty());
    }

    #[test]
    fn halves_skip_children_that_already_exist() {
        let engine = PlanarEngine::default();
        let config = Config::default();
        let street = StreetSegment::new(StreetId(1), line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)]);
        let demands: Vec<DemandPoint> = [(10.0, 5.0), (20.0, 5.0), (60.0, 6.0), (70.0, 6.0), (90.0, 1.0)].iter().enumerate()
            .map(|(i, &(x, w))| DemandPoint::new(DemandId(i as i64 + 1), w, Point::new(x, 1.0)).with_street(StreetId(1)))
            .collect();
        let refs: Vec<&DemandPoint> = demands.iter().collect();
        let partition = partition_street(&engine, &street, &refs, 100.0, 1);
        let mut store = SpatialStore::new(StreetLayer::new(vec![street]).unwrap(), demands.clone());
        store.insert_street_partition(StreetId(1), partition.ordered, partition.boxes, partition.max_distance);

        let original = BoxId::primary(StreetId(1), 1);
        let repaired = original.child(1);
        store.insert_box(CapacityBox::new(repaired.clone(), OrderRank::Secondary));
        store.move_demand(DemandId(5), &repaired);

        let split = split_box(&engine, &store, &original, &config).unwrap();
        let names: Vec<BoxId> = split.halves.iter().map(|h| h.box_id.clone()).collect();
        assert_eq!(names, vec![original.child(2), original.child(3)]);
        apply(&mut store, split);

        assert_eq!(store.boxes()[&repaired].members, vec![DemandId(5)]);
        assert_eq!(store.boxes()[&repaired].aggregate_weight(), 1.0);
        assert_eq!(store.ordered().get(DemandId(5)).unwrap().box_id, Some(repaired));
        assert_eq!(store.boxes()[&original.child(2)].members, vec![DemandId(1), DemandId(2)]);
        assert_eq!(store.boxes()[&original.child(3)].members, vec![DemandId(3), DemandId(4)]);
    }

    fn ids(v: &[DemandId]) -> Vec<i64> {
        v.iter().map(|d| d.0).collect()
    }

    #[test]
    fn bisect_at_half_weight() {
        let members: Vec<_> = [5.0, 6.0, 4.0, 3.0].iter().enumerate()
            .map(|(i, &w)| (DemandId(i as i64), w))
            .collect();
        // total 18, half 9: 5 <= 9, 11 > 9
        let (a, b) = bisect(&members);
        assert_eq!(ids(&a), vec![0]);
        assert_eq!(ids(&b), vec![1, 2, 3]);
    }

    #[test]
    fn heavy_first_member_still_leaves_two_halves() {
        let members = vec![(DemandId(1), 20.0), (DemandId(2), 1.0)];
        let (a, b) = bisect(&members);
        assert_eq!(ids(&a), vec![1]);
        assert_eq!(ids(&b), vec![2]);
    }

    #[test]
    fn zero_weights_split_evenly_enough() {
        let members = vec![(DemandId(1), 0.0), (DemandId(2), 0.0), (DemandId(3), 0.0)];
        let (a, b) = bisect(&members);
        assert_eq!(ids(&a), vec![1, 2]);
        assert_eq!(ids(&b), vec![3]);
    }
}
