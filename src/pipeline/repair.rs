use std::collections::BTreeMap;

use geo::{BoundingRect, LineString};
use streetgeom::GeometryEngine;
use tracing::debug;

use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::model::{BoxId, CapacityBox, ConnectorLine, DemandId, Footprint, OrderRank};
use crate::store::SpatialStore;

use super::synthesize::{place_secondary, shape_between};

/// A box created (or footprinted) from a connector piece.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedBox {
    pub box_id: BoxId,
    pub members: Vec<DemandId>,
    pub footprint: Footprint,
    pub cut: LineString<f64>,
}

/// Changes produced by repairing one box.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxRepair {
    pub connectors: Vec<ConnectorLine>,
    pub spawned: Vec<SpawnedBox>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Uncovered demands grouped by their box, in sequence order.
pub fn uncovered_groups(store: &SpatialStore) -> BTreeMap<BoxId, Vec<DemandId>> {
    let mut groups: BTreeMap<BoxId, Vec<DemandId>> = BTreeMap::new();
    for d in store.ordered().uncovered() {
        if let Some(id) = &d.box_id {
            groups.entry(id.clone()).or_default().push(d.demand_id);
        }
    }
    groups
}

/// Pieces of `line` outside every committed footprint it touches.
fn cut_by_footprints<E: GeometryEngine>(engine: &E, store: &SpatialStore, line: &LineString<f64>) -> Vec<LineString<f64>> {
    let Some(rect) = line.bounding_rect() else { return Vec::new() };
    let mut pieces = vec![line.clone()];
    for f in store.footprints().query(rect, 0.0) {
        pieces = pieces.into_iter()
            .flat_map(|piece| {
                if engine.intersects(&piece, &f.polygon) {
                    engine.line_difference(&piece, &f.polygon).0
                } else {
                    vec![piece]
                }
            })
            .filter(|piece| piece.0.len() >= 2)
            .collect();
    }
    pieces
}

/// Join the uncovered `members` of `source` with a connector and turn each
/// piece left outside committed footprints into a secondary footprint.
///
/// Pieces get derived ids `<source>.<n>`; the source id itself is reused when
/// the connector survives whole and the source has no footprint.
pub fn repair_box<E: GeometryEngine>(
    engine: &E,
    store: &SpatialStore,
    source: &BoxId,
    members: &[DemandId],
    config: &Config,
) -> BoxRepair {
    let mut out = BoxRepair::default();
    let Some(street) = store.streets().get(source.street()) else { return out };
    let points: Vec<_> = members.iter()
        .filter_map(|&id| store.ordered().get(id))
        .map(|d| (d.demand_id, d.geometry))
        .collect();
    if points.len() < 2 {
        return out;
    }

    let connector = LineString::from(points.iter().map(|(_, p)| p.0).collect::<Vec<_>>());
    let pieces = cut_by_footprints(engine, store, &connector);
    debug!(box_id = %source, pieces = pieces.len(), "connector built");

    // each member goes to its closest piece
    let mut assigned: Vec<Vec<DemandId>> = vec![Vec::new(); pieces.len()];
    for (id, point) in &points {
        let closest = pieces.iter().enumerate()
            .map(|(i, piece)| (i, engine.distance_to_line(point, piece)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((i, _)) = closest {
            assigned[i].push(*id);
        }
    }

    let reuse_source = pieces.len() == 1 && !store.footprints().contains_key(source);
    let mut next_child = store.next_child(source);
    let basis = store.offset_basis(source.street()).max(
        members.iter()
            .filter_map(|&id| store.ordered().get(id))
            .filter(|d| d.street_id == source.street())
            .map(|d| d.projection_distance)
            .fold(0.0, f64::max),
    );

    // pieces placed so far must not overlap each other either
    let mut layer = store.footprints().clone();
    for (piece, piece_members) in pieces.into_iter().zip(assigned) {
        let mut connector = ConnectorLine { source: source.clone(), box_id: None, geometry: piece, members: piece_members };
        if connector.members.is_empty() {
            out.connectors.push(connector);
            continue;
        }

        let box_id = if reuse_source { source.clone() } else { source.child(next_child) };

        // street span covered by the piece and its demands
        let fractions: Vec<f64> = connector.geometry.points()
            .chain(connector.members.iter().filter_map(|&id| store.ordered().get(id)).map(|d| d.geometry))
            .filter_map(|p| engine.project(&p, &street.geometry))
            .map(|p| p.fraction)
            .collect();
        let start = fractions.iter().copied().fold(f64::INFINITY, f64::min);
        let end = fractions.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        match shape_between(engine, &street.geometry, start, end, basis, config) {
            Err(length) => {
                out.diagnostics.push(Diagnostic::DegenerateCenterline { box_id, length });
            }
            Ok(shape) => match place_secondary(engine, &layer, &box_id, &shape, config) {
                Some(footprint) => {
                    if !reuse_source {
                        next_child += 1;
                    }
                    layer.insert(footprint.clone());
                    connector.box_id = Some(box_id.clone());
                    out.spawned.push(SpawnedBox {
                        box_id,
                        members: connector.members.clone(),
                        footprint,
                        cut: shape.cut,
                    });
                }
                None => debug!(box_id = %box_id, "secondary footprint fully overlapped"),
            },
        }
        out.connectors.push(connector);
    }
    out
}

/// Apply the changes of one repaired box.
pub fn apply(store: &mut SpatialStore, repair: BoxRepair) -> Vec<Diagnostic> {
    for spawned in repair.spawned {
        if !store.boxes().contains_key(&spawned.box_id) {
            store.insert_box(CapacityBox::new(spawned.box_id.clone(), OrderRank::Secondary));
        }
        store.commit_footprint(spawned.footprint, spawned.cut);
        for demand in spawned.members {
            store.move_demand(demand, &spawned.box_id);
        }
    }
    for connector in repair.connectors {
        store.push_connector(connector);
    }
    repair.diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon, MultiPolygon, Point};
    use std::collections::BTreeSet;
    use streetgeom::PlanarEngine;
    use crate::model::{DemandPoint, StreetId, StreetLayer, StreetSegment};
    use crate::pipeline::sequence::partition_street;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]])
    }

    /// Box 1.1 on a street along the x axis, holding every demand.
    fn store_with(demands: &[(f64, f64)]) -> SpatialStore {
        let engine = PlanarEngine::default();
        let street = StreetSegment::new(StreetId(1), line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)]);
        let demands: Vec<DemandPoint> = demands.iter().enumerate()
            .map(|(i, &(x, y))| DemandPoint::new(DemandId(i as i64 + 1), 1.0, Point::new(x, y)).with_street(StreetId(1)))
            .collect();
        let refs: Vec<&DemandPoint> = demands.iter().collect();
        let partition = partition_street(&engine, &street, &refs, 100.0, 1);
        let mut store = SpatialStore::new(StreetLayer::new(vec![street]).unwrap(), demands.clone());
        store.insert_street_partition(StreetId(1), partition.ordered, partition.boxes, partition.max_distance);
        store
    }

    #[test]
    fn whole_connector_reuses_a_source_without_footprint() {
        let engine = PlanarEngine::default();
        let config = Config::default();
        let mut store = store_with(&[(10.0, 1.0), (30.0, 1.0)]);
        let source = BoxId::primary(StreetId(1), 1);

        assert_eq!(repair_box(&engine, &store, &source, &[DemandId(1)], &config), BoxRepair::default());

        let repair = repair_box(&engine, &store, &source, &[DemandId(1), DemandId(2)], &config);
        assert_eq!(repair.connectors.len(), 1);
        assert_eq!(repair.spawned.len(), 1);
        assert_eq!(repair.spawned[0].box_id, source);

        assert!(apply(&mut store, repair).is_empty());
        assert_eq!(store.boxes().len(), 1);
        assert_eq!(store.footprints().get(&source).unwrap().order_rank, OrderRank::Secondary);
        assert_eq!(store.boxes()[&source].order_rank, OrderRank::Secondary);
    }

    #[test]
    fn connector_split_by_a_footprint_spawns_two_children() {
        let engine = PlanarEngine::default();
        let config = Config::default();
        let mut store = store_with(&[(10.0, 10.0), (50.0, 1.0), (90.0, 10.0)]);
        let source = BoxId::primary(StreetId(1), 1);
        let blocker = BoxId::primary(StreetId(2), 1);
        store.commit_footprint(
            Footprint::new(source.clone(), OrderRank::Primary, rect(40.0, -2.5, 60.0, 2.5), 1.0),
            line_string![(x: 40.0, y: 0.0), (x: 60.0, y: 0.0)],
        );
        store.commit_footprint(
            Footprint::new(blocker.clone(), OrderRank::Primary, rect(45.0, 5.0, 55.0, 20.0), 1.0),
            line_string![(x: 50.0, y: 5.0), (x: 50.0, y: 20.0)],
        );

        let repair = repair_box(&engine, &store, &source, &[DemandId(1), DemandId(3)], &config);
        assert!(repair.diagnostics.is_empty());
        assert_eq!(repair.connectors.len(), 2);
        assert!(repair.connectors.iter().all(|c| c.source == source && !c.is_residual()));

        let names: BTreeSet<BoxId> = repair.spawned.iter().map(|s| s.box_id.clone()).collect();
        assert_eq!(names, BTreeSet::from([source.child(1), source.child(2)]));
        let groups: BTreeSet<Vec<DemandId>> = repair.spawned.iter().map(|s| s.members.clone()).collect();
        assert_eq!(groups, BTreeSet::from([vec![DemandId(1)], vec![DemandId(3)]]));

        let placed: Vec<MultiPolygon<f64>> = repair.spawned.iter().map(|s| s.footprint.polygon.clone()).collect();
        assert!(apply(&mut store, repair).is_empty());

        let own = &store.footprints().get(&source).unwrap().polygon;
        let other = &store.footprints().get(&blocker).unwrap().polygon;
        for polygon in &placed {
            assert!(!engine.overlaps(polygon, own));
            assert!(!engine.overlaps(polygon, other));
        }
        assert_eq!(store.boxes()[&source].members, vec![DemandId(2)]);
        assert_eq!(store.ordered().get(DemandId(1)).unwrap().box_id.as_ref().map(|b| b.parent()), Some(Some(source.clone())));
        assert_eq!(store.connectors().len(), 2);
    }
}
