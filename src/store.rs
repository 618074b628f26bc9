use std::collections::BTreeMap;

use ahash::AHashMap;
use geo::LineString;
use tracing::debug;

use crate::model::{
    BoxId, CapacityBox, ConnectorLine, DemandId, DemandPoint, Footprint, FootprintLayer,
    OrderedDemand, OrderedDemands, StreetId, StreetLayer,
};

/// All mutable state of a run.
///
/// Stages read it and return deltas; only the methods here mutate it, so
/// box membership, weights and footprint links stay consistent.
#[derive(Debug, Clone)]
pub struct SpatialStore {
    streets: StreetLayer,
    demands: Vec<DemandPoint>,
    ordered: OrderedDemands,
    boxes: BTreeMap<BoxId, CapacityBox>,
    footprints: FootprintLayer,
    cuts: BTreeMap<BoxId, LineString<f64>>,
    connectors: Vec<ConnectorLine>,
    offset_basis: AHashMap<StreetId, f64>,
}

impl SpatialStore {
    pub fn new(streets: StreetLayer, demands: Vec<DemandPoint>) -> Self {
        Self {
            streets,
            demands,
            ordered: OrderedDemands::default(),
            boxes: BTreeMap::new(),
            footprints: FootprintLayer::default(),
            cuts: BTreeMap::new(),
            connectors: Vec::new(),
            offset_basis: AHashMap::new(),
        }
    }

    #[inline] pub fn streets(&self) -> &StreetLayer { &self.streets }

    #[inline] pub fn demands(&self) -> &[DemandPoint] { &self.demands }

    #[inline] pub fn ordered(&self) -> &OrderedDemands { &self.ordered }

    #[inline] pub fn boxes(&self) -> &BTreeMap<BoxId, CapacityBox> { &self.boxes }

    #[inline] pub fn footprints(&self) -> &FootprintLayer { &self.footprints }

    #[inline] pub fn cuts(&self) -> &BTreeMap<BoxId, LineString<f64>> { &self.cuts }

    #[inline] pub fn connectors(&self) -> &[ConnectorLine] { &self.connectors }

    /// Buffer basis shared by the boxes of `street` (its largest member distance).
    pub fn offset_basis(&self, street: StreetId) -> f64 {
        self.offset_basis.get(&street).copied().unwrap_or(0.0)
    }

    /// Record the street each associated demand was attached to.
    pub fn assign_streets(&mut self, assignments: &[(DemandId, StreetId)]) {
        let by_id: AHashMap<DemandId, StreetId> = assignments.iter().copied().collect();
        for d in &mut self.demands {
            if let Some(&street) = by_id.get(&d.demand_id) {
                d.street_id = Some(street);
            }
        }
    }

    /// Add the sequenced demands and primary boxes of one street.
    pub fn insert_street_partition(
        &mut self,
        street: StreetId,
        ordered: Vec<OrderedDemand>,
        boxes: Vec<CapacityBox>,
        max_distance: f64,
    ) {
        self.offset_basis.insert(street, max_distance);
        self.ordered.extend(ordered);
        for b in boxes {
            self.boxes.insert(b.box_id.clone(), b);
        }
    }

    pub fn insert_box(&mut self, b: CapacityBox) {
        self.boxes.insert(b.box_id.clone(), b);
    }

    /// Commit or replace the footprint of a box along with the cut it was buffered from.
    pub fn commit_footprint(&mut self, footprint: Footprint, cut: LineString<f64>) {
        debug!(box_id = %footprint.box_id, rank = %footprint.order_rank, "footprint committed");
        if let Some(b) = self.boxes.get_mut(&footprint.box_id) {
            b.order_rank = footprint.order_rank;
        }
        self.cuts.insert(footprint.box_id.clone(), cut);
        self.footprints.insert(footprint);
    }

    /// Destroy a box with its footprint and cut. Its demands are left without a box.
    pub fn remove_box(&mut self, id: &BoxId) -> Option<CapacityBox> {
        self.footprints.remove(id);
        self.cuts.remove(id);
        let removed = self.boxes.remove(id)?;
        for member in &removed.members {
            if let Some(d) = self.ordered.get_mut(*member) {
                if d.box_id.as_ref() == Some(id) {
                    d.box_id = None;
                }
            }
        }
        Some(removed)
    }

    pub fn push_connector(&mut self, connector: ConnectorLine) {
        self.connectors.push(connector);
    }

    pub fn set_covered(&mut self, demand: DemandId, covered: bool) {
        if let Some(d) = self.ordered.get_mut(demand) {
            d.covered = covered;
        }
    }

    pub fn set_contained_weight(&mut self, id: &BoxId, weight: f64) {
        if let Some(f) = self.footprints.get_mut(id) {
            f.contained_weight = weight;
        }
    }

    /// Move a demand into box `to`, leaving its previous box.
    ///
    /// A demand belongs to at most one box; member lists stay in sequence order
    /// and both boxes have their weight re-derived.
    pub fn move_demand(&mut self, demand: DemandId, to: &BoxId) {
        let Some(d) = self.ordered.get(demand) else { return };
        if d.box_id.as_ref() == Some(to) || !self.boxes.contains_key(to) {
            return;
        }
        if let Some(from) = d.box_id.clone() {
            if let Some(b) = self.boxes.get_mut(&from) {
                b.members.retain(|&m| m != demand);
            }
            self.rederive(&from);
        }
        if let Some(b) = self.boxes.get_mut(to) {
            b.members.push(demand);
        }
        if let Some(d) = self.ordered.get_mut(demand) {
            d.box_id = Some(to.clone());
        }
        self.rederive(to);
    }

    /// Re-sort members by sequence and recompute weight and distance of a box.
    ///
    /// Only members on the box's own street count toward its distance; a
    /// demand moved in from another street was projected onto that street.
    pub fn rederive(&mut self, id: &BoxId) {
        let ordered = &self.ordered;
        if let Some(b) = self.boxes.get_mut(id) {
            let street = b.street_id;
            b.members.sort_by_key(|&m| ordered.get(m).map(|d| d.sequence_index));
            b.rederive(|m| ordered.get(m).map(|d| {
                let distance = if d.street_id == street { d.projection_distance } else { 0.0 };
                (d.weight, distance)
            }));
        }
    }

    /// Destroy boxes that have neither members nor a footprint.
    pub fn drop_empty_boxes(&mut self) -> usize {
        let empty: Vec<BoxId> = self.boxes.values()
            .filter(|b| b.is_empty() && !self.footprints.contains_key(&b.box_id))
            .map(|b| b.box_id.clone())
            .collect();
        for id in &empty {
            debug!(box_id = %id, "empty box destroyed");
            self.remove_box(id);
        }
        empty.len()
    }

    /// Next free child ordinal under `parent`.
    pub fn next_child(&self, parent: &BoxId) -> u32 {
        let depth = parent.path().len() + 1;
        self.boxes.keys()
            .chain(self.footprints.iter().map(|f| &f.box_id))
            .filter(|id| id.path().len() == depth && id.parent().as_ref() == Some(parent))
            .filter_map(|id| id.path().last().copied())
            .max()
            .map_or(1, |n| n + 1)
    }

    /// Boxes heavier than `limit` with at least two members.
    pub fn oversize_boxes(&self, limit: f64) -> Vec<BoxId> {
        self.boxes.values()
            .filter(|b| b.aggregate_weight() > limit && b.len() >= 2)
            .map(|b| b.box_id.clone())
            .collect()
    }

    pub fn into_parts(self) -> StoreParts {
        StoreParts {
            ordered: self.ordered.into_vec(),
            boxes: self.boxes.into_values().collect(),
            footprints: self.footprints.iter().cloned().collect(),
            cuts: self.cuts.into_iter().collect(),
            connectors: self.connectors,
        }
    }
}

/// Final collections of a run.
#[derive(Debug, Clone, Default)]
pub struct StoreParts {
    pub ordered: Vec<OrderedDemand>,
    pub boxes: Vec<CapacityBox>,
    pub footprints: Vec<Footprint>,
    pub cuts: Vec<(BoxId, LineString<f64>)>,
    pub connectors: Vec<ConnectorLine>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, Point};
    use crate::model::{OrderRank, StreetSegment};

    fn store_with_two_boxes() -> SpatialStore {
        let street = StreetId(1);
        let streets = StreetLayer::new(vec![
            StreetSegment::new(street, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]),
        ]).unwrap();
        let mut store = SpatialStore::new(streets, Vec::new());
        let a = BoxId::primary(street, 1);
        let b = BoxId::primary(street, 2);
        let ordered: Vec<OrderedDemand> = (1..=3).map(|i| OrderedDemand {
            demand_id: DemandId(i),
            street_id: street,
            sequence_index: i as u32,
            station: i as f64,
            fraction: i as f64 / 10.0,
            projection_distance: i as f64,
            weight: 2.0,
            geometry: Point::new(i as f64, i as f64),
            box_id: Some(if i < 3 { a.clone() } else { b.clone() }),
            covered: false,
        }).collect();
        let mut box_a = CapacityBox::new(a, OrderRank::Primary);
        box_a.members = vec![DemandId(1), DemandId(2)];
        let mut box_b = CapacityBox::new(b, OrderRank::Primary);
        box_b.members = vec![DemandId(3)];
        store.insert_street_partition(street, ordered, vec![box_a, box_b], 3.0);
        for id in store.boxes.keys().cloned().collect::<Vec<_>>() {
            store.rederive(&id);
        }
        store
    }

    #[test]
    fn move_demand_keeps_single_membership() {
        let mut store = store_with_two_boxes();
        let a = BoxId::primary(StreetId(1), 1);
        let b = BoxId::primary(StreetId(1), 2);
        store.move_demand(DemandId(2), &b);

        assert_eq!(store.boxes[&a].members, vec![DemandId(1)]);
        assert_eq!(store.boxes[&b].members, vec![DemandId(2), DemandId(3)]);
        assert_eq!(store.boxes[&a].aggregate_weight(), 2.0);
        assert_eq!(store.boxes[&b].aggregate_weight(), 4.0);
        assert_eq!(store.ordered.get(DemandId(2)).unwrap().box_id, Some(b));
    }

    #[test]
    fn demand_from_another_street_does_not_widen_the_box() {
        let mut store = store_with_two_boxes();
        let a = BoxId::primary(StreetId(1), 1);
        assert_eq!(store.boxes[&a].max_member_distance, 2.0);

        let other = BoxId::primary(StreetId(2), 1);
        store.insert_box(CapacityBox::new(other.clone(), OrderRank::Secondary));
        store.move_demand(DemandId(3), &other);
        store.move_demand(DemandId(2), &other);
        assert_eq!(store.boxes[&other].aggregate_weight(), 4.0);
        assert_eq!(store.boxes[&other].max_member_distance, 0.0);
        assert_eq!(store.boxes[&a].max_member_distance, 1.0);
    }

    #[test]
    fn emptied_box_without_footprint_is_dropped() {
        let mut store = store_with_two_boxes();
        let a = BoxId::primary(StreetId(1), 1);
        let b = BoxId::primary(StreetId(1), 2);
        store.move_demand(DemandId(3), &a);
        assert_eq!(store.drop_empty_boxes(), 1);
        assert!(!store.boxes.contains_key(&b));
        assert_eq!(store.boxes[&a].aggregate_weight(), 6.0);
    }

    #[test]
    fn next_child_counts_existing_children() {
        let mut store = store_with_two_boxes();
        let a = BoxId::primary(StreetId(1), 1);
        assert_eq!(store.next_child(&a), 1);
        store.insert_box(CapacityBox::new(a.child(1), OrderRank::Secondary));
        store.insert_box(CapacityBox::new(a.child(1).child(1), OrderRank::Secondary));
        assert_eq!(store.next_child(&a), 2);
    }

    #[test]
    fn oversize_needs_two_members() {
        let store = store_with_two_boxes();
        assert_eq!(store.oversize_boxes(3.0), vec![BoxId::primary(StreetId(1), 1)]);
        assert!(store.oversize_boxes(1.0).contains(&BoxId::primary(StreetId(1), 1)));
        assert_eq!(store.oversize_boxes(1.0).len(), 1);
    }
}
