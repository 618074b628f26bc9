use std::cmp::Ordering;
use std::collections::BTreeSet;

use ahash::AHashMap;
use geo::{BoundingRect, Intersects};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, RTreeObject};

use crate::config::StreetOrder;
use crate::model::{StreetId, StreetLayer};

/// Streets carrying demands, in the order their boxes are built and committed.
pub fn processing_order(streets: &StreetLayer, with_demands: &BTreeSet<StreetId>, policy: StreetOrder) -> Vec<StreetId> {
    let longest_first = |a: &StreetId, b: &StreetId| -> Ordering {
        let (la, lb) = (streets.length_of(*a).unwrap_or(0.0), streets.length_of(*b).unwrap_or(0.0));
        lb.total_cmp(&la).then(a.cmp(b))
    };

    match policy {
        StreetOrder::Global => {
            let mut order: Vec<StreetId> = with_demands.iter().copied().collect();
            order.sort_by(longest_first);
            order
        }
        StreetOrder::PerComponent => {
            let mut components = connected_components(streets);
            components.iter_mut().for_each(|c| c.sort_by(longest_first));
            let total = |c: &[StreetId]| -> f64 { c.iter().filter_map(|&id| streets.length_of(id)).sum() };
            components.sort_by(|a, b| total(b).total_cmp(&total(a)).then(a[0].cmp(&b[0])));
            components.into_iter()
                .flatten()
                .filter(|id| with_demands.contains(id))
                .collect()
        }
    }
}

/// Groups of streets linked by geometric intersection.
fn connected_components(streets: &StreetLayer) -> Vec<Vec<StreetId>> {
    let segments: Vec<_> = streets.iter().collect();
    let tree = RTree::bulk_load(segments.iter().enumerate()
        .filter_map(|(i, s)| s.geometry.bounding_rect().map(|r| {
            GeomWithData::new(Rectangle::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]), i)
        }))
        .collect());

    let mut parent: Vec<usize> = (0..segments.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for candidate in tree.iter() {
        let i = candidate.data;
        for other in tree.locate_in_envelope_intersecting(&candidate.geom().envelope()) {
            let j = other.data;
            if j <= i || !segments[i].geometry.intersects(&segments[j].geometry) {
                continue;
            }
            let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
            if ri != rj {
                parent[ri.max(rj)] = ri.min(rj);
            }
        }
    }

    let mut groups: AHashMap<usize, Vec<StreetId>> = AHashMap::new();
    for i in 0..segments.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(segments[i].street_id);
    }
    groups.into_values().collect()
}
