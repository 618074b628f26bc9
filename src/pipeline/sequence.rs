use streetgeom::{GeometryEngine, Projection};

use crate::model::{BoxId, CapacityBox, DemandPoint, OrderRank, OrderedDemand, StreetSegment};

/// Sequenced demands and primary boxes of one street.
#[derive(Debug, Clone, PartialEq)]
pub struct StreetPartition {
    pub ordered: Vec<OrderedDemand>,
    pub boxes: Vec<CapacityBox>,
    /// Largest projection distance on the street; buffer basis of its boxes.
    pub max_distance: f64,
    /// First sequence index free for the next street.
    pub next_sequence: u32,
}

/// Project demands onto `street` and order them by station, ties by input order.
pub fn sequence<E: GeometryEngine>(
    engine: &E,
    street: &StreetSegment,
    demands: &[&DemandPoint],
    first_sequence: u32,
) -> (Vec<OrderedDemand>, u32) {
    let mut projected: Vec<(Projection, &DemandPoint)> = demands.iter()
        .map(|&d| {
            let p = engine.project(&d.geometry, &street.geometry).unwrap_or(Projection {
                fraction: 0.0,
                station: 0.0,
                distance: engine.distance_to_line(&d.geometry, &street.geometry),
            });
            (p, d)
        })
        .collect();
    // stable: equal stations keep input order
    projected.sort_by(|a, b| a.0.station.total_cmp(&b.0.station));

    let mut next = first_sequence;
    let ordered = projected.into_iter()
        .map(|(p, d)| {
            let od = OrderedDemand {
                demand_id: d.demand_id,
                street_id: street.street_id,
                sequence_index: next,
                station: p.station,
                fraction: p.fraction,
                projection_distance: p.distance,
                weight: d.weight,
                geometry: d.geometry,
                box_id: None,
                covered: false,
            };
            next += 1;
            od
        })
        .collect();
    (ordered, next)
}

/// Greedy capacity walk: a demand joins the open box while the running
/// weight stays at or below `threshold`, otherwise it opens the next box.
pub fn partition(ordered: &mut [OrderedDemand], threshold: f64) -> Vec<CapacityBox> {
    let mut boxes: Vec<CapacityBox> = Vec::new();
    let mut acc = 0.0;
    for d in ordered.iter_mut() {
        let fits = !boxes.is_empty() && acc + d.weight <= threshold;
        if fits {
            if let Some(open) = boxes.last_mut() {
                open.members.push(d.demand_id);
            }
            acc += d.weight;
        } else {
            let ordinal = boxes.len() as u32 + 1;
            let mut b = CapacityBox::new(BoxId::primary(d.street_id, ordinal), OrderRank::Primary);
            b.members.push(d.demand_id);
            boxes.push(b);
            acc = d.weight;
        }
        d.box_id = boxes.last().map(|b| b.box_id.clone());
    }

    for b in &mut boxes {
        b.rederive(|id| {
            ordered.iter()
                .find(|d| d.demand_id == id)
                .map(|d| (d.weight, d.projection_distance))
        });
    }
    boxes
}

/// Sequence and partition the demands of one street.
pub fn partition_street<E: GeometryEngine>(
    engine: &E,
    street: &StreetSegment,
    demands: &[&DemandPoint],
    threshold: f64,
    first_sequence: u32,
) -> StreetPartition {
    let (mut ordered, next_sequence) = sequence(engine, street, demands, first_sequence);
    let boxes = partition(&mut ordered, threshold);
    let max_distance = ordered.iter().map(|d| d.projection_distance).fold(0.0, f64::max);
    StreetPartition { ordered, boxes, max_distance, next_sequence }
}
