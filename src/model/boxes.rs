use std::fmt;

use serde::Serialize;

use super::ids::{BoxId, DemandId, StreetId};

/// Rank of a box/footprint: partitioner output, or produced by repair and splitting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub enum OrderRank {
    Primary = 1,
    Secondary = 2,
}

impl From<OrderRank> for u8 {
    fn from(rank: OrderRank) -> u8 { rank as u8 }
}

impl fmt::Display for OrderRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", *self as u8) }
}

/// A capacity-bounded cluster of demands on one street.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityBox {
    pub box_id: BoxId,
    pub street_id: StreetId,
    /// Member demands in sequence order.
    pub members: Vec<DemandId>,
    aggregate_weight: f64,
    pub order_rank: OrderRank,
    /// Largest projection distance among the members.
    pub max_member_distance: f64,
}

impl CapacityBox {
    pub fn new(box_id: BoxId, order_rank: OrderRank) -> Self {
        Self {
            street_id: box_id.street(),
            box_id,
            members: Vec::new(),
            aggregate_weight: 0.0,
            order_rank,
            max_member_distance: 0.0,
        }
    }

    #[inline] pub fn aggregate_weight(&self) -> f64 { self.aggregate_weight }

    #[inline] pub fn is_empty(&self) -> bool { self.members.is_empty() }

    #[inline] pub fn len(&self) -> usize { self.members.len() }

    /// Re-derive weight and distance from the members; `lookup` yields
    /// `(weight, projection_distance)` of a member.
    pub fn rederive(&mut self, lookup: impl Fn(DemandId) -> Option<(f64, f64)>) {
        let (weight, dist) = self.members.iter()
            .filter_map(|&id| lookup(id))
            .fold((0.0, 0.0_f64), |(w, d), (mw, md)| (w + mw, d.max(md)));
        self.aggregate_weight = weight;
        self.max_member_distance = dist;
    }
}
