use geo::LineString;

use super::ids::{BoxId, DemandId};

/// A polyline joining uncovered demands of one box, or a piece of one.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorLine {
    /// Box whose uncovered demands the connector joins.
    pub source: BoxId,
    /// Box spawned from this piece; `None` when the piece produced no footprint.
    pub box_id: Option<BoxId>,
    pub geometry: LineString<f64>,
    /// Demands assigned to this piece, in sequence order.
    pub members: Vec<DemandId>,
}

impl ConnectorLine {
    /// A piece that produced no footprint and is kept as residual geometry.
    #[inline] pub fn is_residual(&self) -> bool { self.box_id.is_none() }
}
