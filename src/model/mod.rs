mod boxes;
mod connector;
mod demand;
mod footprint;
mod ids;
mod street;

pub use boxes::{CapacityBox, OrderRank};
pub use connector::ConnectorLine;
pub use demand::{DemandPoint, OrderedDemand, OrderedDemands};
pub use footprint::{Footprint, FootprintLayer};
pub use ids::{BoxId, DemandId, StreetId};
pub use street::{StreetLayer, StreetSegment};
