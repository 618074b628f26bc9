#![doc = "streetbox public API"]
pub mod cli;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod store;

#[doc(inline)]
pub use config::{Config, FieldNames, OverlapPolicy, StreetOrder};

#[doc(inline)]
pub use diagnostics::{Diagnostic, Diagnostics};

#[doc(inline)]
pub use model::{
    BoxId, CapacityBox, ConnectorLine, DemandId, DemandPoint, Footprint, OrderRank, OrderedDemand, StreetId,
    StreetLayer, StreetSegment,
};

#[doc(inline)]
pub use pipeline::{Pipeline, PipelineOutput, Reference};

#[doc(inline)]
pub use store::SpatialStore;

pub use streetgeom::{GeometryEngine, PlanarEngine};
