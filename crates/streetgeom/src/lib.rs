pub mod buffer;
pub mod engine;
pub mod error;
pub mod index;
pub mod line;
pub mod planar;

pub use buffer::{BufferStyle, CapStyle, JoinStyle};
pub use engine::{GeometryEngine, Projection};
pub use error::GeomError;
pub use index::{PointIndex, SegmentIndex};
pub use planar::PlanarEngine;
