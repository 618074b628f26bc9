use geo::{LineString, MultiLineString, MultiPolygon, Point};

use crate::buffer::BufferStyle;
use crate::error::GeomError;

/// Where a point lands on a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Normalized arc-length position of the closest point, in `[0, 1]`.
    pub fraction: f64,
    /// Arc length from the start of the line to the closest point.
    pub station: f64,
    /// Perpendicular (closest-point) distance from the point to the line.
    pub distance: f64,
}

/// Planar geometry operations the clustering and repair logic is built on.
///
/// Implementations must be exact enough that a point lying on a footprint's
/// boundary is within a few ulps of it; callers compare distances against a
/// small tolerance rather than relying on strict predicates.
pub trait GeometryEngine {
    /// Buffer an open polyline into a polygon footprint.
    fn buffer(&self, line: &LineString<f64>, radius: f64, style: &BufferStyle) -> Result<MultiPolygon<f64>, GeomError>;

    /// Sub-line between two normalized positions (see [`Projection::fraction`]).
    fn substring(&self, line: &LineString<f64>, start: f64, end: f64) -> Option<LineString<f64>>;

    /// Project `point` onto the closest position of `line`.
    fn project(&self, point: &Point<f64>, line: &LineString<f64>) -> Option<Projection>;

    /// Euclidean arc length.
    fn length(&self, line: &LineString<f64>) -> f64;

    /// Distance from `point` to the closest point of `line`.
    fn distance_to_line(&self, point: &Point<f64>, line: &LineString<f64>) -> f64;

    /// Distance from `point` to `polygon`; zero inside or on the boundary.
    fn distance_to_polygon(&self, point: &Point<f64>, polygon: &MultiPolygon<f64>) -> f64;

    /// True iff the polygons share interior area (boundary contact does not count).
    fn overlaps(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool;

    /// True iff `line` touches or crosses `polygon`.
    fn intersects(&self, line: &LineString<f64>, polygon: &MultiPolygon<f64>) -> bool;

    /// Part of `a` not covered by `b`.
    fn difference(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64>;

    /// Pieces of `line` lying outside `polygon`.
    fn line_difference(&self, line: &LineString<f64>, polygon: &MultiPolygon<f64>) -> MultiLineString<f64>;

    /// True iff `point` lies in the interior of `polygon`.
    fn contains(&self, polygon: &MultiPolygon<f64>, point: &Point<f64>) -> bool;
}
