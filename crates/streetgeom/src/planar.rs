use geo::{
    Area, BooleanOps, BoundingRect, Closest, ClosestPoint, Contains, Intersects, LineLocatePoint,
    LineString, MultiLineString, MultiPolygon, Point,
};

use crate::buffer::{buffer_line, BufferStyle};
use crate::engine::{GeometryEngine, Projection};
use crate::error::GeomError;
use crate::line;

/// Default minimum shared area for two polygons to count as overlapping.
pub const DEFAULT_AREA_TOLERANCE: f64 = 1e-6;

/// `GeometryEngine` over `geo` primitives in a projected (planar) CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarEngine {
    /// Intersections with less area than this are treated as boundary contact.
    area_tolerance: f64,
}

impl Default for PlanarEngine {
    fn default() -> Self {
        Self { area_tolerance: DEFAULT_AREA_TOLERANCE }
    }
}

impl PlanarEngine {
    pub fn new(area_tolerance: f64) -> Self {
        Self { area_tolerance: area_tolerance.max(0.0) }
    }

    #[inline] pub fn area_tolerance(&self) -> f64 { self.area_tolerance }
}

fn closest_distance(point: &Point<f64>, line: &LineString<f64>) -> f64 {
    match line.closest_point(point) {
        Closest::Intersection(_) => 0.0,
        Closest::SinglePoint(q) => (point.x() - q.x()).hypot(point.y() - q.y()),
        Closest::Indeterminate => f64::INFINITY,
    }
}

impl GeometryEngine for PlanarEngine {
    fn buffer(&self, line: &LineString<f64>, radius: f64, style: &BufferStyle) -> Result<MultiPolygon<f64>, GeomError> {
        buffer_line(line, radius, style)
    }

    fn substring(&self, line: &LineString<f64>, start: f64, end: f64) -> Option<LineString<f64>> {
        line::substring(line, start, end)
    }

    fn project(&self, point: &Point<f64>, line: &LineString<f64>) -> Option<Projection> {
        let fraction = line.line_locate_point(point).filter(|f| f.is_finite())?;
        Some(Projection {
            fraction,
            station: fraction * line::length(line),
            distance: closest_distance(point, line),
        })
    }

    #[inline]
    fn length(&self, line: &LineString<f64>) -> f64 {
        line::length(line)
    }

    #[inline]
    fn distance_to_line(&self, point: &Point<f64>, line: &LineString<f64>) -> f64 {
        closest_distance(point, line)
    }

    fn distance_to_polygon(&self, point: &Point<f64>, polygon: &MultiPolygon<f64>) -> f64 {
        if polygon.intersects(point) {
            return 0.0;
        }
        polygon.0.iter()
            .flat_map(|poly| std::iter::once(poly.exterior()).chain(poly.interiors()))
            .map(|ring| closest_distance(point, ring))
            .fold(f64::INFINITY, f64::min)
    }

    fn overlaps(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool {
        let (Some(ra), Some(rb)) = (a.bounding_rect(), b.bounding_rect()) else { return false };
        if !ra.intersects(&rb) {
            return false;
        }
        a.intersection(b).unsigned_area() > self.area_tolerance
    }

    #[inline]
    fn intersects(&self, line: &LineString<f64>, polygon: &MultiPolygon<f64>) -> bool {
        polygon.intersects(line)
    }

    #[inline]
    fn difference(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        a.difference(b)
    }

    fn line_difference(&self, line: &LineString<f64>, polygon: &MultiPolygon<f64>) -> MultiLineString<f64> {
        polygon.clip(&MultiLineString::new(vec![line.clone()]), true)
    }

    #[inline]
    fn contains(&self, polygon: &MultiPolygon<f64>, point: &Point<f64>) -> bool {
        polygon.contains(point)
    }
}
