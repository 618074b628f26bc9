use geo::orient::{Direction, Orient};
use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};

use crate::error::GeomError;

/// Tolerance below which two consecutive vertices are treated as one.
const VERTEX_TOL: f64 = 1e-9;

/// Below this |sin| consecutive segments count as collinear.
const COLLINEAR_SIN: f64 = 1e-12;

/// How the open ends of a buffered polyline are closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStyle {
    /// Cut square at the end vertex.
    Flat,
    /// Cut square, one radius beyond the end vertex.
    Square,
}

/// How the outer side of a bend is filled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinStyle {
    /// Sharp corner, clipped once it reaches `limit * radius` from the vertex.
    Mitre { limit: f64 },
    /// Straight chord between the two offset edges.
    Bevel,
}

/// Buffer parameters for street centerlines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferStyle {
    pub cap: CapStyle,
    pub join: JoinStyle,
}

impl Default for BufferStyle {
    fn default() -> Self {
        Self::flat_mitre(2.0)
    }
}

impl BufferStyle {
    /// Flat end caps with mitred joins.
    pub fn flat_mitre(limit: f64) -> Self {
        Self { cap: CapStyle::Flat, join: JoinStyle::Mitre { limit } }
    }
}

#[inline] fn add(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> { Coord { x: a.x + b.x, y: a.y + b.y } }

#[inline] fn sub(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> { Coord { x: a.x - b.x, y: a.y - b.y } }

#[inline] fn scale(a: Coord<f64>, k: f64) -> Coord<f64> { Coord { x: a.x * k, y: a.y * k } }

#[inline] fn dot(a: Coord<f64>, b: Coord<f64>) -> f64 { a.x * b.x + a.y * b.y }

#[inline] fn cross(a: Coord<f64>, b: Coord<f64>) -> f64 { a.x * b.y - a.y * b.x }

/// Left-hand normal of a unit direction.
#[inline] fn normal(u: Coord<f64>) -> Coord<f64> { Coord { x: -u.y, y: u.x } }

fn unit(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    let d = sub(b, a);
    scale(d, 1.0 / d.x.hypot(d.y))
}

fn ring(coords: Vec<Coord<f64>>) -> Polygon<f64> {
    Polygon::new(LineString::new(coords), vec![]).orient(Direction::Default)
}

/// Buffer an open polyline by `radius`.
///
/// The outline is the union of one rectangle per segment and one wedge per
/// interior vertex on the outer side of the bend, so concave sides need no
/// special handling. Returns an empty `MultiPolygon` for a zero radius.
pub fn buffer_line(
    line: &LineString<f64>,
    radius: f64,
    style: &BufferStyle,
) -> Result<MultiPolygon<f64>, GeomError> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(GeomError::InvalidRadius(radius));
    }
    if let JoinStyle::Mitre { limit } = style.join {
        if !(limit >= 1.0) {
            return Err(GeomError::InvalidMitreLimit(limit));
        }
    }

    let mut coords = distinct_vertices(line);
    if coords.len() < 2 {
        return Err(GeomError::DegenerateLine);
    }
    if radius == 0.0 {
        return Ok(MultiPolygon::new(vec![]));
    }

    if style.cap == CapStyle::Square {
        let n = coords.len();
        let head = unit(coords[1], coords[0]);
        let tail = unit(coords[n - 2], coords[n - 1]);
        coords[0] = add(coords[0], scale(head, radius));
        coords[n - 1] = add(coords[n - 1], scale(tail, radius));
    }

    let dirs: Vec<Coord<f64>> = coords.windows(2).map(|w| unit(w[0], w[1])).collect();

    let mut pieces: Vec<Polygon<f64>> = Vec::with_capacity(2 * dirs.len());
    for (w, &u) in coords.windows(2).zip(dirs.iter()) {
        let n = scale(normal(u), radius);
        pieces.push(ring(vec![add(w[0], n), add(w[1], n), sub(w[1], n), sub(w[0], n)]));
    }
    for i in 1..coords.len() - 1 {
        if let Some(wedge) = join_wedge(coords[i], dirs[i - 1], dirs[i], radius, style.join) {
            pieces.push(wedge);
        }
    }

    Ok(pieces.into_iter()
        .map(|piece| MultiPolygon::new(vec![piece]))
        .reduce(|acc, piece| acc.union(&piece))
        .unwrap_or_else(|| MultiPolygon::new(vec![])))
}

/// Consecutive vertices closer than `VERTEX_TOL` collapse into one.
fn distinct_vertices(line: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(line.0.len());
    for &c in &line.0 {
        match coords.last() {
            Some(&prev) if (c.x - prev.x).hypot(c.y - prev.y) <= VERTEX_TOL => {}
            _ => coords.push(c),
        }
    }
    coords
}

/// Fill between the two segment rectangles on the outer side of vertex `v`.
///
/// `u0` and `u1` are the unit directions entering and leaving `v`. Returns
/// `None` for straight continuations and full reversals, where the
/// rectangles already meet or a flat end is wanted.
fn join_wedge(v: Coord<f64>, u0: Coord<f64>, u1: Coord<f64>, r: f64, join: JoinStyle) -> Option<Polygon<f64>> {
    let turn = cross(u0, u1);
    if turn.abs() < COLLINEAR_SIN && dot(u0, u1) > 0.0 {
        return None;
    }

    // left turns open up on the right-hand side and vice versa
    let side = if turn > 0.0 { -1.0 } else { 1.0 };
    let n0 = scale(normal(u0), side);
    let n1 = scale(normal(u1), side);
    let a = add(v, scale(n0, r));
    let b = add(v, scale(n1, r));

    let bisector = add(n0, n1);
    let len = bisector.x.hypot(bisector.y);
    if len < COLLINEAR_SIN {
        return None;
    }
    let m = scale(bisector, 1.0 / len);
    let cos_half = dot(m, n0);
    let mitre = r / cos_half;

    match join {
        JoinStyle::Bevel => Some(ring(vec![v, a, b])),
        JoinStyle::Mitre { limit } if mitre <= limit * r => {
            Some(ring(vec![v, a, add(v, scale(m, mitre)), b]))
        }
        JoinStyle::Mitre { limit } => {
            // walk each offset edge until it reaches the clipping line
            let excess = limit * r - r * cos_half;
            let ta = excess / dot(u0, m);
            let tb = excess / dot(scale(u1, -1.0), m);
            Some(ring(vec![v, a, add(a, scale(u0, ta)), sub(b, scale(u1, tb)), b]))
        }
    }
}
