use geo::{Coord, Line, LineString};

/// Euclidean arc length of a polyline.
pub fn length(line: &LineString<f64>) -> f64 {
    line.lines().map(|seg| seg.dx().hypot(seg.dy())).sum()
}

/// Point at parameter `t` (0 at `seg.start`, 1 at `seg.end`).
#[inline]
pub fn interpolate(seg: &Line<f64>, t: f64) -> Coord<f64> {
    Coord {
        x: seg.start.x + seg.dx() * t,
        y: seg.start.y + seg.dy() * t,
    }
}

/// Sub-line between two normalized arc-length positions.
///
/// `start` and `end` are clamped to `[0, 1]` and swapped when reversed. The
/// result always has at least two coordinates; when both positions coincide
/// it is a zero-length line, which callers are expected to screen out by
/// length. Returns `None` for lines without extent.
pub fn substring(line: &LineString<f64>, start: f64, end: f64) -> Option<LineString<f64>> {
    if line.0.len() < 2 || !start.is_finite() || !end.is_finite() {
        return None;
    }

    let total = length(line);
    if total <= 0.0 {
        return None;
    }

    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    let from = start.clamp(0.0, 1.0) * total;
    let to = end.clamp(0.0, 1.0) * total;

    let mut coords: Vec<Coord<f64>> = Vec::new();
    let mut walked = 0.0;

    for seg in line.lines() {
        let len = seg.dx().hypot(seg.dy());
        if len == 0.0 { continue; }
        let next = walked + len;

        if coords.is_empty() && from <= next {
            coords.push(interpolate(&seg, (from - walked) / len));
        }

        if !coords.is_empty() {
            if to <= next {
                coords.push(interpolate(&seg, (to - walked) / len));
                return Some(finish(coords));
            }
            coords.push(seg.end);
        }

        walked = next;
    }

    // Only reached when rounding left `to` past the accumulated length.
    let tail = *line.0.last()?;
    if coords.is_empty() {
        coords.push(tail);
    }
    Some(finish(coords))
}

/// Drop repeated vertices, keeping at least two coordinates.
fn finish(mut coords: Vec<Coord<f64>>) -> LineString<f64> {
    coords.dedup();
    if coords.len() == 1 {
        coords.push(coords[0]);
    }
    LineString::new(coords)
}

/// Unit direction of the final segment, or `None` when it has no length.
pub fn tail_direction(line: &LineString<f64>) -> Option<Coord<f64>> {
    let n = line.0.len();
    if n < 2 {
        return None;
    }
    unit(line.0[n - 2], line.0[n - 1])
}

/// Unit direction pointing out of the first vertex (from the second vertex
/// toward the first), or `None` when the first segment has no length.
pub fn head_direction(line: &LineString<f64>) -> Option<Coord<f64>> {
    if line.0.len() < 2 {
        return None;
    }
    unit(line.0[1], line.0[0])
}

fn unit(from: Coord<f64>, to: Coord<f64>) -> Option<Coord<f64>> {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let magnitude = dx.hypot(dy);
    (magnitude > f64::EPSILON).then(|| Coord { x: dx / magnitude, y: dy / magnitude })
}
