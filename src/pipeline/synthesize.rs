use geo::{Area, BoundingRect, LineString, MultiPolygon};
use streetgeom::GeometryEngine;
use tracing::debug;

use crate::config::{Config, OverlapPolicy};
use crate::model::{BoxId, Footprint, FootprintLayer, OrderRank};

/// A buffered cut, not yet committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub cut: LineString<f64>,
    pub polygon: MultiPolygon<f64>,
    pub basis: f64,
}

/// Outcome of committing a candidate footprint.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Committed(Footprint),
    /// The candidate collided (or nothing was left of it); nothing was committed.
    Rejected { colliding: Vec<BoxId> },
}

/// Buffer the part of `street` between two normalized positions.
///
/// Returns the length of the cut as the error when it is too short to buffer.
pub fn shape_between<E: GeometryEngine>(
    engine: &E,
    street: &LineString<f64>,
    start: f64,
    end: f64,
    basis: f64,
    config: &Config,
) -> Result<Shape, f64> {
    let cut = engine.substring(street, start, end).ok_or(0.0)?;
    shape_along(engine, cut, basis, config)
}

/// Buffer a cut at `basis + margin` with flat caps and mitred joins.
pub fn shape_along<E: GeometryEngine>(engine: &E, cut: LineString<f64>, basis: f64, config: &Config) -> Result<Shape, f64> {
    let length = engine.length(&cut);
    if length < config.min_centerline_length {
        return Err(length);
    }
    let polygon = engine.buffer(&cut, basis + config.margin, &config.buffer_style()).map_err(|_| length)?;
    if polygon.0.is_empty() {
        return Err(length);
    }
    Ok(Shape { cut, polygon, basis })
}

fn colliding<'a, E: GeometryEngine>(
    engine: &E,
    layer: &'a FootprintLayer,
    polygon: &MultiPolygon<f64>,
    radius: f64,
    skip: Option<&BoxId>,
) -> Vec<&'a Footprint> {
    let Some(rect) = polygon.bounding_rect() else { return Vec::new() };
    layer.query(rect, radius).into_iter()
        .filter(|f| Some(&f.box_id) != skip)
        .filter(|f| engine.overlaps(polygon, &f.polygon))
        .collect()
}

fn subtract_all<E: GeometryEngine>(engine: &E, polygon: &MultiPolygon<f64>, others: &[&Footprint]) -> MultiPolygon<f64> {
    others.iter().fold(polygon.clone(), |acc, f| engine.difference(&acc, &f.polygon))
}

/// Commit a partitioner or split box, resolving collisions with `policy`.
///
/// The candidate is checked against every committed footprint. Under
/// [`OverlapPolicy::Reject`] any positive-area collision rejects it; under
/// [`OverlapPolicy::Subtract`] the colliding area is removed and the rest
/// is committed.
pub fn place_primary<E: GeometryEngine>(
    engine: &E,
    layer: &FootprintLayer,
    box_id: &BoxId,
    shape: &Shape,
    rank: OrderRank,
    policy: OverlapPolicy,
    config: &Config,
) -> Placement {
    let hits = colliding(engine, layer, &shape.polygon, 0.0, Some(box_id));
    if hits.is_empty() {
        return Placement::Committed(Footprint::new(box_id.clone(), rank, shape.polygon.clone(), shape.basis));
    }
    let ids: Vec<BoxId> = hits.iter().map(|f| f.box_id.clone()).collect();
    match policy {
        OverlapPolicy::Reject => {
            debug!(box_id = %box_id, colliding = ?ids.iter().map(ToString::to_string).collect::<Vec<_>>(), "candidate rejected");
            Placement::Rejected { colliding: ids }
        }
        OverlapPolicy::Subtract => {
            let rest = subtract_all(engine, &shape.polygon, &hits);
            if rest.unsigned_area() <= config.overlap_area_tolerance {
                Placement::Rejected { colliding: ids }
            } else {
                Placement::Committed(Footprint::new(box_id.clone(), rank, rest, shape.basis))
            }
        }
    }
}

/// Commit a repair or absorption footprint: every committed footprint within
/// the secondary neighborhood is subtracted from the candidate.
///
/// `box_id`'s own current footprint is ignored, so this also re-synthesizes
/// an existing box. Returns `None` when nothing of the candidate is left.
pub fn place_secondary<E: GeometryEngine>(
    engine: &E,
    layer: &FootprintLayer,
    box_id: &BoxId,
    shape: &Shape,
    config: &Config,
) -> Option<Footprint> {
    let hits = colliding(engine, layer, &shape.polygon, config.secondary_search_radius, Some(box_id));
    let rest = subtract_all(engine, &shape.polygon, &hits);
    (rest.unsigned_area() > config.overlap_area_tolerance)
        .then(|| Footprint::new(box_id.clone(), OrderRank::Secondary, rest, shape.basis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;
    use streetgeom::PlanarEngine;
    use crate::model::StreetId;

    fn horizontal() -> LineString<f64> {
        line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)]
    }

    fn vertical() -> LineString<f64> {
        line_string![(x: 25.0, y: -20.0), (x: 25.0, y: 20.0)]
    }

    fn committed(engine: &PlanarEngine, config: &Config) -> FootprintLayer {
        let shape = shape_between(engine, &horizontal(), 0.1, 0.4, 2.0, config).unwrap();
        let mut layer = FootprintLayer::default();
        layer.insert(Footprint::new(BoxId::primary(StreetId(1), 1), OrderRank::Primary, shape.polygon, 2.0));
        layer
    }

    #[test]
    fn cut_is_buffered_at_basis_plus_margin() {
        let engine = PlanarEngine::default();
        let shape = shape_between(&engine, &horizontal(), 0.1, 0.4, 2.0, &Config::default()).unwrap();
        let rect = shape.polygon.bounding_rect().unwrap();
        assert!((rect.max().y - 3.5).abs() < 1e-9);
        assert!((shape.polygon.unsigned_area() - 30.0 * 7.0).abs() < 1e-6);
    }

    #[test]
    fn single_point_cut_is_degenerate() {
        let engine = PlanarEngine::default();
        let err = shape_between(&engine, &horizontal(), 0.45, 0.45, 2.0, &Config::default()).unwrap_err();
        assert_eq!(err, 0.0);
    }

    #[test]
    fn reject_policy_leaves_layer_untouched() {
        let engine = PlanarEngine::default();
        let config = Config::default();
        let layer = committed(&engine, &config);
        let candidate = shape_between(&engine, &vertical(), 0.25, 0.75, 1.0, &config).unwrap();
        let id = BoxId::primary(StreetId(2), 1);
        let placement = place_primary(&engine, &layer, &id, &candidate, OrderRank::Primary, OverlapPolicy::Reject, &config);
        assert_eq!(placement, Placement::Rejected { colliding: vec![BoxId::primary(StreetId(1), 1)] });
        assert_eq!(layer.len(), 1);
    }

    #[test]
    fn subtract_policy_commits_the_remainder() {
        let engine = PlanarEngine::default();
        let config = Config::default();
        let layer = committed(&engine, &config);
        let candidate = shape_between(&engine, &vertical(), 0.25, 0.75, 1.0, &config).unwrap();
        let id = BoxId::primary(StreetId(2), 1);
        let Placement::Committed(fp) = place_primary(&engine, &layer, &id, &candidate, OrderRank::Primary, OverlapPolicy::Subtract, &config) else {
            panic!("expected a committed footprint");
        };
        // 5 x 20 minus the 5 x 7 crossing
        assert!((fp.polygon.unsigned_area() - 65.0).abs() < 1e-6);
        assert!(!engine.overlaps(&fp.polygon, &layer.get(&BoxId::primary(StreetId(1), 1)).unwrap().polygon));
    }

    #[test]
    fn secondary_subtracts_neighbors_and_ignores_itself() {
        let engine = PlanarEngine::default();
        let config = Config::default();
        let mut layer = committed(&engine, &config);
        let own = BoxId::primary(StreetId(1), 1);
        // re-synthesizing box 1.1 over a longer cut must not be cut by its old self
        let longer = shape_between(&engine, &horizontal(), 0.1, 0.5, 2.0, &config).unwrap();
        let fp = place_secondary(&engine, &layer, &own, &longer, &config).unwrap();
        assert!((fp.polygon.unsigned_area() - 40.0 * 7.0).abs() < 1e-6);
        assert_eq!(fp.order_rank, OrderRank::Secondary);

        layer.insert(fp);
        let crossing = shape_between(&engine, &vertical(), 0.0, 1.0, 1.0, &config).unwrap();
        let other = place_secondary(&engine, &layer, &BoxId::primary(StreetId(2), 1).child(1), &crossing, &config).unwrap();
        assert!((other.polygon.unsigned_area() - (200.0 - 35.0)).abs() < 1e-6);
    }
}
