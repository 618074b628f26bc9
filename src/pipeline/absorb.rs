use geo::{Coord, LineString, Rect};
use streetgeom::{line, GeometryEngine};
use tracing::debug;

use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::model::{BoxId, DemandId, Footprint};
use crate::store::SpatialStore;

use super::synthesize::{place_secondary, shape_along};

/// What absorbing one orphan demand leads to.
#[derive(Debug, Clone, PartialEq)]
pub enum Absorption {
    /// An earlier change already covers the demand.
    AlreadyCovered,
    /// The cut of `box_id` was extended and its footprint re-synthesized.
    Extended { box_id: BoxId, cut: LineString<f64>, footprint: Footprint, distance: f64 },
    /// No footprint of the same street lies within the orphan radius.
    OutOfReach,
    Failed(Diagnostic),
}

/// Try to absorb an uncovered demand into the nearest footprint of its street.
///
/// The box's cut is extended past whichever end is nearer the orphan's
/// projection by the orphan's distance plus `extension_epsilon`, along the
/// direction of that end segment, and its footprint is rebuilt with a basis
/// large enough to reach the orphan. The rebuilt footprint is only offered
/// when it still covers the orphan after neighbors are subtracted.
pub fn absorb_one<E: GeometryEngine>(engine: &E, store: &SpatialStore, demand: DemandId, config: &Config) -> Absorption {
    let Some(d) = store.ordered().get(demand) else { return Absorption::OutOfReach };
    let probe = Rect::new(d.geometry.0, d.geometry.0);

    let near = store.footprints().query(probe, config.orphan_radius);
    if near.iter().any(|f| engine.distance_to_polygon(&d.geometry, &f.polygon) <= config.coverage_tolerance) {
        return Absorption::AlreadyCovered;
    }

    let nearest = near.into_iter()
        .filter(|f| f.street_id == d.street_id)
        .map(|f| (f, engine.distance_to_polygon(&d.geometry, &f.polygon)))
        .filter(|&(_, dist)| dist <= config.orphan_radius)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    let Some((target, distance)) = nearest else { return Absorption::OutOfReach };
    let Some(cut) = store.cuts().get(&target.box_id) else { return Absorption::OutOfReach };

    let at_head = engine.project(&d.geometry, cut).is_some_and(|p| p.fraction < 0.5);
    let Some(extended) = extend(cut, at_head, distance + config.extension_epsilon) else {
        return Absorption::Failed(Diagnostic::DegenerateDirection { box_id: target.box_id.clone() });
    };

    let basis = target.offset_basis.max(engine.distance_to_line(&d.geometry, &extended));
    let shape = match shape_along(engine, extended, basis, config) {
        Ok(shape) => shape,
        Err(length) => {
            return Absorption::Failed(Diagnostic::DegenerateCenterline { box_id: target.box_id.clone(), length });
        }
    };
    let Some(footprint) = place_secondary(engine, store.footprints(), &target.box_id, &shape, config) else {
        return Absorption::OutOfReach;
    };
    if engine.distance_to_polygon(&d.geometry, &footprint.polygon) > config.coverage_tolerance {
        debug!(demand = %demand, box_id = %target.box_id, "extended footprint misses orphan; kept original");
        return Absorption::OutOfReach;
    }
    debug!(demand = %demand, box_id = %target.box_id, distance, at_head, "cut extended toward orphan");
    Absorption::Extended { box_id: target.box_id.clone(), cut: shape.cut, footprint, distance }
}

/// Extend `cut` by `step` past its first (`at_head`) or last vertex.
fn extend(cut: &LineString<f64>, at_head: bool, step: f64) -> Option<LineString<f64>> {
    let mut coords = cut.0.clone();
    if at_head {
        let dir = line::head_direction(cut)?;
        let first = *coords.first()?;
        coords.insert(0, Coord { x: first.x + step * dir.x, y: first.y + step * dir.y });
    } else {
        let dir = line::tail_direction(cut)?;
        let last = *coords.last()?;
        coords.push(Coord { x: last.x + step * dir.x, y: last.y + step * dir.y });
    }
    Some(LineString::new(coords))
}

/// Replace the extended box's footprint and cut in one step.
pub fn apply(store: &mut SpatialStore, absorption: Absorption) -> Option<Diagnostic> {
    match absorption {
        Absorption::Extended { footprint, cut, .. } => {
            store.commit_footprint(footprint, cut);
            None
        }
        Absorption::Failed(diagnostic) => Some(diagnostic),
        Absorption::AlreadyCovered | Absorption::OutOfReach => None,
    }
}
