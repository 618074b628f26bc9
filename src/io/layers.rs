use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use geo::{Centroid, Coord, Geometry, LineString, MultiLineString, Point};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::FieldNames;
use crate::model::{DemandId, DemandPoint, StreetId, StreetLayer, StreetSegment};
use crate::pipeline::PipelineOutput;

use super::geojson::{read_features, write_features, Feature};
use super::write_replacing;

pub const ORDERED_DEMANDS: &str = "ordered_demands.geojson";
pub const FOOTPRINTS: &str = "footprints.geojson";
pub const CENTERLINE_CUTS: &str = "centerline_cuts.geojson";
pub const CONNECTORS: &str = "connectors.geojson";
pub const DIAGNOSTICS: &str = "diagnostics.json";

/// Numeric attribute, accepting numbers and numeric strings.
fn number(properties: &Map<String, Value>, field: &str) -> Option<f64> {
    match properties.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Integer id attribute; floats with no fractional part are accepted.
fn id(properties: &Map<String, Value>, field: &str) -> Option<i64> {
    match properties.get(field)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Concatenate the parts of a multi-line, dropping repeated junction vertices.
fn merge_parts(lines: MultiLineString<f64>) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = Vec::new();
    for part in lines {
        for c in part.0 {
            if coords.last() != Some(&c) {
                coords.push(c);
            }
        }
    }
    LineString::new(coords)
}

fn as_line(geometry: Option<Geometry<f64>>) -> Option<LineString<f64>> {
    match geometry? {
        Geometry::LineString(ls) => Some(ls),
        Geometry::MultiLineString(mls) => Some(merge_parts(mls)),
        _ => None,
    }
}

/// Street centerlines; multi-part features are merged into one polyline.
pub fn read_streets(path: &Path, fields: &FieldNames) -> Result<StreetLayer> {
    let features = read_features(path)?;
    let mut segments = Vec::with_capacity(features.len());
    for (i, feature) in features.into_iter().enumerate() {
        let street_id = id(&feature.properties, &fields.street_id)
            .ok_or_else(|| anyhow!("street feature {i} has no '{}' attribute", fields.street_id))?;
        let geometry = as_line(feature.geometry)
            .ok_or_else(|| anyhow!("street {street_id} is not a LineString or MultiLineString"))?;
        segments.push(StreetSegment::new(StreetId(street_id), geometry));
    }
    let layer = StreetLayer::new(segments).with_context(|| format!("Invalid street layer {}", path.display()))?;
    info!(path = %path.display(), streets = layer.len(), "streets loaded");
    Ok(layer)
}

/// Demand points. Ids default to the 1-based feature position; weights are required.
pub fn read_demands(path: &Path, fields: &FieldNames) -> Result<Vec<DemandPoint>> {
    let features = read_features(path)?;
    let mut demands = Vec::with_capacity(features.len());
    for (i, feature) in features.into_iter().enumerate() {
        let demand_id = DemandId(id(&feature.properties, &fields.demand_id).unwrap_or(i as i64 + 1));
        let Some(Geometry::Point(point)) = feature.geometry else {
            bail!("demand {demand_id} is not a Point");
        };
        let weight = number(&feature.properties, &fields.weight)
            .ok_or_else(|| anyhow!("demand {demand_id} has no numeric '{}' attribute", fields.weight))?;
        let mut demand = DemandPoint::new(demand_id, weight, point);
        demand.street_id = id(&feature.properties, &fields.street_id).map(StreetId);
        demands.push(demand);
    }
    info!(path = %path.display(), demands = demands.len(), "demands loaded");
    Ok(demands)
}

/// Lot reference points tagged with their street: points as-is, polygons by centroid.
pub fn read_lots(path: &Path, fields: &FieldNames) -> Result<Vec<(Point<f64>, StreetId)>> {
    let features = read_features(path)?;
    let mut lots = Vec::with_capacity(features.len());
    for (i, feature) in features.into_iter().enumerate() {
        let street = id(&feature.properties, &fields.street_id)
            .ok_or_else(|| anyhow!("lot feature {i} has no '{}' attribute", fields.street_id))?;
        let point = match feature.geometry {
            Some(Geometry::Point(p)) => Some(p),
            Some(Geometry::Polygon(p)) => p.centroid(),
            Some(Geometry::MultiPolygon(mp)) => mp.centroid(),
            _ => None,
        };
        let point = point.ok_or_else(|| anyhow!("lot feature {i} has no usable geometry"))?;
        lots.push((point, StreetId(street)));
    }
    info!(path = %path.display(), lots = lots.len(), "lots loaded");
    Ok(lots)
}

/// Building alignment polylines.
pub fn read_alignments(path: &Path) -> Result<Vec<LineString<f64>>> {
    let features = read_features(path)?;
    let mut lines = Vec::new();
    for feature in features {
        match feature.geometry {
            Some(Geometry::LineString(ls)) => lines.push(ls),
            Some(Geometry::MultiLineString(mls)) => lines.extend(mls.0),
            _ => {}
        }
    }
    info!(path = %path.display(), alignments = lines.len(), "alignments loaded");
    Ok(lines)
}

fn properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Write every output layer to `dir`.
pub fn write_output(dir: &Path, output: &PipelineOutput, force: bool) -> Result<()> {
    let ordered: Vec<Feature> = output.ordered.iter()
        .map(|d| -> Result<Feature> {
            Ok(Feature::new(Geometry::Point(d.geometry), properties(serde_json::to_value(d)?)))
        })
        .collect::<Result<_>>()?;
    write_features(&dir.join(ORDERED_DEMANDS), &ordered, force)?;

    let footprints: Vec<Feature> = output.footprints.iter()
        .map(|f| {
            let weight = output.find_box(&f.box_id).map(|b| b.aggregate_weight());
            Feature::new(Geometry::MultiPolygon(f.polygon.clone()), properties(json!({
                "box_id": f.box_id,
                "street_id": f.street_id,
                "order_rank": f.order_rank,
                "offset_basis": f.offset_basis,
                "contained_weight": f.contained_weight,
                "aggregate_weight": weight,
            })))
        })
        .collect();
    write_features(&dir.join(FOOTPRINTS), &footprints, force)?;

    let cuts: Vec<Feature> = output.cuts.iter()
        .map(|(id, cut)| Feature::new(Geometry::LineString(cut.clone()), properties(json!({
            "box_id": id,
            "street_id": id.street(),
        }))))
        .collect();
    write_features(&dir.join(CENTERLINE_CUTS), &cuts, force)?;

    let connectors: Vec<Feature> = output.connectors.iter()
        .map(|c| Feature::new(Geometry::LineString(c.geometry.clone()), properties(json!({
            "source": c.source,
            "box_id": c.box_id,
            "members": c.members,
            "residual": c.is_residual(),
        }))))
        .collect();
    write_features(&dir.join(CONNECTORS), &connectors, force)?;

    let report = json!({
        "counts": output.diagnostics.counts(),
        "entries": output.diagnostics,
    });
    let bytes = serde_json::to_vec_pretty(&report).context("Failed to serialize diagnostics")?;
    write_replacing(&dir.join(DIAGNOSTICS), &bytes, force)?;

    info!(dir = %dir.display(), "outputs written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn multi_part_street_is_merged() {
        let mls = MultiLineString::new(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
            line_string![(x: 1.0, y: 0.0), (x: 1.0, y: 1.0)],
        ]);
        assert_eq!(merge_parts(mls), line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]);
    }

    #[test]
    fn attributes_accept_numeric_strings() {
        let props = properties(json!({"a": "12", "b": 3.0, "c": "x", "d": 2.5}));
        assert_eq!(id(&props, "a"), Some(12));
        assert_eq!(id(&props, "b"), Some(3));
        assert_eq!(id(&props, "c"), None);
        assert_eq!(id(&props, "d"), None);
        assert_eq!(number(&props, "d"), Some(2.5));
        assert_eq!(number(&props, "missing"), None);
    }
}
