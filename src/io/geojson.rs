use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::{json, Map, Value};

use super::write_replacing;

/// A GeoJSON feature: geometry plus its property bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>, properties: Map<String, Value>) -> Self {
        Self { geometry: Some(geometry), properties }
    }

    /// GeoJSON type name of the geometry, `"None"` when absent.
    pub fn geometry_type(&self) -> &'static str {
        match &self.geometry {
            None => "None",
            Some(Geometry::Point(_)) => "Point",
            Some(Geometry::MultiPoint(_)) => "MultiPoint",
            Some(Geometry::LineString(_)) => "LineString",
            Some(Geometry::MultiLineString(_)) => "MultiLineString",
            Some(Geometry::Polygon(_)) => "Polygon",
            Some(Geometry::MultiPolygon(_)) => "MultiPolygon",
            Some(_) => "Other",
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "type": "Feature",
            "geometry": self.geometry.as_ref().map_or(Value::Null, geometry_to_value),
            "properties": self.properties,
        })
    }
}

/// Read the features of a GeoJSON FeatureCollection file.
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_features(&bytes).with_context(|| format!("Invalid GeoJSON in {}", path.display()))
}

/// Parse FeatureCollection bytes.
pub fn parse_features(bytes: &[u8]) -> Result<Vec<Feature>> {
    let value: Value = serde_json::from_slice(bytes).context("Failed to parse GeoJSON bytes")?;
    ensure!(value["type"].as_str() == Some("FeatureCollection"), "expected a FeatureCollection");
    let features = value["features"].as_array()
        .ok_or_else(|| anyhow!("FeatureCollection has no features array"))?;

    features.iter().enumerate().map(|(i, feature)| -> Result<Feature> {
        let geometry = match &feature["geometry"] {
            Value::Null => None,
            g => Some(parse_geometry(g).with_context(|| format!("feature {i}"))?),
        };
        let properties = feature["properties"].as_object().cloned().unwrap_or_default();
        Ok(Feature { geometry, properties })
    }).collect()
}

/// Write features as a FeatureCollection. Existing files are replaced only with `force`.
pub fn write_features(path: &Path, features: &[Feature], force: bool) -> Result<()> {
    let collection = json!({
        "type": "FeatureCollection",
        "features": features.iter().map(Feature::to_value).collect::<Vec<_>>(),
    });
    let bytes = serde_json::to_vec(&collection).context("Failed to serialize GeoJSON to bytes")?;
    write_replacing(path, &bytes, force)
}

fn parse_coord(value: &Value) -> Result<Coord<f64>> {
    let pair = value.as_array().ok_or_else(|| anyhow!("Invalid coordinate: expected an array"))?;
    ensure!(pair.len() >= 2, "Invalid coordinate: expected at least 2 values");
    let x = pair[0].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: x must be a number"))?;
    let y = pair[1].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: y must be a number"))?;
    Ok(Coord { x, y })
}

fn parse_line(value: &Value) -> Result<LineString<f64>> {
    let coords = value.as_array().ok_or_else(|| anyhow!("Invalid line: expected an array of positions"))?;
    Ok(LineString::new(coords.iter().map(parse_coord).collect::<Result<_>>()?))
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let rings = value.as_array().ok_or_else(|| anyhow!("Invalid polygon: expected an array of rings"))?;
    let mut rings = rings.iter().map(parse_line);
    let exterior = rings.next().ok_or_else(|| anyhow!("Invalid polygon: missing exterior ring"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    // Polygon::new closes open rings
    Ok(Polygon::new(exterior, interiors))
}

fn parse_many<T>(value: &Value, each: fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    value.as_array()
        .ok_or_else(|| anyhow!("Invalid coordinates: expected an array"))?
        .iter()
        .map(each)
        .collect()
}

/// Parse a GeoJSON geometry object.
pub fn parse_geometry(value: &Value) -> Result<Geometry<f64>> {
    let coords = &value["coordinates"];
    Ok(match value["type"].as_str() {
        Some("Point") => Geometry::Point(Point::from(parse_coord(coords)?)),
        Some("MultiPoint") => Geometry::MultiPoint(MultiPoint::new(
            parse_many(coords, parse_coord)?.into_iter().map(Point::from).collect(),
        )),
        Some("LineString") => Geometry::LineString(parse_line(coords)?),
        Some("MultiLineString") => Geometry::MultiLineString(MultiLineString::new(parse_many(coords, parse_line)?)),
        Some("Polygon") => Geometry::Polygon(parse_polygon(coords)?),
        Some("MultiPolygon") => Geometry::MultiPolygon(MultiPolygon::new(parse_many(coords, parse_polygon)?)),
        Some(other) => bail!("Unsupported geometry type {other}"),
        None => bail!("Geometry has no type"),
    })
}

fn line_coords(line: &LineString<f64>) -> Vec<[f64; 2]> {
    line.coords().map(|c| [c.x, c.y]).collect()
}

fn polygon_coords(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(line_coords)
        .collect()
}

/// Convert a geometry to its GeoJSON object.
pub fn geometry_to_value(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": [p.x(), p.y()] }),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| [p.x(), p.y()]).collect::<Vec<_>>(),
        }),
        Geometry::LineString(ls) => json!({ "type": "LineString", "coordinates": line_coords(ls) }),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(line_coords).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({ "type": "Polygon", "coordinates": polygon_coords(p) }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_coords).collect::<Vec<_>>(),
        }),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon};

    #[test]
    fn parses_mixed_collection() {
        let bytes = br#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.5, 2]}, "properties": {"id": 3}},
                {"type": "Feature", "geometry": {"type": "MultiLineString", "coordinates": [[[0, 0], [1, 0]], [[1, 0], [2, 1]]]}, "properties": null},
                {"type": "Feature", "geometry": null, "properties": {}}
            ]
        }"#;
        let features = parse_features(bytes).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0].geometry, Some(Geometry::Point(Point::new(1.5, 2.0))));
        assert_eq!(features[0].properties["id"], 3);
        assert_eq!(features[1].geometry_type(), "MultiLineString");
        assert!(features[1].properties.is_empty());
        assert_eq!(features[2].geometry_type(), "None");
    }

    #[test]
    fn rejects_unknown_geometry() {
        let bytes = br#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Circle", "coordinates": [0, 0]}, "properties": {}}
        ]}"#;
        assert!(parse_features(bytes).is_err());
        assert!(parse_features(br#"{"type": "Feature"}"#).is_err());
    }

    #[test]
    fn write_then_read_polygon_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.geojson");
        let square = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
        let features = vec![
            Feature::new(Geometry::MultiPolygon(MultiPolygon::new(vec![square.clone()])), Map::new()),
            Feature::new(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0)]), Map::new()),
        ];
        write_features(&path, &features, false).unwrap();
        assert!(write_features(&path, &features, false).is_err());
        write_features(&path, &features, true).unwrap();

        let back = read_features(&path).unwrap();
        assert_eq!(back, features);
    }
}
