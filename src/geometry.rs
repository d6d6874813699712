use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::HarvestError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn from_slice(values: &[f64]) -> Result<Self, HarvestError> {
        if values.len() != 4 {
            return Err(HarvestError::Extraction(format!(
                "expected 4 bbox coordinates, got {}",
                values.len()
            )));
        }
        Ok(Self {
            min_lon: values[0],
            min_lat: values[1],
            max_lon: values[2],
            max_lat: values[3],
        })
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    pub fn is_valid(&self) -> bool {
        self.as_array().iter().all(|value| value.is_finite())
            && self.min_lon <= self.max_lon
            && self.min_lat <= self.max_lat
    }

    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON (({} {}, {} {}, {} {}, {} {}, {} {}))",
            self.min_lon,
            self.min_lat,
            self.max_lon,
            self.min_lat,
            self.max_lon,
            self.max_lat,
            self.min_lon,
            self.max_lat,
            self.min_lon,
            self.min_lat
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalExtent {
    pub start: String,
    pub end: String,
}

/// One or more polygon outer rings. Interior rings are not tracked; a parsed
/// polygon keeps its first ring only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub polygons: Vec<Vec<(f64, f64)>>,
}

impl Geometry {
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn merge<I: IntoIterator<Item = Geometry>>(geometries: I) -> Geometry {
        let polygons = geometries
            .into_iter()
            .flat_map(|geometry| geometry.polygons)
            .collect();
        Geometry { polygons }
    }

    pub fn from_wkt(text: &str) -> Result<Self, HarvestError> {
        let trimmed = text.trim();
        let open = trimmed
            .find('(')
            .ok_or_else(|| HarvestError::InvalidWkt(text.to_string()))?;
        let keyword = trimmed[..open].trim().to_uppercase();
        let body = &trimmed[open..];
        match keyword.as_str() {
            "POLYGON" => {
                let (group, rest) = parse_group(body)?;
                expect_consumed(rest, text)?;
                let ring = outer_ring(&group, text)?;
                Ok(Geometry {
                    polygons: vec![ring],
                })
            }
            "MULTIPOLYGON" => {
                let (group, rest) = parse_group(body)?;
                expect_consumed(rest, text)?;
                let Group::List(polygons) = group else {
                    return Err(HarvestError::InvalidWkt(text.to_string()));
                };
                let rings = polygons
                    .iter()
                    .map(|polygon| outer_ring(polygon, text))
                    .collect::<Result<Vec<_>, HarvestError>>()?;
                Ok(Geometry { polygons: rings })
            }
            _ => Err(HarvestError::InvalidWkt(text.to_string())),
        }
    }

    pub fn to_wkt(&self) -> String {
        if self.polygons.len() == 1 {
            format!("POLYGON (({}))", format_ring(&self.polygons[0]))
        } else {
            let parts: Vec<String> = self
                .polygons
                .iter()
                .map(|ring| format!("(({}))", format_ring(ring)))
                .collect();
            format!("MULTIPOLYGON ({})", parts.join(", "))
        }
    }

    pub fn to_geojson(&self) -> Value {
        if self.polygons.len() == 1 {
            json!({
                "type": "Polygon",
                "coordinates": [ring_coordinates(&self.polygons[0])],
            })
        } else {
            let coordinates: Vec<Value> = self
                .polygons
                .iter()
                .map(|ring| json!([ring_coordinates(ring)]))
                .collect();
            json!({
                "type": "MultiPolygon",
                "coordinates": coordinates,
            })
        }
    }
}

enum Group {
    Leaf(String),
    List(Vec<Group>),
}

fn parse_group(input: &str) -> Result<(Group, &str), HarvestError> {
    let input = input.trim_start();
    let rest = input
        .strip_prefix('(')
        .ok_or_else(|| HarvestError::InvalidWkt(input.to_string()))?;
    let rest = rest.trim_start();
    if rest.starts_with('(') {
        let mut items = Vec::new();
        let mut cursor = rest;
        loop {
            let (child, after) = parse_group(cursor)?;
            items.push(child);
            let after = after.trim_start();
            if let Some(next) = after.strip_prefix(',') {
                cursor = next.trim_start();
                continue;
            }
            if let Some(next) = after.strip_prefix(')') {
                return Ok((Group::List(items), next));
            }
            return Err(HarvestError::InvalidWkt(after.to_string()));
        }
    }
    let end = rest
        .find(')')
        .ok_or_else(|| HarvestError::InvalidWkt(rest.to_string()))?;
    Ok((Group::Leaf(rest[..end].to_string()), &rest[end + 1..]))
}

fn expect_consumed(rest: &str, original: &str) -> Result<(), HarvestError> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(HarvestError::InvalidWkt(original.to_string()))
    }
}

fn outer_ring(group: &Group, original: &str) -> Result<Vec<(f64, f64)>, HarvestError> {
    let ring_text = match group {
        Group::Leaf(text) => text,
        Group::List(rings) => match rings.first() {
            Some(Group::Leaf(text)) => text,
            _ => return Err(HarvestError::InvalidWkt(original.to_string())),
        },
    };
    parse_ring(ring_text, original)
}

fn parse_ring(text: &str, original: &str) -> Result<Vec<(f64, f64)>, HarvestError> {
    let mut points = Vec::new();
    for pair in text.split(',') {
        let mut coords = pair.split_whitespace();
        let lon = coords
            .next()
            .and_then(|value| value.parse::<f64>().ok())
            .ok_or_else(|| HarvestError::InvalidWkt(original.to_string()))?;
        let lat = coords
            .next()
            .and_then(|value| value.parse::<f64>().ok())
            .ok_or_else(|| HarvestError::InvalidWkt(original.to_string()))?;
        points.push((lon, lat));
    }
    if points.len() < 3 {
        return Err(HarvestError::InvalidWkt(original.to_string()));
    }
    Ok(points)
}

fn format_ring(ring: &[(f64, f64)]) -> String {
    ring.iter()
        .map(|(lon, lat)| format!("{lon} {lat}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn ring_coordinates(ring: &[(f64, f64)]) -> Vec<Value> {
    ring.iter().map(|(lon, lat)| json!([lon, lat])).collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn bbox_wkt_is_a_closed_ring() {
        let bbox = BoundingBox {
            min_lon: 7.0,
            min_lat: 50.0,
            max_lon: 8.5,
            max_lat: 51.0,
        };
        let wkt = bbox.to_wkt();
        assert_eq!(
            wkt,
            "POLYGON ((7 50, 8.5 50, 8.5 51, 7 51, 7 50))"
        );
        let geometry = Geometry::from_wkt(&wkt).unwrap();
        assert_eq!(geometry.polygons.len(), 1);
        assert_eq!(geometry.polygons[0].len(), 5);
        assert_eq!(geometry.polygons[0][0], geometry.polygons[0][4]);
    }

    #[test]
    fn polygon_wkt_round_trip() {
        let geometry = Geometry::from_wkt("POLYGON ((0 0, 1 0, 1 1, 0 0))").unwrap();
        assert_eq!(geometry.to_wkt(), "POLYGON ((0 0, 1 0, 1 1, 0 0))");
    }

    #[test]
    fn multipolygon_parses_outer_rings() {
        let geometry =
            Geometry::from_wkt("MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((2 2, 3 2, 3 3, 2 2)))")
                .unwrap();
        assert_eq!(geometry.polygons.len(), 2);
        assert!(geometry.to_wkt().starts_with("MULTIPOLYGON"));
    }

    #[test]
    fn polygon_with_hole_keeps_outer_ring() {
        let geometry = Geometry::from_wkt(
            "POLYGON ((0 0, 4 0, 4 4, 0 0), (1 1, 2 1, 2 2, 1 1))",
        )
        .unwrap();
        assert_eq!(geometry.polygons.len(), 1);
        assert_eq!(geometry.polygons[0][1], (4.0, 0.0));
    }

    #[test]
    fn invalid_wkt_is_rejected() {
        assert_matches!(
            Geometry::from_wkt("LINESTRING (0 0, 1 1)"),
            Err(HarvestError::InvalidWkt(_))
        );
        assert_matches!(
            Geometry::from_wkt("POLYGON ((0 0, 1 1))"),
            Err(HarvestError::InvalidWkt(_))
        );
        assert_matches!(
            Geometry::from_wkt("not a geometry"),
            Err(HarvestError::InvalidWkt(_))
        );
    }

    #[test]
    fn merge_collects_polygons() {
        let first = Geometry::from_wkt("POLYGON ((0 0, 1 0, 1 1, 0 0))").unwrap();
        let second = Geometry::from_wkt("POLYGON ((2 2, 3 2, 3 3, 2 2))").unwrap();
        let merged = Geometry::merge(vec![first, second]);
        assert_eq!(merged.polygons.len(), 2);
        let geojson = merged.to_geojson();
        assert_eq!(geojson["type"], "MultiPolygon");
    }
}
