use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use rand::Rng;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::HarvestError;
use crate::geometry::Geometry;
use crate::store::{self, ResultRow, Store};

#[derive(Debug, Clone)]
pub struct MapSummary {
    pub overlays: usize,
    pub rows: usize,
    pub path: Utf8PathBuf,
}

/// Renders one overlay per record index, merging that index's geometries
/// into a single multi-geometry with a random color and a filename/DOI
/// popup.
pub fn render_map(results_path: &Utf8Path, map_path: &Utf8Path) -> Result<MapSummary, HarvestError> {
    let rows = store::read_results(results_path)?;
    let groups = group_by_index(&rows);
    info!(indices = groups.len(), rows = rows.len(), "rendering footprint map");

    let mut rng = rand::thread_rng();
    let mut overlays: Vec<Value> = Vec::new();
    for (index, group) in &groups {
        let geometries: Vec<Geometry> = group
            .iter()
            .filter_map(|row| match Geometry::from_wkt(&row.geometry) {
                Ok(geometry) => Some(geometry),
                Err(err) => {
                    warn!(index, error = %err, "invalid geometry, skipping row");
                    None
                }
            })
            .collect();
        if geometries.is_empty() {
            continue;
        }
        let merged = Geometry::merge(geometries);
        let doi = group
            .iter()
            .map(|row| row.doi_url.as_str())
            .find(|doi| !doi.is_empty() && *doi != "N/A")
            .unwrap_or("N/A");
        overlays.push(json!({
            "index": index,
            "color": random_color(&mut rng),
            "filename": group[0].filename.as_str(),
            "doi": doi,
            "geometry": merged.to_geojson(),
        }));
    }

    let encoded = serde_json::to_string(&overlays)
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    let document = MAP_TEMPLATE.replace("__OVERLAYS__", &encoded);
    Store::write_bytes_atomic(map_path, document.as_bytes())?;
    Ok(MapSummary {
        overlays: overlays.len(),
        rows: rows.len(),
        path: map_path.to_owned(),
    })
}

/// Result filenames carry the record index as a numeric prefix; rows whose
/// prefix does not parse are skipped.
pub fn group_by_index(rows: &[ResultRow]) -> BTreeMap<u64, Vec<&ResultRow>> {
    let prefix = Regex::new(r"^(\d+)_").unwrap();
    let mut groups: BTreeMap<u64, Vec<&ResultRow>> = BTreeMap::new();
    for row in rows {
        let Some(captures) = prefix.captures(&row.filename) else {
            warn!(filename = %row.filename, "no index prefix, skipping row");
            continue;
        };
        let Ok(index) = captures[1].parse::<u64>() else {
            continue;
        };
        groups.entry(index).or_default().push(row);
    }
    groups
}

pub fn random_color<R: Rng>(rng: &mut R) -> String {
    format!("#{:06x}", rng.gen_range(0..0x100_0000))
}

const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>geoharvest footprints</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
var overlays = __OVERLAYS__;
var map = L.map('map').setView([0, 0], 2);
L.tileLayer('https://tile.openstreetmap.org/{z}/{x}/{y}.png', {
  attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);
overlays.forEach(function (overlay) {
  var popup = '<b>' + overlay.filename + '</b><br>DOI: ' + overlay.doi;
  L.geoJSON(overlay.geometry, {
    style: { color: overlay.color, weight: 2, fillOpacity: 0.3 }
  }).bindPopup(popup).addTo(map);
});
</script>
</body>
</html>
"#;
