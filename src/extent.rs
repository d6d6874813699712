use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

use crate::error::HarvestError;
use crate::geometry::{BoundingBox, TemporalExtent};

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub bbox: Option<BoundingBox>,
    pub tbox: Option<TemporalExtent>,
}

pub trait ExtentExtractor: Send + Sync {
    fn extract(
        &self,
        path: &Path,
        want_bbox: bool,
        want_tbox: bool,
    ) -> Result<Extraction, HarvestError>;
}

/// Wraps the external `geoextent` command-line tool.
#[derive(Clone)]
pub struct GeoextentCli {
    program: PathBuf,
}

impl GeoextentCli {
    pub fn new() -> Result<Self, HarvestError> {
        let program = find_in_path("geoextent")
            .ok_or_else(|| HarvestError::MissingTool("geoextent".to_string()))?;
        Ok(Self { program })
    }

    pub fn tool_version(&self) -> Option<String> {
        let output = Command::new(&self.program).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() { None } else { Some(stdout) }
    }
}

impl ExtentExtractor for GeoextentCli {
    fn extract(
        &self,
        path: &Path,
        want_bbox: bool,
        want_tbox: bool,
    ) -> Result<Extraction, HarvestError> {
        let mut cmd = Command::new(&self.program);
        if want_bbox {
            cmd.arg("-b");
        }
        if want_tbox {
            cmd.arg("-t");
        }
        cmd.arg(path);
        let output = cmd
            .output()
            .map_err(|err| HarvestError::Extraction(err.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("geoextent failed on {}", path.display())
            } else {
                stderr
            };
            return Err(HarvestError::Extraction(message));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let payload = parse_output(stdout.trim())?;
        Ok(Extraction {
            bbox: parse_bbox(&payload)?,
            tbox: parse_tbox(&payload),
        })
    }
}

/// geoextent prints a Python literal rather than strict JSON; a second parse
/// with quotes swapped covers that.
fn parse_output(text: &str) -> Result<Value, HarvestError> {
    serde_json::from_str(text)
        .or_else(|_| serde_json::from_str(&text.replace('\'', "\"")))
        .map_err(|err| HarvestError::Extraction(format!("unparseable extractor output: {err}")))
}

fn parse_bbox(payload: &Value) -> Result<Option<BoundingBox>, HarvestError> {
    let Some(values) = payload.get("bbox").and_then(Value::as_array) else {
        return Ok(None);
    };
    let coords: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    if coords.len() != values.len() {
        return Err(HarvestError::Extraction(
            "non-numeric bbox coordinates".to_string(),
        ));
    }
    let bbox = BoundingBox::from_slice(&coords)?;
    Ok(Some(bbox))
}

fn parse_tbox(payload: &Value) -> Option<TemporalExtent> {
    let values = payload.get("tbox")?.as_array()?;
    let start = values.first()?.as_str()?.to_string();
    let end = values.get(1)?.as_str()?.to_string();
    Some(TemporalExtent { start, end })
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_json_output() {
        let payload = parse_output(
            r#"{"format": "geojson", "bbox": [7.6, 51.9, 7.65, 51.97], "crs": "4326"}"#,
        )
        .unwrap();
        let bbox = parse_bbox(&payload).unwrap().unwrap();
        assert_eq!(bbox.min_lon, 7.6);
        assert_eq!(bbox.max_lat, 51.97);
    }

    #[test]
    fn parse_python_literal_output() {
        let payload = parse_output(
            "{'format': 'tif', 'bbox': [5.0, 47.0, 15.0, 55.0], 'tbox': ['2020-01-01', '2020-12-31']}",
        )
        .unwrap();
        assert!(parse_bbox(&payload).unwrap().is_some());
        let tbox = parse_tbox(&payload).unwrap();
        assert_eq!(tbox.start, "2020-01-01");
        assert_eq!(tbox.end, "2020-12-31");
    }

    #[test]
    fn missing_bbox_is_none_not_error() {
        let payload = parse_output(r#"{"format": "csv"}"#).unwrap();
        assert!(parse_bbox(&payload).unwrap().is_none());
    }

    #[test]
    fn garbage_output_is_an_extraction_error() {
        assert_matches!(
            parse_output("no extent detected"),
            Err(HarvestError::Extraction(_))
        );
    }
}
