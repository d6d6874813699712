use crate::domain::Record;

pub fn has_geospatial_extension(name: &str, formats: &[String]) -> bool {
    let lower = name.to_lowercase();
    formats
        .iter()
        .any(|format| lower.ends_with(&format.to_lowercase()))
}

/// Keeps records with at least one allow-listed file, each exactly once.
/// Matching records are tagged with the query keyword that found them;
/// `sum_size` counts every file on the record, not only the matching ones.
pub fn filter_geospatial(records: Vec<Record>, formats: &[String], query: &str) -> Vec<Record> {
    let mut filtered = Vec::new();
    for mut record in records {
        let matched = record
            .files
            .iter()
            .any(|file| has_geospatial_extension(&file.name, formats));
        if !matched {
            continue;
        }
        record.query_key = Some(query.to_string());
        record.sum_size = record.total_file_size();
        filtered.push(record);
    }
    filtered
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use crate::domain::{FileEntry, SourcePlatform};

    use super::*;

    fn entry(name: &str, size: u64) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            size,
            download_url: None,
            checksum: None,
        }
    }

    fn record(id: &str, files: Vec<FileEntry>) -> Record {
        Record {
            id: id.to_string(),
            doi_url: None,
            title: None,
            files,
            sum_size: 0,
            query_key: None,
            platform: SourcePlatform::Zenodo,
            metadata: Map::new(),
        }
    }

    fn formats() -> Vec<String> {
        crate::config::default_formats()
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let formats = formats();
        assert!(has_geospatial_extension("Cover.TIF", &formats));
        assert!(has_geospatial_extension("parcels.geojson", &formats));
        assert!(!has_geospatial_extension("notes.txt", &formats));
        assert!(!has_geospatial_extension("tif", &formats));
    }

    #[test]
    fn records_without_matches_are_excluded() {
        let records = vec![record("1", vec![entry("readme.md", 5), entry("data.csv", 7)])];
        let filtered = filter_geospatial(records, &formats(), "gis");
        assert!(filtered.is_empty());
    }

    #[test]
    fn multiple_matching_files_yield_one_record() {
        let records = vec![record(
            "2",
            vec![entry("a.shp", 10), entry("b.tif", 20), entry("c.txt", 30)],
        )];
        let filtered = filter_geospatial(records, &formats(), "raster");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].query_key.as_deref(), Some("raster"));
    }

    #[test]
    fn sum_size_counts_every_file() {
        let records = vec![record("3", vec![entry("a.shp", 10), entry("notes.txt", 90)])];
        let filtered = filter_geospatial(records, &formats(), "vector");
        assert_eq!(filtered[0].sum_size, 100);
    }
}
