use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use geoharvest::domain::{FileEntry, Record, SourcePlatform};
use geoharvest::error::HarvestError;
use geoharvest::store::{CheckpointStore, ResultRow, Store, append_results, read_results};

fn test_store(temp: &tempfile::TempDir) -> Store {
    let data_root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    let scratch_root = Utf8PathBuf::from_path_buf(temp.path().join("scratch")).unwrap();
    Store::new_with_paths(data_root, scratch_root)
}

#[test]
fn layout_paths() {
    let temp = tempfile::tempdir().unwrap();
    let store = test_store(&temp);
    assert!(
        store
            .records_path(SourcePlatform::Zenodo)
            .ends_with("records/zenodo.json")
    );
    assert!(
        store
            .checkpoint_path(SourcePlatform::Figshare)
            .ends_with("checkpoints/figshare.json")
    );
    assert!(store.results_path().ends_with("bbox_results.csv"));
    assert!(store.map_path().ends_with("footprints.html"));
}

#[test]
fn records_round_trip() {
    let temp = tempfile::tempdir().unwrap();
    let store = test_store(&temp);
    let records = vec![Record {
        id: "doi:10.7910/DVN/ABC".to_string(),
        doi_url: Some("https://doi.org/10.7910/DVN/ABC".to_string()),
        title: Some("Soil grids".to_string()),
        files: vec![FileEntry {
            name: "soil.tif".to_string(),
            size: 42,
            download_url: None,
            checksum: Some("aa".to_string()),
        }],
        sum_size: 42,
        query_key: Some("raster".to_string()),
        platform: SourcePlatform::Dataverse,
        metadata: serde_json::Map::new(),
    }];

    store.save_records(SourcePlatform::Dataverse, &records).unwrap();
    let loaded = store.load_records(SourcePlatform::Dataverse).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, records[0].id);
    assert_eq!(loaded[0].files, records[0].files);
    assert_eq!(loaded[0].sum_size, 42);
}

#[test]
fn missing_records_file_is_a_distinct_error() {
    let temp = tempfile::tempdir().unwrap();
    let store = test_store(&temp);
    let err = store.load_records(SourcePlatform::Zenodo).unwrap_err();
    assert_matches!(err, HarvestError::RecordsNotFound(_));
}

#[test]
fn checkpoint_survives_reload() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("checkpoint.json")).unwrap();

    let mut checkpoint = CheckpointStore::load(path.clone()).unwrap();
    assert!(checkpoint.is_empty());
    checkpoint.mark_processed(3).unwrap();
    checkpoint.mark_processed(7).unwrap();
    drop(checkpoint);

    let reloaded = CheckpointStore::load(path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.contains(3));
    assert!(reloaded.contains(7));
    assert!(!reloaded.contains(4));
}

fn row(filename: &str) -> ResultRow {
    ResultRow {
        filename: filename.to_string(),
        bbox: "[7.0,50.0,8.0,51.0]".to_string(),
        geometry: "POLYGON ((7 50, 8 50, 8 51, 7 51, 7 50))".to_string(),
        doi_url: "https://doi.org/10.5281/zenodo.1".to_string(),
    }
}

#[test]
fn results_append_writes_header_once() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("results.csv")).unwrap();

    append_results(&path, &[row("1_a.tif"), row("1_b.shp")]).unwrap();
    append_results(&path, &[row("2_c.geojson")]).unwrap();

    let content = std::fs::read_to_string(path.as_std_path()).unwrap();
    let header_lines = content
        .lines()
        .filter(|line| line.starts_with("filename,"))
        .count();
    assert_eq!(header_lines, 1);

    let rows = read_results(&path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].filename, "2_c.geojson");
    assert_eq!(rows[0].bbox, "[7.0,50.0,8.0,51.0]");
}

#[test]
fn empty_append_creates_no_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("results.csv")).unwrap();
    append_results(&path, &[]).unwrap();
    assert!(!path.as_std_path().exists());
}
