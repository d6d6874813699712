use assert_matches::assert_matches;

use geoharvest::config::ConfigLoader;
use geoharvest::error::HarvestError;

#[test]
fn resolve_reads_overrides_from_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("geoharvest.json");
    std::fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "queries": ["lidar", "bathymetry"],
            "page_size": 100,
            "target_records": 50,
            "sample_fraction": 0.25,
            "dataverse_api_key": "secret"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.queries, vec!["lidar", "bathymetry"]);
    assert_eq!(resolved.page_size, 100);
    assert_eq!(resolved.target_records, 50);
    assert_eq!(resolved.sample_fraction, 0.25);
    assert_eq!(resolved.dataverse_api_key.as_deref(), Some("secret"));
    // untouched knobs keep their defaults
    assert_eq!(resolved.retry.max_retries, 3);
    assert!(resolved.formats.contains(&".geojson".to_string()));
}

#[test]
fn explicit_missing_config_path_is_an_error() {
    let err = ConfigLoader::resolve(Some("/nonexistent/geoharvest.json")).unwrap_err();
    assert_matches!(err, HarvestError::ConfigRead(_));
}

#[test]
fn malformed_config_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("geoharvest.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, HarvestError::ConfigParse(_));
}
