use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::SourcePlatform;

/// Renames keys present in `key_map`, passes everything else through
/// unchanged. A rename whose target key already exists (as another source
/// key, or as an earlier rename's output) is skipped and the source key kept,
/// so no field is ever dropped and the output has the same number of keys as
/// the input.
pub fn normalize(fields: &Map<String, Value>, key_map: &BTreeMap<String, String>) -> Map<String, Value> {
    let mut normalized = Map::new();
    for (key, value) in fields {
        let target = key_map.get(key).unwrap_or(key);
        if target != key && (fields.contains_key(target) || normalized.contains_key(target)) {
            warn!(key = %key, target = %target, "key rename collides with an existing field, keeping original key");
            normalized.insert(key.clone(), value.clone());
        } else {
            normalized.insert(target.clone(), value.clone());
        }
    }
    normalized
}

pub fn key_map(platform: SourcePlatform) -> BTreeMap<String, String> {
    let pairs: &[(&str, &str)] = match platform {
        SourcePlatform::Zenodo => &[
            ("date_publication", "publication_date"),
            ("last_update", "updated"),
            ("tags", "keywords"),
            ("query", "query_key"),
            ("size(bytes)", "size"),
        ],
        SourcePlatform::Figshare => &[
            ("submission_date", "submitted"),
            ("metadata_info", "metadata"),
            ("file_owners", "owners"),
            ("last_updated", "updated"),
            ("doi_link", "doi_url"),
        ],
        SourcePlatform::Dataverse => &[
            ("name", "title"),
            ("description", "metadata"),
            ("published_at", "created"),
            ("identifier", "doi"),
            ("latestVersion", "version"),
        ],
    };
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}
