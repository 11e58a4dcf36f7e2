//! Per-pipeline value overrides
//!
//! Each pipeline directory carries a `values.json` file mapping parameter
//! ids to literal values. The mapping may sit under a `values` key or be the
//! whole document.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::template::StringOrList;
use crate::error::{CoreError, Result};

/// Name of the values file inside a pipeline directory
pub const VALUES_FILE: &str = "values.json";

/// Parameter id to literal value
pub type ValueOverrides = BTreeMap<String, StringOrList>;

/// Parse value overrides from a JSON document
pub fn values_from_json(json: &str) -> Result<ValueOverrides> {
    let document: JsonValue = serde_json::from_str(json)?;
    let mapping = match document {
        JsonValue::Object(mut map) if map.get("values").is_some_and(JsonValue::is_object) => {
            map.remove("values").unwrap_or_default()
        }
        other => other,
    };
    Ok(serde_json::from_value(mapping)?)
}

/// Load value overrides from `<dir>/values.json`
pub fn values_from_dir(dir: impl AsRef<Path>) -> Result<ValueOverrides> {
    let path = dir.as_ref().join(VALUES_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| CoreError::io(&path, e))?;
    values_from_json(&content).map_err(|e| CoreError::MalformedFile {
        kind: "values file",
        path,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_under_key() {
        let values = values_from_json(
            r#"{"values": {"myName": "echoer", "myTags": ["team:data", "env:dev"]}}"#,
        )
        .unwrap();
        assert_eq!(values["myName"], StringOrList::from("echoer"));
        assert_eq!(
            values["myTags"],
            StringOrList::List(vec!["team:data".to_string(), "env:dev".to_string()])
        );
    }

    #[test]
    fn test_values_top_level() {
        let values = values_from_json(r#"{"myName": "echoer"}"#).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values["myName"].as_single(), Some("echoer"));
    }

    #[test]
    fn test_values_rejects_non_strings() {
        assert!(values_from_json(r#"{"values": {"myRetries": 3}}"#).is_err());
    }

    #[test]
    fn test_values_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(VALUES_FILE),
            r#"{"values": {"myDescription": "nightly"}}"#,
        )
        .unwrap();

        let values = values_from_dir(dir.path()).unwrap();
        assert_eq!(values["myDescription"].as_single(), Some("nightly"));
    }

    #[test]
    fn test_values_from_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = values_from_dir(dir.path().join("absent"));
        assert!(matches!(result, Err(CoreError::Io { .. })));
    }
}
