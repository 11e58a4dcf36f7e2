//! Pipeline DTOs for the scheduling control plane

use serde::{Deserialize, Serialize};

use crate::dto::definition::{ApiField, ApiTag};

/// Request to create a pipeline
///
/// Creation is idempotent on `(name, unique_id)`: the control plane returns
/// the existing pipeline id instead of creating a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePipeline {
    pub name: String,
    pub unique_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ApiTag>,
}

/// Response to a create request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePipelineResponse {
    pub pipeline_id: String,
}

/// Description of a remote pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDescription {
    pub pipeline_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<ApiField>,
    #[serde(default)]
    pub tags: Vec<ApiTag>,
}

impl PipelineDescription {
    /// Returns the value of the first field with key `field_name`
    pub fn field_value(&self, field_name: &str) -> Option<&str> {
        fetch_field_value(&self.fields, field_name)
    }
}

/// Returns the value of the first field with key `field_name`
pub fn fetch_field_value<'a>(fields: &'a [ApiField], field_name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|f| f.key == field_name)
        .and_then(ApiField::value)
}

/// Response to a describe-pipelines request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribePipelinesResponse {
    #[serde(default)]
    pub pipeline_description_list: Vec<PipelineDescription>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> PipelineDescription {
        serde_json::from_value(serde_json::json!({
            "description": "my description",
            "fields": [
                {"key": "@pipelineState", "stringValue": "PENDING"},
                {"key": "@creationTime", "stringValue": "2015-02-11T21:17:10"},
                {"key": "@sphere", "stringValue": "PIPELINE"},
                {"key": "uniqueId", "stringValue": "pipeweldertest1"},
                {"key": "name", "stringValue": "Pipewelder test"},
                {"key": "@id", "stringValue": "df-07437251YGRXOY19OOOO"}
            ],
            "name": "Pipewelder test",
            "pipelineId": "df-07437251YGRXOY19OOOO",
            "tags": []
        }))
        .unwrap()
    }

    #[test]
    fn test_pipeline_state_field() {
        let description = description();
        assert_eq!(description.field_value("@pipelineState"), Some("PENDING"));
        assert_eq!(description.field_value("uniqueId"), Some("pipeweldertest1"));
        assert_eq!(description.field_value("@missing"), None);
    }

    #[test]
    fn test_create_request_wire_names() {
        let req = CreatePipeline {
            name: "echoer".to_string(),
            unique_id: "abc".to_string(),
            description: None,
            tags: vec![ApiTag {
                key: "team".to_string(),
                value: "data".to_string(),
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["uniqueId"], "abc");
        assert!(json.get("description").is_none());
        assert_eq!(json["tags"][0]["value"], "data");
    }
}
