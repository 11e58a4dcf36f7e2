//! Pipeline definition wire encoding
//!
//! The control plane expects objects as `{id, name, fields: [...]}`,
//! parameters as `{id, attributes: [...]}` and values as `{id, stringValue}`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::template::{FieldScalar, Parameter, StringOrList, TemplateObject};
use crate::domain::values::ValueOverrides;
use crate::schedule;

/// One field of a pipeline object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiField {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_value: Option<String>,
}

impl ApiField {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            string_value: Some(value.into()),
            ref_value: None,
        }
    }

    pub fn reference(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            string_value: None,
            ref_value: Some(target.into()),
        }
    }

    /// The field's value, whichever kind it is
    pub fn value(&self) -> Option<&str> {
        self.string_value.as_deref().or(self.ref_value.as_deref())
    }
}

/// A pipeline object in api encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<ApiField>,
}

/// One attribute of a parameter object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAttribute {
    pub key: String,
    pub string_value: String,
}

/// A declared parameter in api encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiParameterObject {
    pub id: String,
    #[serde(default)]
    pub attributes: Vec<ApiAttribute>,
}

/// A parameter value in api encoding
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiParameterValue {
    pub id: String,
    pub string_value: String,
}

/// A pipeline tag in api encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTag {
    pub key: String,
    pub value: String,
}

/// A complete pipeline definition: objects, declared parameters and values
///
/// Serializes to the body fields of the put/validate calls and deserializes
/// from the describe-definition response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    #[serde(rename = "pipelineObjects", default)]
    pub objects: Vec<ApiObject>,
    #[serde(rename = "parameterObjects", default)]
    pub parameters: Vec<ApiParameterObject>,
    #[serde(rename = "parameterValues", default)]
    pub values: Vec<ApiParameterValue>,
}

impl PipelineDefinition {
    /// Returns a copy with every collection sorted
    ///
    /// The control plane does not preserve ordering, so two definitions with
    /// the same content compare equal once normalized.
    pub fn normalized(&self) -> Self {
        let mut objects = self.objects.clone();
        for object in &mut objects {
            object.fields.sort();
        }
        objects.sort_by(|a, b| a.id.cmp(&b.id));

        let mut parameters = self.parameters.clone();
        for parameter in &mut parameters {
            parameter.attributes.sort();
        }
        parameters.sort_by(|a, b| a.id.cmp(&b.id));

        let mut values = self.values.clone();
        values.sort();

        Self {
            objects,
            parameters,
            values,
        }
    }

    /// Returns a copy with the `id` timestamps advanced by whole `period`s
    /// until they are not earlier than `now`
    ///
    /// Two anchors that differ only by whole periods end up identical.
    /// Values that are not timestamps are kept as they are.
    pub fn with_advanced_timestamp(&self, id: &str, period: &str, now: NaiveDateTime) -> Self {
        let mut copy = self.clone();
        for value in copy.values.iter_mut().filter(|v| v.id == id) {
            if let Ok(advanced) = schedule::advance_from(&value.string_value, period, now) {
                value.string_value = advanced;
            }
        }
        copy
    }

    /// Whether nothing has been defined yet
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.parameters.is_empty() && self.values.is_empty()
    }
}

impl PartialEq for PipelineDefinition {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.normalized(), other.normalized());
        a.objects == b.objects && a.parameters == b.parameters && a.values == b.values
    }
}

impl Eq for PipelineDefinition {}

// =============================================================================
// Translation from the template
// =============================================================================

/// Convert template objects to api objects
///
/// `id` and `name` become top-level members (name defaults to id); every
/// other key becomes a field, with list values expanded to repeated keys.
pub fn objects_to_api(objects: &[TemplateObject]) -> Vec<ApiObject> {
    objects
        .iter()
        .map(|object| {
            let fields = object
                .fields
                .iter()
                .flat_map(|(key, value)| {
                    value.scalars().map(move |scalar| match scalar {
                        FieldScalar::Text(text) => ApiField::string(key, text),
                        FieldScalar::Ref { target } => ApiField::reference(key, target),
                    })
                })
                .collect();

            ApiObject {
                id: object.id.clone(),
                name: object.name.clone().unwrap_or_else(|| object.id.clone()),
                fields,
            }
        })
        .collect()
}

/// Convert declared parameters to api parameter objects
pub fn parameters_to_api(parameters: &[Parameter]) -> Vec<ApiParameterObject> {
    parameters
        .iter()
        .map(|parameter| {
            let mut attributes = vec![ApiAttribute {
                key: "type".to_string(),
                string_value: parameter.kind.clone(),
            }];
            if let Some(default) = &parameter.default {
                attributes.push(ApiAttribute {
                    key: "default".to_string(),
                    string_value: default.clone(),
                });
            }
            for (key, value) in &parameter.attributes {
                attributes.extend(value.iter().map(|v| ApiAttribute {
                    key: key.clone(),
                    string_value: v.to_string(),
                }));
            }

            ApiParameterObject {
                id: parameter.id.clone(),
                attributes,
            }
        })
        .collect()
}

/// Convert value overrides to api parameter values
///
/// List values produce one entry per element.
pub fn values_to_api(values: &ValueOverrides) -> Vec<ApiParameterValue> {
    values
        .iter()
        .flat_map(|(id, value)| {
            let entries: Vec<ApiParameterValue> = match value {
                StringOrList::Single(s) => vec![ApiParameterValue {
                    id: id.clone(),
                    string_value: s.clone(),
                }],
                StringOrList::List(list) => list
                    .iter()
                    .map(|s| ApiParameterValue {
                        id: id.clone(),
                        string_value: s.clone(),
                    })
                    .collect(),
            };
            entries
        })
        .collect()
}
