//! Template domain types
//!
//! A template is the pipeline definition file shared by every pipeline in a
//! fleet. It is parsed once and each pipeline works on its own copy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Parsed pipeline definition template
///
/// Shape of the definition file:
/// `{ "objects": [...], "parameters": [...] }`. The `parameters` collection
/// is required; a template without it is rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub objects: Vec<TemplateObject>,
    pub parameters: Vec<Parameter>,
}

/// A declared pipeline object (schedule, activity, resource, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateObject {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// Value of an object field: one scalar or a list of scalars
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    One(FieldScalar),
    Many(Vec<FieldScalar>),
}

/// A string expression or a reference to another object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldScalar {
    Text(String),
    Ref {
        #[serde(rename = "ref")]
        target: String,
    },
}

impl FieldValue {
    /// Iterate over the scalars of this field in declaration order
    pub fn scalars(&self) -> impl Iterator<Item = &FieldScalar> {
        match self {
            FieldValue::One(scalar) => std::slice::from_ref(scalar).iter(),
            FieldValue::Many(scalars) => scalars.iter(),
        }
    }
}

/// A declared template parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    #[serde(rename = "type", default = "default_parameter_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Remaining attributes (`description`, `allowedValues`, ...)
    #[serde(flatten)]
    pub attributes: BTreeMap<String, StringOrList>,
}

fn default_parameter_type() -> String {
    "String".to_string()
}

/// A string or a list of strings
///
/// Used for parameter attributes and for per-pipeline values (`myTags` is a
/// list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    Single(String),
    List(Vec<String>),
}

impl StringOrList {
    /// Returns the string if this is a single value
    pub fn as_single(&self) -> Option<&str> {
        match self {
            StringOrList::Single(s) => Some(s),
            StringOrList::List(_) => None,
        }
    }

    /// Iterate over the contained strings
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            StringOrList::Single(s) => std::slice::from_ref(s),
            StringOrList::List(list) => list,
        };
        items.iter().map(String::as_str)
    }
}

impl From<&str> for StringOrList {
    fn from(s: &str) -> Self {
        StringOrList::Single(s.to_string())
    }
}

impl From<String> for StringOrList {
    fn from(s: String) -> Self {
        StringOrList::Single(s)
    }
}

impl Template {
    /// Parse a template from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a template from a definition file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| CoreError::MalformedFile {
            kind: "template",
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Returns the declared default for a parameter, if any
    pub fn default_for(&self, key: &str) -> Option<&str> {
        fetch_default(&self.parameters, key)
    }
}

/// Returns the default associated with `key` in a parameter list
pub fn fetch_default<'a>(parameters: &'a [Parameter], key: &str) -> Option<&'a str> {
    parameters
        .iter()
        .find(|p| p.id == key)
        .and_then(|p| p.default.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r##"{
        "objects": [
            {
                "id": "Default",
                "name": "Default",
                "scheduleType": "cron",
                "schedule": {"ref": "DefaultSchedule"}
            },
            {
                "id": "DefaultSchedule",
                "type": "Schedule",
                "period": "#{mySchedulePeriod}",
                "startDateTime": "#{myStartDateTime}",
                "onFail": [{"ref": "FailAlarm"}, {"ref": "FailLog"}]
            }
        ],
        "parameters": [
            {"id": "myName", "type": "String"},
            {"id": "myShellCommand", "type": "String", "default": "run"},
            {"id": "myEnv", "type": "String", "allowedValues": ["dev", "prod"]}
        ]
    }"##;

    #[test]
    fn test_parse_template() {
        let template = Template::from_json(TEMPLATE).unwrap();
        assert_eq!(template.objects.len(), 2);
        assert_eq!(template.parameters.len(), 3);

        let schedule = &template.objects[1];
        assert_eq!(schedule.name, None);
        assert_eq!(
            schedule.fields.get("period"),
            Some(&FieldValue::One(FieldScalar::Text(
                "#{mySchedulePeriod}".to_string()
            )))
        );
        let on_fail: Vec<_> = schedule.fields["onFail"].scalars().collect();
        assert_eq!(on_fail.len(), 2);
        assert_eq!(
            template.objects[0].fields["schedule"],
            FieldValue::One(FieldScalar::Ref {
                target: "DefaultSchedule".to_string()
            })
        );
    }

    #[test]
    fn test_parameter_attributes() {
        let template = Template::from_json(TEMPLATE).unwrap();
        let env = &template.parameters[2];
        assert_eq!(env.kind, "String");
        assert_eq!(env.default, None);
        assert_eq!(
            env.attributes.get("allowedValues"),
            Some(&StringOrList::List(vec![
                "dev".to_string(),
                "prod".to_string()
            ]))
        );
    }

    #[test]
    fn test_fetch_default() {
        let template = Template::from_json(TEMPLATE).unwrap();
        assert_eq!(template.default_for("myShellCommand"), Some("run"));
        assert_eq!(template.default_for("myName"), None);
        assert_eq!(template.default_for("myUnknown"), None);
    }

    #[test]
    fn test_missing_parameters_rejected() {
        let result = Template::from_json(r#"{"objects": []}"#);
        assert!(matches!(result, Err(CoreError::MalformedTemplate(_))));
    }

    #[test]
    fn test_copies_are_independent() {
        let template = Template::from_json(TEMPLATE).unwrap();
        let mut copy = template.clone();
        copy.objects.clear();
        assert_eq!(template.objects.len(), 2);
    }
}
