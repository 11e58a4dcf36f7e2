//! Pipeline instances
//!
//! A `PipelineInstance` is one instantiation of the shared template for a
//! pipeline directory. It owns a private copy of the template and the
//! directory's values, derives the pipeline's identity, and projects its
//! definition into the control plane's encoding.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::template::{StringOrList, Template};
use crate::domain::values::{ValueOverrides, values_from_dir};
use crate::dto::definition::{
    ApiObject, ApiParameterObject, ApiParameterValue, ApiTag, PipelineDefinition, objects_to_api,
    parameters_to_api, values_to_api,
};
use crate::error::{CoreError, Result};
use crate::resolver::ParameterResolver;
use crate::schedule;

pub const NAME_KEY: &str = "myName";
pub const DESCRIPTION_KEY: &str = "myDescription";
pub const TAGS_KEY: &str = "myTags";
pub const START_KEY: &str = "myStartDateTime";
pub const PERIOD_KEY: &str = "mySchedulePeriod";
pub const INPUT_DIR_KEY: &str = "myS3InputDir";

/// One pipeline derived from the template
#[derive(Debug, Clone)]
pub struct PipelineInstance {
    dir: PathBuf,
    definition: Template,
    values: ValueOverrides,
}

impl PipelineInstance {
    /// Instantiate the template for `dir` with the given values
    ///
    /// `myName` defaults to the directory's base name. The start timestamp
    /// is moved into the future once, here.
    pub fn new(template: &Template, dir: impl Into<PathBuf>, values: ValueOverrides) -> Result<Self> {
        let dir = dir.into();
        let mut instance = Self {
            definition: template.clone(),
            values,
            dir,
        };

        if !instance.values.contains_key(NAME_KEY) {
            let base_name = instance
                .dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            instance
                .values
                .insert(NAME_KEY.to_string(), StringOrList::Single(base_name));
        }

        let timestamp = instance.get_value(START_KEY)?;
        let period = instance.get_value(PERIOD_KEY)?;
        let adjusted = schedule::advance(&timestamp, &period)?;
        instance
            .values
            .insert(START_KEY.to_string(), StringOrList::Single(adjusted));

        debug!(
            "Instantiated pipeline '{}' from {}",
            instance.name()?,
            instance.dir.display()
        );

        Ok(instance)
    }

    /// Instantiate the template from `<dir>/values.json`
    ///
    /// `extra` values are merged over the file's values.
    pub fn from_dir(template: &Template, dir: impl AsRef<Path>, extra: &ValueOverrides) -> Result<Self> {
        let dir = dir.as_ref();
        let mut values = values_from_dir(dir)?;
        values.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::new(template, dir, values)
    }

    /// Directory this pipeline was loaded from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The private template copy
    pub fn definition(&self) -> &Template {
        &self.definition
    }

    /// Current values, including the normalized start timestamp
    pub fn values(&self) -> &ValueOverrides {
        &self.values
    }

    /// Resolve `key` against this pipeline's values and template defaults
    pub fn get_value(&self, key: &str) -> Result<String> {
        ParameterResolver::new(&self.values, &self.definition.parameters).resolve(key)
    }

    /// The resolved `myName`
    pub fn name(&self) -> Result<String> {
        self.get_value(NAME_KEY)
    }

    /// The resolved `myDescription`, if any
    pub fn description(&self) -> Result<Option<String>> {
        ParameterResolver::new(&self.values, &self.definition.parameters)
            .resolve_optional(DESCRIPTION_KEY)
    }

    /// Tags parsed from `key:value` entries of `myTags`
    pub fn tags(&self) -> Result<BTreeMap<String, String>> {
        let Some(entries) = self.values.get(TAGS_KEY) else {
            return Ok(BTreeMap::new());
        };

        entries
            .iter()
            .map(|entry| {
                entry
                    .split_once(':')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| CoreError::InvalidTag(entry.to_string()))
            })
            .collect()
    }

    /// Stable identity used for idempotent remote creation
    ///
    /// Hex SHA-256 over the name and the sorted tag set: the same name and
    /// tags always give the same id.
    pub fn unique_id(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(self.name()?.as_bytes());
        for (key, value) in self.tags()? {
            hasher.update([0x1f]);
            hasher.update(key.as_bytes());
            hasher.update([b':']);
            hasher.update(value.as_bytes());
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Template objects in api encoding
    pub fn api_objects(&self) -> Vec<ApiObject> {
        objects_to_api(&self.definition.objects)
    }

    /// Declared parameters in api encoding
    pub fn api_parameters(&self) -> Vec<ApiParameterObject> {
        parameters_to_api(&self.definition.parameters)
    }

    /// Values in api encoding
    pub fn api_values(&self) -> Vec<ApiParameterValue> {
        values_to_api(&self.values)
    }

    /// Tags in api encoding
    pub fn api_tags(&self) -> Result<Vec<ApiTag>> {
        Ok(self
            .tags()?
            .into_iter()
            .map(|(key, value)| ApiTag { key, value })
            .collect())
    }

    /// Objects, parameters and values together
    pub fn api_definition(&self) -> PipelineDefinition {
        PipelineDefinition {
            objects: self.api_objects(),
            parameters: self.api_parameters(),
            values: self.api_values(),
        }
    }
}
