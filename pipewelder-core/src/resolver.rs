//! Parameter resolution
//!
//! Resolves a named value for one pipeline, expanding `#{myKey}`
//! placeholders against the pipeline's own values and the template's
//! declared defaults.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::template::{Parameter, fetch_default};
use crate::domain::values::ValueOverrides;
use crate::error::{CoreError, Result};

/// Placeholder token: `#{identifier}` where the identifier starts with `my`
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\{(my[a-zA-Z0-9]+)\}").unwrap());

/// Resolves parameter values for a single pipeline
pub struct ParameterResolver<'a> {
    values: &'a ValueOverrides,
    parameters: &'a [Parameter],
}

/// Internal failure, rewritten to name the originally requested key
enum Failure {
    Missing(String),
    Cycle(Vec<String>),
    NonScalar(String),
}

impl Failure {
    fn into_error(self, key: &str) -> CoreError {
        match self {
            Failure::Missing(unresolved) => CoreError::MissingValue {
                key: key.to_string(),
                unresolved,
            },
            Failure::Cycle(chain) => CoreError::CyclicReference {
                key: key.to_string(),
                chain: chain.join(" -> "),
            },
            Failure::NonScalar(id) => CoreError::NonScalarValue(id),
        }
    }
}

impl<'a> ParameterResolver<'a> {
    pub fn new(values: &'a ValueOverrides, parameters: &'a [Parameter]) -> Self {
        Self { values, parameters }
    }

    /// Resolve `key` to a string with every placeholder expanded
    ///
    /// A key present in the values wins over the declared default. A key
    /// with neither is `MissingValue`; a chain that leads back to a key
    /// already being resolved is `CyclicReference`.
    pub fn resolve(&self, key: &str) -> Result<String> {
        let mut chain = Vec::new();
        self.resolve_key(key, &mut chain)
            .map_err(|failure| failure.into_error(key))
    }

    /// Resolve `key`, returning `None` when it has no value or default
    pub fn resolve_optional(&self, key: &str) -> Result<Option<String>> {
        match self.resolve(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_missing_value() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Expand placeholders in an arbitrary expression
    pub fn expand(&self, expression: &str) -> Result<String> {
        let mut chain = Vec::new();
        self.expand_expression(expression.to_string(), &mut chain)
            .map_err(|failure| failure.into_error(expression))
    }

    fn resolve_key(&self, key: &str, chain: &mut Vec<String>) -> std::result::Result<String, Failure> {
        if chain.iter().any(|k| k == key) {
            let mut cycle = chain.clone();
            cycle.push(key.to_string());
            return Err(Failure::Cycle(cycle));
        }

        let raw = match self.values.get(key) {
            Some(value) => value
                .as_single()
                .ok_or_else(|| Failure::NonScalar(key.to_string()))?,
            None => fetch_default(self.parameters, key)
                .ok_or_else(|| Failure::Missing(key.to_string()))?,
        };

        chain.push(key.to_string());
        let resolved = self.expand_expression(raw.to_string(), chain)?;
        chain.pop();

        Ok(resolved)
    }

    /// Substitute the first placeholder, then rescan, until none remain
    fn expand_expression(
        &self,
        mut expression: String,
        chain: &mut Vec<String>,
    ) -> std::result::Result<String, Failure> {
        while let Some(captures) = PLACEHOLDER_RE.captures(&expression) {
            let placeholder = captures[0].to_string();
            let referenced = captures[1].to_string();
            let value = self.resolve_key(&referenced, chain)?;
            tracing::trace!("Expanded {} to '{}'", placeholder, value);
            expression = expression.replace(&placeholder, &value);
        }
        Ok(expression)
    }
}
