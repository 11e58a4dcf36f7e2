//! Fleet actions

use std::fmt;
use std::str::FromStr;

/// An operation applied to every pipeline of a fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Validate definitions with the control plane
    Validate,
    /// Publish definitions
    PutDefinition,
    /// Mirror pipeline files to object storage
    Upload,
    /// Activate definitions, recreating pipelines when needed
    Activate,
    /// Delete pipelines
    Delete,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Validate,
        Action::PutDefinition,
        Action::Upload,
        Action::Activate,
        Action::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Validate => "validate",
            Action::PutDefinition => "put-definition",
            Action::Upload => "upload",
            Action::Activate => "activate",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('_', "-");
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| format!("unknown action '{}'", s))
    }
}
