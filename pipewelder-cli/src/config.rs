//! Configuration module
//!
//! CLI settings plus the `pipewelder.json` file. The file maps group names
//! to group settings; a `defaults` entry applies to every group. Without a
//! file there is one group, `pipewelder`, rooted next to where the file
//! would be.

use anyhow::{Context, Result};
use pipewelder_core::domain::values::{VALUES_FILE, ValueOverrides};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE: &str = "pipewelder.json";

/// Group used when no configuration file exists
pub const IMPLICIT_GROUP: &str = "pipewelder";

const DEFAULTS_KEY: &str = "defaults";
const DEFAULT_TEMPLATE: &str = "pipeline_definition.json";

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of `pipewelder.json`; it need not exist
    pub config_path: PathBuf,
    /// Only act on this group
    pub group: Option<String>,
    /// Region for groups that do not set one
    pub region: Option<String>,
    /// Explicit control plane URL
    pub endpoint: Option<String>,
    /// Root directory of the file-copy object storage
    pub storage_root: PathBuf,
}

/// One group entry as written in the file; unset fields fall through
#[derive(Debug, Clone, Default, Deserialize)]
struct GroupEntry {
    dirs: Option<Vec<String>>,
    region: Option<String>,
    template: Option<String>,
    values: Option<ValueOverrides>,
}

impl GroupEntry {
    fn builtin() -> Self {
        Self {
            dirs: Some(vec!["*".to_string()]),
            region: Some(String::new()),
            template: Some(DEFAULT_TEMPLATE.to_string()),
            values: Some(ValueOverrides::new()),
        }
    }

    /// Fields of `self`, falling back to `fallback`
    fn over(self, fallback: GroupEntry) -> GroupEntry {
        GroupEntry {
            dirs: self.dirs.or(fallback.dirs),
            region: self.region.or(fallback.region),
            template: self.template.or(fallback.template),
            values: self.values.or(fallback.values),
        }
    }
}

/// A fully resolved pipeline group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupConfig {
    pub name: String,
    /// Pipeline directories, each holding a `values.json`
    pub dirs: Vec<PathBuf>,
    /// May be empty when an explicit endpoint is used
    pub region: String,
    pub template: PathBuf,
    /// Merged over every pipeline's `values.json`
    pub values: ValueOverrides,
}

/// Load every group from `config_path`
///
/// `region` is the CLI/environment default, applied under each group's own
/// setting and over the file's `defaults`.
pub fn load_groups(config_path: &Path, region: Option<&str>) -> Result<Vec<GroupConfig>> {
    let absolute = std::path::absolute(config_path)
        .with_context(|| format!("Failed to resolve {}", config_path.display()))?;
    let base_dir = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut entries: BTreeMap<String, GroupEntry> = if absolute.is_file() {
        let content = std::fs::read_to_string(&absolute)
            .with_context(|| format!("Failed to read configuration file: {}", absolute.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration file: {}", absolute.display()))?
    } else {
        BTreeMap::from([(IMPLICIT_GROUP.to_string(), GroupEntry::default())])
    };

    let file_defaults = entries.remove(DEFAULTS_KEY).unwrap_or_default();
    let cli_defaults = GroupEntry {
        region: region.map(str::to_string),
        ..GroupEntry::default()
    };
    let defaults = cli_defaults.over(file_defaults.over(GroupEntry::builtin()));

    entries
        .into_iter()
        .map(|(name, entry)| resolve_group(name, entry.over(defaults.clone()), &base_dir))
        .collect()
}

fn resolve_group(name: String, entry: GroupEntry, base_dir: &Path) -> Result<GroupConfig> {
    let patterns = entry.dirs.unwrap_or_default();
    let dirs = pipeline_dirs(base_dir, &patterns)
        .with_context(|| format!("Failed to resolve dirs of group '{}'", name))?;

    Ok(GroupConfig {
        dirs,
        region: entry.region.unwrap_or_default(),
        template: base_dir.join(entry.template.unwrap_or_else(|| DEFAULT_TEMPLATE.to_string())),
        values: entry.values.unwrap_or_default(),
        name,
    })
}

/// Directories matching `patterns` under `base_dir` that hold a values file
fn pipeline_dirs(base_dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for pattern in patterns {
        let full_pattern = base_dir.join(pattern).display().to_string();
        for entry in glob::glob(&full_pattern)? {
            let path = entry?;
            if path.join(VALUES_FILE).is_file() && !dirs.contains(&path) {
                dirs.push(path);
            }
        }
    }
    Ok(dirs)
}
