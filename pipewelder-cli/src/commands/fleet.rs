//! Fleet action handler
//!
//! Builds one fleet per configuration group and prints a line per pipeline.

use anyhow::{Context, Result, bail};
use colored::*;
use pipewelder_client::{DataPipelineClient, FsObjectStorage, ObjectStorage, SchedulingService};
use pipewelder_engine::{Action, BatchReport, FleetCoordinator, Outcome};
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, GroupConfig, load_groups};

/// Run `action` over every selected group
pub async fn run_action(action: Action, config: &Config) -> Result<()> {
    let groups = load_groups(&config.config_path, config.region.as_deref())?;
    info!("Reading configuration from {}", config.config_path.display());

    if let Some(selected) = &config.group {
        if !groups.iter().any(|g| &g.name == selected) {
            bail!("No group named '{}' in {}", selected, config.config_path.display());
        }
    }

    let storage: Arc<dyn ObjectStorage> = Arc::new(FsObjectStorage::new(&config.storage_root));

    for group in &groups {
        if config.group.as_ref().is_some_and(|selected| selected != &group.name) {
            continue;
        }

        println!("{} '{}'", "Acting on configuration".bold(), group.name.cyan());
        let service = scheduling_service(group, config)?;
        let mut fleet = FleetCoordinator::from_template_file(&group.template, service, storage.clone())
            .with_context(|| format!("Failed to load template: {}", group.template.display()))?;

        if group.dirs.is_empty() {
            println!("  {}", "No pipeline directories found".yellow());
        }
        fleet.add_pipelines(&group.dirs, &group.values);

        let report = fleet.run(action).await;
        print_report(&report);

        if !report.succeeded() {
            bail!("Failed '{}' action", action);
        }
    }

    Ok(())
}

/// Client for the group's control plane
fn scheduling_service(group: &GroupConfig, config: &Config) -> Result<Arc<dyn SchedulingService>> {
    let client = match (&config.endpoint, group.region.as_str()) {
        (Some(endpoint), _) => DataPipelineClient::new(endpoint.as_str()),
        (None, "") => bail!(
            "No region configured for group '{}'; set AWS_DEFAULT_REGION or pass --region",
            group.name
        ),
        (None, region) => DataPipelineClient::for_region(region),
    };
    info!("Using control plane at {}", client.endpoint());
    Ok(Arc::new(client))
}

fn print_report(report: &BatchReport) {
    for entry in &report.entries {
        match &entry.outcome {
            Outcome::Succeeded(message) => {
                println!("  {} {} {}", "✓".green(), entry.name.bold(), message.dimmed());
            }
            Outcome::Failed(message) => {
                println!("  {} {} {}", "✗".red(), entry.name.bold(), message.red());
            }
        }
    }

    let failed = report.failures().count();
    let summary = format!(
        "{}: {} succeeded, {} failed",
        report.action,
        report.entries.len() - failed,
        failed
    );
    if failed == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewelder_core::domain::values::ValueOverrides;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(endpoint: Option<&str>) -> Config {
        Config {
            config_path: PathBuf::from("pipewelder.json"),
            group: None,
            region: None,
            endpoint: endpoint.map(str::to_string),
            storage_root: PathBuf::from("."),
        }
    }

    fn group(region: &str) -> GroupConfig {
        GroupConfig {
            name: "main".to_string(),
            dirs: Vec::new(),
            region: region.to_string(),
            template: PathBuf::from("pipeline_definition.json"),
            values: ValueOverrides::new(),
        }
    }

    #[test]
    fn test_region_required_without_endpoint() {
        let err = scheduling_service(&group(""), &config(None)).err().unwrap();
        assert!(err.to_string().contains("No region configured"));

        assert!(scheduling_service(&group("us-east-1"), &config(None)).is_ok());
        assert!(scheduling_service(&group(""), &config(Some("http://localhost:4566"))).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_group() {
        let root = TempDir::new().unwrap();
        let mut config = config(Some("http://localhost:4566"));
        config.config_path = root.path().join("pipewelder.json");
        config.group = Some("nightly".to_string());

        let err = run_action(Action::Validate, &config).await.unwrap_err();
        assert!(err.to_string().contains("No group named 'nightly'"));
    }

    #[tokio::test]
    async fn test_missing_template_fails() {
        let root = TempDir::new().unwrap();
        let mut config = config(Some("http://localhost:4566"));
        config.config_path = root.path().join("pipewelder.json");

        let err = run_action(Action::Validate, &config).await.unwrap_err();
        assert!(err.to_string().contains("Failed to load template"));
    }
}
