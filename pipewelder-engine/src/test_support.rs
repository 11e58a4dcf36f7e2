//! Shared fixtures for engine tests

use pipewelder_core::PipelineInstance;
use pipewelder_core::domain::template::{StringOrList, Template};
use pipewelder_core::domain::values::ValueOverrides;

pub const TEMPLATE: &str = r##"{
    "objects": [
        {
            "id": "Default",
            "scheduleType": "cron",
            "schedule": {"ref": "DefaultSchedule"}
        },
        {
            "id": "DefaultSchedule",
            "type": "Schedule",
            "period": "#{mySchedulePeriod}",
            "startDateTime": "#{myStartDateTime}"
        },
        {
            "id": "ShellCommandActivity",
            "type": "ShellCommandActivity",
            "command": "#{myS3InputDir}/run #{myEnv}"
        }
    ],
    "parameters": [
        {"id": "myName", "type": "String"},
        {"id": "mySchedulePeriod", "type": "String", "default": "1 days"},
        {"id": "myStartDateTime", "type": "String"},
        {"id": "myEnv", "type": "String", "default": "dev"},
        {"id": "myS3InputDir", "type": "String", "default": "s3://bucket/pipelines/#{myName}"}
    ]
}"##;

pub fn template() -> Template {
    Template::from_json(TEMPLATE).unwrap()
}

pub fn values(pairs: &[(&str, &str)]) -> ValueOverrides {
    let mut values: ValueOverrides = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), StringOrList::from(*v)))
        .collect();
    values
        .entry("myStartDateTime".to_string())
        .or_insert_with(|| "2199-01-01T00:00:00".into());
    values
}

/// A pipeline named `name` with extra values
pub fn pipeline(name: &str, pairs: &[(&str, &str)]) -> PipelineInstance {
    let mut values = values(pairs);
    values.insert("myName".to_string(), name.into());
    PipelineInstance::new(&template(), format!("pipelines/{}", name), values).unwrap()
}
