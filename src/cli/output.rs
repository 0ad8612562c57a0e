//! Output formatting for CLI results
//!
//! JSON and YAML for machines, plain text for people.

use crate::maven::steps::StepReport;
use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_images(&self, images: &[String]) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(&images),
            OutputFormat::Yaml => to_yaml(&images),
            OutputFormat::Human => Ok(images.join("\n")),
        }
    }

    pub fn format_reports(&self, reports: &[StepReport]) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(&reports),
            OutputFormat::Yaml => to_yaml(&reports),
            OutputFormat::Human => Ok(reports
                .iter()
                .map(|report| {
                    if report.skipped {
                        format!("{}: skipped", report.name)
                    } else if report.id.is_empty() {
                        format!("{}: done", report.name)
                    } else {
                        format!("{}: {}", report.name, report.id)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output as JSON")
}

fn to_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_yaml::to_string(value).context("Failed to serialize output as YAML")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reports() -> Vec<StepReport> {
        vec![
            StepReport {
                name: "maven".to_string(),
                id: "abc123".to_string(),
                skipped: false,
            },
            StepReport {
                name: "maven-prod".to_string(),
                id: String::new(),
                skipped: false,
            },
        ]
    }

    #[test]
    fn test_images_human() {
        let images = vec!["a:1".to_string(), "tomcat:latest".to_string()];
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_images(&images)
            .unwrap();
        assert_eq!(output, "a:1\ntomcat:latest");
    }

    #[test]
    fn test_images_json() {
        let images = vec!["tomcat:latest".to_string()];
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_images(&images)
            .unwrap();
        let parsed: Vec<String> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, images);
    }

    #[test]
    fn test_reports_human() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_reports(&reports())
            .unwrap();
        assert_eq!(output, "maven: abc123\nmaven-prod: done");
    }

    #[test]
    fn test_reports_yaml() {
        let output = OutputFormatter::new(OutputFormat::Yaml)
            .format_reports(&reports())
            .unwrap();
        assert!(output.contains("name: maven-prod"));
        assert!(output.contains("skipped: false"));
    }
}
