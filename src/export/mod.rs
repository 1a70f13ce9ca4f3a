//! Rendering of analysis reports.
//!
//! Reports can be written as JSON for tooling, Markdown for pull-request
//! comments, or plain text for the terminal.

pub mod json;
pub mod markdown;
pub mod text;

use crate::engine::AnalysisReport;
use std::io::{self, Write};
use std::path::Path;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Human-readable terminal output
    #[default]
    Text,
    /// JSON format - machine-readable, full data
    Json,
    /// Markdown format - documentation/reporting
    Markdown,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            _ => Err(format!(
                "Unknown export format: '{}'. Valid formats: text, json, markdown",
                s
            )),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Text => write!(f, "text"),
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Trait for exporters.
pub trait Exporter {
    /// Export the report to the given writer.
    fn export<W: Write>(&self, report: &AnalysisReport, writer: &mut W) -> io::Result<()>;
}

/// Export a report in the specified format.
pub fn export<W: Write>(
    format: ExportFormat,
    report: &AnalysisReport,
    writer: &mut W,
) -> io::Result<()> {
    match format {
        ExportFormat::Text => text::TextExporter.export(report, writer),
        ExportFormat::Json => json::JsonExporter.export(report, writer),
        ExportFormat::Markdown => markdown::MarkdownExporter.export(report, writer),
    }
}

/// Export a report to a string.
pub fn export_to_string(format: ExportFormat, report: &AnalysisReport) -> io::Result<String> {
    let mut buffer = Vec::new();
    export(format, report, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// `path` relative to the project root when possible, for display.
pub(crate) fn display_path(report: &AnalysisReport, path: &Path) -> String {
    path.strip_prefix(&report.project_root)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
pub(crate) fn sample_report() -> AnalysisReport {
    use crate::engine::{RetainReason, RetainedDependency, ScanWarnings};
    use std::path::PathBuf;

    let mut report = AnalysisReport {
        project_root: PathBuf::from("/work/app"),
        analyzed: 5,
        unused: vec!["left-pad".into(), "moment".into()],
        retained: vec![RetainedDependency {
            name: "tslib".into(),
            reason: RetainReason::Protected,
        }],
        passes: 2,
        warnings: ScanWarnings {
            file_errors: 1,
            skipped_packages: 0,
        },
        ..Default::default()
    };
    report
        .evidence
        .insert("react".into(), vec![PathBuf::from("/work/app/src/App.tsx")]);
    report.evidence.insert(
        "@types/react".into(),
        vec![PathBuf::from("/work/app/src/App.tsx")],
    );
    report
        .supported_by
        .insert("@types/react".into(), "react".into());
    report
        .required_by
        .insert("scheduler".into(), ["react".to_string()].into());
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("text".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert_eq!(
            "md".parse::<ExportFormat>().unwrap(),
            ExportFormat::Markdown
        );
        assert!("csv".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_format_display() {
        assert_eq!(format!("{}", ExportFormat::Json), "json");
        assert_eq!(format!("{}", ExportFormat::Text), "text");
        assert_eq!(format!("{}", ExportFormat::Markdown), "markdown");
    }

    #[test]
    fn test_export_to_string_every_format() {
        let report = sample_report();
        for format in [ExportFormat::Text, ExportFormat::Json, ExportFormat::Markdown] {
            let out = export_to_string(format, &report).unwrap();
            assert!(out.contains("left-pad"), "{format} output lacks unused list");
        }
    }

    #[test]
    fn test_display_path() {
        let report = sample_report();
        assert_eq!(
            display_path(&report, Path::new("/work/app/src/App.tsx")),
            "src/App.tsx"
        );
        assert_eq!(display_path(&report, Path::new("/elsewhere/x.js")), "/elsewhere/x.js");
    }
}
