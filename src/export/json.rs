//! JSON export implementation.
//!
//! Emits the full report, with file paths made root-relative.

use super::{display_path, Exporter};
use crate::engine::AnalysisReport;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

/// JSON exporter implementation.
pub struct JsonExporter;

/// Summary statistics for JSON output.
#[derive(Serialize)]
struct JsonSummary {
    analyzed: usize,
    used: usize,
    unused: usize,
    retained: usize,
    closure_passes: usize,
    file_errors: usize,
    skipped_packages: usize,
}

#[derive(Serialize)]
struct JsonRetained<'a> {
    name: &'a str,
    reason: String,
}

/// Root JSON export structure.
#[derive(Serialize)]
struct JsonExport<'a> {
    project_root: String,
    summary: JsonSummary,
    unused: &'a [String],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    retained: Vec<JsonRetained<'a>>,
    evidence: BTreeMap<&'a str, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    required_by: BTreeMap<String, BTreeSet<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    supported_by: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    sub_dependency_usage: BTreeSet<String>,
}

impl Exporter for JsonExporter {
    fn export<W: Write>(&self, report: &AnalysisReport, writer: &mut W) -> io::Result<()> {
        let evidence = report
            .evidence
            .iter()
            .map(|(name, files)| {
                let files: Vec<String> = files.iter().map(|f| display_path(report, f)).collect();
                (name.as_str(), files)
            })
            .collect();

        let export = JsonExport {
            project_root: report.project_root.display().to_string(),
            summary: JsonSummary {
                analyzed: report.analyzed,
                used: report.used_count(),
                unused: report.unused.len(),
                retained: report.retained.len(),
                closure_passes: report.passes,
                file_errors: report.warnings.file_errors,
                skipped_packages: report.warnings.skipped_packages,
            },
            unused: &report.unused,
            retained: report
                .retained
                .iter()
                .map(|r| JsonRetained {
                    name: &r.name,
                    reason: r.reason.to_string(),
                })
                .collect(),
            evidence,
            required_by: report.required_by.clone(),
            supported_by: report.supported_by.clone(),
            sub_dependency_usage: report.sub_dependency_usage.clone(),
        };

        let json = serde_json::to_string_pretty(&export)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        writeln!(writer, "{}", json)
    }
}
