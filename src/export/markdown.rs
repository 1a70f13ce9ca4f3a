//! Markdown export implementation.
//!
//! Suited to pull-request comments and checked-in reports.

use super::{display_path, Exporter};
use crate::engine::AnalysisReport;
use std::io::{self, Write};

/// Markdown exporter implementation.
pub struct MarkdownExporter;

impl Exporter for MarkdownExporter {
    fn export<W: Write>(&self, report: &AnalysisReport, writer: &mut W) -> io::Result<()> {
        // Title
        writeln!(writer, "# Unused Dependency Report")?;
        writeln!(writer)?;
        writeln!(writer, "**Project:** `{}`", report.project_root.display())?;
        writeln!(writer)?;

        // Summary section
        writeln!(writer, "## Summary")?;
        writeln!(writer)?;
        writeln!(writer, "| Metric | Count |")?;
        writeln!(writer, "|--------|-------|")?;
        writeln!(writer, "| Analyzed | {} |", report.analyzed)?;
        writeln!(writer, "| Used | {} |", report.used_count())?;
        writeln!(writer, "| Unused | {} |", report.unused.len())?;
        writeln!(writer, "| Retained | {} |", report.retained.len())?;
        if !report.warnings.is_empty() {
            writeln!(writer, "| Unreadable Files | {} |", report.warnings.file_errors)?;
            writeln!(
                writer,
                "| Skipped Installed Packages | {} |",
                report.warnings.skipped_packages
            )?;
        }
        writeln!(writer)?;

        writeln!(writer, "## Unused Dependencies")?;
        writeln!(writer)?;
        if report.unused.is_empty() {
            writeln!(writer, "_None found._")?;
        } else {
            for name in &report.unused {
                writeln!(writer, "- `{}`", name)?;
            }
        }
        writeln!(writer)?;

        if !report.retained.is_empty() {
            writeln!(writer, "## Retained ({})", report.retained.len())?;
            writeln!(writer)?;
            writeln!(writer, "| Package | Reason |")?;
            writeln!(writer, "|---------|--------|")?;
            for retained in &report.retained {
                writeln!(writer, "| `{}` | {} |", retained.name, retained.reason)?;
            }
            writeln!(writer)?;
        }

        if !report.evidence.is_empty() {
            writeln!(writer, "## Usage Evidence")?;
            writeln!(writer)?;
            writeln!(writer, "| Package | Files | Supported By |")?;
            writeln!(writer, "|---------|-------|--------------|")?;
            for (name, files) in &report.evidence {
                let shown: Vec<String> = files
                    .iter()
                    .take(3)
                    .map(|f| format!("`{}`", display_path(report, f)))
                    .collect();
                let more = files.len().saturating_sub(shown.len());
                let mut cell = shown.join(", ");
                if more > 0 {
                    cell.push_str(&format!(" (+{} more)", more));
                }
                let supported = report
                    .supported_by
                    .get(name)
                    .map(String::as_str)
                    .unwrap_or("-");
                writeln!(writer, "| `{}` | {} | {} |", name, cell, supported)?;
            }
            writeln!(writer)?;
        }

        if !report.required_by.is_empty() {
            writeln!(writer, "## Transitive Requirements")?;
            writeln!(writer)?;
            writeln!(writer, "| Package | Required By |")?;
            writeln!(writer, "|---------|-------------|")?;
            for (name, requirers) in &report.required_by {
                let list: Vec<&str> = requirers.iter().map(String::as_str).collect();
                writeln!(writer, "| `{}` | {} |", name, list.join(", "))?;
            }
            writeln!(writer)?;
        }

        writeln!(writer, "---")?;
        writeln!(writer, "*Generated by depsweep*")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::sample_report;
    use std::path::PathBuf;

    fn render(report: &AnalysisReport) -> String {
        let mut output = Vec::new();
        MarkdownExporter.export(report, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_markdown_export_sections() {
        let md = render(&sample_report());

        assert!(md.contains("# Unused Dependency Report"));
        assert!(md.contains("| Unused | 2 |"));
        assert!(md.contains("- `left-pad`"));
        assert!(md.contains("| `tslib` | protected |"));
        assert!(md.contains("| `@types/react` | `src/App.tsx` | react |"));
        assert!(md.contains("| `scheduler` | react |"));
        assert!(md.contains("| Unreadable Files | 1 |"));
    }

    #[test]
    fn test_markdown_export_clean_project() {
        let md = render(&AnalysisReport::default());

        assert!(md.contains("_None found._"));
        assert!(!md.contains("## Retained"));
        assert!(!md.contains("Unreadable Files"));
    }

    #[test]
    fn test_markdown_export_truncates_evidence() {
        let mut report = AnalysisReport::default();
        let files = (0..5).map(|i| PathBuf::from(format!("/f{i}.js"))).collect();
        report.evidence.insert("react".into(), files);

        let md = render(&report);
        assert!(md.contains("(+2 more)"));
    }
}
