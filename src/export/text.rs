//! Plain-text export for terminals.

use super::{display_path, Exporter};
use crate::engine::AnalysisReport;
use std::io::{self, Write};

/// Plain-text exporter implementation.
pub struct TextExporter;

impl Exporter for TextExporter {
    fn export<W: Write>(&self, report: &AnalysisReport, writer: &mut W) -> io::Result<()> {
        if report.unused.is_empty() {
            writeln!(writer, "No unused dependencies found.")?;
        } else {
            writeln!(writer, "Unused dependencies ({}):", report.unused.len())?;
            for name in &report.unused {
                writeln!(writer, "  {}", name)?;
                if let Some(requirers) = report.required_by.get(name) {
                    let list: Vec<&str> = requirers.iter().map(String::as_str).collect();
                    writeln!(writer, "    only required by unused: {}", list.join(", "))?;
                }
            }
        }

        if !report.retained.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "Retained ({}):", report.retained.len())?;
            for retained in &report.retained {
                writeln!(writer, "  {} ({})", retained.name, retained.reason)?;
            }
        }

        if !report.evidence.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "Used ({}):", report.evidence.len())?;
            for (name, files) in &report.evidence {
                let first = files
                    .first()
                    .map(|f| display_path(report, f))
                    .unwrap_or_default();
                match report.supported_by.get(name) {
                    Some(source) => writeln!(writer, "  {} via {} ({})", name, source, first)?,
                    None if files.len() > 1 => {
                        writeln!(writer, "  {} ({} and {} more)", name, first, files.len() - 1)?
                    }
                    None => writeln!(writer, "  {} ({})", name, first)?,
                }
            }
        }

        if !report.warnings.is_empty() {
            writeln!(writer)?;
            writeln!(
                writer,
                "Warnings: {} unreadable file(s), {} skipped installed package(s)",
                report.warnings.file_errors, report.warnings.skipped_packages
            )?;
        }

        Ok(())
    }
}
