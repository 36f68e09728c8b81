//! Output formatting for glint results.
//!
//! Supports three output formats:
//! - Text: colored terminal output for human readability
//! - JSON: a flat array of diagnostics, for programmatic consumption
//! - SARIF: Static Analysis Results Interchange Format for IDE/CI integration

use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use crate::config::OutputFormat;
use crate::engine::RunStats;
use crate::rule::{Diagnostic, Rule, Severity};

/// Everything a reporter needs from a finished run.
pub struct Report<'a> {
    /// Root that SARIF URIs are made relative to.
    pub base_path: &'a Path,
    pub diagnostics: &'a [Diagnostic],
    pub rules: &'a [Arc<dyn Rule>],
    pub stats: &'a RunStats,
    pub cancelled: bool,
}

impl Report<'_> {
    /// Write the report in `format`.
    pub fn write<W: Write>(&self, out: &mut W, format: OutputFormat) -> anyhow::Result<()> {
        match format {
            OutputFormat::Text => write_text(out, self)?,
            OutputFormat::Json => write_json(out, self.diagnostics)?,
            OutputFormat::Sarif => write_sarif(out, self)?,
        }
        Ok(())
    }
}

/// Diagnostic counts by severity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeverityCounts {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl SeverityCounts {
    pub fn of(diagnostics: &[Diagnostic]) -> Self {
        let mut counts = Self::default();
        for d in diagnostics {
            match d.severity {
                Severity::Error => counts.errors += 1,
                Severity::Warning => counts.warnings += 1,
                Severity::Info => counts.infos += 1,
            }
        }
        counts
    }
}

// =============================================================================
// JSON Format
// =============================================================================

/// One diagnostic in the JSON report.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonDiagnostic {
    pub rule: String,
    pub category: String,
    pub severity: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub message: String,
}

impl From<&Diagnostic> for JsonDiagnostic {
    fn from(d: &Diagnostic) -> Self {
        Self {
            rule: d.rule.clone(),
            category: d.category.to_string(),
            severity: d.severity.to_string(),
            file: d.start.file.clone(),
            line: d.start.line,
            column: d.start.column,
            end_line: d.end.line,
            end_column: d.end.column,
            message: d.message.clone(),
        }
    }
}

/// Write diagnostics as a JSON array.
pub fn write_json<W: Write>(out: &mut W, diagnostics: &[Diagnostic]) -> serde_json::Result<()> {
    let records: Vec<JsonDiagnostic> = diagnostics.iter().map(JsonDiagnostic::from).collect();
    serde_json::to_writer_pretty(&mut *out, &records)?;
    writeln!(out).map_err(serde_json::Error::io)
}

// =============================================================================
// SARIF Format
// =============================================================================

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const TOOL_NAME: &str = "glint";

#[derive(Serialize)]
struct SarifReport {
    version: &'static str,
    #[serde(rename = "$schema")]
    schema: &'static str,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    invocations: Vec<SarifInvocation>,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifInvocation {
    execution_successful: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_execution_notifications: Vec<SarifNotification>,
}

#[derive(Serialize)]
struct SarifNotification {
    level: &'static str,
    message: SarifMessage,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
struct SarifDriver {
    name: &'static str,
    version: &'static str,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
struct SarifRule {
    id: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "defaultConfiguration")]
    default_config: SarifRuleConfig,
    properties: SarifRuleProperties,
}

#[derive(Serialize)]
struct SarifRuleConfig {
    level: &'static str,
}

#[derive(Serialize)]
struct SarifRuleProperties {
    category: &'static str,
}

#[derive(Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: &'static str,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifact,
    region: SarifRegion,
}

#[derive(Serialize)]
struct SarifArtifact {
    uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifRegion {
    start_line: usize,
    start_column: usize,
    end_line: usize,
    end_column: usize,
}

fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

fn make_relative_path(file_path: &str, base_path: &Path) -> String {
    if base_path.as_os_str().is_empty() {
        return file_path.to_string();
    }

    let file = Path::new(file_path);

    // Single file scan
    if file == base_path {
        return file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string());
    }

    file.strip_prefix(base_path)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| file_path.to_string())
}

/// Write results as a SARIF 2.1.0 log with one run.
pub fn write_sarif<W: Write>(out: &mut W, report: &Report<'_>) -> serde_json::Result<()> {
    let rules = report
        .rules
        .iter()
        .map(|rule| SarifRule {
            id: rule.name().to_string(),
            short_description: SarifMessage {
                text: rule.description().to_string(),
            },
            default_config: SarifRuleConfig {
                level: sarif_level(rule.severity()),
            },
            properties: SarifRuleProperties {
                category: rule.category().as_str(),
            },
        })
        .collect();

    let results = report
        .diagnostics
        .iter()
        .map(|d| SarifResult {
            rule_id: d.rule.clone(),
            level: sarif_level(d.severity),
            message: SarifMessage {
                text: d.message.clone(),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifact {
                        uri: make_relative_path(&d.start.file, report.base_path),
                    },
                    region: SarifRegion {
                        start_line: d.start.line.max(1),
                        start_column: d.start.column.max(1),
                        end_line: d.end.line.max(1),
                        end_column: d.end.column.max(1),
                    },
                },
            }],
        })
        .collect();

    let invocation = SarifInvocation {
        execution_successful: !report.cancelled,
        tool_execution_notifications: if report.cancelled {
            vec![SarifNotification {
                level: "error",
                message: SarifMessage {
                    text: format!(
                        "run cancelled: {} files not analyzed",
                        report.stats.not_dispatched
                    ),
                },
            }]
        } else {
            Vec::new()
        },
    };

    let sarif = SarifReport {
        version: SARIF_VERSION,
        schema: SARIF_SCHEMA,
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME,
                    version: env!("CARGO_PKG_VERSION"),
                    rules,
                },
            },
            invocations: vec![invocation],
            results,
        }],
    };

    serde_json::to_writer_pretty(&mut *out, &sarif)?;
    writeln!(out).map_err(serde_json::Error::io)
}

// =============================================================================
// Text Format
// =============================================================================

/// Write results in human-readable form, grouped by file.
///
/// Coloring follows the process-wide `colored` override.
pub fn write_text<W: Write>(out: &mut W, report: &Report<'_>) -> io::Result<()> {
    let mut by_file: BTreeMap<&str, Vec<&Diagnostic>> = BTreeMap::new();
    for d in report.diagnostics {
        by_file.entry(d.start.file.as_str()).or_default().push(d);
    }

    for (file, diagnostics) in &by_file {
        writeln!(out, "{}", file.blue().bold())?;
        for d in diagnostics {
            writeln!(
                out,
                "  {:>4}:{:<3} {} {} {}",
                d.start.line,
                d.start.column,
                severity_tag(d.severity),
                d.message,
                format!("({})", d.rule).dimmed()
            )?;
        }
        writeln!(out)?;
    }

    write_summary(out, report)
}

fn severity_tag(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "error  ".red(),
        Severity::Warning => "warning".yellow(),
        Severity::Info => "info   ".blue(),
    }
}

fn write_summary<W: Write>(out: &mut W, report: &Report<'_>) -> io::Result<()> {
    let counts = SeverityCounts::of(report.diagnostics);
    let stats = report.stats;

    if report.diagnostics.is_empty() && report.cancelled {
        write!(out, "{}", "! no problems found in the files analyzed".yellow())?;
    } else if report.diagnostics.is_empty() {
        write!(out, "{}", "✓ no problems found".green())?;
    } else {
        write!(
            out,
            "{} {} ({} errors, {} warnings, {} info)",
            "✗".red(),
            format!("{} problems", report.diagnostics.len()).bold(),
            counts.errors,
            counts.warnings,
            counts.infos
        )?;
    }
    writeln!(
        out,
        "  {}",
        format!(
            "[{} analyzed, {} cached, {} skipped]",
            stats.analyzed, stats.cached, stats.skipped
        )
        .dimmed()
    )?;

    if report.cancelled {
        writeln!(
            out,
            "{}",
            format!(
                "run cancelled: {} files not analyzed",
                stats.not_dispatched
            )
            .yellow()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Category, Position};
    use crate::rules::LineLength;

    fn diag(file: &str, line: usize, severity: Severity) -> Diagnostic {
        Diagnostic {
            rule: "line-length".to_string(),
            category: Category::Style,
            severity,
            start: Position::new(file, line, 1),
            end: Position::new(file, line, 40),
            message: "line is 39 characters (max 20)".to_string(),
        }
    }

    fn render(format: OutputFormat, diagnostics: &[Diagnostic], cancelled: bool) -> String {
        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(LineLength::new(20))];
        let stats = RunStats {
            analyzed: 2,
            cached: 1,
            skipped: 0,
            not_dispatched: 3,
        };
        let report = Report {
            base_path: Path::new("/src"),
            diagnostics,
            rules: &rules,
            stats: &stats,
            cancelled,
        };
        let mut out = Vec::new();
        report.write(&mut out, format).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_severity_counts() {
        let diags = vec![
            diag("a.go", 1, Severity::Error),
            diag("a.go", 2, Severity::Warning),
            diag("a.go", 3, Severity::Warning),
        ];
        assert_eq!(
            SeverityCounts::of(&diags),
            SeverityCounts {
                errors: 1,
                warnings: 2,
                infos: 0
            }
        );
    }

    #[test]
    fn test_json_is_flat_array() {
        let diags = vec![diag("/src/a.go", 3, Severity::Warning)];
        let out = render(OutputFormat::Json, &diags, false);
        let parsed: Vec<JsonDiagnostic> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].rule, "line-length");
        assert_eq!(parsed[0].category, "style");
        assert_eq!(parsed[0].severity, "warning");
        assert_eq!(parsed[0].file, "/src/a.go");
        assert_eq!((parsed[0].line, parsed[0].column), (3, 1));
        assert_eq!((parsed[0].end_line, parsed[0].end_column), (3, 40));
    }

    #[test]
    fn test_sarif_structure() {
        let diags = vec![diag("/src/pkg/a.go", 3, Severity::Info)];
        let out = render(OutputFormat::Sarif, &diags, false);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["version"], "2.1.0");
        let run = &value["runs"][0];
        assert_eq!(run["tool"]["driver"]["name"], "glint");
        assert_eq!(run["tool"]["driver"]["rules"][0]["id"], "line-length");
        let result = &run["results"][0];
        assert_eq!(result["level"], "note");
        let location = &result["locations"][0]["physicalLocation"];
        assert_eq!(location["artifactLocation"]["uri"], "pkg/a.go");
        assert_eq!(location["region"]["startLine"], 3);
        assert_eq!(location["region"]["endColumn"], 40);
        assert_eq!(run["invocations"][0]["executionSuccessful"], true);
        assert!(run["invocations"][0].get("toolExecutionNotifications").is_none());
    }

    #[test]
    fn test_sarif_marks_cancelled_run_unsuccessful() {
        let out = render(OutputFormat::Sarif, &[], true);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let invocation = &value["runs"][0]["invocations"][0];
        assert_eq!(invocation["executionSuccessful"], false);
        assert_eq!(
            invocation["toolExecutionNotifications"][0]["message"]["text"],
            "run cancelled: 3 files not analyzed"
        );
    }

    #[test]
    fn test_text_output() {
        colored::control::set_override(false);
        let diags = vec![
            diag("a.go", 3, Severity::Error),
            diag("b.go", 1, Severity::Warning),
        ];
        let out = render(OutputFormat::Text, &diags, false);
        assert!(out.contains("a.go\n"));
        assert!(out.contains("line is 39 characters (max 20) (line-length)"));
        assert!(out.contains("2 problems (1 errors, 1 warnings, 0 info)"));
        assert!(!out.contains("cancelled"));
    }

    #[test]
    fn test_text_output_clean_and_cancelled() {
        colored::control::set_override(false);
        let out = render(OutputFormat::Text, &[], false);
        assert!(out.contains("✓ no problems found"));

        let out = render(OutputFormat::Text, &[], true);
        assert!(!out.contains("✓"));
        assert!(out.contains("no problems found in the files analyzed"));
        assert!(out.contains("[2 analyzed, 1 cached, 0 skipped]"));
        assert!(out.contains("3 files not analyzed"));
    }

    #[test]
    fn test_make_relative_path() {
        assert_eq!(make_relative_path("/src/a/b.go", Path::new("/src")), "a/b.go");
        assert_eq!(make_relative_path("/src/a.go", Path::new("/src/a.go")), "a.go");
        assert_eq!(make_relative_path("/other/a.go", Path::new("/src")), "/other/a.go");
    }
}
