//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::deploy::{BatchReport, ReleaseOutcome};
use crate::release::Release;
use crate::state::{StateChange, StateInfo};
use crate::workflow::{DeployRun, ExportSummary};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Release outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Release")]
    name: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Stored release row for table display.
#[derive(Tabled)]
struct ReleaseRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Version")]
    version: u32,
    #[tabled(rename = "Chart")]
    chart: String,
    #[tabled(rename = "Exported")]
    exported: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats an import or transfer run.
    #[must_use]
    pub fn format_deploy_run(&self, run: &DeployRun) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(run).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                for warning in &run.warnings {
                    let _ = writeln!(output, "{} {warning}", "⚠".yellow());
                }
                output.push_str(&Self::format_report_text(&run.report));
                output
            }
        }
    }

    /// Formats a batch report as text.
    fn format_report_text(report: &BatchReport) -> String {
        let mut output = String::new();

        if report.dry_run {
            for result in &report.results {
                if let ReleaseOutcome::DryRunRendered { output: rendered } = &result.outcome {
                    let _ = writeln!(output, "{rendered}");
                }
            }
        }

        if report.results.is_empty() {
            output.push_str("   No releases to deploy.\n");
        } else {
            let rows: Vec<OutcomeRow> = report
                .results
                .iter()
                .map(|r| {
                    let (result, detail) = Self::format_outcome(&r.outcome);
                    OutcomeRow {
                        name: r.name.clone(),
                        namespace: r.namespace.clone(),
                        result,
                        detail,
                    }
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let status = if report.has_failures() {
            format!("{} Batch finished with failures", "✗".red())
        } else {
            format!("{} Batch finished", "✓".green())
        };

        let _ = write!(
            output,
            "\n{status}: {} installed, {} skipped, {} failed, {} rendered, {} filtered out ({}s)\n",
            report.installed().to_string().green(),
            report.skipped().to_string().yellow(),
            report.failed().to_string().red(),
            report.rendered(),
            report.filtered_out,
            report.duration().num_seconds()
        );

        output
    }

    /// Formats an export summary.
    #[must_use]
    pub fn format_export(&self, summary: &ExportSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => {
                let prefix = if summary.dry_run { "Would export" } else { "Exported" };
                let mut output = format!(
                    "\n{} {prefix} to {}\n\n",
                    "✓".green(),
                    summary.storage_path
                );

                let _ = writeln!(output, "   Deployed: {}", summary.deployed);
                let _ = writeln!(output, "   Written: {}", summary.written.len());
                let _ = writeln!(output, "   Removed: {}", summary.removed.len());
                let _ = writeln!(output, "   Unchanged: {}", summary.unchanged);
                let _ = writeln!(output, "   State: {}", Self::format_state_change(summary.state));

                for file in &summary.written {
                    let _ = writeln!(output, "     {} {file}", "+".green());
                }
                for file in &summary.removed {
                    let _ = writeln!(output, "     {} {file}", "-".red());
                }

                output
            }
        }
    }

    /// Formats the state record, or its absence.
    #[must_use]
    pub fn format_state(&self, path: &str, info: Option<&StateInfo>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "path": path,
                "state": info,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => match info {
                Some(info) => {
                    let mut output = format!("\n💾 State: {path}\n\n");
                    let _ = writeln!(output, "   Release: {}", info.release_name);
                    let _ = writeln!(output, "   Version: {}", info.release_version);
                    let _ = writeln!(output, "   File: {}", info.release_filename);
                    output
                }
                None => format!("   No state found at {path}.\n"),
            },
        }
    }

    /// Formats stored releases.
    #[must_use]
    pub fn format_releases(&self, releases: &[Release]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(releases).unwrap_or_default(),
            OutputFormat::Text => {
                if releases.is_empty() {
                    return String::from("   No stored releases.\n");
                }

                let rows: Vec<ReleaseRow> = releases
                    .iter()
                    .map(|r| ReleaseRow {
                        name: r.name.clone(),
                        namespace: r.namespace.clone(),
                        version: r.version,
                        chart: r.chart.to_string(),
                        exported: r
                            .exported_at
                            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_default(),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let _ = write!(output, "\n\n{} stored releases\n", releases.len());
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "errors": result.errors,
                "warnings": result.warnings,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    format!("{} Configuration is invalid\n", "✗".red())
                };

                for error in &result.errors {
                    let _ = writeln!(output, "   - {error}");
                }
                if show_warnings {
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   {} {warning}", "⚠".yellow());
                    }
                }
                output
            }
        }
    }

    /// Formats a one-line success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::json!({ "status": "success", "message": message }).to_string()
            }
            OutputFormat::Text => format!("{} {message}", "✓".green()),
        }
    }

    /// Formats a one-line error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::json!({ "status": "error", "message": message }).to_string()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Formats an outcome with color and its detail text.
    fn format_outcome(outcome: &ReleaseOutcome) -> (String, String) {
        match outcome {
            ReleaseOutcome::Installed => ("installed".green().to_string(), String::new()),
            ReleaseOutcome::SkippedAlreadyExists => {
                ("skipped".yellow().to_string(), String::from("already exists"))
            }
            ReleaseOutcome::Failed { reason } => {
                ("failed".red().to_string(), Self::truncate(reason, 60))
            }
            ReleaseOutcome::DryRunRendered { .. } => {
                ("rendered".dimmed().to_string(), String::from("dry run"))
            }
        }
    }

    /// Formats a state change.
    fn format_state_change(change: Option<StateChange>) -> String {
        match change {
            Some(StateChange::Written) => "written".green().to_string(),
            Some(StateChange::Unchanged) => "unchanged".to_string(),
            Some(StateChange::Removed) => "removed".yellow().to_string(),
            Some(StateChange::Disabled) => "not managed".dimmed().to_string(),
            None => "skipped (dry run)".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{kept}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::ReleaseResult;
    use chrono::Utc;

    fn report() -> BatchReport {
        let now = Utc::now();
        BatchReport {
            results: vec![
                ReleaseResult {
                    name: String::from("web"),
                    namespace: String::from("apps"),
                    outcome: ReleaseOutcome::Installed,
                },
                ReleaseResult {
                    name: String::from("x"),
                    namespace: String::from("apps"),
                    outcome: ReleaseOutcome::SkippedAlreadyExists,
                },
            ],
            filtered_out: 0,
            dry_run: false,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_deploy_run_text() {
        colored::control::set_override(false);
        let run = DeployRun {
            run_id: String::from("host-1-abcdef12"),
            warnings: vec![String::from("forced")],
            report: report(),
        };

        let text = OutputFormatter::new(OutputFormat::Text).format_deploy_run(&run);
        assert!(text.contains("⚠ forced"));
        assert!(text.contains("web"));
        assert!(text.contains("1 installed, 1 skipped, 0 failed"));
    }

    #[test]
    fn test_deploy_run_json() {
        let run = DeployRun {
            run_id: String::from("host-1-abcdef12"),
            warnings: Vec::new(),
            report: report(),
        };

        let json = OutputFormatter::new(OutputFormat::Json).format_deploy_run(&run);
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["report"]["results"][1]["status"], "skipped_already_exists");
    }

    #[test]
    fn test_state_text() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let info = StateInfo::new("mgr-3.yaml", "mgr", 3);

        let text = formatter.format_state("snap/releasemanager.state.json", Some(&info));
        assert!(text.contains("Release: mgr"));
        assert!(formatter
            .format_state("snap/releasemanager.state.json", None)
            .contains("No state found"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("a long failure message", 10), "a long ...");
    }
}
