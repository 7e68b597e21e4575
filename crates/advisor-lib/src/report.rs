//! Run report: persisted JSON artifacts and the plain-text summary

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use crate::aggregate::Summary;
use crate::error::ScriptError;
use crate::files::{read_json, LoadError};
use crate::models::Issue;

pub const ISSUES_FILE: &str = "issues.json";
pub const SCRIPT_ERRORS_FILE: &str = "script_errors.json";
pub const REPORT_FILE: &str = "report.txt";

/// Everything one analysis run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub region: String,
    pub lookback_days: u32,
    pub pools_total: usize,
    pub pools_analyzed: usize,
    pub issues: Vec<Issue>,
    pub script_errors: Vec<ScriptError>,
    pub summary: Summary,
}

#[derive(Tabled)]
struct TopRow {
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Monthly Savings")]
    monthly_savings: String,
    #[tabled(rename = "Title")]
    title: String,
}

#[derive(Tabled)]
struct ErrorRow {
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Human-readable report, free of terminal colors
pub fn render_text(report: &RunReport) -> String {
    let summary = &report.summary;
    let mut lines = vec![
        "Node Pool Advisor Report".to_string(),
        format!("Run:       {}", report.run_id),
        format!("Generated: {}", report.generated_at.to_rfc3339()),
        format!("Region:    {}", report.region),
        format!("Lookback:  {} days", report.lookback_days),
        format!(
            "Pools:     {} analyzed of {} ({} could not be analyzed)",
            report.pools_analyzed,
            report.pools_total,
            report.script_errors.len()
        ),
        String::new(),
        format!(
            "Potential savings: {:.2} per month, {:.2} per year",
            summary.total_monthly, summary.total_annual
        ),
        format!(
            "Issues: {} (high {}, medium {}, low {})",
            summary.issue_count, summary.by_severity.high, summary.by_severity.medium, summary.by_severity.low
        ),
    ];

    if !summary.top.is_empty() {
        let rows: Vec<TopRow> = summary
            .top
            .iter()
            .map(|top| TopRow {
                pool: top.pool_id.to_string(),
                severity: top.severity.to_string(),
                monthly_savings: format!("{:.2}", top.monthly_savings),
                title: top.title.clone(),
            })
            .collect();
        lines.push(String::new());
        lines.push("Top opportunities:".to_string());
        lines.push(Table::new(rows).with(Style::rounded()).to_string());
    }

    if !report.script_errors.is_empty() {
        let rows: Vec<ErrorRow> = report
            .script_errors
            .iter()
            .map(|e| ErrorRow {
                pool: e
                    .pool_id
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                kind: e.kind.to_string(),
                message: e.message.clone(),
            })
            .collect();
        lines.push(String::new());
        lines.push("Pools not analyzed:".to_string());
        lines.push(Table::new(rows).with(Style::rounded()).to_string());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Paths written by [`persist`]
#[derive(Debug, Clone)]
pub struct PersistedPaths {
    pub issues: PathBuf,
    pub script_errors: PathBuf,
    pub report: PathBuf,
}

/// Write `issues.json`, `script_errors.json` and `report.txt` under `dir`
pub async fn persist(report: &RunReport, dir: &Path) -> Result<PersistedPaths> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let paths = PersistedPaths {
        issues: dir.join(ISSUES_FILE),
        script_errors: dir.join(SCRIPT_ERRORS_FILE),
        report: dir.join(REPORT_FILE),
    };

    let issues = serde_json::to_string_pretty(&report.issues).context("Failed to serialize issues")?;
    tokio::fs::write(&paths.issues, issues)
        .await
        .with_context(|| format!("Failed to write {}", paths.issues.display()))?;

    let errors = serde_json::to_string_pretty(&report.script_errors)
        .context("Failed to serialize script errors")?;
    tokio::fs::write(&paths.script_errors, errors)
        .await
        .with_context(|| format!("Failed to write {}", paths.script_errors.display()))?;

    tokio::fs::write(&paths.report, render_text(report))
        .await
        .with_context(|| format!("Failed to write {}", paths.report.display()))?;

    info!(
        event = "report_persisted",
        run_id = %report.run_id,
        dir = %dir.display(),
        issues = report.issues.len(),
        script_errors = report.script_errors.len(),
        "Persisted run report"
    );

    Ok(paths)
}

/// Read a persisted `issues.json`
pub async fn load_issues(path: &Path) -> Result<Vec<Issue>, LoadError> {
    read_json(path).await
}
