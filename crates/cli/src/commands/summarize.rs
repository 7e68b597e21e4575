//! `summarize`: re-aggregate persisted issues from one or more runs

use advisor_lib::report::load_issues;
use advisor_lib::{Aggregator, Issue};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use tabled::Tabled;
use tracing::debug;

use crate::output::{color_severity, format_currency, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct TopRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Monthly Savings")]
    savings: String,
    #[tabled(rename = "Title")]
    title: String,
}

pub async fn run(files: &[PathBuf], top: usize, format: OutputFormat) -> Result<()> {
    let mut issues: Vec<Issue> = Vec::new();
    for path in files {
        let loaded = load_issues(path)
            .await
            .with_context(|| format!("Failed to load issues from {}", path.display()))?;
        debug!(path = %path.display(), issues = loaded.len(), "Loaded persisted issues");
        issues.extend(loaded);
    }

    let summary = Aggregator::new(top).aggregate(&issues);

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            println!("{}", "Savings Summary".bold());
            println!("{}", "=".repeat(50));
            println!("Files:                  {}", files.len());
            println!(
                "Issues:                 {} (high {}, medium {}, low {})",
                summary.issue_count,
                summary.by_severity.high,
                summary.by_severity.medium,
                summary.by_severity.low
            );
            println!(
                "{}      {}",
                "Monthly Savings:".bold(),
                format_currency(summary.total_monthly).green().bold()
            );
            println!(
                "Annual Savings:         {}",
                format_currency(summary.total_annual).green()
            );
            println!();

            let rows: Vec<TopRow> = summary
                .top
                .iter()
                .enumerate()
                .map(|(i, issue)| TopRow {
                    rank: i + 1,
                    pool: issue.pool_id.to_string(),
                    severity: color_severity(issue.severity),
                    savings: format_currency(issue.monthly_savings),
                    title: issue.title.clone(),
                })
                .collect();
            print_table(rows, "No issues found");
        }
    }

    Ok(())
}
