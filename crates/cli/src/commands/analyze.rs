//! `analyze`: size every pool in an inventory and report savings

use advisor_lib::gateway::{FileMetricsGateway, HttpMetricsGateway, MetricsGateway};
use advisor_lib::inventory::load_inventory;
use advisor_lib::pricing::{FilePricingSource, HttpPricingSource};
use advisor_lib::report::{self, RunReport};
use advisor_lib::{Analyzer, EngineMetrics, PricingCatalog, PricingSource, RetryPolicy};
use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use tabled::Tabled;
use tracing::{debug, info};

use crate::config::AnalyzeArgs;
use crate::output::{
    color_error_kind, color_severity, format_currency, format_timestamp, print_info, print_json,
    print_success, print_table, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Monthly Savings")]
    savings: String,
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

pub async fn run(args: AnalyzeArgs, format: OutputFormat) -> Result<()> {
    let policy = args.policy.load()?;
    let config = args.analyzer_config()?;

    let pools = load_inventory(&args.inventory)
        .await
        .context("Failed to load node pool inventory")?;
    debug!(
        inventory = %args.inventory.display(),
        pools = pools.len(),
        "Inventory loaded"
    );

    let catalog = load_catalog(&args).await?;
    let gateway = build_gateway(&args).await?;

    let analyzer = Analyzer::new(gateway, Arc::new(catalog), Arc::new(policy), config);
    let report = analyzer.run(pools).await;

    if let Some(dir) = &args.output_dir {
        let paths = report::persist(&report, dir).await?;
        info!(
            output_dir = %dir.display(),
            issues = %paths.issues.display(),
            "Run output persisted"
        );
    }
    if let Some(path) = &args.metrics_textfile {
        EngineMetrics::new()
            .write_textfile(path)
            .await
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        debug!(path = %path.display(), "Metrics textfile written");
    }

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_report(&report);
            if let Some(dir) = &args.output_dir {
                println!();
                print_success(&format!("Report written to {}", dir.display()));
            }
        }
    }

    Ok(())
}

async fn load_catalog(args: &AnalyzeArgs) -> Result<PricingCatalog> {
    let source: Box<dyn PricingSource> = match (&args.pricing_file, &args.pricing_url) {
        (Some(path), _) => Box::new(FilePricingSource::new(path)),
        (None, Some(url)) => Box::new(HttpPricingSource::new(url)?),
        (None, None) => anyhow::bail!("Either --pricing-file or --pricing-url is required"),
    };

    let catalog = RetryPolicy::default()
        .run("pricing", || source.load_catalog(&args.region))
        .await
        .with_context(|| format!("Failed to load pricing catalog for {}", args.region))?;

    if catalog.is_empty() {
        anyhow::bail!("Pricing catalog for {} has no entries", args.region);
    }
    info!(region = %args.region, entries = catalog.len(), "Pricing catalog loaded");
    Ok(catalog)
}

async fn build_gateway(args: &AnalyzeArgs) -> Result<Arc<dyn MetricsGateway>> {
    match (&args.metrics_file, &args.metrics_url) {
        (Some(path), _) => {
            let gateway = FileMetricsGateway::load(path)
                .await
                .context("Failed to load utilization samples")?;
            Ok(Arc::new(gateway))
        }
        (None, Some(url)) => Ok(Arc::new(
            HttpMetricsGateway::new(url).context("Failed to create metrics client")?,
        )),
        (None, None) => anyhow::bail!("Either --metrics-file or --metrics-url is required"),
    }
}

fn print_report(report: &RunReport) {
    let summary = &report.summary;

    println!("{}", "Node Pool Analysis".bold());
    println!("{}", "=".repeat(60));
    println!("Run:                    {}", report.run_id);
    println!("Generated:              {}", format_timestamp(&report.generated_at));
    println!("Region:                 {}", report.region.cyan());
    println!("Lookback:               {} days", report.lookback_days);
    println!(
        "Pools analyzed:         {} of {}",
        report.pools_analyzed, report.pools_total
    );
    println!();

    println!("{}", "Potential Savings".bold());
    println!("{}", "-".repeat(60));
    println!(
        "Monthly:                {}",
        format_currency(summary.total_monthly).green().bold()
    );
    println!(
        "Annual:                 {}",
        format_currency(summary.total_annual).green()
    );
    println!(
        "Issues:                 {} (high {}, medium {}, low {})",
        summary.issue_count, summary.by_severity.high, summary.by_severity.medium, summary.by_severity.low
    );
    println!();

    let mut issues: Vec<_> = report.issues.iter().collect();
    issues.sort_by(|a, b| {
        b.monthly_savings
            .total_cmp(&a.monthly_savings)
            .then_with(|| a.pool_id.cmp(&b.pool_id))
    });
    let rows: Vec<IssueRow> = issues
        .into_iter()
        .map(|issue| IssueRow {
            pool: issue.pool_id.to_string(),
            severity: color_severity(issue.severity),
            savings: format_currency(issue.monthly_savings),
            title: issue.title.clone(),
        })
        .collect();
    print_table(rows, "No issues found");

    if !report.script_errors.is_empty() {
        println!();
        print_warning(&format!(
            "{} pool(s) could not be analyzed",
            report.script_errors.len()
        ));
        let rows: Vec<ErrorRow> = report
            .script_errors
            .iter()
            .map(|e| ErrorRow {
                pool: e
                    .pool_id
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                kind: color_error_kind(e.kind),
                message: e.message.clone(),
            })
            .collect();
        print_table(rows, "");
    }

    if summary.issue_count > 0 {
        println!();
        print_info("Run with --format json for full details and next steps");
    }
}
